use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::api::table_dto::{ClassroomRowDto, tables};
use crate::domain::remote::portal_store_trait::{PortalStore, fetch_all};
use crate::domain::remote::table_query::{OrderDir, TableQuery};
use crate::domain::utils::id::{CampusId, RoomName};
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomStatus {
    Active,
    Inactive,
}

impl RoomStatus {
    pub fn parse(raw: &str) -> RoomStatus {
        if raw.trim().eq_ignore_ascii_case("active") { RoomStatus::Active } else { RoomStatus::Inactive }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomAsset {
    pub name: RoomName,
    pub campus: CampusId,
    pub building: String,
    pub capacity: u32,
    pub status: RoomStatus,
}

impl RoomAsset {
    pub fn is_active(&self) -> bool {
        self.status == RoomStatus::Active
    }
}

impl From<ClassroomRowDto> for RoomAsset {
    fn from(row: ClassroomRowDto) -> Self {
        RoomAsset { name: RoomName::new(row.name), campus: CampusId::new(row.campus), building: row.building, capacity: row.capacity, status: RoomStatus::parse(&row.status) }
    }
}

type Rooms = Arc<Vec<RoomAsset>>;

#[derive(Debug, Default)]
struct CatalogInner {
    by_campus: HashMap<CampusId, Rooms>,
    all: Option<Rooms>,
}

/// Active rooms per campus and overall, cached for one arrangement session.
#[derive(Debug, Clone)]
pub struct RoomCatalog {
    store: Arc<dyn PortalStore>,
    page_limit: u32,
    inner: Arc<RwLock<CatalogInner>>,
}

impl RoomCatalog {
    pub fn new(store: Arc<dyn PortalStore>, page_limit: u32) -> Self {
        RoomCatalog { store, page_limit, inner: Arc::new(RwLock::new(CatalogInner::default())) }
    }

    async fn fetch(&self, query: TableQuery) -> Result<Vec<RoomAsset>> {
        let rows: Vec<ClassroomRowDto> = fetch_all(self.store.as_ref(), query).await?;
        Ok(rows.into_iter().map(RoomAsset::from).filter(RoomAsset::is_active).collect())
    }

    /// Active rooms belonging to `campus`.
    pub async fn rooms_for_campus(&self, campus: &CampusId) -> Result<Rooms> {
        if let Some(rooms) = self.inner.read().expect("RwLock poisoned").by_campus.get(campus).cloned() {
            return Ok(rooms);
        }

        let query = TableQuery::new(tables::CLASSROOMS, self.page_limit).search("campus", campus.as_str()).order_by("capacity", OrderDir::Asc);
        let rooms: Vec<RoomAsset> = self.fetch(query).await?.into_iter().filter(|room| &room.campus == campus).collect();
        log::debug!("Campus {} has {} active rooms.", campus, rooms.len());

        let rooms = Arc::new(rooms);
        self.inner.write().expect("RwLock poisoned").by_campus.insert(campus.clone(), rooms.clone());
        Ok(rooms)
    }

    /// Every active room, regardless of campus.
    pub async fn all_rooms(&self) -> Result<Rooms> {
        if let Some(rooms) = self.inner.read().expect("RwLock poisoned").all.clone() {
            return Ok(rooms);
        }

        let rooms = Arc::new(self.fetch(TableQuery::new(tables::CLASSROOMS, self.page_limit).order_by("capacity", OrderDir::Desc)).await?);
        log::debug!("Loaded {} active rooms across all campuses.", rooms.len());

        self.inner.write().expect("RwLock poisoned").all = Some(rooms.clone());
        Ok(rooms)
    }

    /// Capacity of a room already present in one of the caches.
    pub fn capacity_of(&self, room: &RoomName) -> Option<u32> {
        let guard = self.inner.read().expect("RwLock poisoned");
        guard.all.iter().chain(guard.by_campus.values()).flat_map(|rooms| rooms.iter()).find(|asset| &asset.name == room).map(|asset| asset.capacity)
    }

    /// Rooms whose name contains `term`. Terms shorter than `min_length` return
    /// nothing without touching the store.
    pub async fn search_rooms(&self, term: &str, min_length: usize) -> Result<Vec<RoomAsset>> {
        let term = term.trim();
        if term.chars().count() < min_length {
            return Ok(Vec::new());
        }

        let query = TableQuery::new(tables::CLASSROOMS, self.page_limit).search("name", term).order_by("name", OrderDir::Asc);
        self.fetch(query).await
    }
}
