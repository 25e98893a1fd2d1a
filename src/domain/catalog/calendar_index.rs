use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use chrono::NaiveDate;

use crate::api::table_dto::{CalendarRowDto, tables};
use crate::domain::remote::portal_store_trait::{PortalStore, fetch_all};
use crate::domain::remote::table_query::{OrderDir, TableQuery};
use crate::domain::utils::id::SemesterCode;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayType {
    Normal,
    Holiday,
}

impl DayType {
    pub fn parse(raw: &str) -> DayType {
        if raw.trim().eq_ignore_ascii_case("holiday") { DayType::Holiday } else { DayType::Normal }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarEntry {
    pub semester: SemesterCode,
    /// 1 = Monday ... 7 = Sunday.
    pub weekday: u8,
    pub week: u32,
    pub date: NaiveDate,
    pub day_type: DayType,
    pub holiday_name: Option<String>,
}

impl CalendarEntry {
    pub fn is_holiday(&self) -> bool {
        self.day_type == DayType::Holiday
    }
}

impl From<CalendarRowDto> for CalendarEntry {
    fn from(row: CalendarRowDto) -> Self {
        CalendarEntry {
            semester: SemesterCode::new(row.semester),
            weekday: row.weekday,
            week: row.week,
            date: row.date,
            day_type: DayType::parse(&row.day_type),
            holiday_name: row.holiday_name.filter(|name| !name.trim().is_empty()),
        }
    }
}

/// Whether the weeks of a `(semester, weekday)` pair are known yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarLoadState {
    NotLoaded,
    /// Loaded, but the calendar has no such day in that semester.
    Empty,
    Loaded(usize),
}

type WeekEntries = Arc<BTreeMap<u32, CalendarEntry>>;

/// `(semester, weekday, week)` -> calendar date, fetched one weekday at a time.
#[derive(Debug, Clone)]
pub struct CalendarIndex {
    store: Arc<dyn PortalStore>,
    page_limit: u32,
    inner: Arc<RwLock<HashMap<(SemesterCode, u8), WeekEntries>>>,
}

impl CalendarIndex {
    pub fn new(store: Arc<dyn PortalStore>, page_limit: u32) -> Self {
        CalendarIndex { store, page_limit, inner: Arc::new(RwLock::new(HashMap::new())) }
    }

    fn cached(&self, key: &(SemesterCode, u8)) -> Option<WeekEntries> {
        let guard = self.inner.read().expect("RwLock poisoned");
        guard.get(key).cloned()
    }

    /// All week entries of the pair. The first call fetches every week in one
    /// request; later calls are cache hits, including for pairs with no rows.
    pub async fn entries(&self, semester: &SemesterCode, weekday: u8) -> Result<WeekEntries> {
        let key = (semester.clone(), weekday);
        if let Some(entries) = self.cached(&key) {
            log::debug!("Calendar cache hit for semester {} weekday {}.", semester, weekday);
            return Ok(entries);
        }

        let query = TableQuery::new(tables::CALENDAR, self.page_limit)
            .search("semester", semester.as_str())
            .search("weekday", weekday.to_string())
            .order_by("week", OrderDir::Asc);
        let rows: Vec<CalendarRowDto> = fetch_all(self.store.as_ref(), query).await?;

        let entries: BTreeMap<u32, CalendarEntry> = rows
            .into_iter()
            .filter(|row| row.semester == semester.as_str() && row.weekday == weekday)
            .map(|row| (row.week, CalendarEntry::from(row)))
            .collect();

        if entries.is_empty() {
            log::info!("Semester {} has no calendar days on weekday {}.", semester, weekday);
        }

        let entries = Arc::new(entries);
        self.inner.write().expect("RwLock poisoned").insert(key, entries.clone());
        Ok(entries)
    }

    pub async fn resolve(&self, semester: &SemesterCode, weekday: u8, week: u32) -> Result<Option<CalendarEntry>> {
        Ok(self.entries(semester, weekday).await?.get(&week).cloned())
    }

    /// Sorted week numbers that have an entry.
    pub async fn available_weeks(&self, semester: &SemesterCode, weekday: u8) -> Result<Vec<u32>> {
        Ok(self.entries(semester, weekday).await?.keys().copied().collect())
    }

    pub fn load_state(&self, semester: &SemesterCode, weekday: u8) -> CalendarLoadState {
        match self.cached(&(semester.clone(), weekday)) {
            None => CalendarLoadState::NotLoaded,
            Some(entries) if entries.is_empty() => CalendarLoadState::Empty,
            Some(entries) => CalendarLoadState::Loaded(entries.len()),
        }
    }
}
