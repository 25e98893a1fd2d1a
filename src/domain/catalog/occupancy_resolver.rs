use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use chrono::{NaiveDate, NaiveDateTime};
use futures::future::try_join_all;

use crate::api::table_dto::{OccupancyRowDto, tables};
use crate::domain::catalog::room_catalog::RoomAsset;
use crate::domain::remote::portal_store_trait::{PortalStore, fetch_all};
use crate::domain::remote::table_query::TableQuery;
use crate::domain::utils::id::RoomName;
use crate::domain::utils::interval::TimeInterval;
use crate::error::Result;

/// An existing booking of a room. Blocks every new booking overlapping it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccupancyRecord {
    pub room: RoomName,
    pub date: NaiveDate,
    pub begin: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl OccupancyRecord {
    pub fn interval(&self) -> TimeInterval {
        TimeInterval::new(self.begin, self.end)
    }
}

impl From<OccupancyRowDto> for OccupancyRecord {
    fn from(row: OccupancyRowDto) -> Self {
        OccupancyRecord { room: RoomName::new(row.room), date: row.date, begin: row.begin, end: row.end }
    }
}

/// Ordering of free-room candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomOrder {
    /// Capacity ascending, then name. Used for courses.
    TightestFirst,
    /// Capacity descending, then name. Used for exams.
    LargestFirst,
}

type DayRecords = Arc<Vec<OccupancyRecord>>;

/// Per-date cache of occupancy records.
///
/// Entries are only ever replaced whole, after a fetch has completed.
#[derive(Debug, Clone)]
pub struct OccupancyResolver {
    store: Arc<dyn PortalStore>,
    page_limit: u32,
    inner: Arc<RwLock<HashMap<NaiveDate, DayRecords>>>,
}

impl OccupancyResolver {
    pub fn new(store: Arc<dyn PortalStore>, page_limit: u32) -> Self {
        OccupancyResolver { store, page_limit, inner: Arc::new(RwLock::new(HashMap::new())) }
    }

    fn cached(&self, date: NaiveDate) -> Option<DayRecords> {
        self.inner.read().expect("RwLock poisoned").get(&date).cloned()
    }

    pub fn is_cached(&self, date: NaiveDate) -> bool {
        self.inner.read().expect("RwLock poisoned").contains_key(&date)
    }

    async fn fetch(store: &dyn PortalStore, page_limit: u32, date: NaiveDate) -> Result<(NaiveDate, DayRecords)> {
        let day = date.format("%Y-%m-%d").to_string();
        let query = TableQuery::new(tables::OCCUPANCY, page_limit).search("date", day);
        let rows: Vec<OccupancyRowDto> = fetch_all(store, query).await?;

        let records = rows.into_iter().filter(|row| row.date == date).map(OccupancyRecord::from).collect::<Vec<_>>();
        log::debug!("Fetched {} occupancy records for {}.", records.len(), date);
        Ok((date, Arc::new(records)))
    }

    /// Records booked on `date`, fetched on first use.
    pub async fn records(&self, date: NaiveDate) -> Result<DayRecords> {
        if let Some(records) = self.cached(date) {
            return Ok(records);
        }

        let (date, records) = Self::fetch(self.store.as_ref(), self.page_limit, date).await?;
        self.inner.write().expect("RwLock poisoned").insert(date, records.clone());
        Ok(records)
    }

    /// Fetches every uncached date concurrently.
    pub async fn prefetch(&self, dates: &[NaiveDate]) -> Result<()> {
        let missing: BTreeSet<NaiveDate> = dates.iter().copied().filter(|date| !self.is_cached(*date)).collect();
        if missing.is_empty() {
            return Ok(());
        }

        let store = self.store.as_ref();
        let fetched = try_join_all(missing.into_iter().map(|date| Self::fetch(store, self.page_limit, date))).await?;

        let mut guard = self.inner.write().expect("RwLock poisoned");
        for (date, records) in fetched {
            guard.insert(date, records);
        }
        Ok(())
    }

    /// Drops the cached entries of `dates` so the next lookup re-fetches them.
    pub fn invalidate(&self, dates: &[NaiveDate]) {
        let mut guard = self.inner.write().expect("RwLock poisoned");
        for date in dates {
            if guard.remove(date).is_some() {
                log::debug!("Invalidated occupancy cache for {}.", date);
            }
        }
    }

    /// Rooms with at least one booking on `date` overlapping any of `intervals`.
    pub async fn occupied_rooms(&self, date: NaiveDate, intervals: &[TimeInterval]) -> Result<BTreeSet<RoomName>> {
        let records = self.records(date).await?;
        Ok(Self::rooms_overlapping(&records, intervals))
    }

    /// Rooms occupied anywhere within `window`, which may span several dates.
    /// Bookings of the previous day are consulted for overnight overlap.
    pub async fn occupied_rooms_during(&self, window: &TimeInterval) -> Result<BTreeSet<RoomName>> {
        let dates = window.occupancy_dates();
        self.prefetch(&dates).await?;

        let mut occupied = BTreeSet::new();
        for date in dates {
            occupied.extend(self.occupied_rooms(date, std::slice::from_ref(window)).await?);
        }
        Ok(occupied)
    }

    pub fn rooms_overlapping(records: &[OccupancyRecord], intervals: &[TimeInterval]) -> BTreeSet<RoomName> {
        records
            .iter()
            .filter(|record| {
                let booked = record.interval();
                intervals.iter().any(|candidate| booked.overlaps(candidate))
            })
            .map(|record| record.room.clone())
            .collect()
    }

    /// `eligible - occupied`, restricted to rooms seating at least `min_capacity`.
    pub fn free_rooms(eligible: &[RoomAsset], occupied: &BTreeSet<RoomName>, min_capacity: u32, order: RoomOrder) -> Vec<RoomAsset> {
        let mut free: Vec<RoomAsset> = eligible.iter().filter(|room| !occupied.contains(&room.name) && room.capacity >= min_capacity).cloned().collect();

        match order {
            RoomOrder::TightestFirst => free.sort_by(|a, b| a.capacity.cmp(&b.capacity).then_with(|| a.name.cmp(&b.name))),
            RoomOrder::LargestFirst => free.sort_by(|a, b| b.capacity.cmp(&a.capacity).then_with(|| a.name.cmp(&b.name))),
        }
        free
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::room_catalog::RoomStatus;
    use crate::domain::utils::id::CampusId;

    fn room(name: &str, capacity: u32) -> RoomAsset {
        RoomAsset { name: RoomName::new(name), campus: CampusId::new("Main"), building: "A".to_string(), capacity, status: RoomStatus::Active }
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 3).unwrap().and_hms_opt(h, m, 0).unwrap()
    }

    fn booking(room: &str, begin: NaiveDateTime, end: NaiveDateTime) -> OccupancyRecord {
        OccupancyRecord { room: RoomName::new(room), date: begin.date(), begin, end }
    }

    #[test]
    fn test_rooms_overlapping_any_candidate() {
        let records = vec![booking("A101", at(8, 0), at(9, 40)), booking("A102", at(10, 0), at(11, 40)), booking("A103", at(14, 0), at(15, 40))];
        let candidates = vec![TimeInterval::new(at(9, 0), at(9, 45)), TimeInterval::new(at(11, 0), at(11, 45))];

        let occupied = OccupancyResolver::rooms_overlapping(&records, &candidates);

        assert_eq!(occupied, BTreeSet::from([RoomName::new("A101"), RoomName::new("A102")]));
    }

    #[test]
    fn test_back_to_back_booking_is_not_a_conflict() {
        let records = vec![booking("A101", at(8, 0), at(9, 0))];
        let candidates = vec![TimeInterval::new(at(9, 0), at(10, 0))];

        assert!(OccupancyResolver::rooms_overlapping(&records, &candidates).is_empty());
    }

    #[test]
    fn test_course_free_rooms_respect_capacity_and_tightest_fit() {
        let eligible = vec![room("B", 60), room("A", 60), room("C", 30), room("D", 120), room("E", 45)];
        let occupied = BTreeSet::from([RoomName::new("D")]);

        let free = OccupancyResolver::free_rooms(&eligible, &occupied, 40, RoomOrder::TightestFirst);
        let names: Vec<&str> = free.iter().map(|r| r.name.as_str()).collect();

        assert_eq!(names, vec!["E", "A", "B"]);
        assert!(free.iter().all(|r| r.capacity >= 40));
    }

    #[test]
    fn test_exam_free_rooms_largest_first() {
        let eligible = vec![room("S1", 30), room("L1", 200), room("M1", 80)];

        let free = OccupancyResolver::free_rooms(&eligible, &BTreeSet::new(), 0, RoomOrder::LargestFirst);
        let names: Vec<&str> = free.iter().map(|r| r.name.as_str()).collect();

        assert_eq!(names, vec!["L1", "M1", "S1"]);
    }
}
