use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveTime};

use crate::api::table_dto::{LessonRowDto, tables};
use crate::domain::arrangement::validation::ValidationError;
use crate::domain::remote::portal_store_trait::{PortalStore, fetch_all};
use crate::domain::remote::table_query::{OrderDir, TableQuery};
use crate::domain::utils::interval::TimeInterval;
use crate::error::Result;

pub const MAX_LESSON_INDEX: u8 = 13;

/// One class period of the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LessonSlot {
    pub index: u8,
    pub begin: NaiveTime,
    pub end: NaiveTime,
}

/// Lesson index -> clock time. Loaded once per session and never mutated.
#[derive(Debug, Clone, Default)]
pub struct LessonTimetable {
    slots: BTreeMap<u8, LessonSlot>,
}

impl LessonTimetable {
    /// Rows outside `1..=13` or with an empty time range are dropped.
    pub fn from_slots(slots: impl IntoIterator<Item = LessonSlot>) -> Self {
        let mut timetable = LessonTimetable::default();

        for slot in slots {
            if slot.index == 0 || slot.index > MAX_LESSON_INDEX || slot.begin >= slot.end {
                log::warn!("Ignoring lesson slot {} ({} - {}): not a valid class period.", slot.index, slot.begin, slot.end);
                continue;
            }
            timetable.slots.insert(slot.index, slot);
        }
        timetable
    }

    pub async fn load(store: &dyn PortalStore, page_limit: u32) -> Result<Self> {
        let query = TableQuery::new(tables::LESSONS, page_limit).order_by("lessonIndex", OrderDir::Asc);
        let rows: Vec<LessonRowDto> = fetch_all(store, query).await?;

        let timetable = Self::from_slots(rows.into_iter().map(|row| LessonSlot { index: row.lesson_index, begin: row.begin, end: row.end }));
        log::info!("Lesson timetable loaded with {} periods.", timetable.len());
        Ok(timetable)
    }

    pub fn get(&self, index: u8) -> Option<&LessonSlot> {
        self.slots.get(&index)
    }

    pub fn contains(&self, index: u8) -> bool {
        self.slots.contains_key(&index)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> impl Iterator<Item = &LessonSlot> {
        self.slots.values()
    }

    /// Wall-clock intervals of `lessons` on `date`.
    pub fn intervals_on<'a>(&self, date: NaiveDate, lessons: impl IntoIterator<Item = &'a u8>) -> std::result::Result<Vec<TimeInterval>, ValidationError> {
        lessons
            .into_iter()
            .map(|index| self.get(*index).map(|slot| TimeInterval::on_date(date, slot.begin, slot.end)).ok_or(ValidationError::UnknownLesson(*index)))
            .collect()
    }
}
