use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::api::arrange_dto::{CourseSubmitDto, ExamSubmitDto, SubmitResponseDto, TransactionDto, TransactionListRequestDto};
use crate::api::table_dto::{CalendarRowDto, ClassroomRowDto, LessonRowDto, OccupancyRowDto, SectionRowDto, tables};
use crate::domain::remote::portal_endpoint::PortalEndpoint;
use crate::domain::remote::portal_store_trait::{PortalStore, TablePage, TransactionPage};
use crate::domain::remote::table_query::{OrderDir, TableQuery};
use crate::domain::utils::interval::TimeInterval;
use crate::error::{Error, Result};

#[derive(Debug, Default)]
struct MockInner {
    tables: HashMap<String, Vec<serde_json::Value>>,
    transactions: Vec<TransactionDto>,
    fetch_counts: HashMap<String, usize>,
    offline: bool,
    next_exam_arrangement: u32,
}

/// In-memory stand-in for the portal backend.
///
/// Serves the generic table endpoint with the same substring search and
/// paging rules as the real one, and performs the authoritative occupancy
/// check at submission time, writing the new bookings atomically.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPortalStore {
    inner: Arc<Mutex<MockInner>>,
}

fn cell_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(text) => text.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn decode_rows<T: DeserializeOwned>(inner: &MockInner, table: &str) -> Result<Vec<T>> {
    inner
        .tables
        .get(table)
        .map(|rows| rows.iter().map(|row| serde_json::from_value(row.clone()).map_err(|e| Error::InvalidRow(e.to_string()))).collect())
        .unwrap_or_else(|| Ok(Vec::new()))
}

impl InMemoryPortalStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add_row<T: Serialize>(&self, table: &str, row: &T) -> Result<()> {
        let value = serde_json::to_value(row)?;
        self.lock().tables.entry(table.to_string()).or_default().push(value);
        Ok(())
    }

    pub fn add_lesson(&self, row: LessonRowDto) -> Result<()> {
        self.add_row(tables::LESSONS, &row)
    }

    pub fn add_calendar_entry(&self, row: CalendarRowDto) -> Result<()> {
        self.add_row(tables::CALENDAR, &row)
    }

    pub fn add_occupancy(&self, row: OccupancyRowDto) -> Result<()> {
        self.add_row(tables::OCCUPANCY, &row)
    }

    pub fn add_classroom(&self, row: ClassroomRowDto) -> Result<()> {
        self.add_row(tables::CLASSROOMS, &row)
    }

    pub fn add_section(&self, row: SectionRowDto) -> Result<()> {
        self.add_row(tables::COURSE_SECTIONS, &row)
    }

    pub fn add_transaction(&self, transaction: TransactionDto) {
        self.lock().transactions.push(transaction);
    }

    /// While offline every call fails with `Error::Transient`.
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Number of `list_table` calls served for `table`.
    pub fn fetch_count(&self, table: &str) -> usize {
        self.lock().fetch_counts.get(table).copied().unwrap_or(0)
    }

    pub fn occupancy_on(&self, date: NaiveDate) -> Result<Vec<OccupancyRowDto>> {
        let inner = self.lock();
        Ok(decode_rows::<OccupancyRowDto>(&inner, tables::OCCUPANCY)?.into_iter().filter(|row| row.date == date).collect())
    }

    pub fn pending_transaction_count(&self) -> usize {
        self.lock().transactions.len()
    }

    /// While offline, fails with the transport error reqwest reports for a
    /// request that never reaches the portal.
    async fn check_online(&self, endpoint: PortalEndpoint) -> Result<()> {
        let offline = self.lock().offline;
        if !offline {
            return Ok(());
        }

        let failure = match reqwest::Client::builder().build() {
            Ok(client) => client.request(endpoint.method(), format!("offline://portal{}", endpoint.path())).send().await.err(),
            Err(e) => Some(e),
        };
        Err(match failure {
            Some(e) => Error::Transient(e),
            None => Error::Remote { endpoint: endpoint.to_string(), message: "portal unreachable".to_string() },
        })
    }

    fn room_conflict(occupancy: &[OccupancyRowDto], room: &str, interval: &TimeInterval) -> Option<OccupancyRowDto> {
        occupancy.iter().find(|row| row.room == room && TimeInterval::new(row.begin, row.end).overlaps(interval)).cloned()
    }
}

#[async_trait]
impl PortalStore for InMemoryPortalStore {
    async fn list_table(&self, query: &TableQuery) -> Result<TablePage> {
        self.check_online(PortalEndpoint::TableList).await?;
        let mut inner = self.lock();
        *inner.fetch_counts.entry(query.table_name.clone()).or_insert(0) += 1;

        let mut rows: Vec<serde_json::Value> = inner
            .tables
            .get(&query.table_name)
            .map(|rows| {
                rows.iter()
                    .filter(|row| {
                        query.search.iter().all(|(field, needle)| row.get(field).map(|cell| cell_text(cell).to_lowercase().contains(&needle.to_lowercase())).unwrap_or(false))
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some(order_by) = &query.order_by {
            rows.sort_by(|a, b| {
                let (a, b) = (a.get(order_by), b.get(order_by));
                let ordering = match (a.and_then(|v| v.as_f64()), b.and_then(|v| v.as_f64())) {
                    (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal),
                    _ => a.map(cell_text).cmp(&b.map(cell_text)),
                };
                if query.order_dir == OrderDir::Desc { ordering.reverse() } else { ordering }
            });
        }

        let total = rows.len() as u64;
        let skip = (query.page.max(1) as usize - 1) * query.limit as usize;
        let rows = rows.into_iter().skip(skip).take(query.limit as usize).collect();

        Ok(TablePage { rows, total })
    }

    async fn list_transactions(&self, request: &TransactionListRequestDto) -> Result<TransactionPage> {
        self.check_online(PortalEndpoint::TransactionList).await?;
        let inner = self.lock();

        let matching: Vec<TransactionDto> = inner
            .transactions
            .iter()
            .filter(|transaction| match &request.search {
                Some(term) => {
                    let course_code = match transaction {
                        TransactionDto::Course(course) => &course.course_code,
                        TransactionDto::Exam(exam) => &exam.course_code,
                    };
                    transaction.id().contains(term.as_str()) || course_code.contains(term.as_str())
                }
                None => true,
            })
            .cloned()
            .collect();

        let total = matching.len() as u64;
        let skip = (request.page.max(1) as usize - 1) * request.limit as usize;
        let transactions = matching.into_iter().skip(skip).take(request.limit as usize).collect();

        Ok(TransactionPage { transactions, total })
    }

    async fn submit_course(&self, body: &CourseSubmitDto) -> Result<SubmitResponseDto> {
        self.check_online(PortalEndpoint::CourseSubmit).await?;
        let mut inner = self.lock();

        let Some(position) = inner.transactions.iter().position(|t| matches!(t, TransactionDto::Course(course) if course.course_code == body.courno)) else {
            return Ok(SubmitResponseDto::rejected(format!("Course {} has no pending arrangement", body.courno)));
        };
        let TransactionDto::Course(course) = inner.transactions[position].clone() else {
            return Ok(SubmitResponseDto::rejected("Transaction kind mismatch"));
        };

        let lessons: HashMap<u8, LessonRowDto> = decode_rows::<LessonRowDto>(&inner, tables::LESSONS)?.into_iter().map(|row| (row.lesson_index, row)).collect();
        let calendar = decode_rows::<CalendarRowDto>(&inner, tables::CALENDAR)?;
        let occupancy = decode_rows::<OccupancyRowDto>(&inner, tables::OCCUPANCY)?;

        let mut new_rows = Vec::new();
        let mut class_hours = 0;
        for week in &body.weeks {
            let Some(entry) = calendar.iter().find(|row| row.semester == course.semester_code && row.weekday == body.selected_day && row.week == week.week) else {
                return Ok(SubmitResponseDto::rejected(format!("Week {} does not exist for weekday {}", week.week, body.selected_day)));
            };

            for lesson in &week.lessons {
                let Some(slot) = lesson.parse::<u8>().ok().and_then(|index| lessons.get(&index)) else {
                    return Ok(SubmitResponseDto::rejected(format!("Unknown lesson '{}'", lesson)));
                };
                let interval = TimeInterval::on_date(entry.date, slot.begin, slot.end);

                if let Some(conflict) = Self::room_conflict(&occupancy, &week.classroom, &interval) {
                    return Ok(SubmitResponseDto::rejected(format!(
                        "Classroom {} is already occupied on {} from {} to {}",
                        week.classroom,
                        conflict.date,
                        conflict.begin.time(),
                        conflict.end.time()
                    )));
                }

                new_rows.push(OccupancyRowDto { room: week.classroom.clone(), date: entry.date, begin: interval.begin, end: interval.end });
                class_hours += 1;
            }
        }

        for row in new_rows {
            let value = serde_json::to_value(&row)?;
            inner.tables.entry(tables::OCCUPANCY.to_string()).or_default().push(value);
        }
        inner.transactions.remove(position);

        Ok(SubmitResponseDto { success: true, classhour: Some(class_hours), ..Default::default() })
    }

    async fn submit_exam(&self, body: &ExamSubmitDto) -> Result<SubmitResponseDto> {
        self.check_online(PortalEndpoint::ExamSubmit).await?;
        let mut inner = self.lock();

        let Some(position) = inner.transactions.iter().position(|t| matches!(t, TransactionDto::Exam(exam) if exam.id == body.setup_e_id)) else {
            return Ok(SubmitResponseDto::rejected(format!("Exam setup {} has no pending arrangement", body.setup_e_id)));
        };
        let TransactionDto::Exam(exam) = inner.transactions[position].clone() else {
            return Ok(SubmitResponseDto::rejected("Transaction kind mismatch"));
        };
        let (Some(begin), Some(end)) = (exam.window_begin, exam.window_end) else {
            return Ok(SubmitResponseDto::rejected("Exam has no time window"));
        };
        let window = TimeInterval::new(begin, end);

        let classrooms = decode_rows::<ClassroomRowDto>(&inner, tables::CLASSROOMS)?;
        let occupancy = decode_rows::<OccupancyRowDto>(&inner, tables::OCCUPANCY)?;
        let people: u32 = decode_rows::<SectionRowDto>(&inner, tables::COURSE_SECTIONS)?.iter().filter(|s| s.courno == exam.course_code).map(|s| s.headcount).sum();

        let mut capacity = 0;
        for room in &body.classrooms {
            let Some(asset) = classrooms.iter().find(|c| &c.name == room) else {
                return Ok(SubmitResponseDto::rejected(format!("Unknown classroom {}", room)));
            };
            if let Some(conflict) = Self::room_conflict(&occupancy, room, &window) {
                return Ok(SubmitResponseDto::rejected(format!("Classroom {} is already occupied on {} from {} to {}", room, conflict.date, conflict.begin.time(), conflict.end.time())));
            }
            capacity += asset.capacity;
        }

        for room in &body.classrooms {
            for date in window.dates() {
                let row = OccupancyRowDto { room: room.clone(), date, begin: begin.max(date.and_hms_opt(0, 0, 0).unwrap_or(begin)), end };
                let value = serde_json::to_value(&row)?;
                inner.tables.entry(tables::OCCUPANCY.to_string()).or_default().push(value);
            }
        }
        inner.transactions.remove(position);
        inner.next_exam_arrangement += 1;
        let eno = format!("EA{:05}", inner.next_exam_arrangement);

        Ok(SubmitResponseDto { success: true, eno: Some(eno), capacity: Some(capacity), people: Some(people), ..Default::default() })
    }
}
