use std::collections::BTreeSet;

use crate::api::arrange_dto::{CourseTransactionDto, ExamTransactionDto, TransactionDto};
use crate::api::table_dto::{SectionRowDto, tables};
use crate::domain::remote::portal_store_trait::{PortalStore, fetch_all};
use crate::domain::remote::table_query::TableQuery;
use crate::domain::utils::id::{CampusId, CourseCode, SemesterCode, TransactionId};
use crate::domain::utils::interval::TimeInterval;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionKind {
    Course,
    Exam,
}

/// An approved request to teach a course, waiting for dates, lessons and rooms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseTransaction {
    pub id: TransactionId,
    pub course_code: CourseCode,
    pub semester: SemesterCode,
    pub campus: CampusId,
    pub max_headcount: u32,
    pub eligible_weekdays: BTreeSet<u8>,
    pub total_class_hours: u32,
}

impl From<CourseTransactionDto> for CourseTransaction {
    fn from(dto: CourseTransactionDto) -> Self {
        let eligible_weekdays = dto.eligible_weekdays.into_iter().filter(|day| (1..=7).contains(day)).collect();

        CourseTransaction {
            id: TransactionId::new(dto.id),
            course_code: CourseCode::new(dto.course_code),
            semester: SemesterCode::new(dto.semester_code),
            campus: CampusId::new(dto.campus),
            max_headcount: dto.max_headcount,
            eligible_weekdays,
            total_class_hours: dto.total_class_hours,
        }
    }
}

/// An approved request to hold an exam in a fixed time window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExamTransaction {
    pub id: TransactionId,
    pub course_code: CourseCode,
    pub window: Option<TimeInterval>,
    pub expected_headcount: u32,
}

impl ExamTransaction {
    pub fn from_dto(dto: ExamTransactionDto, expected_headcount: u32) -> Self {
        let window = match (dto.window_begin, dto.window_end) {
            (Some(begin), Some(end)) if begin < end => Some(TimeInterval::new(begin, end)),
            (Some(begin), Some(end)) => {
                log::warn!("Exam {} has an empty time window ({} - {}); treating it as missing.", dto.id, begin, end);
                None
            }
            _ => None,
        };

        ExamTransaction { id: TransactionId::new(dto.id), course_code: CourseCode::new(dto.course_code), window, expected_headcount }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transaction {
    Course(CourseTransaction),
    Exam(ExamTransaction),
}

impl Transaction {
    pub fn id(&self) -> &TransactionId {
        match self {
            Transaction::Course(course) => &course.id,
            Transaction::Exam(exam) => &exam.id,
        }
    }

    pub fn kind(&self) -> TransactionKind {
        match self {
            Transaction::Course(_) => TransactionKind::Course,
            Transaction::Exam(_) => TransactionKind::Exam,
        }
    }

    /// Builds the domain transaction, deriving what the listing does not
    /// carry (the expected exam headcount).
    pub async fn load(store: &dyn PortalStore, page_limit: u32, dto: TransactionDto) -> Result<Transaction> {
        match dto {
            TransactionDto::Course(course) => Ok(Transaction::Course(course.into())),
            TransactionDto::Exam(exam) => {
                let headcount = expected_headcount(store, page_limit, &CourseCode::new(exam.course_code.clone())).await?;
                Ok(Transaction::Exam(ExamTransaction::from_dto(exam, headcount)))
            }
        }
    }
}

/// Sum of the enrollment of every section of `course`. Sections are added
/// as they come, without deduplication.
pub async fn expected_headcount(store: &dyn PortalStore, page_limit: u32, course: &CourseCode) -> Result<u32> {
    let query = TableQuery::new(tables::COURSE_SECTIONS, page_limit).search("courno", course.as_str());
    let sections: Vec<SectionRowDto> = fetch_all(store, query).await?;

    Ok(sections.iter().filter(|section| section.courno == course.as_str()).map(|section| section.headcount).sum())
}
