use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::api::serde_time;

/// Body of `POST /arrange/course/submit`.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CourseSubmitDto {
    pub courno: String,
    pub selected_day: u8,
    pub per_session_lessons: u32,
    pub weeks: Vec<WeekAssignmentDto>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct WeekAssignmentDto {
    pub week: u32,
    /// Lesson indices, sent as strings.
    pub lessons: Vec<String>,
    pub classroom: String,
}

/// Body of `POST /arrange/exam/submit`.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExamSubmitDto {
    #[serde(rename = "setupEId")]
    pub setup_e_id: String,
    pub classrooms: Vec<String>,
}

/// Response of both submission endpoints. Which optional fields are present
/// depends on the endpoint and on `success`.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct SubmitResponseDto {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classhour: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eno: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub people: Option<u32>,
}

impl SubmitResponseDto {
    pub fn rejected(message: impl Into<String>) -> Self {
        SubmitResponseDto { success: false, message: Some(message.into()), ..Default::default() }
    }
}

/// Body of `POST /arrange/transactions/list`.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct TransactionListRequestDto {
    pub page: u32,
    pub limit: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TransactionListResponseDto {
    pub success: bool,
    #[serde(default)]
    pub data: Vec<TransactionDto>,
    #[serde(default)]
    pub pagination: Option<crate::api::table_dto::PaginationDto>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransactionDto {
    Course(CourseTransactionDto),
    Exam(ExamTransactionDto),
}

impl TransactionDto {
    pub fn id(&self) -> &str {
        match self {
            TransactionDto::Course(course) => &course.id,
            TransactionDto::Exam(exam) => &exam.id,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CourseTransactionDto {
    pub id: String,
    pub course_code: String,
    pub semester_code: String,
    pub campus: String,
    pub max_headcount: u32,
    pub eligible_weekdays: Vec<u8>,
    pub total_class_hours: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExamTransactionDto {
    pub id: String,
    pub course_code: String,
    #[serde(default, with = "serde_time::optional_datetime")]
    pub window_begin: Option<NaiveDateTime>,
    #[serde(default, with = "serde_time::optional_datetime")]
    pub window_end: Option<NaiveDateTime>,
}
