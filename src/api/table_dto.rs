use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::api::serde_time;

/// Table names understood by `GET /table/list`.
pub mod tables {
    pub const LESSONS: &str = "lessons";
    pub const CALENDAR: &str = "calendar";
    pub const OCCUPANCY: &str = "occupancy";
    pub const CLASSROOMS: &str = "classrooms";
    pub const COURSE_SECTIONS: &str = "course_sections";
}

/// Root response object of the generic table endpoint.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TableListResponseDto {
    pub success: bool,

    #[serde(default)]
    pub data: Vec<serde_json::Value>,

    #[serde(default)]
    pub pagination: Option<PaginationDto>,

    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default)]
pub struct PaginationDto {
    pub total: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LessonRowDto {
    pub lesson_index: u8,
    #[serde(with = "serde_time::time")]
    pub begin: NaiveTime,
    #[serde(with = "serde_time::time")]
    pub end: NaiveTime,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CalendarRowDto {
    pub semester: String,
    pub weekday: u8,
    pub week: u32,
    #[serde(with = "serde_time::date")]
    pub date: NaiveDate,
    pub day_type: String,
    #[serde(default)]
    pub holiday_name: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct OccupancyRowDto {
    pub room: String,
    #[serde(with = "serde_time::date")]
    pub date: NaiveDate,
    #[serde(with = "serde_time::datetime")]
    pub begin: NaiveDateTime,
    #[serde(with = "serde_time::datetime")]
    pub end: NaiveDateTime,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ClassroomRowDto {
    pub name: String,
    pub campus: String,
    #[serde(default)]
    pub building: String,
    pub capacity: u32,
    pub status: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SectionRowDto {
    pub courno: String,
    #[serde(default)]
    pub section: String,
    pub headcount: u32,
}
