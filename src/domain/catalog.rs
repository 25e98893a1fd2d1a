pub mod calendar_index;
pub mod lesson_timetable;
pub mod occupancy_resolver;
pub mod room_catalog;
