pub mod course_arrangement;
pub mod exam_arrangement;
pub mod session_planner;
pub mod transaction;
pub mod validation;
