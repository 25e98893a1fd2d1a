pub mod arrange_dto;
pub mod serde_time;
pub mod table_dto;
