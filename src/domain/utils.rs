pub mod id;
pub mod interval;
