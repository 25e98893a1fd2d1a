pub mod arrangement;
pub mod catalog;
pub mod remote;
pub mod session;
pub mod submission_gateway;
pub mod utils;
