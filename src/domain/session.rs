pub mod arrangement_session;
pub mod selection_tag;
