pub mod http_portal_store;
pub mod portal_endpoint;
pub mod portal_store_mock;
pub mod portal_store_trait;
pub mod table_query;
