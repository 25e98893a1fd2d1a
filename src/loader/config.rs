use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Settings of one arrangement deployment, read from a camelCase JSON file.
/// Every field has a default.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ArrangementConfig {
    /// Base URL of the portal API, without trailing slash.
    pub base_url: String,

    /// Sent as `Authorization: Bearer <token>` when present.
    pub auth_token: Option<String>,

    pub request_timeout_secs: u64,

    /// Rows requested per page from the table endpoint.
    pub page_limit: u32,

    /// Search terms shorter than this are not sent.
    pub min_search_length: usize,

    /// Aggregate exam room capacity must reach this multiple of the expected headcount.
    pub exam_capacity_multiplier: u32,
}

impl Default for ArrangementConfig {
    fn default() -> Self {
        ArrangementConfig {
            base_url: "http://localhost:3000".to_string(),
            auth_token: None,
            request_timeout_secs: 30,
            page_limit: 100,
            min_search_length: 2,
            exam_capacity_multiplier: 3,
        }
    }
}

impl ArrangementConfig {
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(Error::Config("baseUrl must not be empty".to_string()));
        }
        if self.page_limit == 0 {
            return Err(Error::Config("pageLimit must be at least 1".to_string()));
        }
        if self.exam_capacity_multiplier == 0 {
            return Err(Error::Config("examCapacityMultiplier must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}
