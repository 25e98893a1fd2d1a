use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::api::arrange_dto::{CourseSubmitDto, ExamSubmitDto, SubmitResponseDto, TransactionDto, TransactionListRequestDto};
use crate::domain::remote::table_query::TableQuery;
use crate::error::{Error, Result};

/// One page of raw rows from the table endpoint.
#[derive(Debug, Clone, Default)]
pub struct TablePage {
    pub rows: Vec<serde_json::Value>,
    pub total: u64,
}

#[derive(Debug, Clone, Default)]
pub struct TransactionPage {
    pub transactions: Vec<TransactionDto>,
    pub total: u64,
}

/// The remote store behind the portal.
///
/// Submission calls return the decoded response even when `success` is
/// false; interpreting a rejection is the caller's business. Transport
/// failures are returned as errors.
#[async_trait]
pub trait PortalStore: std::fmt::Debug + Send + Sync {
    async fn list_table(&self, query: &TableQuery) -> Result<TablePage>;

    async fn list_transactions(&self, request: &TransactionListRequestDto) -> Result<TransactionPage>;

    async fn submit_course(&self, body: &CourseSubmitDto) -> Result<SubmitResponseDto>;

    async fn submit_exam(&self, body: &ExamSubmitDto) -> Result<SubmitResponseDto>;
}

/// Pages through `query` until the reported total is collected and decodes
/// every row into `T`.
pub async fn fetch_all<T: DeserializeOwned>(store: &dyn PortalStore, query: TableQuery) -> Result<Vec<T>> {
    let mut decoded = Vec::new();
    let mut page = query.page.max(1);

    loop {
        let result = store.list_table(&query.with_page(page)).await?;
        let received = result.rows.len();

        for row in result.rows {
            let value = serde_json::from_value::<T>(row.clone())
                .map_err(|e| Error::InvalidRow(format!("table '{}': {} (row: {})", query.table_name, e, row)))?;
            decoded.push(value);
        }

        if received == 0 || decoded.len() as u64 >= result.total {
            break;
        }
        page += 1;
    }

    log::debug!("Fetched {} rows from table '{}' (filters: {:?}).", decoded.len(), query.table_name, query.search);
    Ok(decoded)
}
