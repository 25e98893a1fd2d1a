use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Serialize;

use crate::api::arrange_dto::{CourseSubmitDto, ExamSubmitDto, SubmitResponseDto, TransactionListRequestDto, TransactionListResponseDto};
use crate::api::table_dto::TableListResponseDto;
use crate::domain::remote::portal_endpoint::PortalEndpoint;
use crate::domain::remote::portal_store_trait::{PortalStore, TablePage, TransactionPage};
use crate::domain::remote::table_query::TableQuery;
use crate::error::{Error, Result};
use crate::loader::config::ArrangementConfig;

/// `PortalStore` speaking HTTP to the portal backend.
#[derive(Debug, Clone)]
pub struct HttpPortalStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPortalStore {
    pub fn new(config: &ArrangementConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &config.auth_token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|e| Error::Config(format!("authToken is not a valid header value: {}", e)))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder().default_headers(headers).timeout(Duration::from_secs(config.request_timeout_secs)).build()?;

        Ok(HttpPortalStore { client, base_url: config.base_url().to_string() })
    }

    fn url(&self, endpoint: PortalEndpoint) -> String {
        format!("{}{}", self.base_url, endpoint.path())
    }

    async fn post_json<B: Serialize + Sync>(&self, endpoint: PortalEndpoint, body: &B) -> Result<(reqwest::StatusCode, String)> {
        let response = self.client.request(endpoint.method(), self.url(endpoint)).json(body).send().await.map_err(|e| {
            log::error!("Request to {} failed: {}", endpoint, e);
            Error::Transient(e)
        })?;

        let status = response.status();
        let text = response.text().await?;
        Ok((status, text))
    }

    fn unsuccessful(endpoint: PortalEndpoint, status: reqwest::StatusCode, body_text: &str) -> Error {
        log::error!(
            "Portal request was not successful.\nEndpoint: <<{}>>\nResponse-Status-Code: <<{}>>\nResponse-Body: <<{}>>",
            endpoint,
            status,
            body_text
        );
        Error::Remote { endpoint: endpoint.to_string(), message: format!("HTTP {}", status) }
    }

    async fn submit(&self, endpoint: PortalEndpoint, body: &(impl Serialize + Sync)) -> Result<SubmitResponseDto> {
        let (status, text) = self.post_json(endpoint, body).await?;

        // Rejections may arrive with a 4xx status but still carry the documented body.
        match serde_json::from_str::<SubmitResponseDto>(&text) {
            Ok(response) => Ok(response),
            Err(_) if !status.is_success() => Err(Self::unsuccessful(endpoint, status, &text)),
            Err(e) => Err(Error::DeserializationError(e)),
        }
    }
}

#[async_trait]
impl PortalStore for HttpPortalStore {
    async fn list_table(&self, query: &TableQuery) -> Result<TablePage> {
        let endpoint = PortalEndpoint::TableList;
        let response = self.client.request(endpoint.method(), self.url(endpoint)).query(&query.to_query_pairs()).send().await.map_err(|e| {
            log::error!("Request to {} for table '{}' failed: {}", endpoint, query.table_name, e);
            Error::Transient(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await?;
            return Err(Self::unsuccessful(endpoint, status, &body_text));
        }

        let body: TableListResponseDto = response.json().await?;
        if !body.success {
            return Err(Error::Remote { endpoint: endpoint.to_string(), message: body.message.unwrap_or_else(|| format!("listing table '{}' failed", query.table_name)) });
        }

        let total = body.pagination.map(|p| p.total).unwrap_or(body.data.len() as u64);
        Ok(TablePage { rows: body.data, total })
    }

    async fn list_transactions(&self, request: &TransactionListRequestDto) -> Result<TransactionPage> {
        let endpoint = PortalEndpoint::TransactionList;
        let (status, text) = self.post_json(endpoint, request).await?;
        if !status.is_success() {
            return Err(Self::unsuccessful(endpoint, status, &text));
        }

        let body: TransactionListResponseDto = serde_json::from_str(&text)?;
        if !body.success {
            return Err(Error::Remote { endpoint: endpoint.to_string(), message: body.message.unwrap_or_else(|| "listing transactions failed".to_string()) });
        }

        let total = body.pagination.map(|p| p.total).unwrap_or(body.data.len() as u64);
        Ok(TransactionPage { transactions: body.data, total })
    }

    async fn submit_course(&self, body: &CourseSubmitDto) -> Result<SubmitResponseDto> {
        self.submit(PortalEndpoint::CourseSubmit, body).await
    }

    async fn submit_exam(&self, body: &ExamSubmitDto) -> Result<SubmitResponseDto> {
        self.submit(PortalEndpoint::ExamSubmit, body).await
    }
}
