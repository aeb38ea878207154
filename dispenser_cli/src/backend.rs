//! PostgREST-style REST backend: event sink and remote request source.
//!
//! Tables live under `{url}/rest/v1/{table}`; every call carries the
//! `apikey` header and a bearer token when a key is configured.

use std::time::Duration;

use dispenser_config::Backend;
use dispenser_traits::{DispenseEvent, DispenseRequest, EventSink, RequestSource, WeightReport};
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::Deserialize;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{table}: unexpected status {status}: {body}")]
    Status {
        table: String,
        status: u16,
        body: String,
    },
}

#[derive(Debug, Clone)]
pub struct RestClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl RestClient {
    pub fn new(cfg: &Backend) -> Result<Self, BackendError> {
        let http = Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()?;
        let api_key = cfg.resolved_api_key();
        if api_key.is_none() {
            tracing::warn!(
                url = %cfg.url,
                env = dispenser_config::API_KEY_ENV,
                "no backend API key configured; requests are unauthenticated"
            );
        }
        Ok(Self {
            http,
            base_url: cfg.url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn authorized(&self, rb: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => rb.header("apikey", key).bearer_auth(key),
            None => rb,
        }
    }

    fn insert<T: serde::Serialize>(&self, table: &str, row: &T) -> Result<(), BackendError> {
        let resp = self
            .authorized(self.http.post(self.table_url(table)))
            .header("Prefer", "return=minimal")
            .json(row)
            .send()?;
        check_status(table, resp)?;
        Ok(())
    }
}

fn check_status(table: &str, resp: Response) -> Result<Response, BackendError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    Err(BackendError::Status {
        table: table.to_string(),
        status: status.as_u16(),
        body: resp.text().unwrap_or_default(),
    })
}

/// Writes events to the history table and weight reports to the weights table.
pub struct RestSink {
    client: RestClient,
    events_table: String,
    weights_table: String,
}

impl RestSink {
    pub fn new(client: RestClient, cfg: &Backend) -> Self {
        Self {
            client,
            events_table: cfg.events_table.clone(),
            weights_table: cfg.weights_table.clone(),
        }
    }
}

impl EventSink for RestSink {
    fn record(&mut self, event: &DispenseEvent) -> Result<(), BoxError> {
        self.client.insert(&self.events_table, event)?;
        Ok(())
    }

    fn report_weight(&mut self, report: &WeightReport) -> Result<(), BoxError> {
        self.client.insert(&self.weights_table, report)?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct RequestRow {
    id: serde_json::Value,
    requested_grams: f32,
}

fn row_id(id: &serde_json::Value) -> String {
    match id {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Hands out the oldest pending request row and marks it `processing`.
pub struct RestRequests {
    client: RestClient,
    table: String,
}

impl RestRequests {
    pub fn new(client: RestClient, cfg: &Backend) -> Self {
        Self {
            client,
            table: cfg.requests_table.clone(),
        }
    }

    fn pending_url(&self) -> String {
        format!(
            "{}?status=eq.pending&order=created_at.asc&limit=1",
            self.client.table_url(&self.table)
        )
    }

    fn claim(&self, id: &str) -> Result<(), BackendError> {
        let url = format!("{}?id=eq.{}", self.client.table_url(&self.table), id);
        let resp = self
            .client
            .authorized(self.client.http.patch(url))
            .json(&serde_json::json!({ "status": "processing" }))
            .send()?;
        check_status(&self.table, resp)?;
        Ok(())
    }
}

impl RequestSource for RestRequests {
    fn poll(&mut self) -> Result<Option<DispenseRequest>, BoxError> {
        let resp = self
            .client
            .authorized(self.client.http.get(self.pending_url()))
            .send()
            .map_err(BackendError::from)?;
        let rows: Vec<RequestRow> = check_status(&self.table, resp)?
            .json()
            .map_err(BackendError::from)?;
        let Some(row) = rows.into_iter().next() else {
            return Ok(None);
        };
        let id = row_id(&row.id);
        self.claim(&id)?;
        tracing::debug!(id = %id, requested_grams = row.requested_grams, "claimed remote request");
        Ok(Some(DispenseRequest {
            target_g: row.requested_grams,
            id: Some(id),
        }))
    }
}
