// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use reqwest::StatusCode;
use reqwest::blocking::{Client as HttpClient, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::time::Duration;
use time::Date;
use url::Url;
use wealthq_app::{DashboardMetrics, QueryAnswer, QueryRecord, format_filter_date};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Blocking client for the query-answering backend.
///
/// Every call is a single request with no retry. Transport failures, non-2xx
/// statuses, and bodies that carry an `error` field all come back as `Err`.
#[derive(Debug, Clone)]
pub struct Client {
    base_url: String,
    timeout: Duration,
    http: HttpClient,
}

impl Client {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_owned();
        if base_url.is_empty() {
            bail!("server.base_url must not be empty");
        }
        let parsed = Url::parse(&base_url)
            .with_context(|| format!("server.base_url {base_url:?} is not a valid URL"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!(
                "server.base_url {base_url:?} must use http or https, got {:?}",
                parsed.scheme()
            );
        }
        if parsed.query().is_some() || parsed.fragment().is_some() {
            bail!("server.base_url {base_url:?} must not carry a query string or fragment");
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url,
            timeout,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn ping(&self) -> Result<String> {
        let url = self.endpoint("/");
        tracing::debug!(%url, "ping backend");
        let response = self
            .http
            .get(&url)
            .send()
            .map_err(|error| self.transport_error(error))?;
        let parsed: RootResponse = decode_payload(check_status(response)?, "health response")?;
        Ok(parsed.message.trim().to_owned())
    }

    pub fn submit_query(&self, question: &str) -> Result<QueryAnswer> {
        let url = self.endpoint("/query");
        tracing::debug!(%url, chars = question.chars().count(), "submit query");
        let response = self
            .http
            .post(&url)
            .json(&QueryRequest { question })
            .send()
            .map_err(|error| self.transport_error(error))?;
        decode_payload(check_status(response)?, "query response")
    }

    pub fn dashboard_metrics(&self) -> Result<DashboardMetrics> {
        let url = self.endpoint("/dashboard-metrics");
        tracing::debug!(%url, "load dashboard metrics");
        let response = self
            .http
            .get(&url)
            .send()
            .map_err(|error| self.transport_error(error))?;
        decode_payload(check_status(response)?, "dashboard metrics")
    }

    pub fn recent_queries(&self) -> Result<Vec<QueryRecord>> {
        let url = self.endpoint("/recent-queries");
        tracing::debug!(%url, "list recent queries");
        let response = self
            .http
            .get(&url)
            .send()
            .map_err(|error| self.transport_error(error))?;
        let parsed: QueriesResponse = decode_payload(check_status(response)?, "recent queries")?;
        Ok(parsed.queries)
    }

    pub fn filter_recent_queries(&self, start: Date, end: Date) -> Result<Vec<QueryRecord>> {
        let url = self.filter_url(start, end)?;
        tracing::debug!(%url, "filter recent queries");
        let response = self
            .http
            .get(url)
            .send()
            .map_err(|error| self.transport_error(error))?;
        let parsed: QueriesResponse =
            decode_payload(check_status(response)?, "filtered recent queries")?;
        Ok(parsed.queries)
    }

    /// Deletes the record at `index` in the server's current ordering.
    pub fn delete_recent_query(&self, index: usize) -> Result<()> {
        let url = self.endpoint(&format!("/recent-queries/{index}"));
        tracing::debug!(%url, index, "delete recent query");
        let response = self
            .http
            .delete(&url)
            .send()
            .map_err(|error| self.transport_error(error))?;
        check_status(response)?;
        Ok(())
    }

    pub fn export_url(&self) -> String {
        self.endpoint("/recent-queries/export")
    }

    /// Streams the CSV export into `out`, returning the number of bytes written.
    pub fn download_export(&self, out: &mut dyn Write) -> Result<u64> {
        let url = self.export_url();
        tracing::debug!(%url, "download history export");
        let response = self
            .http
            .get(&url)
            .send()
            .map_err(|error| self.transport_error(error))?;
        let mut response = check_status(response)?;
        response.copy_to(out).context("write history export")
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn filter_url(&self, start: Date, end: Date) -> Result<Url> {
        Url::parse_with_params(
            &self.endpoint("/recent-queries/filter"),
            &[
                ("start", format_filter_date(start)),
                ("end", format_filter_date(end)),
            ],
        )
        .context("build history filter URL")
    }

    fn transport_error(&self, error: reqwest::Error) -> anyhow::Error {
        if error.is_timeout() {
            return anyhow!(
                "request to {} timed out after {:?} -- raise [server].timeout if the backend is slow",
                self.base_url,
                self.timeout
            );
        }
        anyhow!(
            "cannot reach {} -- start the backend or fix [server].base_url ({})",
            self.base_url,
            error
        )
    }
}

fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(clean_error_response(status, &body))
}

/// Decodes a 2xx body. The backend reports some failures with a 200 status
/// and an `{"error": ...}` body, so that field is checked before decoding.
fn decode_payload<T: DeserializeOwned>(response: Response, what: &str) -> Result<T> {
    let body = response.text().with_context(|| format!("read {what}"))?;
    parse_payload(&body, what)
}

fn parse_payload<T: DeserializeOwned>(body: &str, what: &str) -> Result<T> {
    let value: serde_json::Value =
        serde_json::from_str(body).with_context(|| format!("decode {what}: body is not JSON"))?;
    if let Some(error) = value.get("error").and_then(serde_json::Value::as_str) {
        bail!("server rejected request: {error}");
    }
    serde_json::from_value(value).with_context(|| format!("decode {what}"))
}

fn clean_error_response(status: StatusCode, body: &str) -> anyhow::Error {
    if let Ok(parsed) = serde_json::from_str::<ErrorEnvelope>(body) {
        if let Some(detail) = parsed.detail.as_ref().and_then(detail_message)
            && !detail.is_empty()
        {
            return anyhow!("server error ({}): {}", status.as_u16(), detail);
        }
        if let Some(error) = parsed.error
            && !error.is_empty()
        {
            return anyhow!("server error ({}): {}", status.as_u16(), error);
        }
    }

    if body.len() < 100 && !body.contains('{') && !body.trim().is_empty() {
        return anyhow!("server error ({}): {}", status.as_u16(), body.trim());
    }

    anyhow!("server returned {}", status.as_u16())
}

/// FastAPI sends `detail` as a string for raised errors and as a list of
/// objects with a `msg` field for validation errors.
fn detail_message(detail: &serde_json::Value) -> Option<String> {
    match detail {
        serde_json::Value::String(message) => Some(message.clone()),
        serde_json::Value::Array(items) => {
            let messages = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(serde_json::Value::as_str))
                .collect::<Vec<_>>();
            (!messages.is_empty()).then(|| messages.join("; "))
        }
        _ => None,
    }
}

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    question: &'a str,
}

#[derive(Debug, Deserialize)]
struct QueriesResponse {
    #[serde(default)]
    queries: Vec<QueryRecord>,
}

#[derive(Debug, Deserialize)]
struct RootResponse {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    detail: Option<serde_json::Value>,
    error: Option<String>,
}
