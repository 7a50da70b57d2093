// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow};
use std::io::{Cursor, Read};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use time::macros::format_description;
use time::{Date, Month, OffsetDateTime};
use tiny_http::{Header, Method, Request, Response, Server};
use url::Url;
use wealthq_app::{
    AssetShare, DashboardMetrics, GraphPoint, GrowthPoint, ManagerClients, MetricValue,
    QueryAnswer, QueryRecord, TableRow, parse_filter_date,
};

const MOCK_ORIGIN: &str = "http://mock.invalid";

pub fn sample_answer() -> QueryAnswer {
    answer_for("Acme", 120.0)
}

pub fn answer_for(client: &str, value: f64) -> QueryAnswer {
    QueryAnswer {
        response: format!("{client} holds the largest portfolio."),
        graph_data: vec![GraphPoint {
            label: client.to_owned(),
            value,
        }],
        table_data: vec![TableRow {
            client: client.to_owned(),
            portfolio_value: value,
        }],
    }
}

pub fn record(text: &str, time: &str) -> QueryRecord {
    QueryRecord {
        text: text.to_owned(),
        time: time.to_owned(),
    }
}

/// Three records, newest first.
pub fn sample_records() -> Vec<QueryRecord> {
    vec![
        record("Who are the top relationship managers by portfolio?", "12-Mar 04:15 PM"),
        record("List clients who prefer investing in Real Estate.", "11-Mar 09:02 AM"),
        record("What are the top five portfolios?", "02-Feb 11:45 AM"),
    ]
}

pub fn sample_metrics() -> DashboardMetrics {
    DashboardMetrics {
        top_portfolios: MetricValue::Integer(10),
        total_aum: MetricValue::Text("₹4,500,000".to_owned()),
        active_rms: MetricValue::Integer(4),
        high_risk: MetricValue::Integer(3),
        portfolio_growth: vec![
            GrowthPoint {
                month: "Jan".to_owned(),
                value: 1_200_000.0,
            },
            GrowthPoint {
                month: "Feb".to_owned(),
                value: 1_450_000.0,
            },
        ],
        asset_allocation: vec![
            AssetShare {
                asset: "Equity".to_owned(),
                percent: 60.0,
            },
            AssetShare {
                asset: "Real Estate".to_owned(),
                percent: 40.0,
            },
        ],
        rm_clients: vec![
            ManagerClients {
                rm: "Priya".to_owned(),
                clients: 5,
            },
            ManagerClients {
                rm: "Arjun".to_owned(),
                clients: 3,
            },
        ],
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    pub url: String,
    pub body: String,
}

#[derive(Debug, Clone)]
struct StoredRecord {
    record: QueryRecord,
    date: Date,
}

#[derive(Debug)]
struct BackendState {
    records: Vec<StoredRecord>,
    answer: QueryAnswer,
    metrics: serde_json::Value,
    failures: Vec<(u16, String)>,
    requests: Vec<RecordedRequest>,
}

/// In-process HTTP backend that serves the query, history, and metrics
/// endpoints from memory. History is kept newest first and deletes are
/// positional, matching the real service.
pub struct MockBackend {
    base_url: String,
    server: Arc<Server>,
    state: Arc<Mutex<BackendState>>,
    handle: Option<JoinHandle<()>>,
}

impl MockBackend {
    pub fn start() -> Result<Self> {
        let server =
            Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock backend: {error}"))?;
        let server = Arc::new(server);
        let base_url = format!("http://{}", server.server_addr());
        let metrics = serde_json::to_value(sample_metrics())?;
        let state = Arc::new(Mutex::new(BackendState {
            records: Vec::new(),
            answer: sample_answer(),
            metrics,
            failures: Vec::new(),
            requests: Vec::new(),
        }));

        let handle = {
            let server = Arc::clone(&server);
            let state = Arc::clone(&state);
            thread::spawn(move || {
                for request in server.incoming_requests() {
                    serve(&state, request);
                }
            })
        };

        Ok(Self {
            base_url,
            server,
            state,
            handle: Some(handle),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Adds a record as the newest entry, stamped with `date` at 10:30 AM.
    pub fn push_record(&self, text: &str, date: Date) {
        let day = date
            .format(format_description!("[day]-[month repr:short]"))
            .unwrap_or_default();
        self.lock().records.insert(
            0,
            StoredRecord {
                record: record(text, &format!("{day} 10:30 AM")),
                date,
            },
        );
    }

    pub fn set_answer(&self, answer: QueryAnswer) {
        self.lock().answer = answer;
    }

    pub fn set_metrics_json(&self, metrics: serde_json::Value) {
        self.lock().metrics = metrics;
    }

    /// The next request, whatever its route, gets this status and body.
    pub fn fail_next(&self, status: u16, body: &str) {
        self.lock().failures.push((status, body.to_owned()));
    }

    pub fn records(&self) -> Vec<QueryRecord> {
        self.lock()
            .records
            .iter()
            .map(|stored| stored.record.clone())
            .collect()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }

    /// Request count for `method` and a path, ignoring query strings.
    pub fn request_count(&self, method: &str, path: &str) -> usize {
        self.lock()
            .requests
            .iter()
            .filter(|request| {
                request.method == method
                    && parse_target(&request.url).is_some_and(|target| target.path() == path)
            })
            .count()
    }

    fn lock(&self) -> MutexGuard<'_, BackendState> {
        lock_state(&self.state)
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn lock_state(state: &Mutex<BackendState>) -> MutexGuard<'_, BackendState> {
    state
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn serve(state: &Mutex<BackendState>, mut request: Request) {
    let mut body = String::new();
    let _ = request.as_reader().read_to_string(&mut body);
    let method = request.method().clone();
    let url = request.url().to_owned();

    let (status, content_type, payload) = {
        let mut state = lock_state(state);
        state.requests.push(RecordedRequest {
            method: method.to_string(),
            url: url.clone(),
            body: body.clone(),
        });
        if !state.failures.is_empty() {
            let (status, payload) = state.failures.remove(0);
            (status, "application/json", payload)
        } else if let Some(target) = parse_target(&url) {
            route(&mut state, &method, &target, &body)
        } else {
            json(400, serde_json::json!({"detail": "Invalid request target"}))
        }
    };

    tracing::debug!(%method, %url, status, "mock backend response");
    let _ = request.respond(response(status, content_type, payload));
}

/// Resolves a request target such as `/recent-queries/filter?start=...`.
fn parse_target(target: &str) -> Option<Url> {
    Url::parse(MOCK_ORIGIN).ok()?.join(target).ok()
}

fn route(
    state: &mut BackendState,
    method: &Method,
    target: &Url,
    body: &str,
) -> (u16, &'static str, String) {
    let path = target.path();
    match (method, path) {
        (Method::Get, "/") => json(200, serde_json::json!({"message": "Wealth query backend"})),
        (Method::Post, "/query") => handle_query(state, body),
        (Method::Get, "/recent-queries") => json(200, queries_payload(state.records.iter())),
        (Method::Get, "/recent-queries/export") => match export_csv(state) {
            Ok(csv) => (200, "text/csv", csv),
            Err(error) => json(500, serde_json::json!({"detail": format!("{error:#}")})),
        },
        (Method::Get, "/recent-queries/filter") => handle_filter(state, target),
        (Method::Get, "/dashboard-metrics") => json(200, state.metrics.clone()),
        (Method::Delete, _) if path.starts_with("/recent-queries/") => {
            handle_delete(state, &path["/recent-queries/".len()..])
        }
        _ => json(404, serde_json::json!({"detail": "Not Found"})),
    }
}

fn handle_query(state: &mut BackendState, body: &str) -> (u16, &'static str, String) {
    let question = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("question")
                .and_then(serde_json::Value::as_str)
                .map(str::to_owned)
        })
        .unwrap_or_default();
    if question.is_empty() {
        return json(200, serde_json::json!({"error": "No question provided"}));
    }

    let now = OffsetDateTime::now_utc();
    let time = now
        .format(format_description!(
            "[day]-[month repr:short] [hour repr:12]:[minute] [period]"
        ))
        .unwrap_or_default();
    state.records.insert(
        0,
        StoredRecord {
            record: record(&question, &time),
            date: now.date(),
        },
    );
    json(200, serde_json::to_value(&state.answer).unwrap_or_default())
}

fn handle_filter(state: &BackendState, target: &Url) -> (u16, &'static str, String) {
    let param = |name: &str| {
        target
            .query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    };
    let (Some(start), Some(end)) = (param("start"), param("end")) else {
        return json(
            422,
            serde_json::json!({"detail": [{"msg": "field required"}]}),
        );
    };
    let (Ok(start), Ok(end)) = (parse_filter_date(&start), parse_filter_date(&end)) else {
        return json(
            400,
            serde_json::json!({"detail": "Date parsing error: expected YYYY-MM-DD"}),
        );
    };
    let matching = state
        .records
        .iter()
        .filter(|stored| start <= stored.date && stored.date <= end);
    json(200, queries_payload(matching))
}

fn handle_delete(state: &mut BackendState, raw_index: &str) -> (u16, &'static str, String) {
    let Ok(index) = raw_index.parse::<usize>() else {
        return json(
            422,
            serde_json::json!({"detail": [{"msg": "value is not a valid integer"}]}),
        );
    };
    if index >= state.records.len() {
        return json(404, serde_json::json!({"detail": "Query not found"}));
    }
    let removed = state.records.remove(index);
    json(
        200,
        serde_json::json!({"message": "Deleted", "deleted": removed.record}),
    )
}

fn queries_payload<'a>(records: impl Iterator<Item = &'a StoredRecord>) -> serde_json::Value {
    let queries = records
        .map(|stored| stored.record.clone())
        .collect::<Vec<_>>();
    serde_json::json!({ "queries": queries })
}

/// History as the service exports it: a `Query,Timestamp` header and CRLF
/// line endings.
fn export_csv(state: &BackendState) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(Vec::new());
    writer.write_record(["Query", "Timestamp"])?;
    for stored in &state.records {
        writer.write_record([&stored.record.text, &stored.record.time])?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|error| anyhow!("flush export csv: {}", error.error()))?;
    Ok(String::from_utf8(bytes)?)
}

fn json(status: u16, value: serde_json::Value) -> (u16, &'static str, String) {
    (status, "application/json", value.to_string())
}

fn response(status: u16, content_type: &str, body: String) -> Response<Cursor<Vec<u8>>> {
    let mut response = Response::from_string(body).with_status_code(status);
    if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], content_type.as_bytes()) {
        response.add_header(header);
    }
    response
}

/// Calendar date helper for seeding records.
pub fn day(year: i32, month: Month, day: u8) -> Result<Date> {
    Ok(Date::from_calendar_date(year, month, day)?)
}

#[cfg(test)]
mod tests {
    use super::{
        BackendState, StoredRecord, day, export_csv, handle_filter, parse_target, record,
        sample_answer, sample_metrics, sample_records,
    };
    use anyhow::{Result, anyhow};
    use time::Month;

    fn state_with(records: Vec<StoredRecord>) -> Result<BackendState> {
        Ok(BackendState {
            records,
            answer: sample_answer(),
            metrics: serde_json::to_value(sample_metrics())?,
            failures: Vec::new(),
            requests: Vec::new(),
        })
    }

    #[test]
    fn sample_records_are_newest_first() {
        let records = sample_records();
        assert_eq!(records.len(), 3);
        assert!(records[0].time.starts_with("12-Mar"));
    }

    #[test]
    fn sample_metrics_carry_every_chart() {
        let metrics = sample_metrics();
        assert!(!metrics.portfolio_growth.is_empty());
        assert!(!metrics.asset_allocation.is_empty());
        assert!(!metrics.rm_clients.is_empty());
    }

    #[test]
    fn export_quotes_fields_only_when_needed() -> Result<()> {
        let state = state_with(vec![
            StoredRecord {
                record: record("say \"hi\"", "03-Jan 09:00 AM"),
                date: day(2026, Month::January, 3)?,
            },
            StoredRecord {
                record: record("top, five", "02-Jan 10:30 AM"),
                date: day(2026, Month::January, 2)?,
            },
            StoredRecord {
                record: record("plain", "01-Jan 08:00 AM"),
                date: day(2026, Month::January, 1)?,
            },
        ])?;

        assert_eq!(
            export_csv(&state)?,
            "Query,Timestamp\r\n\
             \"say \"\"hi\"\"\",03-Jan 09:00 AM\r\n\
             \"top, five\",02-Jan 10:30 AM\r\n\
             plain,01-Jan 08:00 AM\r\n"
        );
        Ok(())
    }

    #[test]
    fn filter_decodes_percent_encoded_dates() -> Result<()> {
        let state = state_with(vec![
            StoredRecord {
                record: record("new", "05-Jan 10:30 AM"),
                date: day(2026, Month::January, 5)?,
            },
            StoredRecord {
                record: record("old", "30-Dec 10:30 AM"),
                date: day(2025, Month::December, 30)?,
            },
        ])?;
        let target = parse_target("/recent-queries/filter?start=2026%2D01%2D01&end=2026-01-31")
            .ok_or_else(|| anyhow!("target should parse"))?;

        let (status, _, body) = handle_filter(&state, &target);
        assert_eq!(status, 200);
        let payload: serde_json::Value = serde_json::from_str(&body)?;
        assert_eq!(payload["queries"][0]["text"], "new");
        assert_eq!(payload["queries"].as_array().map(Vec::len), Some(1));
        Ok(())
    }

    #[test]
    fn filter_without_both_dates_is_unprocessable() -> Result<()> {
        let state = state_with(Vec::new())?;
        let target = parse_target("/recent-queries/filter?start=2026-01-01")
            .ok_or_else(|| anyhow!("target should parse"))?;
        let (status, _, _) = handle_filter(&state, &target);
        assert_eq!(status, 422);
        Ok(())
    }
}
