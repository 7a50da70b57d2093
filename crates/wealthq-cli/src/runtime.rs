// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use std::sync::mpsc::Sender;
use std::thread;
use time::Date;
use wealthq_app::{DashboardMetrics, QueryAnswer, QueryRecord, SubmissionId};
use wealthq_client::Client;
use wealthq_tui::{HistoryRequest, InternalEvent};

type UrlOpener = Box<dyn FnMut(&str) -> Result<()>>;

pub struct HttpRuntime {
    client: Client,
    open_url: UrlOpener,
}

impl HttpRuntime {
    pub fn new(client: Client) -> Self {
        Self::with_opener(client, Box::new(open_in_browser))
    }

    pub fn with_opener(client: Client, open_url: UrlOpener) -> Self {
        Self { client, open_url }
    }
}

fn open_in_browser(url: &str) -> Result<()> {
    webbrowser::open(url).with_context(|| {
        format!("open {url} in a browser; use `wealthq --export-history <path>` instead")
    })
}

impl wealthq_tui::AppRuntime for HttpRuntime {
    fn load_dashboard_metrics(&mut self) -> Result<DashboardMetrics> {
        self.client.dashboard_metrics()
    }

    fn load_history(&mut self) -> Result<Vec<QueryRecord>> {
        self.client.recent_queries()
    }

    fn filter_history(&mut self, start: Date, end: Date) -> Result<Vec<QueryRecord>> {
        self.client.filter_recent_queries(start, end)
    }

    fn delete_history_entry(&mut self, index: usize) -> Result<()> {
        self.client.delete_recent_query(index)
    }

    fn open_export(&mut self) -> Result<String> {
        let url = self.client.export_url();
        (self.open_url)(&url)?;
        Ok(url)
    }

    fn submit_query(&mut self, question: &str) -> Result<QueryAnswer> {
        self.client.submit_query(question)
    }

    /// Runs the request on a worker thread. A blocking request cannot be
    /// aborted, so a superseded or canceled worker runs to completion and its
    /// result is dropped as stale by the event loop.
    fn spawn_submission(
        &mut self,
        id: SubmissionId,
        question: &str,
        tx: Sender<InternalEvent>,
    ) -> Result<()> {
        let client = self.client.clone();
        let question = question.to_owned();
        spawn_worker(format!("wealthq-submit-{id}"), move || {
            let result = client
                .submit_query(&question)
                .map_err(|error| format!("{error:#}"));
            report(&tx, InternalEvent::SubmissionCompleted { id, result });
        })
    }

    fn spawn_metrics_fetch(&mut self, token: u64, tx: Sender<InternalEvent>) -> Result<()> {
        let client = self.client.clone();
        spawn_worker(format!("wealthq-metrics-{token}"), move || {
            let result = client
                .dashboard_metrics()
                .map_err(|error| format!("{error:#}"));
            report(&tx, InternalEvent::MetricsLoaded { token, result });
        })
    }

    fn spawn_history_fetch(
        &mut self,
        token: u64,
        request: HistoryRequest,
        tx: Sender<InternalEvent>,
    ) -> Result<()> {
        let client = self.client.clone();
        spawn_worker(format!("wealthq-history-{token}"), move || {
            let result = match request {
                HistoryRequest::Refresh => client.recent_queries(),
                HistoryRequest::Filter { start, end } => client.filter_recent_queries(start, end),
            }
            .map_err(|error| format!("{error:#}"));
            report(
                &tx,
                InternalEvent::HistoryLoaded {
                    token,
                    request,
                    result,
                },
            );
        })
    }

    fn spawn_history_delete(&mut self, index: usize, tx: Sender<InternalEvent>) -> Result<()> {
        let client = self.client.clone();
        spawn_worker(format!("wealthq-delete-{index}"), move || {
            let result = client
                .delete_recent_query(index)
                .map_err(|error| format!("{error:#}"));
            report(&tx, InternalEvent::HistoryDeleted { index, result });
        })
    }
}

fn spawn_worker<F>(name: String, work: F) -> Result<()>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(name.clone())
        .spawn(work)
        .with_context(|| format!("spawn worker {name}"))?;
    Ok(())
}

fn report(tx: &Sender<InternalEvent>, event: InternalEvent) {
    if tx.send(event).is_err() {
        tracing::debug!("event loop gone before worker finished");
    }
}

#[cfg(test)]
mod tests {
    use super::HttpRuntime;
    use anyhow::{Result, anyhow};
    use std::sync::mpsc;
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::{Duration, Instant};
    use time::Month;
    use tiny_http::{Response, Server};
    use wealthq_app::SubmissionId;
    use wealthq_client::Client;
    use wealthq_testkit::{MockBackend, day, sample_answer, sample_metrics};
    use wealthq_tui::{AppRuntime, HistoryRequest, InternalEvent};

    fn runtime_for(backend: &MockBackend) -> Result<HttpRuntime> {
        let client = Client::new(backend.base_url(), Duration::from_secs(2))?;
        Ok(HttpRuntime::with_opener(
            client,
            Box::new(|_: &str| -> Result<()> { Ok(()) }),
        ))
    }

    #[test]
    fn spawn_submission_reports_on_channel() -> Result<()> {
        let backend = MockBackend::start()?;
        let mut runtime = runtime_for(&backend)?;
        let (tx, rx) = mpsc::channel();

        runtime.spawn_submission(SubmissionId::new(7), "top five?", tx)?;
        let event = rx.recv_timeout(Duration::from_secs(5))?;
        assert_eq!(
            event,
            InternalEvent::SubmissionCompleted {
                id: SubmissionId::new(7),
                result: Ok(sample_answer()),
            }
        );
        Ok(())
    }

    #[test]
    fn spawn_submission_reports_failures_as_text() -> Result<()> {
        let backend = MockBackend::start()?;
        let mut runtime = runtime_for(&backend)?;
        let (tx, rx) = mpsc::channel();

        runtime.spawn_submission(SubmissionId::new(1), "", tx)?;
        match rx.recv_timeout(Duration::from_secs(5))? {
            InternalEvent::SubmissionCompleted { result: Err(error), .. } => {
                assert!(error.contains("No question provided"));
            }
            other => return Err(anyhow!("unexpected event {other:?}")),
        }
        Ok(())
    }

    #[test]
    fn delete_then_load_reflects_backend_order() -> Result<()> {
        let backend = MockBackend::start()?;
        backend.push_record("a", day(2026, Month::January, 1)?);
        backend.push_record("b", day(2026, Month::January, 2)?);
        backend.push_record("c", day(2026, Month::January, 3)?);
        let mut runtime = runtime_for(&backend)?;

        runtime.delete_history_entry(0)?;
        let records = runtime.load_history()?;
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|record| record.text != "c"));
        Ok(())
    }

    #[test]
    fn filter_history_uses_backend_filter() -> Result<()> {
        let backend = MockBackend::start()?;
        backend.push_record("old", day(2025, Month::December, 30)?);
        backend.push_record("new", day(2026, Month::January, 5)?);
        let mut runtime = runtime_for(&backend)?;

        let records = runtime.filter_history(
            day(2026, Month::January, 1)?,
            day(2026, Month::January, 31)?,
        )?;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].text, "new");
        assert_eq!(backend.request_count("GET", "/recent-queries/filter"), 1);
        Ok(())
    }

    #[test]
    fn open_export_hands_url_to_opener() -> Result<()> {
        let backend = MockBackend::start()?;
        let client = Client::new(backend.base_url(), Duration::from_secs(2))?;
        let opened = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&opened);
        let mut runtime = HttpRuntime::with_opener(
            client,
            Box::new(move |url: &str| -> Result<()> {
                sink.lock()
                    .map_err(|_| anyhow!("opener lock poisoned"))?
                    .push(url.to_owned());
                Ok(())
            }),
        );

        let url = runtime.open_export()?;
        assert_eq!(url, format!("{}/recent-queries/export", backend.base_url()));
        assert_eq!(
            *opened.lock().map_err(|_| anyhow!("lock poisoned"))?,
            vec![url]
        );
        assert!(backend.requests().is_empty());
        Ok(())
    }

    #[test]
    fn history_fetch_returns_before_slow_backend_answers() -> Result<()> {
        let server =
            Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock server: {error}"))?;
        let addr = format!("http://{}", server.server_addr());
        let handle = thread::spawn(move || {
            let request = server.recv().expect("request expected");
            thread::sleep(Duration::from_millis(600));
            let _ = request.respond(Response::from_string(r#"{"queries":[]}"#));
        });

        let client = Client::new(&addr, Duration::from_secs(5))?;
        let mut runtime = HttpRuntime::with_opener(
            client,
            Box::new(|_: &str| -> Result<()> { Ok(()) }),
        );
        let (tx, rx) = mpsc::channel();

        let started = Instant::now();
        runtime.spawn_history_fetch(3, HistoryRequest::Refresh, tx)?;
        assert!(
            started.elapsed() < Duration::from_millis(300),
            "spawn blocked for {:?}",
            started.elapsed()
        );

        let event = rx.recv_timeout(Duration::from_secs(5))?;
        assert_eq!(
            event,
            InternalEvent::HistoryLoaded {
                token: 3,
                request: HistoryRequest::Refresh,
                result: Ok(Vec::new()),
            }
        );
        handle
            .join()
            .map_err(|_| anyhow!("server thread panicked"))?;
        Ok(())
    }

    #[test]
    fn spawned_delete_and_metrics_report_on_channel() -> Result<()> {
        let backend = MockBackend::start()?;
        backend.push_record("only", day(2026, Month::January, 1)?);
        let mut runtime = runtime_for(&backend)?;
        let (tx, rx) = mpsc::channel();

        runtime.spawn_history_delete(5, tx.clone())?;
        match rx.recv_timeout(Duration::from_secs(5))? {
            InternalEvent::HistoryDeleted {
                index: 5,
                result: Err(error),
            } => assert!(error.contains("Query not found"), "got {error}"),
            other => return Err(anyhow!("unexpected event {other:?}")),
        }

        runtime.spawn_metrics_fetch(9, tx)?;
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(5))?,
            InternalEvent::MetricsLoaded {
                token: 9,
                result: Ok(sample_metrics()),
            }
        );
        assert_eq!(backend.records().len(), 1);
        Ok(())
    }

    #[test]
    fn spawned_filter_uses_backend_filter() -> Result<()> {
        let backend = MockBackend::start()?;
        backend.push_record("new", day(2026, Month::January, 5)?);
        let mut runtime = runtime_for(&backend)?;
        let (tx, rx) = mpsc::channel();
        let request = HistoryRequest::Filter {
            start: day(2026, Month::January, 1)?,
            end: day(2026, Month::January, 31)?,
        };

        runtime.spawn_history_fetch(1, request, tx)?;
        match rx.recv_timeout(Duration::from_secs(5))? {
            InternalEvent::HistoryLoaded {
                request: got,
                result: Ok(records),
                ..
            } => {
                assert_eq!(got, request);
                assert_eq!(records.len(), 1);
            }
            other => return Err(anyhow!("unexpected event {other:?}")),
        }
        assert_eq!(backend.request_count("GET", "/recent-queries/filter"), 1);
        Ok(())
    }

    #[test]
    fn metrics_pass_through() -> Result<()> {
        let backend = MockBackend::start()?;
        let mut runtime = runtime_for(&backend)?;
        let metrics = runtime.load_dashboard_metrics()?;
        assert_eq!(metrics.asset_allocation.len(), 2);
        Ok(())
    }
}
