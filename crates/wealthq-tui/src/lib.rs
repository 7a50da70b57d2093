// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Tabs, Wrap};
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;
use time::Date;
use wealthq_app::{
    AppCommand, AppEvent, AppState, DashboardMetrics, DisplayTab, DisplayView, GraphPoint,
    MetricValue, QueryAnswer, QueryRecord, SAMPLE_QUESTIONS, SampleVisibility, Screen,
    SubmissionId, format_filter_date, format_number, format_table_row, parse_filter_date,
    select_view,
};

const BAR_WIDTH: usize = 24;
const PLACEHOLDER: &str = "...";
const DATE_INPUT_MAX: usize = 10;

/// I/O seam between the event loop and the backend.
///
/// Every backend call goes through a `spawn_*` method and reports back on the
/// internal channel, so the loop keeps handling keys and drawing while calls
/// are pending. The default `spawn_*` bodies call the blocking methods inline;
/// runtimes backed by a network override them to run on worker threads.
/// Export only hands a URL to the platform and stays on the loop thread.
pub trait AppRuntime {
    fn load_dashboard_metrics(&mut self) -> Result<DashboardMetrics>;
    fn load_history(&mut self) -> Result<Vec<QueryRecord>>;
    fn filter_history(&mut self, start: Date, end: Date) -> Result<Vec<QueryRecord>>;
    fn delete_history_entry(&mut self, index: usize) -> Result<()>;
    /// Hands the export download to the platform and returns its URL.
    fn open_export(&mut self) -> Result<String>;
    fn submit_query(&mut self, question: &str) -> Result<QueryAnswer>;
    fn spawn_submission(
        &mut self,
        id: SubmissionId,
        question: &str,
        tx: Sender<InternalEvent>,
    ) -> Result<()> {
        let result = self
            .submit_query(question)
            .map_err(|error| format!("{error:#}"));
        send_internal(&tx, InternalEvent::SubmissionCompleted { id, result })
    }
    fn cancel_submission(&mut self, _id: SubmissionId) -> Result<()> {
        Ok(())
    }
    fn spawn_metrics_fetch(&mut self, token: u64, tx: Sender<InternalEvent>) -> Result<()> {
        let result = self
            .load_dashboard_metrics()
            .map_err(|error| format!("{error:#}"));
        send_internal(&tx, InternalEvent::MetricsLoaded { token, result })
    }
    fn spawn_history_fetch(
        &mut self,
        token: u64,
        request: HistoryRequest,
        tx: Sender<InternalEvent>,
    ) -> Result<()> {
        let result = match request {
            HistoryRequest::Refresh => self.load_history(),
            HistoryRequest::Filter { start, end } => self.filter_history(start, end),
        }
        .map_err(|error| format!("{error:#}"));
        send_internal(
            &tx,
            InternalEvent::HistoryLoaded {
                token,
                request,
                result,
            },
        )
    }
    fn spawn_history_delete(&mut self, index: usize, tx: Sender<InternalEvent>) -> Result<()> {
        let result = self
            .delete_history_entry(index)
            .map_err(|error| format!("{error:#}"));
        send_internal(&tx, InternalEvent::HistoryDeleted { index, result })
    }
}

fn send_internal(tx: &Sender<InternalEvent>, event: InternalEvent) -> Result<()> {
    tx.send(event)
        .map_err(|_| anyhow::anyhow!("internal event channel closed"))
}

/// Which history list a fetch asks the backend for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryRequest {
    Refresh,
    Filter { start: Date, end: Date },
}

impl HistoryRequest {
    pub const fn action(self) -> &'static str {
        match self {
            Self::Refresh => "history refresh",
            Self::Filter { .. } => "history filter",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InternalEvent {
    ClearStatus {
        token: u64,
    },
    SubmissionCompleted {
        id: SubmissionId,
        result: Result<QueryAnswer, String>,
    },
    MetricsLoaded {
        token: u64,
        result: Result<DashboardMetrics, String>,
    },
    HistoryLoaded {
        token: u64,
        request: HistoryRequest,
        result: Result<Vec<QueryRecord>, String>,
    },
    HistoryDeleted {
        index: usize,
        result: Result<(), String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DateField {
    From,
    To,
}

impl DateField {
    const fn label(self) -> &'static str {
        match self {
            Self::From => "from",
            Self::To => "to",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct DateEditState {
    field: DateField,
    buffer: String,
}

/// Fetch tokens work like submission ids: only the latest issued metrics or
/// history fetch may apply its result.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct ViewData {
    history_cursor: usize,
    date_edit: Option<DateEditState>,
    sample_cursor: Option<usize>,
    status_token: u64,
    fetch_token: u64,
    pending_metrics: Option<u64>,
    pending_history: Option<u64>,
}

pub fn run_app<R: AppRuntime>(state: &mut AppState, runtime: &mut R) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let mut view_data = ViewData::default();
    let (internal_tx, internal_rx) = mpsc::channel();

    enter_screen(state, runtime, &mut view_data, &internal_tx);

    let mut result = Ok(());
    loop {
        process_internal_events(state, runtime, &mut view_data, &internal_tx, &internal_rx);

        if let Err(error) = terminal.draw(|frame| render(frame, state, &view_data)) {
            result = Err(error).context("draw frame");
            break;
        }

        match event::poll(Duration::from_millis(120)).context("poll event") {
            Ok(false) => {}
            Ok(true) => match event::read().context("read event") {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                    if handle_key_event(state, runtime, &mut view_data, &internal_tx, key) {
                        break;
                    }
                }
                Ok(_) => {}
                Err(error) => {
                    result = Err(error);
                    break;
                }
            },
            Err(error) => {
                result = Err(error);
                break;
            }
        }
    }

    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    result
}

fn process_internal_events<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        match event {
            InternalEvent::ClearStatus { token } if token == view_data.status_token => {
                state.dispatch(AppCommand::ClearStatus);
            }
            InternalEvent::ClearStatus { .. } => {}
            InternalEvent::SubmissionCompleted { id, result } => {
                apply_submission_completion(state, view_data, tx, id, result);
            }
            InternalEvent::MetricsLoaded { token, result } => {
                apply_metrics_result(state, view_data, tx, token, result);
            }
            InternalEvent::HistoryLoaded {
                token,
                request,
                result,
            } => apply_history_result(state, view_data, tx, token, request, result),
            InternalEvent::HistoryDeleted { index, result } => {
                finish_history_delete(state, runtime, view_data, tx, index, result);
            }
        }
    }
}

fn next_fetch_token(view_data: &mut ViewData) -> u64 {
    view_data.fetch_token = view_data.fetch_token.saturating_add(1);
    view_data.fetch_token
}

fn apply_submission_completion(
    state: &mut AppState,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    id: SubmissionId,
    result: Result<QueryAnswer, String>,
) {
    let events = state.complete_submission(id, result);
    for event in &events {
        match event {
            AppEvent::SubmissionApplied(id) => tracing::info!(%id, "submission applied"),
            AppEvent::SubmissionDiscarded(id) => {
                tracing::debug!(%id, "dropped stale submission result");
            }
            AppEvent::SubmissionFailed { id, error } => {
                tracing::warn!(%id, "query submission failed: {error}");
            }
            AppEvent::SamplesHidden => view_data.sample_cursor = None,
            _ => {}
        }
    }
    track_status(view_data, tx, &events);
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_secs(4));
        let _ = sender.send(InternalEvent::ClearStatus { token });
    });
}

fn emit_status(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    message: impl Into<String>,
) {
    state.dispatch(AppCommand::SetStatus(message.into()));
    view_data.status_token = view_data.status_token.saturating_add(1);
    schedule_status_clear(internal_tx, view_data.status_token);
}

/// Status lines set inside `AppState` by the failure policy still need a
/// clear timer.
fn track_status(
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    events: &[AppEvent],
) {
    if events
        .iter()
        .any(|event| matches!(event, AppEvent::StatusUpdated(_)))
    {
        view_data.status_token = view_data.status_token.saturating_add(1);
        schedule_status_clear(internal_tx, view_data.status_token);
    }
}

fn handle_key_event<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        match key.code {
            KeyCode::Char('q') => return true,
            KeyCode::Char('c') => {
                cancel_in_flight_submission(state, runtime, view_data, internal_tx);
                return false;
            }
            _ => {}
        }
    }

    if view_data.date_edit.is_some() {
        handle_date_edit_key(state, view_data, internal_tx, key);
        return false;
    }

    let screen_command = match key.code {
        KeyCode::Tab => Some(AppCommand::NextScreen),
        KeyCode::BackTab => Some(AppCommand::PrevScreen),
        KeyCode::F(number) => usize::from(number)
            .checked_sub(1)
            .and_then(|index| Screen::ALL.get(index).copied())
            .map(AppCommand::ShowScreen),
        _ => None,
    };
    if let Some(command) = screen_command {
        state.dispatch(command);
        enter_screen(state, runtime, view_data, internal_tx);
        return false;
    }

    match state.screen {
        Screen::Dashboard => {}
        Screen::Query => handle_query_key(state, runtime, view_data, internal_tx, key),
        Screen::History => handle_history_key(state, runtime, view_data, internal_tx, key),
    }
    false
}

/// Loads what a screen shows each time it is opened.
fn enter_screen<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    match state.screen {
        Screen::Dashboard => load_dashboard_metrics(state, runtime, view_data, internal_tx),
        Screen::Query => {}
        Screen::History => refresh_history(state, runtime, view_data, internal_tx),
    }
}

fn handle_query_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let alt = key.modifiers.contains(KeyModifiers::ALT);
    match key.code {
        KeyCode::Enter => submit_question(state, runtime, view_data, internal_tx),
        KeyCode::Left => {
            state.dispatch(AppCommand::PrevDisplayTab);
        }
        KeyCode::Right => {
            state.dispatch(AppCommand::NextDisplayTab);
        }
        KeyCode::Backspace => {
            let mut question = state.session.question().to_owned();
            question.pop();
            state.dispatch(AppCommand::SetQuestion(question));
        }
        KeyCode::Char('u') if ctrl => {
            state.dispatch(AppCommand::SetQuestion(String::new()));
        }
        KeyCode::Char('n') if ctrl => cycle_sample(state, view_data, 1),
        KeyCode::Char('p') if ctrl => cycle_sample(state, view_data, -1),
        KeyCode::Char(digit) if alt => {
            if let Some(index) = digit
                .to_digit(10)
                .and_then(|value| (value as usize).checked_sub(1))
            {
                select_sample(state, view_data, index);
            }
        }
        KeyCode::Char(ch) if !ctrl => {
            let mut question = state.session.question().to_owned();
            question.push(ch);
            state.dispatch(AppCommand::SetQuestion(question));
        }
        _ => {}
    }
}

fn cycle_sample(state: &mut AppState, view_data: &mut ViewData, delta: isize) {
    let len = SAMPLE_QUESTIONS.len() as isize;
    let next = match view_data.sample_cursor {
        Some(current) => (current as isize + delta).rem_euclid(len),
        None if delta >= 0 => 0,
        None => len - 1,
    };
    select_sample(state, view_data, next as usize);
}

fn select_sample(state: &mut AppState, view_data: &mut ViewData, index: usize) {
    if state.samples != SampleVisibility::Visible {
        return;
    }
    if !state.dispatch(AppCommand::SelectSample(index)).is_empty() {
        view_data.sample_cursor = Some(index);
    }
}

fn submit_question<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let ticket = state.begin_submission();
    if let Some(previous) = ticket.superseded {
        tracing::debug!(%previous, id = %ticket.id, "superseding in-flight submission");
        if let Err(error) = runtime.cancel_submission(previous) {
            tracing::warn!(%previous, "cancel superseded submission: {error:#}");
        }
    }
    tracing::info!(id = %ticket.id, "submission issued");

    if let Err(error) = runtime.spawn_submission(ticket.id, &ticket.question, internal_tx.clone())
    {
        apply_submission_completion(
            state,
            view_data,
            internal_tx,
            ticket.id,
            Err(format!("{error:#}")),
        );
    }
}

fn cancel_in_flight_submission<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    for event in state.cancel_submission() {
        if let AppEvent::SubmissionCanceled(id) = event {
            if let Err(error) = runtime.cancel_submission(id) {
                tracing::warn!(%id, "cancel submission: {error:#}");
            }
            tracing::info!(%id, "submission canceled");
            emit_status(state, view_data, internal_tx, "query canceled");
        }
    }
}

fn load_dashboard_metrics<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let token = next_fetch_token(view_data);
    view_data.pending_metrics = Some(token);
    tracing::debug!(token, "dashboard metrics fetch issued");
    if let Err(error) = runtime.spawn_metrics_fetch(token, internal_tx.clone()) {
        apply_metrics_result(
            state,
            view_data,
            internal_tx,
            token,
            Err(format!("{error:#}")),
        );
    }
}

fn apply_metrics_result(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    token: u64,
    result: Result<DashboardMetrics, String>,
) {
    if view_data.pending_metrics != Some(token) {
        tracing::debug!(token, "dropped stale dashboard metrics");
        return;
    }
    view_data.pending_metrics = None;
    if let Err(error) = &result {
        tracing::warn!("dashboard metrics fetch failed: {error}");
    }
    let events = state.apply_metrics(result.map_err(anyhow::Error::msg));
    track_status(view_data, internal_tx, &events);
}

fn handle_history_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let last = state.history.len().saturating_sub(1);
    match key.code {
        KeyCode::Up | KeyCode::Char('k') => {
            view_data.history_cursor = view_data.history_cursor.saturating_sub(1);
        }
        KeyCode::Down | KeyCode::Char('j') => {
            view_data.history_cursor = (view_data.history_cursor + 1).min(last);
        }
        KeyCode::Home | KeyCode::Char('g') => view_data.history_cursor = 0,
        KeyCode::End | KeyCode::Char('G') => view_data.history_cursor = last,
        KeyCode::Enter => {
            state.dispatch(AppCommand::ReuseHistoryRecord(view_data.history_cursor));
        }
        KeyCode::Char('d') => delete_history_entry(state, runtime, view_data, internal_tx),
        KeyCode::Char('e') => export_history(state, runtime, view_data, internal_tx),
        KeyCode::Char('r') => refresh_history(state, runtime, view_data, internal_tx),
        KeyCode::Char('f') => open_date_edit(state, view_data, DateField::From),
        KeyCode::Char('t') => open_date_edit(state, view_data, DateField::To),
        KeyCode::Char('/') => filter_history(state, runtime, view_data, internal_tx),
        _ => {}
    }
}

fn refresh_history<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    request_history(state, runtime, view_data, internal_tx, HistoryRequest::Refresh);
}

/// Issues a history fetch. A newer fetch supersedes any pending one, so a
/// late refresh cannot overwrite a filter issued after it.
fn request_history<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    request: HistoryRequest,
) {
    let token = next_fetch_token(view_data);
    view_data.pending_history = Some(token);
    tracing::debug!(token, action = request.action(), "history fetch issued");
    if let Err(error) = runtime.spawn_history_fetch(token, request, internal_tx.clone()) {
        apply_history_result(
            state,
            view_data,
            internal_tx,
            token,
            request,
            Err(format!("{error:#}")),
        );
    }
}

/// Replaces the cache with the server's filtered list. Needs both dates; with
/// either missing nothing is sent.
fn filter_history<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let Some((start, end)) = state.date_range.bounds() else {
        tracing::debug!("history filter skipped: both dates required");
        return;
    };
    request_history(
        state,
        runtime,
        view_data,
        internal_tx,
        HistoryRequest::Filter { start, end },
    );
}

/// Deletes the row under the cursor by position. The refetch follows once the
/// delete reports back, whatever its outcome.
fn delete_history_entry<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let index = view_data.history_cursor;
    let generation = state.history.generation();
    tracing::info!(index, %generation, "history delete issued");

    if let Err(error) = runtime.spawn_history_delete(index, internal_tx.clone()) {
        finish_history_delete(
            state,
            runtime,
            view_data,
            internal_tx,
            index,
            Err(format!("{error:#}")),
        );
    }
}

fn finish_history_delete<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    index: usize,
    result: Result<(), String>,
) {
    match result {
        Ok(()) => tracing::info!(index, "history delete applied"),
        Err(error) => {
            tracing::warn!(index, "history delete failed: {error}");
            if let Some(message) = state.failure_policy.status_message("delete", &error) {
                emit_status(state, view_data, internal_tx, message);
            }
        }
    }
    refresh_history(state, runtime, view_data, internal_tx);
}

fn export_history<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    match runtime.open_export() {
        Ok(url) => {
            tracing::info!(%url, "history export opened");
            emit_status(state, view_data, internal_tx, format!("export opened: {url}"));
        }
        Err(error) => {
            let error = format!("{error:#}");
            tracing::warn!("history export failed: {error}");
            if let Some(message) = state.failure_policy.status_message("export", &error) {
                emit_status(state, view_data, internal_tx, message);
            }
        }
    }
}

fn apply_history_result(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    token: u64,
    request: HistoryRequest,
    result: Result<Vec<QueryRecord>, String>,
) {
    let action = request.action();
    if view_data.pending_history != Some(token) {
        tracing::debug!(token, "dropped stale {action} result");
        return;
    }
    view_data.pending_history = None;
    if let Err(error) = &result {
        tracing::warn!("{action} failed: {error}");
    }
    let events = state.apply_history_fetch(result.map_err(anyhow::Error::msg));
    for event in &events {
        if let AppEvent::HistoryReplaced { generation, len } = event {
            tracing::debug!(%generation, len, "{action} replaced history");
        }
    }
    view_data.history_cursor = view_data
        .history_cursor
        .min(state.history.len().saturating_sub(1));
    track_status(view_data, internal_tx, &events);
}

fn open_date_edit(state: &AppState, view_data: &mut ViewData, field: DateField) {
    let current = match field {
        DateField::From => state.date_range.from,
        DateField::To => state.date_range.to,
    };
    view_data.date_edit = Some(DateEditState {
        field,
        buffer: current.map(format_filter_date).unwrap_or_default(),
    });
}

fn handle_date_edit_key(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let Some(edit) = view_data.date_edit.as_mut() else {
        return;
    };
    match key.code {
        KeyCode::Esc => view_data.date_edit = None,
        KeyCode::Backspace => {
            edit.buffer.pop();
        }
        KeyCode::Char(ch) if ch.is_ascii_digit() || ch == '-' => {
            if edit.buffer.len() < DATE_INPUT_MAX {
                edit.buffer.push(ch);
            }
        }
        KeyCode::Enter => commit_date_edit(state, view_data, internal_tx),
        _ => {}
    }
}

/// An empty buffer clears the bound. An unparseable one keeps the editor open.
fn commit_date_edit(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let Some(edit) = view_data.date_edit.take() else {
        return;
    };
    let date = if edit.buffer.trim().is_empty() {
        None
    } else {
        match parse_filter_date(&edit.buffer) {
            Ok(date) => Some(date),
            Err(error) => {
                emit_status(state, view_data, internal_tx, format!("{error}"));
                view_data.date_edit = Some(edit);
                return;
            }
        }
    };
    let command = match edit.field {
        DateField::From => AppCommand::SetFilterFrom(date),
        DateField::To => AppCommand::SetFilterTo(date),
    };
    state.dispatch(command);
}

fn render(frame: &mut ratatui::Frame<'_>, state: &AppState, view_data: &ViewData) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(3),
        ])
        .split(frame.area());

    let selected = Screen::ALL
        .iter()
        .position(|screen| *screen == state.screen)
        .unwrap_or(0);
    let titles = Screen::ALL
        .iter()
        .enumerate()
        .map(|(index, screen)| format!("F{} {}", index + 1, screen.label()))
        .collect::<Vec<String>>();
    let tabs = Tabs::new(titles)
        .block(Block::default().title("wealthq").borders(Borders::ALL))
        .style(Style::default().fg(Color::White))
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .select(selected);
    frame.render_widget(tabs, layout[0]);

    match state.screen {
        Screen::Dashboard => {
            let title = pending_title("dashboard", view_data.pending_metrics);
            let body = Paragraph::new(render_dashboard_text(state.metrics.as_ref()))
                .block(Block::default().borders(Borders::ALL).title(title));
            frame.render_widget(body, layout[1]);
        }
        Screen::Query => render_query(frame, layout[1], state, view_data),
        Screen::History => {
            let title = pending_title("history", view_data.pending_history);
            let body = Paragraph::new(render_history_text(state, view_data))
                .block(Block::default().borders(Borders::ALL).title(title));
            frame.render_widget(body, layout[1]);
        }
    }

    let status_widget = Paragraph::new(status_text(state, view_data))
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(status_widget, layout[2]);

    if let Some(edit) = &view_data.date_edit {
        let area = centered_rect(48, 30, frame.area());
        frame.render_widget(Clear, area);
        let editor = Paragraph::new(render_date_edit_text(edit))
            .block(Block::default().title("date").borders(Borders::ALL));
        frame.render_widget(editor, area);
    }
}

fn render_query(
    frame: &mut ratatui::Frame<'_>,
    area: Rect,
    state: &AppState,
    view_data: &ViewData,
) {
    let samples_height = match state.samples {
        SampleVisibility::Visible => SAMPLE_QUESTIONS.len() as u16 + 2,
        SampleVisibility::Hidden => 0,
    };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(samples_height),
            Constraint::Length(3),
            Constraint::Min(1),
        ])
        .split(area);

    let input_title = match state.submission.in_flight() {
        Some(id) => format!("question (loading #{id})"),
        None => "question".to_owned(),
    };
    let input = Paragraph::new(format!("> {}", state.session.question()))
        .block(Block::default().title(input_title).borders(Borders::ALL));
    frame.render_widget(input, chunks[0]);

    if state.samples == SampleVisibility::Visible {
        let samples = Paragraph::new(render_samples_text(view_data.sample_cursor))
            .block(Block::default().title("sample questions").borders(Borders::ALL));
        frame.render_widget(samples, chunks[1]);
    }

    let active = state.session.active_tab();
    let display_tabs = Tabs::new(DisplayTab::ALL.iter().map(|tab| tab.label()))
        .block(Block::default().borders(Borders::ALL))
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .select(
            DisplayTab::ALL
                .iter()
                .position(|tab| *tab == active)
                .unwrap_or(0),
        );
    frame.render_widget(display_tabs, chunks[2]);

    let block = Block::default().title("answer").borders(Borders::ALL);
    match select_view(&state.session) {
        DisplayView::Table(rows) => {
            let rows = rows.iter().map(|row| {
                Row::new(vec![
                    Cell::from(row.client.clone()),
                    Cell::from(format_number(row.portfolio_value)),
                ])
            });
            let table = Table::new(rows, [Constraint::Percentage(60), Constraint::Percentage(40)])
                .header(
                    Row::new(vec!["Client", "Portfolio Value"])
                        .style(Style::default().add_modifier(Modifier::BOLD)),
                )
                .block(block);
            frame.render_widget(table, chunks[3]);
        }
        view => {
            let answer = Paragraph::new(render_answer_text(view))
                .wrap(Wrap { trim: false })
                .block(block);
            frame.render_widget(answer, chunks[3]);
        }
    }
}

fn pending_title(title: &str, pending: Option<u64>) -> String {
    match pending {
        Some(_) => format!("{title} (loading...)"),
        None => title.to_owned(),
    }
}

fn render_answer_text(view: DisplayView<'_>) -> String {
    match view {
        DisplayView::Empty => String::new(),
        DisplayView::Text(response) => response.to_owned(),
        DisplayView::Table(rows) => rows
            .iter()
            .map(format_table_row)
            .collect::<Vec<_>>()
            .join("\n"),
        DisplayView::Graph(points) => render_graph_text(points),
    }
}

fn render_graph_text(points: &[GraphPoint]) -> String {
    let entries = points
        .iter()
        .map(|point| (point.label.as_str(), point.value, format_number(point.value)))
        .collect::<Vec<_>>();
    render_bars(&entries).join("\n")
}

fn render_samples_text(cursor: Option<usize>) -> String {
    SAMPLE_QUESTIONS
        .iter()
        .enumerate()
        .map(|(index, question)| {
            let marker = if cursor == Some(index) { ">" } else { " " };
            format!("{marker} alt+{} {question}", index + 1)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_dashboard_text(metrics: Option<&DashboardMetrics>) -> String {
    let stat = |value: Option<&MetricValue>| {
        value.map_or_else(|| PLACEHOLDER.to_owned(), ToString::to_string)
    };
    let mut lines = vec![
        format!(
            "Top Portfolios: {}",
            stat(metrics.map(|metrics| &metrics.top_portfolios))
        ),
        format!(
            "Total AUM: {}",
            stat(metrics.map(|metrics| &metrics.total_aum))
        ),
        format!(
            "Active RMs: {}",
            stat(metrics.map(|metrics| &metrics.active_rms))
        ),
        format!(
            "High Risk: {}",
            stat(metrics.map(|metrics| &metrics.high_risk))
        ),
    ];
    let Some(metrics) = metrics else {
        return lines.join("\n");
    };

    lines.push(String::new());
    lines.push("Portfolio growth".to_owned());
    let growth = metrics
        .portfolio_growth
        .iter()
        .map(|point| (point.month.as_str(), point.value, format_number(point.value)))
        .collect::<Vec<_>>();
    lines.extend(section_lines(&growth));

    lines.push(String::new());
    lines.push("Asset allocation".to_owned());
    let allocation = metrics
        .asset_allocation
        .iter()
        .map(|share| {
            (
                share.asset.as_str(),
                share.percent,
                format!("{}%", format_number(share.percent)),
            )
        })
        .collect::<Vec<_>>();
    lines.extend(section_lines(&allocation));

    lines.push(String::new());
    lines.push("Clients per RM".to_owned());
    let managers = metrics
        .rm_clients
        .iter()
        .map(|manager| {
            (
                manager.rm.as_str(),
                manager.clients as f64,
                manager.clients.to_string(),
            )
        })
        .collect::<Vec<_>>();
    lines.extend(section_lines(&managers));

    lines.join("\n")
}

fn section_lines(entries: &[(&str, f64, String)]) -> Vec<String> {
    if entries.is_empty() {
        return vec!["  (no data)".to_owned()];
    }
    render_bars(entries)
}

fn render_bars(entries: &[(&str, f64, String)]) -> Vec<String> {
    let label_width = entries
        .iter()
        .map(|(label, _, _)| label.chars().count())
        .max()
        .unwrap_or(0);
    let max = entries
        .iter()
        .map(|(_, value, _)| *value)
        .fold(0.0_f64, f64::max);
    entries
        .iter()
        .map(|(label, value, shown)| {
            format!(
                "  {label:<label_width$}  {bar:<width$}  {shown}",
                bar = bar(*value, max),
                width = BAR_WIDTH,
            )
        })
        .collect()
}

fn bar(value: f64, max: f64) -> String {
    if !value.is_finite() || !max.is_finite() || value <= 0.0 || max <= 0.0 {
        return String::new();
    }
    let cells = ((value / max) * BAR_WIDTH as f64).round() as usize;
    "█".repeat(cells.clamp(1, BAR_WIDTH))
}

fn render_history_text(state: &AppState, view_data: &ViewData) -> String {
    let date_label = |date: Option<Date>| {
        date.map(format_filter_date)
            .unwrap_or_else(|| "----------".to_owned())
    };
    let mut lines = vec![
        format!(
            "from: {}   to: {}",
            date_label(state.date_range.from),
            date_label(state.date_range.to)
        ),
        String::new(),
    ];

    if state.history.is_empty() {
        let empty = if state.history.is_loaded() {
            "no queries"
        } else {
            "history not loaded"
        };
        lines.push(empty.to_owned());
    }

    for (index, record) in state.history.records().iter().enumerate() {
        let marker = if index == view_data.history_cursor {
            ">"
        } else {
            " "
        };
        lines.push(format!("{marker} {}  {}", record.time, record.text));
    }
    lines.join("\n")
}

fn render_date_edit_text(edit: &DateEditState) -> String {
    format!(
        "{}: {}_\n\nYYYY-MM-DD | enter set | empty clears | esc cancel",
        edit.field.label(),
        edit.buffer
    )
}

fn status_text(state: &AppState, view_data: &ViewData) -> String {
    let hints = if view_data.date_edit.is_some() {
        "enter set | esc cancel"
    } else {
        match state.screen {
            Screen::Dashboard => "tab/F1-F3 screens | ctrl+q",
            Screen::Query => {
                "enter submit | left/right view | ctrl+n/p sample | ctrl+c cancel | tab | ctrl+q"
            }
            Screen::History => {
                "j/k | enter reuse | d del | e export | f/t dates | / filter | r reload | ctrl+q"
            }
        }
    };
    let loading = if state.is_loading() { "loading | " } else { "" };
    match &state.status_line {
        Some(status) => format!("{loading}{status} | {hints}"),
        None => format!("{loading}{hints}"),
    }
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
