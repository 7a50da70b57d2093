// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use time::Date;

use crate::{
    Completion, DashboardMetrics, DateRange, DisplayTab, FailurePolicy, HistoryCache,
    HistoryGeneration, QueryAnswer, QueryRecord, QuerySession, SAMPLE_QUESTIONS, Screen,
    SubmissionId, SubmissionTicket, SubmissionTracker,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleVisibility {
    Hidden,
    Visible,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppState {
    pub screen: Screen,
    pub session: QuerySession,
    pub submission: SubmissionTracker,
    pub samples: SampleVisibility,
    pub history: HistoryCache,
    pub date_range: DateRange,
    pub metrics: Option<DashboardMetrics>,
    pub failure_policy: FailurePolicy,
    pub status_line: Option<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            screen: Screen::Dashboard,
            session: QuerySession::new(),
            submission: SubmissionTracker::default(),
            samples: SampleVisibility::Visible,
            history: HistoryCache::default(),
            date_range: DateRange::default(),
            metrics: None,
            failure_policy: FailurePolicy::default(),
            status_line: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    NextScreen,
    PrevScreen,
    ShowScreen(Screen),
    SetQuestion(String),
    SelectSample(usize),
    ReuseHistoryRecord(usize),
    SetDisplayTab(DisplayTab),
    NextDisplayTab,
    PrevDisplayTab,
    SetFilterFrom(Option<Date>),
    SetFilterTo(Option<Date>),
    SetStatus(String),
    ClearStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    ScreenChanged(Screen),
    QuestionChanged,
    DisplayTabChanged(DisplayTab),
    SamplesHidden,
    FilterRangeChanged(DateRange),
    StatusUpdated(String),
    StatusCleared,
    SubmissionApplied(SubmissionId),
    SubmissionFailed {
        id: SubmissionId,
        error: String,
    },
    SubmissionDiscarded(SubmissionId),
    SubmissionCanceled(SubmissionId),
    HistoryReplaced {
        generation: HistoryGeneration,
        len: usize,
    },
    HistoryFetchFailed {
        error: String,
    },
    MetricsLoaded,
    MetricsFailed {
        error: String,
    },
}

impl AppState {
    pub fn dispatch(&mut self, command: AppCommand) -> Vec<AppEvent> {
        match command {
            AppCommand::NextScreen => self.rotate_screen(1),
            AppCommand::PrevScreen => self.rotate_screen(-1),
            AppCommand::ShowScreen(screen) => {
                self.screen = screen;
                vec![AppEvent::ScreenChanged(screen)]
            }
            AppCommand::SetQuestion(text) => {
                self.session.set_question(text);
                vec![AppEvent::QuestionChanged]
            }
            AppCommand::SelectSample(index) => match SAMPLE_QUESTIONS.get(index) {
                Some(sample) => {
                    self.session.set_question(*sample);
                    vec![AppEvent::QuestionChanged]
                }
                None => Vec::new(),
            },
            AppCommand::ReuseHistoryRecord(index) => {
                let Some(record) = self.history.get(index) else {
                    return Vec::new();
                };
                let text = record.text.clone();
                self.session.set_question(text);
                self.screen = Screen::Query;
                vec![
                    AppEvent::QuestionChanged,
                    AppEvent::ScreenChanged(Screen::Query),
                ]
            }
            AppCommand::SetDisplayTab(tab) => {
                self.session.set_active_tab(tab);
                vec![AppEvent::DisplayTabChanged(tab)]
            }
            AppCommand::NextDisplayTab => {
                let tab = self.session.active_tab().rotate(1);
                self.session.set_active_tab(tab);
                vec![AppEvent::DisplayTabChanged(tab)]
            }
            AppCommand::PrevDisplayTab => {
                let tab = self.session.active_tab().rotate(-1);
                self.session.set_active_tab(tab);
                vec![AppEvent::DisplayTabChanged(tab)]
            }
            AppCommand::SetFilterFrom(date) => {
                self.date_range.from = date;
                vec![AppEvent::FilterRangeChanged(self.date_range)]
            }
            AppCommand::SetFilterTo(date) => {
                self.date_range.to = date;
                vec![AppEvent::FilterRangeChanged(self.date_range)]
            }
            AppCommand::SetStatus(message) => vec![self.set_status(&message)],
            AppCommand::ClearStatus => {
                self.status_line = None;
                vec![AppEvent::StatusCleared]
            }
        }
    }

    pub fn is_loading(&self) -> bool {
        self.submission.is_loading()
    }

    /// Issues a new submission for the current question. Any submission still
    /// in flight is superseded and its completion will be discarded.
    pub fn begin_submission(&mut self) -> SubmissionTicket {
        let (id, superseded) = self.submission.begin();
        SubmissionTicket {
            id,
            question: self.session.question().to_owned(),
            superseded,
        }
    }

    pub fn complete_submission(
        &mut self,
        id: SubmissionId,
        result: Result<QueryAnswer, String>,
    ) -> Vec<AppEvent> {
        if self.submission.finish(id) == Completion::Stale {
            return vec![AppEvent::SubmissionDiscarded(id)];
        }

        match result {
            Ok(answer) => {
                self.session.replace_result(answer);
                self.session.set_active_tab(DisplayTab::Text);
                let mut events = vec![
                    AppEvent::SubmissionApplied(id),
                    AppEvent::DisplayTabChanged(DisplayTab::Text),
                ];
                if self.samples == SampleVisibility::Visible {
                    self.samples = SampleVisibility::Hidden;
                    events.push(AppEvent::SamplesHidden);
                }
                events
            }
            Err(error) => {
                let mut events = vec![AppEvent::SubmissionFailed {
                    id,
                    error: error.clone(),
                }];
                if let Some(message) = self.failure_policy.status_message("query", &error) {
                    events.push(self.set_status(&message));
                }
                events
            }
        }
    }

    pub fn cancel_submission(&mut self) -> Vec<AppEvent> {
        match self.submission.cancel() {
            Some(id) => vec![AppEvent::SubmissionCanceled(id)],
            None => Vec::new(),
        }
    }

    pub fn apply_history_fetch(
        &mut self,
        result: anyhow::Result<Vec<QueryRecord>>,
    ) -> Vec<AppEvent> {
        match result {
            Ok(records) => {
                let generation = self.history.replace(records);
                vec![AppEvent::HistoryReplaced {
                    generation,
                    len: self.history.len(),
                }]
            }
            Err(error) => {
                let error = format!("{error:#}");
                let mut events = vec![AppEvent::HistoryFetchFailed {
                    error: error.clone(),
                }];
                if let Some(message) = self.failure_policy.status_message("history", &error) {
                    events.push(self.set_status(&message));
                }
                events
            }
        }
    }

    pub fn apply_metrics(&mut self, result: anyhow::Result<DashboardMetrics>) -> Vec<AppEvent> {
        match result {
            Ok(metrics) => {
                self.metrics = Some(metrics);
                vec![AppEvent::MetricsLoaded]
            }
            Err(error) => {
                let error = format!("{error:#}");
                let mut events = vec![AppEvent::MetricsFailed {
                    error: error.clone(),
                }];
                if let Some(message) = self.failure_policy.status_message("metrics", &error) {
                    events.push(self.set_status(&message));
                }
                events
            }
        }
    }

    fn rotate_screen(&mut self, delta: isize) -> Vec<AppEvent> {
        let screens = Screen::ALL;
        let current = screens
            .iter()
            .position(|screen| *screen == self.screen)
            .unwrap_or(0) as isize;
        let len = screens.len() as isize;
        let next = (current + delta).rem_euclid(len) as usize;
        self.screen = screens[next];
        vec![AppEvent::ScreenChanged(self.screen)]
    }

    fn set_status(&mut self, message: &str) -> AppEvent {
        self.status_line = Some(message.to_owned());
        AppEvent::StatusUpdated(message.to_owned())
    }
}
