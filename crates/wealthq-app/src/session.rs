// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::{DisplayTab, GraphPoint, QueryAnswer, TableRow};

/// State of the current query and its last resolved answer.
///
/// Fields are private: the question and tab change through their setters and
/// the answer only ever changes as a whole through [`QuerySession::replace_result`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QuerySession {
    question: String,
    answer: QueryAnswer,
    active_tab: DisplayTab,
}

impl QuerySession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn answer(&self) -> &QueryAnswer {
        &self.answer
    }

    pub fn response(&self) -> &str {
        &self.answer.response
    }

    pub fn graph_data(&self) -> &[GraphPoint] {
        &self.answer.graph_data
    }

    pub fn table_data(&self) -> &[TableRow] {
        &self.answer.table_data
    }

    pub fn active_tab(&self) -> DisplayTab {
        self.active_tab
    }

    pub fn set_question(&mut self, text: impl Into<String>) {
        self.question = text.into();
    }

    pub fn set_active_tab(&mut self, tab: DisplayTab) {
        self.active_tab = tab;
    }

    pub fn replace_result(&mut self, answer: QueryAnswer) {
        self.answer = answer;
    }
}
