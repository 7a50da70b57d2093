// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::{DisplayTab, GraphPoint, QuerySession, TableRow, format_number};

/// What the answer pane should draw for the session's active tab.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DisplayView<'a> {
    /// Nothing to draw. Covers both "not queried yet" and "empty payload".
    Empty,
    Text(&'a str),
    Table(&'a [TableRow]),
    Graph(&'a [GraphPoint]),
}

impl DisplayView<'_> {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

pub fn select_view(session: &QuerySession) -> DisplayView<'_> {
    match session.active_tab() {
        DisplayTab::Text if !session.response().is_empty() => {
            DisplayView::Text(session.response())
        }
        DisplayTab::Table if !session.table_data().is_empty() => {
            DisplayView::Table(session.table_data())
        }
        DisplayTab::Graph if !session.graph_data().is_empty() => {
            DisplayView::Graph(session.graph_data())
        }
        _ => DisplayView::Empty,
    }
}

pub fn format_table_row(row: &TableRow) -> String {
    format!("{} | {}", row.client, format_number(row.portfolio_value))
}
