// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use time::Date;
use time::macros::format_description;

use crate::{HistoryGeneration, QueryRecord};

/// Local copy of the server-owned query history.
///
/// The list is only ever replaced wholesale with the latest server response.
/// Positions are valid against the snapshot identified by `generation`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HistoryCache {
    records: Vec<QueryRecord>,
    generation: HistoryGeneration,
}

impl HistoryCache {
    pub fn records(&self) -> &[QueryRecord] {
        &self.records
    }

    pub fn get(&self, index: usize) -> Option<&QueryRecord> {
        self.records.get(index)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn generation(&self) -> HistoryGeneration {
        self.generation
    }

    /// True once at least one fetch has succeeded.
    pub fn is_loaded(&self) -> bool {
        self.generation.get() != 0
    }

    pub fn replace(&mut self, records: Vec<QueryRecord>) -> HistoryGeneration {
        self.records = records;
        self.generation = self.generation.next();
        self.generation
    }
}

/// Date bounds typed on the history screen. Both must be set before a filter
/// request goes out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateRange {
    pub from: Option<Date>,
    pub to: Option<Date>,
}

impl DateRange {
    pub fn bounds(&self) -> Option<(Date, Date)> {
        Some((self.from?, self.to?))
    }
}

pub fn parse_filter_date(raw: &str) -> Result<Date> {
    Date::parse(raw.trim(), format_description!("[year]-[month]-[day]"))
        .with_context(|| format!("invalid date {raw:?}; use YYYY-MM-DD"))
}

pub fn format_filter_date(date: Date) -> String {
    date.format(format_description!("[year]-[month]-[day]"))
        .unwrap_or_else(|_| date.to_string())
}
