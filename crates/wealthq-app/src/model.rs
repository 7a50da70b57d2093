// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use std::fmt;

pub const SAMPLE_QUESTIONS: [&str; 4] = [
    "What are the top five portfolios?",
    "List clients who prefer investing in Real Estate.",
    "Give me the breakup of portfolio values per relationship manager.",
    "Who are the top relationship managers by portfolio?",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Dashboard,
    Query,
    History,
}

impl Screen {
    pub const ALL: [Self; 3] = [Self::Dashboard, Self::Query, Self::History];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Dashboard => "dashboard",
            Self::Query => "query",
            Self::History => "history",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "dashboard" => Some(Self::Dashboard),
            "query" => Some(Self::Query),
            "history" => Some(Self::History),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Dashboard => "Dashboard",
            Self::Query => "Query Interface",
            Self::History => "Query History",
        }
    }
}

/// Which representation of the last answer is on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayTab {
    #[default]
    Text,
    Table,
    Graph,
}

impl DisplayTab {
    pub const ALL: [Self; 3] = [Self::Text, Self::Table, Self::Graph];

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "text" => Some(Self::Text),
            "table" => Some(Self::Table),
            "graph" => Some(Self::Graph),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Text => "Text",
            Self::Table => "Table",
            Self::Graph => "Graph",
        }
    }

    pub fn rotate(self, delta: isize) -> Self {
        let tabs = Self::ALL;
        let current = tabs.iter().position(|tab| *tab == self).unwrap_or(0) as isize;
        let len = tabs.len() as isize;
        tabs[(current + delta).rem_euclid(len) as usize]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphPoint {
    pub label: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    pub client: String,
    pub portfolio_value: f64,
}

/// One resolved answer from the query service. The three parts always travel
/// together.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryAnswer {
    pub response: String,
    pub graph_data: Vec<GraphPoint>,
    pub table_data: Vec<TableRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRecord {
    pub text: String,
    pub time: String,
}

/// Stat-card value. The metrics backend mixes integers with preformatted
/// currency strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Integer(i64),
    Decimal(f64),
    Text(String),
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(value) => write!(f, "{value}"),
            Self::Decimal(value) => write!(f, "{}", format_number(*value)),
            Self::Text(value) => f.write_str(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthPoint {
    pub month: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetShare {
    pub asset: String,
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagerClients {
    pub rm: String,
    pub clients: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardMetrics {
    pub top_portfolios: MetricValue,
    pub total_aum: MetricValue,
    pub active_rms: MetricValue,
    pub high_risk: MetricValue,
    #[serde(default)]
    pub portfolio_growth: Vec<GrowthPoint>,
    #[serde(default)]
    pub asset_allocation: Vec<AssetShare>,
    #[serde(default)]
    pub rm_clients: Vec<ManagerClients>,
}

/// Shortest exact rendering of a backend number: whole values drop the `.0`
/// and fractions keep full precision. Negative zero prints as `0`.
pub fn format_number(value: f64) -> String {
    if value == 0.0 {
        return "0".to_owned();
    }
    value.to_string()
}
