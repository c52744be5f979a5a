//! Types for analysis reports and the cached snapshot

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Server-assigned report identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportId(pub i64);

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One entry of the report selector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub id: ReportId,

    #[serde(default)]
    pub company_name: String,

    #[serde(default)]
    pub target_market: String,

    #[serde(default)]
    pub industry: String,

    #[serde(default)]
    pub status: String,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Reply of the report selector endpoint
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ReportList {
    #[serde(default)]
    pub reports: Vec<ReportSummary>,
}

/// Full analysis payload, as returned by the latest-dashboard and
/// report-detail endpoints
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ReportPayload {
    /// Explicit "the user has stored reports" signal; report details omit it
    #[serde(default)]
    pub has_data: Option<bool>,

    #[serde(default)]
    pub report_id: Option<ReportId>,

    #[serde(default)]
    pub dashboard_data: Option<Value>,

    #[serde(default, alias = "competitor_analysis")]
    pub competitor_summary: Option<Value>,

    #[serde(default, alias = "segment_arbitrage")]
    pub arbitrage_data: Option<Value>,
}

/// A completed analysis stored locally while no server record exists
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalAnalysis {
    pub dashboard_data: Option<Value>,
    pub competitor_summary: Option<Value>,
    pub arbitrage_data: Option<Value>,
}

/// What the UI currently shows for analysis data
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisSnapshot {
    pub dashboard_data: Option<Value>,
    pub competitor_summary: Option<Value>,
    pub arbitrage_data: Option<Value>,
    pub has_analysis_history: bool,
    pub is_loading: bool,
    pub available_reports: Vec<ReportSummary>,
    pub current_report_id: Option<ReportId>,
}

impl AnalysisSnapshot {
    /// Empty and settled: what an anonymous visitor sees
    pub fn empty() -> Self {
        Self {
            dashboard_data: None,
            competitor_summary: None,
            arbitrage_data: None,
            has_analysis_history: false,
            is_loading: false,
            available_reports: Vec::new(),
            current_report_id: None,
        }
    }

    /// Empty and waiting for the first load
    pub fn loading() -> Self {
        Self {
            is_loading: true,
            ..Self::empty()
        }
    }

    /// Whether any data field is populated
    pub fn has_data(&self) -> bool {
        self.dashboard_data.is_some()
            || self.competitor_summary.is_some()
            || self.arbitrage_data.is_some()
    }
}

impl Default for AnalysisSnapshot {
    fn default() -> Self {
        Self::loading()
    }
}

/// The newest report of a selector list.
///
/// Uses `created_at` when present; without timestamps the server's order
/// (newest first) decides.
pub fn most_recent(reports: &[ReportSummary]) -> Option<ReportId> {
    let newest_dated = reports
        .iter()
        .filter_map(|report| report.created_at.map(|at| (at, report.id)))
        .max_by_key(|(at, _)| *at)
        .map(|(_, id)| id);

    newest_dated.or_else(|| reports.first().map(|report| report.id))
}
