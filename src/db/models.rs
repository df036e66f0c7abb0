//! Status document model types.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A monitored endpoint.
///
/// `id` is the key shared by results and history; renaming it orphans the
/// target's history, which then ages out through retention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub url: String,
    #[serde(default)]
    pub icon: String,
}

impl Target {
    pub fn new(id: &str, name: &str, description: &str, url: &str, icon: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            url: url.to_string(),
            icon: icon.to_string(),
        }
    }
}

/// Health classification of a target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Operational,
    Degraded,
    Outage,
    /// No probe outcome exists for the target in this cycle.
    Unknown,
}

impl Status {
    /// Rank used when reducing to the worst status.
    pub fn severity(self) -> u8 {
        match self {
            Status::Operational => 0,
            Status::Unknown => 1,
            Status::Degraded => 2,
            Status::Outage => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Operational => "operational",
            Status::Degraded => "degraded",
            Status::Outage => "outage",
            Status::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The outcome of probing one target once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub description: String,
    pub status: Status,
    pub status_text: String,
    /// Absent when no response was received.
    #[serde(default)]
    pub status_code: Option<u16>,
    /// Milliseconds from request start to response or failure.
    pub response_time: u64,
    #[serde(default)]
    pub error: Option<String>,
    pub last_checked: DateTime<Utc>,
}

impl CheckResult {
    /// Placeholder for a target whose probe never produced a result.
    pub fn unavailable(target: &Target, checked_at: DateTime<Utc>) -> Self {
        Self {
            id: target.id.clone(),
            name: target.name.clone(),
            url: target.url.clone(),
            icon: target.icon.clone(),
            description: target.description.clone(),
            status: Status::Unknown,
            status_text: "Check Unavailable".to_string(),
            status_code: None,
            response_time: 0,
            error: Some("probe did not complete".to_string()),
            last_checked: checked_at,
        }
    }
}

/// A non-operational target as listed in the metrics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteIssue {
    pub id: String,
    pub name: String,
    pub status: Status,
    pub status_text: String,
}

/// System-wide reduction over one cycle's results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HealthMetrics {
    /// Worst status across all targets.
    pub status: Status,
    pub operational_percentage: u32,
    /// Mean response time of operational targets only.
    pub average_response_time: u64,
    pub sites_with_issues: Vec<SiteIssue>,
    pub total_sites: usize,
}

/// Last observation within one hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourlyBucket {
    pub status: Status,
    pub response_time: u64,
}

/// Counters accumulated over one calendar day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DailyBucket {
    pub checks: u64,
    pub operational: u64,
    pub degraded: u64,
    pub outage: u64,
    pub total_response_time: u64,
    /// `round(100 * operational / checks)`
    pub uptime: u64,
    /// `round(total_response_time / checks)`
    pub avg_response_time: u64,
}

/// Hour key (`YYYY-MM-DDTHH`) to bucket, per target.
pub type HourlySeries = BTreeMap<String, HourlyBucket>;

/// Date key (`YYYY-MM-DD`) to bucket, per target.
pub type DailySeries = BTreeMap<String, DailyBucket>;

/// Bucketed history of every target, keyed by target id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Historical {
    pub hourly: BTreeMap<String, HourlySeries>,
    pub daily: BTreeMap<String, DailySeries>,
}

/// One hourly bucket in a per-target history view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HourlyEntry {
    pub timestamp: DateTime<Utc>,
    pub status: Status,
    pub response_time: u64,
}

/// One daily bucket in a per-target history view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyEntry {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub bucket: DailyBucket,
}

/// Chronologically ordered history of one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteHistory {
    pub site_id: String,
    /// False until the target has at least one bucket.
    pub has_data: bool,
    /// Share of retained hours that were operational, 100 with no data.
    pub availability: u64,
    pub hourly_data: Vec<HourlyEntry>,
    pub daily_data: Vec<DailyEntry>,
}

/// Results and metrics of the most recent cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub metrics: HealthMetrics,
    pub sites: Vec<CheckResult>,
    pub last_checked: DateTime<Utc>,
}

/// The persisted unit. Every save replaces the whole document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatusDocument {
    /// `None` until the first cycle has been written.
    pub timestamp: Option<DateTime<Utc>>,
    pub overall: Status,
    pub metrics: HealthMetrics,
    pub sites: Vec<CheckResult>,
    pub last_checked: Option<DateTime<Utc>>,
    pub historical: Historical,
}

impl StatusDocument {
    /// True for a document no cycle has written yet.
    pub fn is_empty(&self) -> bool {
        self.timestamp.is_none()
    }
}
