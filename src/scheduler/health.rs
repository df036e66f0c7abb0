//! System-wide health metrics.

use crate::db::{CheckResult, HealthMetrics, SiteIssue, Status};

use super::round_div;

/// Reduce one cycle's results to system-wide metrics.
///
/// An empty result set is reported as fully operational (100% of zero
/// targets); a fleet with nothing configured has nothing failing.
pub fn aggregate(results: &[CheckResult]) -> HealthMetrics {
    let total = results.len() as u64;

    let status = results
        .iter()
        .map(|r| r.status)
        .max_by_key(|s| s.severity())
        .unwrap_or(Status::Operational);

    let operational: Vec<&CheckResult> = results
        .iter()
        .filter(|r| r.status == Status::Operational)
        .collect();
    let operational_count = operational.len() as u64;

    let operational_percentage = if total == 0 {
        100
    } else {
        round_div(100 * operational_count, total) as u32
    };

    let average_response_time = if operational_count == 0 {
        0
    } else {
        let sum: u64 = operational.iter().map(|r| r.response_time).sum();
        round_div(sum, operational_count)
    };

    let sites_with_issues = results
        .iter()
        .filter(|r| r.status != Status::Operational)
        .map(|r| SiteIssue {
            id: r.id.clone(),
            name: r.name.clone(),
            status: r.status,
            status_text: r.status_text.clone(),
        })
        .collect();

    HealthMetrics {
        status,
        operational_percentage,
        average_response_time,
        sites_with_issues,
        total_sites: results.len(),
    }
}
