//! Plain-text summary of the persisted status document.

use crate::db::{StatusDocument, Store};
use crate::scheduler::RetentionPolicy;

use std::collections::BTreeMap;
use std::fmt::{self, Write};

/// Build the report printed by `statusboard analyze`.
pub fn analyze(store: &Store, policy: &RetentionPolicy) -> String {
    let mut out = String::new();

    // Writing into a String cannot fail
    let _ = match store.read() {
        Ok(Some(doc)) => write_report(&mut out, store, &doc, policy),
        Ok(None) => writeln!(out, "No status document found at {}", store.path().display()),
        Err(e) => writeln!(out, "Status document is unreadable: {}", e),
    };

    out
}

fn write_report(
    out: &mut String,
    store: &Store,
    doc: &StatusDocument,
    policy: &RetentionPolicy,
) -> fmt::Result {
    writeln!(out, "File Information:")?;
    writeln!(out, "Path: {}", store.path().display())?;
    writeln!(out, "Size: {}", format_bytes(store.size_bytes().unwrap_or(0)))?;
    match doc.timestamp {
        Some(ts) => writeln!(out, "Last Status Check: {}", ts.to_rfc3339())?,
        None => writeln!(out, "Last Status Check: never")?,
    }
    writeln!(out)?;

    writeln!(out, "Status Summary:")?;
    writeln!(out, "Overall Status: {}", doc.overall)?;
    writeln!(out, "Operational Sites: {}%", doc.metrics.operational_percentage)?;
    writeln!(out, "Total Sites: {}", doc.metrics.total_sites)?;
    writeln!(out, "Average Response Time: {}ms", doc.metrics.average_response_time)?;
    if !doc.metrics.sites_with_issues.is_empty() {
        writeln!(out)?;
        writeln!(out, "Sites with Issues:")?;
        for site in &doc.metrics.sites_with_issues {
            writeln!(out, "- {}: {} ({})", site.name, site.status, site.status_text)?;
        }
    }
    writeln!(out)?;

    let by_date = count_by_key(doc.historical.daily.values().flat_map(|s| s.keys()));
    let by_hour = count_by_key(doc.historical.hourly.values().flat_map(|s| s.keys()));

    writeln!(out, "Daily Data:")?;
    writeln!(out, "Total Daily Entries: {}", by_date.values().sum::<usize>())?;
    for (date, count) in &by_date {
        writeln!(out, "  - {}: {} site entries", date, count)?;
    }
    writeln!(out)?;

    writeln!(out, "Hourly Data:")?;
    writeln!(out, "Total Hourly Entries: {}", by_hour.values().sum::<usize>())?;
    for (hour, count) in &by_hour {
        writeln!(out, "  - {}: {} site entries", hour, count)?;
    }
    writeln!(out)?;

    writeln!(out, "Storage Analysis:")?;
    writeln!(out, "Historical Data Size Estimate: ~{}", format_bytes(json_len(&doc.historical)))?;
    writeln!(out, "Sites Data Size Estimate: ~{}", format_bytes(json_len(&doc.sites)))?;
    writeln!(out, "Metrics Data Size Estimate: ~{}", format_bytes(json_len(&doc.metrics)))?;

    // Eviction keeps the cutoff bucket itself, hence the +1
    if by_date.len() as i64 > policy.daily_days + 1 {
        writeln!(
            out,
            "Warning: {} days of daily history present, retention is {} days",
            by_date.len(),
            policy.daily_days
        )?;
    }
    if by_hour.len() as i64 > policy.hourly_hours + 1 {
        writeln!(
            out,
            "Warning: {} hours of hourly history present, retention is {} hours",
            by_hour.len(),
            policy.hourly_hours
        )?;
    }

    Ok(())
}

fn count_by_key<'a>(keys: impl Iterator<Item = &'a String>) -> BTreeMap<&'a str, usize> {
    let mut counts = BTreeMap::new();
    for key in keys {
        *counts.entry(key.as_str()).or_insert(0) += 1;
    }
    counts
}

fn json_len<T: serde::Serialize>(value: &T) -> u64 {
    serde_json::to_vec(value).map(|v| v.len() as u64).unwrap_or(0)
}

fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
