//! Rolls check results up into hourly and daily history buckets.

use crate::db::{
    CheckResult, DailyBucket, DailyEntry, HealthMetrics, Historical, HourlyBucket, HourlyEntry,
    SiteHistory, Status, StatusDocument,
};

use super::retention::RetentionPolicy;
use super::round_div;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

const HOUR_KEY_FORMAT: &str = "%Y-%m-%dT%H";
const DATE_KEY_FORMAT: &str = "%Y-%m-%d";

/// Key of the hourly bucket containing `dt`, e.g. `2024-03-01T12`.
pub fn hour_key(dt: DateTime<Utc>) -> String {
    dt.format(HOUR_KEY_FORMAT).to_string()
}

/// Key of the daily bucket containing `dt`, e.g. `2024-03-01`.
pub fn date_key(dt: DateTime<Utc>) -> String {
    dt.format(DATE_KEY_FORMAT).to_string()
}

/// Parse an hour key back to the start of its hour.
///
/// Only canonical keys are accepted, so one hour can never be stored under
/// two spellings.
pub fn parse_hour_key(key: &str) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(&format!("{}:00", key), "%Y-%m-%dT%H:%M").ok()?;
    let dt = DateTime::from_naive_utc_and_offset(naive, Utc);
    (hour_key(dt) == key).then_some(dt)
}

/// Parse a date key.
pub fn parse_date_key(key: &str) -> Option<NaiveDate> {
    let date = NaiveDate::parse_from_str(key, DATE_KEY_FORMAT).ok()?;
    (date.format(DATE_KEY_FORMAT).to_string() == key).then_some(date)
}

/// Truncate a datetime to the start of its containing window.
pub fn truncate_to_window(dt: DateTime<Utc>, window_seconds: i64) -> DateTime<Utc> {
    let ts = dt.timestamp();
    let truncated = ts - ts.rem_euclid(window_seconds);
    DateTime::from_timestamp(truncated, 0).unwrap_or(dt)
}

impl DailyBucket {
    /// Fold one check into the day's counters.
    ///
    /// `Unknown` carries no probe outcome and is ignored, which keeps
    /// `checks == operational + degraded + outage`.
    pub fn record(&mut self, status: Status, response_time: u64) {
        match status {
            Status::Operational => self.operational += 1,
            Status::Degraded => self.degraded += 1,
            Status::Outage => self.outage += 1,
            Status::Unknown => return,
        }

        self.checks += 1;
        self.total_response_time += response_time;
        self.uptime = round_div(100 * self.operational, self.checks);
        self.avg_response_time = round_div(self.total_response_time, self.checks);
    }
}

impl Historical {
    /// Merge one cycle's results into the history, then evict expired buckets.
    ///
    /// Hourly buckets are overwritten (last write wins within the hour);
    /// daily buckets accumulate, so merging the same results twice counts
    /// them twice.
    pub fn merge_check(&mut self, results: &[CheckResult], now: DateTime<Utc>, policy: &RetentionPolicy) {
        let hour = hour_key(truncate_to_window(now, 3600));
        let date = date_key(now);

        for result in results {
            if result.status == Status::Unknown {
                continue;
            }

            self.hourly.entry(result.id.clone()).or_default().insert(
                hour.clone(),
                HourlyBucket {
                    status: result.status,
                    response_time: result.response_time,
                },
            );

            self.daily
                .entry(result.id.clone())
                .or_default()
                .entry(date.clone())
                .or_default()
                .record(result.status, result.response_time);
        }

        let evicted = self.evict_expired(now, policy);
        if evicted > 0 {
            tracing::debug!("History: evicted {} expired buckets", evicted);
        }
    }

    /// Chronological view of one target's buckets.
    pub fn site_history(&self, site_id: &str) -> SiteHistory {
        let hourly_data: Vec<HourlyEntry> = self
            .hourly
            .get(site_id)
            .into_iter()
            .flatten()
            .filter_map(|(key, bucket)| {
                Some(HourlyEntry {
                    timestamp: parse_hour_key(key)?,
                    status: bucket.status,
                    response_time: bucket.response_time,
                })
            })
            .collect();

        let daily_data: Vec<DailyEntry> = self
            .daily
            .get(site_id)
            .into_iter()
            .flatten()
            .filter_map(|(key, bucket)| {
                Some(DailyEntry {
                    date: parse_date_key(key)?,
                    bucket: *bucket,
                })
            })
            .collect();

        let operational_hours = hourly_data
            .iter()
            .filter(|h| h.status == Status::Operational)
            .count() as u64;
        let availability = if hourly_data.is_empty() {
            100
        } else {
            round_div(100 * operational_hours, hourly_data.len() as u64)
        };

        SiteHistory {
            site_id: site_id.to_string(),
            has_data: !hourly_data.is_empty() || !daily_data.is_empty(),
            availability,
            hourly_data,
            daily_data,
        }
    }
}

impl StatusDocument {
    /// Replace the snapshot with a new cycle's results and fold them into
    /// the existing history.
    ///
    /// Existing buckets are kept; new results update the current hour and
    /// day on top of them.
    pub fn apply_cycle(
        &mut self,
        results: Vec<CheckResult>,
        metrics: HealthMetrics,
        now: DateTime<Utc>,
        policy: &RetentionPolicy,
    ) {
        self.historical.merge_check(&results, now, policy);

        self.timestamp = Some(now);
        self.overall = metrics.status;
        self.metrics = metrics;
        self.sites = results;
        self.last_checked = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Target;
    use chrono::{Duration as ChronoDuration, TimeZone};

    fn result(id: &str, status: Status, response_time: u64, at: DateTime<Utc>) -> CheckResult {
        let target = Target::new(id, id, "", "https://example.com", "");
        CheckResult {
            status,
            status_text: String::new(),
            response_time,
            error: None,
            status_code: Some(200),
            ..CheckResult::unavailable(&target, at)
        }
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 34, 56).unwrap()
    }

    #[test]
    fn test_truncate_to_window() {
        let dt = noon();
        assert_eq!(truncate_to_window(dt, 60), Utc.with_ymd_and_hms(2024, 3, 1, 12, 34, 0).unwrap());
        assert_eq!(truncate_to_window(dt, 300), Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap());
        assert_eq!(truncate_to_window(dt, 3600), Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_bucket_keys() {
        assert_eq!(hour_key(noon()), "2024-03-01T12");
        assert_eq!(date_key(noon()), "2024-03-01");
        assert_eq!(parse_hour_key("2024-03-01T12"), Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()));
        assert_eq!(parse_date_key("2024-03-01"), NaiveDate::from_ymd_opt(2024, 3, 1));

        assert!(parse_hour_key("2024-3-1T5").is_none());
        assert!(parse_hour_key("garbage").is_none());
        assert!(parse_date_key("2024-03-01T12").is_none());
    }

    #[test]
    fn test_hourly_overwrite_is_idempotent_daily_is_not() {
        let policy = RetentionPolicy::default();
        let now = noon();
        let results = vec![result("docs", Status::Operational, 100, now)];

        let mut once = Historical::default();
        once.merge_check(&results, now, &policy);
        let mut twice = once.clone();
        twice.merge_check(&results, now, &policy);

        assert_eq!(once.hourly, twice.hourly);

        let day_once = once.daily["docs"]["2024-03-01"];
        let day_twice = twice.daily["docs"]["2024-03-01"];
        assert_eq!(day_once.checks, 1);
        assert_eq!(day_twice.checks, 2);
        assert_eq!(day_twice.operational, 2);
        assert_eq!(day_twice.total_response_time, 200);
    }

    #[test]
    fn test_hourly_last_write_wins() {
        let policy = RetentionPolicy::default();
        let mut history = Historical::default();
        let first = noon();
        let later = first + ChronoDuration::minutes(20);

        history.merge_check(&[result("docs", Status::Operational, 100, first)], first, &policy);
        history.merge_check(&[result("docs", Status::Outage, 5000, later)], later, &policy);

        let series = &history.hourly["docs"];
        assert_eq!(series.len(), 1);
        assert_eq!(series["2024-03-01T12"], HourlyBucket { status: Status::Outage, response_time: 5000 });
    }

    #[test]
    fn test_daily_accumulates_three_checks() {
        let policy = RetentionPolicy::default();
        let mut history = Historical::default();
        let now = noon();

        history.merge_check(&[result("api", Status::Operational, 100, now)], now, &policy);
        history.merge_check(&[result("api", Status::Operational, 200, now)], now, &policy);
        history.merge_check(&[result("api", Status::Outage, 5001, now)], now, &policy);

        let day = history.daily["api"]["2024-03-01"];
        assert_eq!(day.checks, 3);
        assert_eq!(day.operational, 2);
        assert_eq!(day.outage, 1);
        assert_eq!(day.degraded, 0);
        assert_eq!(day.checks, day.operational + day.degraded + day.outage);
        assert_eq!(day.uptime, 67);
        assert_eq!(day.total_response_time, 5301);
        assert_eq!(day.avg_response_time, 1767);
    }

    #[test]
    fn test_unknown_results_are_not_recorded() {
        let policy = RetentionPolicy::default();
        let mut history = Historical::default();
        let now = noon();

        history.merge_check(&[result("api", Status::Unknown, 0, now)], now, &policy);

        assert!(history.hourly.is_empty());
        assert!(history.daily.is_empty());
    }

    #[test]
    fn test_merge_evicts_stale_hour() {
        let policy = RetentionPolicy::default();
        let now = noon();
        let stale = hour_key(now - ChronoDuration::hours(25));
        let mut history = Historical::default();
        history.hourly.entry("docs".to_string()).or_default().insert(
            stale.clone(),
            HourlyBucket { status: Status::Operational, response_time: 90 },
        );

        history.merge_check(&[result("docs", Status::Operational, 100, now)], now, &policy);

        assert!(!history.hourly["docs"].contains_key(&stale));
        assert!(history.hourly["docs"].contains_key("2024-03-01T12"));
    }

    #[test]
    fn test_merge_evicts_untouched_targets() {
        let policy = RetentionPolicy::default();
        let now = noon();
        let mut history = Historical::default();
        history.hourly.entry("retired".to_string()).or_default().insert(
            hour_key(now - ChronoDuration::hours(30)),
            HourlyBucket { status: Status::Outage, response_time: 0 },
        );
        history
            .daily
            .entry("retired".to_string())
            .or_default()
            .insert(date_key(now - ChronoDuration::days(8)), DailyBucket::default());

        history.merge_check(&[], now, &policy);

        assert!(!history.hourly.contains_key("retired"));
        assert!(!history.daily.contains_key("retired"));
    }

    #[test]
    fn test_site_history_is_chronological() {
        let policy = RetentionPolicy::default();
        let mut history = Historical::default();
        let now = noon();
        let earlier = now - ChronoDuration::hours(3);

        history.merge_check(&[result("docs", Status::Degraded, 400, earlier)], earlier, &policy);
        history.merge_check(&[result("docs", Status::Operational, 100, now)], now, &policy);

        let view = history.site_history("docs");
        assert!(view.has_data);
        assert_eq!(view.hourly_data.len(), 2);
        assert!(view.hourly_data[0].timestamp < view.hourly_data[1].timestamp);
        assert_eq!(view.availability, 50);
        assert_eq!(view.daily_data.len(), 1);
        assert_eq!(view.daily_data[0].bucket.checks, 2);

        let empty = history.site_history("blog");
        assert!(!empty.has_data);
        assert_eq!(empty.availability, 100);
    }

    #[test]
    fn test_apply_cycle_keeps_existing_history() {
        let policy = RetentionPolicy::default();
        let now = noon();
        let mut doc = StatusDocument::default();
        doc.historical.daily.entry("docs".to_string()).or_default().insert(
            "2024-02-29".to_string(),
            DailyBucket { checks: 4, operational: 4, uptime: 100, ..Default::default() },
        );

        let metrics = HealthMetrics { status: Status::Operational, total_sites: 1, ..Default::default() };
        doc.apply_cycle(vec![result("docs", Status::Operational, 100, now)], metrics, now, &policy);

        assert_eq!(doc.timestamp, Some(now));
        assert_eq!(doc.last_checked, Some(now));
        assert_eq!(doc.sites.len(), 1);
        assert_eq!(doc.historical.daily["docs"].len(), 2);
        assert_eq!(doc.historical.daily["docs"]["2024-02-29"].checks, 4);
    }
}
