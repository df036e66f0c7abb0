//! Retention policy and eviction of expired history buckets.

use crate::db::Historical;

use super::rollup::{parse_date_key, parse_hour_key, truncate_to_window};

use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Longest accepted hourly retention, one year.
pub const MAX_HOURLY_HOURS: i64 = 24 * 366;

/// Longest accepted daily retention, ten years.
pub const MAX_DAILY_DAYS: i64 = 3660;

/// How long history buckets are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    /// Hourly bucket retention, in hours.
    pub hourly_hours: i64,
    /// Daily bucket retention, in days.
    pub daily_days: i64,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            hourly_hours: 24,
            daily_days: 7,
        }
    }
}

impl RetentionPolicy {
    /// Validate the policy.
    pub fn validate(&self) -> Result<(), String> {
        if self.hourly_hours <= 0 {
            return Err("hourly retention must be positive".to_string());
        }
        if self.daily_days <= 0 {
            return Err("daily retention must be positive".to_string());
        }
        if self.hourly_hours > MAX_HOURLY_HOURS {
            return Err(format!("hourly retention is capped at {}h", MAX_HOURLY_HOURS));
        }
        if self.daily_days > MAX_DAILY_DAYS {
            return Err(format!("daily retention is capped at {}d", MAX_DAILY_DAYS));
        }
        if self.daily_days * 24 < self.hourly_hours {
            return Err(format!(
                "daily retention ({}d) is shorter than hourly retention ({}h)",
                self.daily_days, self.hourly_hours
            ));
        }
        Ok(())
    }

    /// Start of the oldest hour still retained at `now`.
    ///
    /// A window reaching past the representable range retains everything.
    pub fn hourly_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        ChronoDuration::try_hours(self.hourly_hours)
            .and_then(|window| now.checked_sub_signed(window))
            .map(|cutoff| truncate_to_window(cutoff, 3600))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Oldest date still retained at `now`.
    pub fn daily_cutoff(&self, now: DateTime<Utc>) -> NaiveDate {
        ChronoDuration::try_days(self.daily_days)
            .and_then(|window| now.checked_sub_signed(window))
            .map(|cutoff| cutoff.date_naive())
            .unwrap_or(NaiveDate::MIN)
    }
}

impl Historical {
    /// Delete every bucket older than the policy allows, plus any bucket
    /// whose key is not a valid hour or date key. Targets left without
    /// buckets are dropped. Returns the number of buckets removed.
    pub fn evict_expired(&mut self, now: DateTime<Utc>, policy: &RetentionPolicy) -> usize {
        let hourly_cutoff = policy.hourly_cutoff(now);
        let daily_cutoff = policy.daily_cutoff(now);
        let mut removed = 0;

        for series in self.hourly.values_mut() {
            let before = series.len();
            series.retain(|key, _| parse_hour_key(key).is_some_and(|hour| hour >= hourly_cutoff));
            removed += before - series.len();
        }
        self.hourly.retain(|_, series| !series.is_empty());

        for series in self.daily.values_mut() {
            let before = series.len();
            series.retain(|key, _| parse_date_key(key).is_some_and(|date| date >= daily_cutoff));
            removed += before - series.len();
        }
        self.daily.retain(|_, series| !series.is_empty());

        removed
    }
}
