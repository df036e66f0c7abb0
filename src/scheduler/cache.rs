//! Time-bounded cache of the latest cycle, owned by the serving layer.

use crate::db::{CheckResult, StatusSnapshot};

use std::time::{Duration, Instant};

/// Latest snapshot plus the instant it was stored.
#[derive(Debug)]
pub struct StatusCache {
    ttl: Duration,
    entry: Option<(Instant, StatusSnapshot)>,
}

impl StatusCache {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entry: None }
    }

    pub fn store(&mut self, snapshot: StatusSnapshot) {
        self.entry = Some((Instant::now(), snapshot));
    }

    /// Drop the cached snapshot so the next request runs a new cycle.
    pub fn invalidate(&mut self) {
        self.entry = None;
    }

    /// The cached snapshot if it is still within the TTL.
    pub fn fresh(&self) -> Option<&StatusSnapshot> {
        self.fresh_at(Instant::now())
    }

    pub fn fresh_at(&self, now: Instant) -> Option<&StatusSnapshot> {
        self.entry
            .as_ref()
            .filter(|(stored_at, _)| now.saturating_duration_since(*stored_at) < self.ttl)
            .map(|(_, snapshot)| snapshot)
    }

    /// A fresh cached result for one target.
    pub fn fresh_site(&self, id: &str) -> Option<&CheckResult> {
        self.fresh()?.sites.iter().find(|s| s.id == id)
    }
}
