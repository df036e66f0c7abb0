//! Concurrent probing of the whole target list.

use crate::db::{CheckResult, Target};
use crate::probe::Prober;

use chrono::Utc;

/// Probe every target concurrently and wait for all of them.
///
/// Each probe is bounded by the prober's own timeout, so one hung target
/// cannot hold up the rest. Every target gets exactly one result; a probe
/// task that dies without producing one is reported as `unknown`.
pub async fn check_all(prober: &Prober, targets: &[Target]) -> Vec<CheckResult> {
    let handles: Vec<_> = targets
        .iter()
        .map(|target| {
            let prober = prober.clone();
            let target = target.clone();
            tokio::spawn(async move { prober.probe(&target).await })
        })
        .collect();

    let mut results = Vec::with_capacity(targets.len());
    for (target, handle) in targets.iter().zip(handles) {
        match handle.await {
            Ok(result) => results.push(result),
            Err(e) => {
                tracing::error!("Probe task for {} did not complete: {}", target.id, e);
                results.push(CheckResult::unavailable(target, Utc::now()));
            }
        }
    }

    results
}
