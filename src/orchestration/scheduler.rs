//! Periodic scheduler driving the aggregation runner.
//!
//! The runner's cursor protocol requires at most one in-flight run per
//! aggregator; a single ticking task satisfies that, and the runner's
//! per-kind locks cover manual triggers racing a tick. Window end is chosen
//! here, at the tick; the aggregation core itself never reads the clock.

use crate::aggregation::AggregationRunner;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Spawn the periodic aggregation task.
///
/// Errors are logged and the tick loop continues: the cursor was not
/// advanced, so the next tick retries the same window with a later end.
pub fn spawn_scheduler(runner: Arc<AggregationRunner>, interval_ms: i64) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms as u64));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!(interval_ms, "Aggregation scheduler started");

        loop {
            ticker.tick().await;
            let window_end = Utc::now();
            match runner.run_all(window_end).await {
                Ok(outcomes) => {
                    for (kind, outcome) in outcomes {
                        tracing::debug!(aggregator = kind.as_str(), ?outcome, "Tick outcome");
                    }
                }
                Err(e) => {
                    error!(error = %e, "Aggregation tick failed; window will be retried");
                }
            }
        }
    })
}
