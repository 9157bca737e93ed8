use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregation::{affiliate_info, referee_stats, AggregatorKind, RunOutcome};
use crate::api::AppState;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunAggregationRequest {
    /// Explicit exclusive lower bound. When absent, each aggregator starts
    /// from its stored cursor and advances it on success; when present, the
    /// given window is aggregated as-is and no cursor moves.
    pub window_start: Option<DateTime<Utc>>,
    /// Inclusive upper bound of the window; the caller owns this policy.
    pub window_end: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunAggregationResponse {
    pub outcomes: Vec<AggregatorOutcome>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatorOutcome {
    pub aggregator: AggregatorKind,
    #[serde(flatten)]
    pub outcome: RunOutcome,
}

/// Trigger an aggregation run for every aggregator.
///
/// Failure means no statistical change for the failing aggregator (full
/// rollback), so retrying with the same bounds is always safe.
pub async fn run_aggregation(
    State(state): State<AppState>,
    Json(request): Json<RunAggregationRequest>,
) -> Result<Json<RunAggregationResponse>, AppError> {
    let outcomes = match request.window_start {
        None => state.runner.run_all(request.window_end).await?,
        Some(window_start) => {
            // Explicit window: the caller is responsible for not replaying
            // it; additive merges are not idempotent.
            let pool = state.repo.pool();
            let window_end = request.window_end;

            let affiliate_summary =
                affiliate_info::update_affiliate_info(pool, window_start, window_end).await?;
            let referee_summary =
                referee_stats::update_referee_stats(pool, window_start, window_end).await?;

            vec![
                (
                    AggregatorKind::AffiliateInfo,
                    RunOutcome::Completed {
                        window_start,
                        window_end,
                        summary: affiliate_summary,
                    },
                ),
                (
                    AggregatorKind::RefereeStats,
                    RunOutcome::Completed {
                        window_start,
                        window_end,
                        summary: referee_summary,
                    },
                ),
            ]
        }
    };

    Ok(Json(RunAggregationResponse {
        outcomes: outcomes
            .into_iter()
            .map(|(aggregator, outcome)| AggregatorOutcome {
                aggregator,
                outcome,
            })
            .collect(),
    }))
}
