//! Persisted aggregation cursor: the exclusive lower bound of the next
//! window, one row per aggregator kind.

use crate::aggregation::{AggregationError, AggregatorKind};
use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

/// Read the stored next-window start for an aggregator kind.
///
/// Returns `None` when the aggregator has never completed a run; the caller
/// supplies the initial window start in that case.
///
/// # Errors
/// Returns an error on database failure or if the stored value is not a
/// valid RFC 3339 timestamp.
pub async fn next_window_start(
    conn: &mut SqliteConnection,
    kind: AggregatorKind,
) -> Result<Option<DateTime<Utc>>, AggregationError> {
    let row: Option<(String,)> =
        sqlx::query_as("SELECT next_window_start FROM aggregation_runs WHERE aggregator = ?")
            .bind(kind.as_str())
            .fetch_optional(&mut *conn)
            .await?;

    match row {
        None => Ok(None),
        Some((value,)) => DateTime::parse_from_rfc3339(&value)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|_| AggregationError::CorruptCursor {
                aggregator: kind.as_str(),
                value,
            }),
    }
}

/// Advance the cursor for an aggregator kind to `window_end`.
///
/// Callers run this in the same transaction as the merge so stats and
/// cursor commit or roll back together.
///
/// # Errors
/// Returns an error if the write fails.
pub async fn advance(
    conn: &mut SqliteConnection,
    kind: AggregatorKind,
    window_end: DateTime<Utc>,
) -> Result<(), AggregationError> {
    sqlx::query(
        r#"
        INSERT INTO aggregation_runs (aggregator, next_window_start)
        VALUES (?, ?)
        ON CONFLICT(aggregator) DO UPDATE SET
            next_window_start = excluded.next_window_start
        "#,
    )
    .bind(kind.as_str())
    .bind(window_end.to_rfc3339())
    .execute(&mut *conn)
    .await?;

    Ok(())
}
