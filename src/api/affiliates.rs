use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use crate::api::AppState;
use crate::domain::{Address, AffiliateInfo, AffiliateRefereeStats};
use crate::error::AppError;

const DEFAULT_LIMIT: i64 = 100;
const MAX_LIMIT: i64 = 1000;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffiliatesQuery {
    /// Comma-separated address filter.
    pub address: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// List affiliate running totals, highest earners first.
pub async fn get_affiliates(
    Query(params): Query<AffiliatesQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<AffiliateInfo>>, AppError> {
    let addresses: Vec<Address> = params
        .address
        .as_deref()
        .unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| Address::new(s.to_string()))
        .collect();

    let limit = params.limit.unwrap_or(DEFAULT_LIMIT);
    if !(1..=MAX_LIMIT).contains(&limit) {
        return Err(AppError::BadRequest(format!(
            "limit must be between 1 and {}",
            MAX_LIMIT
        )));
    }
    let offset = params.offset.unwrap_or(0);
    if offset < 0 {
        return Err(AppError::BadRequest("offset must not be negative".to_string()));
    }

    let infos = state
        .repo
        .list_affiliate_infos(&addresses, limit, offset)
        .await?;
    Ok(Json(infos))
}

/// List per-referee totals for one affiliate.
pub async fn get_affiliate_referees(
    Path(address): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Vec<AffiliateRefereeStats>>, AppError> {
    let affiliate = Address::new(address);
    let stats = state.repo.referee_stats_for_affiliate(&affiliate).await?;
    Ok(Json(stats))
}
