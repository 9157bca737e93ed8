pub mod affiliates;
pub mod aggregation;
pub mod health;

use crate::aggregation::AggregationRunner;
use crate::db::Repository;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub runner: Arc<AggregationRunner>,
}

impl AppState {
    pub fn new(repo: Arc<Repository>, runner: Arc<AggregationRunner>) -> Self {
        Self { repo, runner }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/affiliates", get(affiliates::get_affiliates))
        .route(
            "/v1/affiliates/:address/referees",
            get(affiliates::get_affiliate_referees),
        )
        .route("/v1/aggregation/run", post(aggregation::run_aggregation))
        .layer(cors)
        .with_state(state)
}
