//! Analytics HTTP endpoints.
//!
//! - GET /api/v1/stats
//! - GET /api/v1/correlations

use axum::extract::State;
use axum::Json;

use super::AppState;
use crate::errors::{AppError, ErrorResponse};
use crate::services::analysis::{
    load_correlation_report, load_stats, CorrelationReport, StatsResponse,
};

/// Overview counts and date ranges of the stored data.
#[utoipa::path(
    get,
    path = "/api/v1/stats",
    tag = "Analysis",
    responses(
        (status = 200, description = "Stored data overview", body = StatsResponse),
        (status = 500, description = "Storage failure", body = ErrorResponse),
    )
)]
pub async fn get_stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, AppError> {
    let stats = load_stats(&state.pool, &state.config.reporting_timezone).await?;
    Ok(Json(stats))
}

/// Commit activity joined with weather: daily series, seasonal, temperature
/// and precipitation breakdowns, and Pearson correlations.
///
/// Computed from scratch on every call. An empty store yields empty series
/// and zero correlations.
#[utoipa::path(
    get,
    path = "/api/v1/correlations",
    tag = "Analysis",
    responses(
        (status = 200, description = "Correlation report", body = CorrelationReport),
        (status = 500, description = "Storage failure", body = ErrorResponse),
    )
)]
pub async fn get_correlations(
    State(state): State<AppState>,
) -> Result<Json<CorrelationReport>, AppError> {
    let report = load_correlation_report(&state.pool, &state.config.reporting_timezone).await?;
    Ok(Json(report))
}
