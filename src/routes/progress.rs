use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::response::AppError;
use crate::services::progress::models::{
    HistoryQuery, ProgressEvent, SimulationStatus, HISTORY_DEFAULT_LIMIT,
};
use crate::state::AppState;

#[derive(Serialize)]
struct SuccessResponse<T> {
    success: bool,
    data: T,
}

impl<T> SuccessResponse<T> {
    fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserQuery {
    #[serde(alias = "user_id")]
    user_id: i64,
}

#[derive(Debug, Default, Deserialize)]
struct HistoryParams {
    limit: Option<u32>,
    offset: Option<u64>,
    status: Option<String>,
}

impl HistoryParams {
    fn into_query(self) -> Result<HistoryQuery, AppError> {
        let status = match self.status.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(SimulationStatus::parse(raw).ok_or_else(|| {
                AppError::validation(format!(
                    "invalid status filter {raw:?}, expected Completed, InProgress or Failed"
                ))
            })?),
        };

        Ok(HistoryQuery {
            limit: self.limit.unwrap_or(HISTORY_DEFAULT_LIMIT),
            offset: self.offset.unwrap_or(0),
            status,
        })
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(general_progress))
        .route("/summary", get(progress_summary))
        .route("/health/status", get(health_status))
        .route("/:user_id/simulations", get(simulation_history))
        .route("/:user_id/elements", get(element_statistics))
        .route("/:user_id/events", post(save_progress_event))
}

async fn progress_summary(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<impl IntoResponse, AppError> {
    let summary = state.progress().get_progress_summary(query.user_id).await?;
    Ok(Json(SuccessResponse::new(summary)))
}

async fn general_progress(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<impl IntoResponse, AppError> {
    let progress = state.progress().get_general_progress(query.user_id).await?;
    Ok(Json(SuccessResponse::new(progress)))
}

async fn simulation_history(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Query(params): Query<HistoryParams>,
) -> Result<impl IntoResponse, AppError> {
    let query = params.into_query()?;
    tracing::debug!(user_id, limit = query.limit, offset = query.offset, status = ?query.status, "simulation history requested");

    let history = state
        .progress()
        .get_simulation_history(user_id, &query)
        .await?;
    Ok(Json(SuccessResponse::new(history)))
}

async fn element_statistics(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let statistics = state.progress().get_element_statistics(user_id).await?;
    Ok(Json(SuccessResponse::new(statistics)))
}

async fn save_progress_event(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(event): Json<ProgressEvent>,
) -> Result<impl IntoResponse, AppError> {
    let result = state.progress().save_progress_event(user_id, event).await?;
    Ok(Json(SuccessResponse::new(result)))
}

async fn health_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.progress().health().await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_params_defaults() {
        let query = HistoryParams::default().into_query().unwrap();
        assert_eq!(query, HistoryQuery::default());
    }

    #[test]
    fn test_history_params_status() {
        let params = HistoryParams {
            status: Some("En proceso".to_string()),
            ..HistoryParams::default()
        };
        assert_eq!(
            params.into_query().unwrap().status,
            Some(SimulationStatus::InProgress)
        );

        let bad = HistoryParams {
            status: Some("archived".to_string()),
            ..HistoryParams::default()
        };
        let err = bad.into_query().unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }
}
