use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use std::sync::Arc;

use crate::{
    error::AppError,
    identity::CurrentUser,
    models::{ChartDefinition, ChartView, NewChart},
    services::excel::{column_statistics, validate},
    AppState,
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/charts", get(list_charts).post(create_chart))
        .route("/charts/:id", get(get_chart).delete(delete_chart))
}

fn visible_chart(state: &AppState, user: &CurrentUser, id: &str) -> Result<ChartDefinition, AppError> {
    state
        .store
        .get_chart(id)?
        .filter(|chart| user.can_access(&chart.owner))
        .ok_or_else(|| AppError::NotFound(format!("Chart {}", id)))
}

async fn create_chart(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Json(mut request): Json<NewChart>,
) -> Result<(StatusCode, Json<ChartDefinition>), AppError> {
    request.title = request.title.trim().to_string();
    if request.title.is_empty() {
        return Err(AppError::InvalidInput("Chart title must not be empty".to_string()));
    }

    let file = state
        .store
        .get_file(&request.file_id)?
        .filter(|file| user.can_access(&file.owner))
        .ok_or_else(|| AppError::NotFound(format!("File {}", request.file_id)))?;

    let sheet = state
        .store
        .load_sheet(&file.id, &request.sheet_name)?
        .ok_or_else(|| {
            AppError::InvalidInput(format!("Sheet '{}' not found in file", request.sheet_name))
        })?;

    for column in [&request.x_column, &request.y_column] {
        if !sheet.has_header(column) {
            return Err(AppError::InvalidInput(format!(
                "Column '{}' not found in sheet '{}'",
                column, request.sheet_name
            )));
        }
    }

    let chart = state.store.create_chart(user.current_user_id(), &request)?;
    Ok((StatusCode::CREATED, Json(chart)))
}

async fn list_charts(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<Json<Vec<ChartDefinition>>, AppError> {
    Ok(Json(state.store.list_charts(user.owner_filter())?))
}

async fn get_chart(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<ChartView>, AppError> {
    let chart = visible_chart(&state, &user, &id)?;
    let sheet = state
        .store
        .load_sheet(&chart.file_id, &chart.sheet_name)?
        .ok_or_else(|| AppError::NotFound(format!("Sheet '{}' of chart {}", chart.sheet_name, id)))?;

    Ok(Json(ChartView {
        validation: validate(sheet.data()),
        x_statistics: column_statistics(sheet.data(), &chart.x_column),
        y_statistics: column_statistics(sheet.data(), &chart.y_column),
        chart,
    }))
}

async fn delete_chart(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    visible_chart(&state, &user, &id)?;
    state.store.delete_chart(&id)?;
    Ok(StatusCode::NO_CONTENT)
}
