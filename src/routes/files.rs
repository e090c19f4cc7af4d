use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use indexmap::IndexMap;
use std::sync::Arc;

use crate::{
    error::AppError,
    identity::CurrentUser,
    models::{NewFile, StoredFile},
    services::{
        excel::{
            column_statistics, describe_sheet,
            types::{ColumnStatistics, NormalizedSheet, ValidationResult},
            validate,
        },
        file_processor::{self, ProcessOutcome},
    },
    AppState,
};

// Room for multipart boundaries and part headers on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

const UPLOAD_FIELD: &str = "file";

pub fn routes(max_file_size: usize) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/files",
            post(upload_file)
                .layer(DefaultBodyLimit::max(max_file_size + MULTIPART_OVERHEAD))
                .get(list_files),
        )
        .route("/files/:id", get(get_file).delete(delete_file))
        .route("/files/:id/reprocess", post(reprocess_file))
        .route("/files/:id/sheets", get(list_sheets))
        .route("/files/:id/sheets/:sheet/validation", get(sheet_validation))
        .route("/files/:id/sheets/:sheet/statistics", get(sheet_statistics))
        .route(
            "/files/:id/sheets/:sheet/columns/:column/statistics",
            get(column_stats),
        )
}

struct Upload {
    file_name: String,
    content_type: Option<String>,
    bytes: Bytes,
}

async fn read_upload(multipart: &mut Multipart) -> Result<Upload, AppError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload").to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(multipart_error)?;
        return Ok(Upload {
            file_name,
            content_type,
            bytes,
        });
    }

    Err(AppError::InvalidInput(format!(
        "Missing multipart field '{}'",
        UPLOAD_FIELD
    )))
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(err.body_text())
    } else {
        AppError::InvalidInput(err.body_text())
    }
}

fn check_upload(upload: &Upload, max_file_size: usize) -> Result<(), AppError> {
    if upload.bytes.len() > max_file_size {
        tracing::warn!(
            "Rejected upload {}: {} bytes exceeds limit of {}",
            upload.file_name,
            upload.bytes.len(),
            max_file_size
        );
        return Err(AppError::PayloadTooLarge(format!(
            "File exceeds the maximum size of {} bytes",
            max_file_size
        )));
    }

    if !file_processor::is_spreadsheet_upload(
        upload.content_type.as_deref(),
        Some(&upload.file_name),
    ) {
        tracing::warn!(
            "Rejected upload {} with content type {:?}",
            upload.file_name,
            upload.content_type
        );
        return Err(AppError::UnsupportedMediaType(
            "Only spreadsheet files are supported".to_string(),
        ));
    }

    Ok(())
}

/// Runs decoding or SQLite work off the async worker threads.
async fn run_blocking<T, E, F>(work: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Into<AppError> + Send + 'static,
{
    tokio::task::spawn_blocking(work).await?.map_err(Into::into)
}

/// The file with `id` if `user` may see it. Files of other users read as
/// missing.
fn visible_file(state: &AppState, user: &CurrentUser, id: &str) -> Result<StoredFile, AppError> {
    state
        .store
        .get_file(id)?
        .filter(|file| user.can_access(&file.owner))
        .ok_or_else(|| AppError::NotFound(format!("File {}", id)))
}

fn visible_sheet(
    state: &AppState,
    user: &CurrentUser,
    id: &str,
    sheet: &str,
) -> Result<NormalizedSheet, AppError> {
    visible_file(state, user, id)?;
    state
        .store
        .load_sheet(id, sheet)?
        .ok_or_else(|| AppError::NotFound(format!("Sheet '{}' in file {}", sheet, id)))
}

async fn upload_file(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    let start = std::time::Instant::now();
    let upload = read_upload(&mut multipart).await?;
    tracing::info!(
        "Upload {} from {}, size: {}KB",
        upload.file_name,
        user.current_user_id(),
        upload.bytes.len() / 1024
    );

    check_upload(&upload, state.config.max_file_size)?;

    let bytes = upload.bytes.clone();
    let sheets = run_blocking(move || file_processor::process_workbook(bytes)).await?;

    let file_name = upload.file_name.clone();
    let owner = user.current_user_id().to_string();
    let store_state = state.clone();
    let (stored, sheets) = run_blocking(move || {
        let new_file = NewFile {
            owner: &owner,
            file_name: &upload.file_name,
            content_type: upload.content_type.as_deref(),
            bytes: &upload.bytes,
        };
        store_state
            .store
            .save_file(new_file, &sheets)
            .map(|stored| (stored, sheets))
    })
    .await?;

    tracing::info!("Upload {} stored as {} in {:?}", file_name, stored.id, start.elapsed());
    let location = format!("/files/{}", stored.id);
    Ok(([(header::LOCATION, location)], Json(ProcessOutcome::processed(sheets))).into_response())
}

async fn list_files(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<Json<Vec<StoredFile>>, AppError> {
    Ok(Json(state.store.list_files(user.owner_filter())?))
}

async fn get_file(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<StoredFile>, AppError> {
    Ok(Json(visible_file(&state, &user, &id)?))
}

async fn delete_file(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    visible_file(&state, &user, &id)?;
    state.store.delete_file(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn reprocess_file(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<ProcessOutcome>, AppError> {
    visible_file(&state, &user, &id)?;
    let bytes = state
        .store
        .load_file_bytes(&id)?
        .ok_or_else(|| AppError::NotFound(format!("File {}", id)))?;

    let sheets = run_blocking(move || file_processor::process_workbook(Bytes::from(bytes))).await?;
    let sheets = run_blocking(move || {
        state.store.replace_sheets(&id, &sheets).map(|()| sheets)
    })
    .await?;
    Ok(Json(ProcessOutcome::processed(sheets)))
}

async fn list_sheets(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Vec<NormalizedSheet>>, AppError> {
    visible_file(&state, &user, &id)?;
    Ok(Json(state.store.load_sheets(&id)?))
}

async fn sheet_validation(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path((id, sheet)): Path<(String, String)>,
) -> Result<Json<ValidationResult>, AppError> {
    let sheet = visible_sheet(&state, &user, &id, &sheet)?;
    Ok(Json(validate(sheet.data())))
}

async fn sheet_statistics(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path((id, sheet)): Path<(String, String)>,
) -> Result<Json<IndexMap<String, Option<ColumnStatistics>>>, AppError> {
    let sheet = visible_sheet(&state, &user, &id, &sheet)?;
    Ok(Json(describe_sheet(&sheet)))
}

async fn column_stats(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path((id, sheet, column)): Path<(String, String, String)>,
) -> Result<Json<Option<ColumnStatistics>>, AppError> {
    let sheet = visible_sheet(&state, &user, &id, &sheet)?;
    Ok(Json(column_statistics(sheet.data(), &column)))
}
