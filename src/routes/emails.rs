use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::db;
use crate::error::AppError;
use crate::import;
use crate::models::{Contact, ContactStatus};
use crate::state::SharedState;

#[derive(Deserialize)]
pub struct ListParams {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

pub async fn list_pending(
    state: State<SharedState>,
    params: Query<ListParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    list(state, params, ContactStatus::Pending).await
}

pub async fn list_sent(
    state: State<SharedState>,
    params: Query<ListParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    list(state, params, ContactStatus::Sent).await
}

pub async fn list_failed(
    state: State<SharedState>,
    params: Query<ListParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    list(state, params, ContactStatus::Failed).await
}

async fn list(
    State(state): State<SharedState>,
    Query(params): Query<ListParams>,
    status: ContactStatus,
) -> Result<Json<serde_json::Value>, AppError> {
    let page = params.page.unwrap_or(1).max(1);
    let per_page = params.per_page.unwrap_or(50).clamp(1, 500);
    let offset = (page - 1)
        .checked_mul(per_page)
        .ok_or_else(|| AppError::BadRequest(format!("page {page} is out of range")))?;

    let emails = db::contacts::list_by_status(&state.pool, status, per_page, offset).await?;
    let total = db::contacts::count_by_status(&state.pool, status).await?;

    Ok(Json(json!({
        "success": true,
        "status": status,
        "emails": emails,
        "total": total,
        "page": page,
        "per_page": per_page,
        "total_pages": (total + per_page - 1) / per_page,
    })))
}

pub async fn get(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Contact>, AppError> {
    let contact = db::contacts::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Contact not found".to_string()))?;
    Ok(Json(contact))
}

pub async fn attempts(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    db::contacts::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Contact not found".to_string()))?;

    let attempts = db::send_attempts::list_by_contact(&state.pool, id).await?;
    Ok(Json(json!({ "success": true, "attempts": attempts })))
}

pub async fn upload(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: bytes::Bytes,
) -> Result<Json<serde_json::Value>, AppError> {
    let rows = import::parser::parse_upload(&headers, body)
        .await
        .map_err(AppError::BadRequest)?;

    if rows.is_empty() {
        return Err(AppError::BadRequest("Upload contains no contacts".to_string()));
    }

    let batch = import::normalize(rows);
    let summary = db::contacts::upsert_bulk(&state.pool, &batch.contacts).await?;

    tracing::info!(
        "Imported contacts: {} new, {} updated, {} duplicate rows, {} skipped",
        summary.inserted,
        summary.updated,
        batch.duplicates,
        batch.skipped.len()
    );

    Ok(Json(json!({
        "success": true,
        "inserted": summary.inserted,
        "updated": summary.updated,
        "duplicates": batch.duplicates,
        "skipped": batch.skipped,
    })))
}

pub async fn retry(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    if let Some(contact) = db::contacts::retry(&state.pool, id).await? {
        return Ok(Json(json!({ "success": true, "email": contact })));
    }

    match db::contacts::find_by_id(&state.pool, id).await? {
        None => Err(AppError::NotFound("Contact not found".to_string())),
        Some(contact) => Err(AppError::Conflict(format!(
            "Only failed contacts can be retried (this one is {})",
            contact.status.as_str()
        ))),
    }
}

pub async fn retry_all_failed(
    State(state): State<SharedState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let reset = db::contacts::retry_all_failed(&state.pool).await?;
    tracing::info!("Re-queued {reset} failed contact(s)");
    Ok(Json(json!({ "success": true, "reset": reset })))
}
