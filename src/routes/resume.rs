use axum::Json;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use serde::Deserialize;
use serde_json::json;

use crate::db;
use crate::error::AppError;
use crate::mailer;
use crate::state::SharedState;

#[derive(Deserialize)]
pub struct UploadParams {
    pub filename: String,
}

pub async fn get(State(state): State<SharedState>) -> Result<Json<serde_json::Value>, AppError> {
    let resume = db::resumes::find_active_info(&state.pool).await?;
    Ok(Json(json!({
        "success": true,
        "resume": resume,
        "fallback_path": state.config.resume_path,
    })))
}

/// Replace the attached resume with the raw request body.
pub async fn upload(
    State(state): State<SharedState>,
    Query(params): Query<UploadParams>,
    headers: HeaderMap,
    body: bytes::Bytes,
) -> Result<Json<serde_json::Value>, AppError> {
    let filename = params
        .filename
        .rsplit(['/', '\\'])
        .next()
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .ok_or_else(|| AppError::BadRequest("filename is required".to_string()))?
        .to_string();

    if body.is_empty() {
        return Err(AppError::BadRequest("Resume file is empty".to_string()));
    }

    let content_type = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .filter(|ct| !ct.is_empty() && !ct.starts_with("application/octet-stream"))
        .unwrap_or_else(|| mailer::guess_content_type(&filename))
        .to_string();

    let info = db::resumes::replace_active(&state.pool, &filename, &content_type, &body).await?;
    tracing::info!("Resume replaced: {} ({} bytes)", info.filename, info.size);

    Ok(Json(json!({ "success": true, "resume": info })))
}
