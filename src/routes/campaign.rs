use axum::Json;
use axum::extract::State;
use serde_json::json;

use crate::db;
use crate::error::AppError;
use crate::models::ContactStatus;
use crate::state::SharedState;

pub async fn stats(State(state): State<SharedState>) -> Result<Json<serde_json::Value>, AppError> {
    let contacts = db::contacts::stats(&state.pool).await?;
    Ok(Json(json!({
        "success": true,
        "campaign": state.campaign.snapshot(),
        "contacts": contacts,
    })))
}

pub async fn start(State(state): State<SharedState>) -> Result<Json<serde_json::Value>, AppError> {
    let pending = db::contacts::count_by_status(&state.pool, ContactStatus::Pending).await?;
    let status = state.campaign.start(pending)?;
    Ok(Json(json!({
        "success": true,
        "status": status,
        "pending": pending,
    })))
}

pub async fn pause(State(state): State<SharedState>) -> Result<Json<serde_json::Value>, AppError> {
    let status = state.campaign.pause()?;
    Ok(Json(json!({ "success": true, "status": status })))
}

pub async fn resume(State(state): State<SharedState>) -> Result<Json<serde_json::Value>, AppError> {
    let status = state.campaign.resume()?;
    Ok(Json(json!({ "success": true, "status": status })))
}

pub async fn stop(State(state): State<SharedState>) -> Result<Json<serde_json::Value>, AppError> {
    let status = state.campaign.stop()?;
    Ok(Json(json!({ "success": true, "status": status })))
}
