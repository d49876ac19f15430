use axum::Json;
use axum::extract::{Path as UrlPath, State};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::config::SyncMode;
use crate::server::AppState;
use crate::server::error::ApiResult;
use crate::targets::{self, TargetList, TargetUpdate};

pub async fn list(State(state): State<AppState>) -> ApiResult<Json<TargetList>> {
    let list = state
        .read(|ctx, _| {
            let skills = ctx.skills()?;
            targets::list(&ctx.config, &skills)
        })
        .await?;
    Ok(Json(list))
}

#[derive(Debug, Deserialize)]
pub struct AddTarget {
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub mode: Option<SyncMode>,
}

pub async fn add(State(state): State<AppState>, Json(body): Json<AddTarget>) -> ApiResult<Json<Value>> {
    let args = json!({ "name": body.name, "path": body.path });
    state
        .write("target-add", args, move |ctx, _| {
            targets::add(&mut ctx.config, &body.name, &body.path, body.mode)?;
            ctx.save_config()
        })
        .await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn update(
    State(state): State<AppState>,
    UrlPath(name): UrlPath<String>,
    Json(patch): Json<TargetUpdate>,
) -> ApiResult<Json<Value>> {
    let args = json!({ "name": name });
    state
        .write("target-update", args, move |ctx, _| {
            targets::update(&mut ctx.config, &name, patch)?;
            ctx.save_config()
        })
        .await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn remove(State(state): State<AppState>, UrlPath(name): UrlPath<String>) -> ApiResult<Json<Value>> {
    let args = json!({ "name": name });
    let removed = state
        .write("target-remove", args, move |ctx, _| {
            let removed = targets::remove(&mut ctx.config, &name)?;
            ctx.save_config()?;
            Ok(removed)
        })
        .await?;
    Ok(Json(json!({
        "success": true,
        "unlinked": removed.unlinked,
        "materialized": removed.materialized,
    })))
}

pub async fn available(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let targets = state.read(|ctx, _| Ok(targets::available(&ctx.config))).await?;
    Ok(Json(json!({ "targets": targets })))
}
