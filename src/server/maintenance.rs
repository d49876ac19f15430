use axum::Json;
use axum::extract::{Path as UrlPath, State};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::backup::BackupList;
use crate::server::AppState;
use crate::server::error::ApiResult;
use crate::trash::TrashList;

pub async fn backups(State(state): State<AppState>) -> ApiResult<Json<BackupList>> {
    let list = state.read(|ctx, _| ctx.backups().list()).await?;
    Ok(Json(list))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct BackupBody {
    pub target: Option<String>,
}

pub async fn backup(State(state): State<AppState>, Json(body): Json<BackupBody>) -> ApiResult<Json<Value>> {
    let args = json!({ "target": body.target });
    let created = state
        .write("backup", args, move |ctx, clock| {
            let target = body.target.as_deref().filter(|t| !t.is_empty());
            ctx.backups().create(&ctx.config, target, clock)
        })
        .await?;
    Ok(Json(json!({
        "success": true,
        "timestamp": created.timestamp,
        "backedUpTargets": created.backed_up_targets,
    })))
}

pub async fn cleanup(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let removed = state
        .write("backup-cleanup", Value::Null, |ctx, clock| {
            ctx.backups().cleanup(&ctx.config.backup, clock)
        })
        .await?;
    Ok(Json(json!({ "success": true, "removed": removed.len() })))
}

#[derive(Debug, Deserialize)]
pub struct RestoreBody {
    pub target: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub force: bool,
}

pub async fn restore(State(state): State<AppState>, Json(body): Json<RestoreBody>) -> ApiResult<Json<Value>> {
    let args = json!({ "target": body.target, "timestamp": body.timestamp, "force": body.force });
    let target = body.target.clone();
    let timestamp = state
        .write("restore", args, move |ctx, _| {
            ctx.backups()
                .restore(&ctx.config, &body.target, body.timestamp.as_deref(), body.force)
        })
        .await?;
    Ok(Json(json!({ "success": true, "target": target, "timestamp": timestamp })))
}

pub async fn trash(State(state): State<AppState>) -> ApiResult<Json<TrashList>> {
    // Listing sweeps expired entries, so it takes the write path.
    let list = state
        .write("trash", json!({ "list": true }), |ctx, clock| {
            Ok(ctx.trash().list(ctx.config.trash.ttl_days, clock))
        })
        .await?;
    Ok(Json(list))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TrashRestoreBody {
    pub force: bool,
}

pub async fn trash_restore(
    State(state): State<AppState>,
    UrlPath(name): UrlPath<String>,
    body: Option<Json<TrashRestoreBody>>,
) -> ApiResult<Json<Value>> {
    let force = body.is_some_and(|Json(body)| body.force);
    let args = json!({ "name": name, "force": force });
    state
        .write("trash-restore", args, move |ctx, clock| {
            ctx.trash().restore(&name, &ctx.config.source, force, clock)
        })
        .await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn trash_delete(State(state): State<AppState>, UrlPath(name): UrlPath<String>) -> ApiResult<Json<Value>> {
    let args = json!({ "name": name });
    state
        .write("trash-delete", args, move |ctx, _| ctx.trash().delete(&name))
        .await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn trash_empty(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let removed = state
        .write("trash-empty", Value::Null, |ctx, _| ctx.trash().empty())
        .await?;
    Ok(Json(json!({ "success": true, "removed": removed })))
}
