use axum::Json;
use axum::extract::{Query, State};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::collect::{self, CollectRequest, CollectResult, ScanResult};
use crate::server::AppState;
use crate::server::error::ApiResult;
use crate::sync::{self as engine, SyncOptions};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncBody {
    pub dry_run: bool,
    pub force: bool,
    pub target: Option<String>,
}

pub async fn sync(State(state): State<AppState>, Json(body): Json<SyncBody>) -> ApiResult<Json<Value>> {
    let opts = SyncOptions {
        dry_run: body.dry_run,
        force: body.force,
        target: body.target,
    };
    let run = move |ctx: &crate::app::AppContext| {
        let skills = ctx.skills()?;
        engine::sync(&ctx.config, &skills, &opts)
    };
    let results = if body.dry_run {
        state.read(move |ctx, _| run(ctx)).await?
    } else {
        let args = json!({ "force": body.force });
        state.write("sync", args, move |ctx, _| run(&*ctx)).await?
    };
    Ok(Json(json!({ "results": results })))
}

#[derive(Debug, Default, Deserialize)]
pub struct TargetQuery {
    pub target: Option<String>,
}

pub async fn diff(State(state): State<AppState>, Query(query): Query<TargetQuery>) -> ApiResult<Json<Value>> {
    let diffs = state
        .read(move |ctx, _| {
            let skills = ctx.skills()?;
            engine::diff(&ctx.config, &skills, query.target.as_deref().filter(|t| !t.is_empty()))
        })
        .await?;
    Ok(Json(json!({ "diffs": diffs })))
}

pub async fn scan(State(state): State<AppState>, Query(query): Query<TargetQuery>) -> ApiResult<Json<ScanResult>> {
    let result = state
        .read(move |ctx, _| collect::scan(&ctx.config, query.target.as_deref().filter(|t| !t.is_empty())))
        .await?;
    Ok(Json(result))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CollectBody {
    pub skills: Vec<CollectRequest>,
    pub force: bool,
    pub dry_run: bool,
}

pub async fn collect(State(state): State<AppState>, Json(body): Json<CollectBody>) -> ApiResult<Json<CollectResult>> {
    let args = json!({ "count": body.skills.len(), "force": body.force });
    let result = state
        .write("collect", args, move |ctx, _| {
            Ok(collect::collect(&ctx.config, &body.skills, body.force, body.dry_run))
        })
        .await?;
    Ok(Json(result))
}
