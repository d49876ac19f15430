use axum::Json;
use axum::extract::{Query, State};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::config::{Config, SyncMode};
use crate::error::SkillshareError;
use crate::remote::{self, PullRequest, PullResult, PushRequest, PushResult};
use crate::server::AppState;
use crate::server::error::ApiResult;
use crate::storage::git::{self, GitStatus};
use crate::storage::oplog::parse_since;
use crate::storage::{LogKind, LogQuery};
use crate::store::{TrackedRepo, top_level_count, tracked_repos};
use crate::utils::fs::{ensure_dir, read_optional};

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub source: String,
    pub skill_count: usize,
    pub top_level_count: usize,
    pub target_count: usize,
    pub mode: SyncMode,
    pub version: &'static str,
    pub tracked_repos: Vec<TrackedRepo>,
    pub is_project_mode: bool,
}

pub async fn overview(State(state): State<AppState>) -> ApiResult<Json<Overview>> {
    let overview = state
        .read(|ctx, _| {
            let source = &ctx.config.source;
            let skills = if source.is_dir() { ctx.skills()? } else { Vec::new() };
            Ok(Overview {
                source: source.display().to_string(),
                skill_count: skills.len(),
                top_level_count: top_level_count(source),
                target_count: ctx.config.targets.len(),
                mode: ctx.config.mode,
                version: env!("CARGO_PKG_VERSION"),
                tracked_repos: tracked_repos(source, &skills),
                is_project_mode: ctx.is_project_mode(),
            })
        })
        .await?;
    Ok(Json(overview))
}

pub async fn git_status(State(state): State<AppState>) -> ApiResult<Json<GitStatus>> {
    let status = state.read(|ctx, _| git::status(&ctx.config.source)).await?;
    Ok(Json(status))
}

pub async fn push(State(state): State<AppState>, Json(body): Json<PushRequest>) -> ApiResult<Json<PushResult>> {
    let result = if body.dry_run {
        state.read(move |ctx, _| remote::push(&ctx.config, &body)).await?
    } else {
        let args = json!({ "message": body.message });
        state
            .write("push", args, move |ctx, _| remote::push(&ctx.config, &body))
            .await?
    };
    Ok(Json(result))
}

pub async fn pull(State(state): State<AppState>, Json(body): Json<PullRequest>) -> ApiResult<Json<PullResult>> {
    let result = if body.dry_run {
        state.read(move |ctx, _| remote::pull(&ctx.config, &body)).await?
    } else {
        state
            .write("pull", Value::Null, move |ctx, _| remote::pull(&ctx.config, &body))
            .await?
    };
    Ok(Json(result))
}

pub async fn config_get(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let (config, raw) = state
        .read(|ctx, _| {
            let raw = match read_optional(&ctx.config_path)? {
                Some(raw) => raw,
                None => toml::to_string_pretty(&ctx.config)?,
            };
            Ok((ctx.config.clone(), raw))
        })
        .await?;
    Ok(Json(json!({ "config": config, "raw": raw })))
}

#[derive(Debug, Deserialize)]
pub struct ConfigBody {
    pub raw: String,
}

pub async fn config_put(State(state): State<AppState>, Json(body): Json<ConfigBody>) -> ApiResult<Json<Value>> {
    state
        .write("config", Value::Null, move |ctx, _| {
            Config::parse(&body.raw, &ctx.root)
                .map_err(|err| SkillshareError::Config(err.to_string()))?;
            if let Some(parent) = ctx.config_path.parent() {
                ensure_dir(parent)?;
            }
            std::fs::write(&ctx.config_path, &body.raw)?;
            ctx.reload_config()
        })
        .await?;
    Ok(Json(json!({ "success": true })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LogParams {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub limit: Option<usize>,
    pub cmd: Option<String>,
    pub status: Option<String>,
    pub since: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

pub async fn log_get(State(state): State<AppState>, Query(params): Query<LogParams>) -> ApiResult<Json<Value>> {
    let page = state
        .read(move |ctx, clock| {
            let kind: LogKind = params.kind.as_deref().unwrap_or_default().parse()?;
            let since = non_empty(params.since)
                .map(|value| parse_since(&value, clock.now()))
                .transpose()?;
            let query = LogQuery {
                limit: params.limit,
                cmd: non_empty(params.cmd),
                status: non_empty(params.status),
                since,
            };
            ctx.oplog().read(kind, &query)
        })
        .await?;
    Ok(Json(serde_json::to_value(page).map_err(SkillshareError::from)?))
}

pub async fn log_clear(State(state): State<AppState>, Query(params): Query<LogParams>) -> ApiResult<Json<Value>> {
    state
        .read(move |ctx, _| {
            let kind: LogKind = params.kind.as_deref().unwrap_or_default().parse()?;
            ctx.oplog().clear(kind)
        })
        .await?;
    Ok(Json(json!({ "success": true })))
}
