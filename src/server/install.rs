use std::time::Instant;

use axum::Json;
use axum::extract::{Path as UrlPath, State};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::audit::{self, AuditReport, RulesFile};
use crate::install::{self, BatchOptions, BatchResult, DiscoverResult, InstallOptions, InstallResult, UpdateOptions, UpdateReport};
use crate::server::AppState;
use crate::server::error::ApiResult;
use crate::storage::{LogEntry, LogKind};
use crate::store::find_skill;
use crate::trash::delete_repo;

#[derive(Debug, Deserialize)]
pub struct DiscoverBody {
    pub source: String,
}

pub async fn discover(State(state): State<AppState>, Json(body): Json<DiscoverBody>) -> ApiResult<Json<DiscoverResult>> {
    let result = state.read(move |_, _| install::discover(&body.source)).await?;
    Ok(Json(result))
}

pub async fn install(State(state): State<AppState>, Json(opts): Json<InstallOptions>) -> ApiResult<Json<InstallResult>> {
    let args = json!({ "source": opts.source, "force": opts.force, "track": opts.track });
    let result = state
        .write("install", args, move |ctx, _| {
            let scanner = ctx.scanner()?;
            ctx.installer(&scanner).install(&opts)
        })
        .await?;
    Ok(Json(result))
}

pub async fn install_batch(State(state): State<AppState>, Json(opts): Json<BatchOptions>) -> ApiResult<Json<BatchResult>> {
    let args = json!({ "source": opts.source, "skills": opts.skills });
    let result = state
        .write("install", args, move |ctx, _| {
            let scanner = ctx.scanner()?;
            ctx.installer(&scanner).install_batch(&opts)
        })
        .await?;
    Ok(Json(result))
}

pub async fn update(State(state): State<AppState>, Json(opts): Json<UpdateOptions>) -> ApiResult<Json<UpdateReport>> {
    let args = json!({ "name": opts.name, "all": opts.all });
    let report = state
        .write("update", args, move |ctx, _| {
            let scanner = ctx.scanner()?;
            ctx.installer(&scanner).update(&opts)
        })
        .await?;
    Ok(Json(report))
}

pub async fn delete_repo_handler(State(state): State<AppState>, UrlPath(name): UrlPath<String>) -> ApiResult<Json<Value>> {
    let args = json!({ "name": name });
    let (name, _) = state
        .write("delete", args, move |ctx, clock| {
            delete_repo(&ctx.trash(), &ctx.config.source, &name, clock)
        })
        .await?;
    Ok(Json(json!({ "success": true, "name": name })))
}

pub async fn audit_all(State(state): State<AppState>) -> ApiResult<Json<AuditReport>> {
    let report = state
        .read(|ctx, _| {
            let started = Instant::now();
            let skills = ctx.skills()?;
            let scanner = ctx.scanner()?;
            let report = audit::audit_all(&scanner, &skills, ctx.threshold());
            let status = if report.summary.failed > 0 { "blocked" } else { "ok" };
            let entry = LogEntry::new("audit", status, started).with_msg(format!(
                "{} scanned, {} failed, {} warning",
                report.summary.total, report.summary.failed, report.summary.warning
            ));
            ctx.oplog().record(LogKind::Audit, &entry);
            Ok(report)
        })
        .await?;
    Ok(Json(report))
}

pub async fn audit_one(State(state): State<AppState>, UrlPath(name): UrlPath<String>) -> ApiResult<Json<Value>> {
    let (result, summary) = state
        .read(move |ctx, _| {
            let skills = ctx.skills()?;
            let skill = find_skill(&skills, &name)?;
            let scanner = ctx.scanner()?;
            let threshold = ctx.threshold();
            let result = audit::audit_skill(&scanner, &skill.source_path, &skill.flat_name, threshold)?;
            let summary = audit::AuditSummary::from_results(std::slice::from_ref(&result), threshold, 0);
            Ok((result, summary))
        })
        .await?;
    Ok(Json(json!({ "result": result, "summary": summary })))
}

pub async fn rules_get(State(state): State<AppState>) -> ApiResult<Json<RulesFile>> {
    let file = state
        .read(|ctx, _| audit::read_rules_file(&ctx.audit_rules_path()))
        .await?;
    Ok(Json(file))
}

#[derive(Debug, Deserialize)]
pub struct RulesBody {
    pub raw: String,
}

pub async fn rules_put(State(state): State<AppState>, Json(body): Json<RulesBody>) -> ApiResult<Json<Value>> {
    state
        .write("audit-rules", Value::Null, move |ctx, _| {
            audit::write_rules_file(&ctx.audit_rules_path(), &body.raw)
        })
        .await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn rules_init(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let path = state
        .write("audit-rules", Value::Null, |ctx, _| {
            let path = ctx.audit_rules_path();
            audit::init_rules_file(&path)?;
            Ok(path)
        })
        .await?;
    Ok(Json(json!({ "success": true, "path": path.display().to_string() })))
}
