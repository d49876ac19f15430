//! E2E Scenario: the JSON API driven the way the dashboard drives it.

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode};
use serde_json::{Value, json};
use skillshare::config::SyncMode;
use skillshare::server::{self, AppState};
use tower::ServiceExt;

use super::common::{CLEAN_SKILL, CRITICAL_SKILL, Workspace, entries};

fn app(ws: &Workspace, targets: &[(&str, SyncMode)]) -> Router {
    let ctx = ws.context(ws.config(targets));
    server::app(AppState::new(ctx))
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn health_and_overview() {
    let ws = Workspace::new();
    ws.write_skill("pdf", CLEAN_SKILL);
    ws.write_skill("frontend/react", CLEAN_SKILL);
    let app = app(&ws, &[("claude", SyncMode::Merge)]);

    let (status, body) = call(&app, Method::GET, "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = call(&app, Method::GET, "/api/overview", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["skillCount"], 2);
    assert_eq!(body["topLevelCount"], 2);
    assert_eq!(body["targetCount"], 1);
    assert_eq!(body["mode"], "merge");
}

#[tokio::test]
async fn sync_dry_run_matches_diff_then_applies() {
    let ws = Workspace::new();
    ws.write_skill("pdf", CLEAN_SKILL);
    let app = app(&ws, &[("claude", SyncMode::Merge)]);

    let (status, preview) = call(&app, Method::POST, "/api/sync", Some(json!({ "dryRun": true }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(preview["results"][0]["linked"], json!(["pdf"]));
    assert!(entries(&ws.target_dir("claude")).is_empty());

    let (_, diff) = call(&app, Method::GET, "/api/diff", None).await;
    assert_eq!(diff["diffs"][0]["items"][0]["skill"], "pdf");
    assert_eq!(diff["diffs"][0]["items"][0]["action"], "link");

    let (status, applied) = call(&app, Method::POST, "/api/sync", Some(json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(applied["results"][0]["linked"], json!(["pdf"]));
    assert_eq!(entries(&ws.target_dir("claude")), vec!["pdf"]);

    let (_, log) = call(&app, Method::GET, "/api/log?cmd=sync", None).await;
    assert_eq!(log["total"], 1);
    assert_eq!(log["entries"][0]["status"], "ok");
}

#[tokio::test]
async fn errors_map_to_statuses() {
    let ws = Workspace::new();
    ws.write_skill("pdf", CLEAN_SKILL);
    let app = app(&ws, &[]);

    let (status, body) = call(&app, Method::GET, "/api/skills/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("missing"));

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/targets",
        Some(json!({ "name": "../evil", "path": "/tmp/x" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let evil = ws.upstream_skill("evil", CRITICAL_SKILL);
    let (status, body) = call(
        &app,
        Method::POST,
        "/api/install",
        Some(json!({ "source": evil.display().to_string() })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("security audit failed"));
}

#[tokio::test]
async fn target_crud_persists_config() {
    let ws = Workspace::new();
    ws.write_skill("pdf", CLEAN_SKILL);
    let app = app(&ws, &[]);
    let path = ws.target_dir("codex").display().to_string();

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/targets",
        Some(json!({ "name": "codex", "path": path })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(
        &app,
        Method::POST,
        "/api/targets",
        Some(json!({ "name": "codex", "path": path })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = call(
        &app,
        Method::PATCH,
        "/api/targets/codex",
        Some(json!({ "exclude": ["pdf"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let saved = std::fs::read_to_string(ws.config_path()).unwrap();
    assert!(saved.contains("codex"));

    let (_, list) = call(&app, Method::GET, "/api/targets", None).await;
    assert_eq!(list["targets"][0]["exclude"], json!(["pdf"]));
    assert_eq!(list["targets"][0]["expectedSkillCount"], 0);

    let (status, _) = call(&app, Method::DELETE, "/api/targets/codex", None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, list) = call(&app, Method::GET, "/api/targets", None).await;
    assert_eq!(list["targets"], json!([]));
}

#[tokio::test]
async fn delete_and_restore_through_trash() {
    let ws = Workspace::new();
    ws.write_skill("pdf", CLEAN_SKILL);
    let app = app(&ws, &[]);

    let (status, deleted) = call(&app, Method::DELETE, "/api/skills/pdf", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["name"], "pdf");
    assert!(!ws.source().join("pdf").exists());

    let (_, trash) = call(&app, Method::GET, "/api/trash", None).await;
    assert_eq!(trash["items"][0]["name"], "pdf");

    let (status, _) = call(&app, Method::POST, "/api/trash/pdf/restore", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(ws.source().join("pdf/SKILL.md").is_file());

    let (_, trash) = call(&app, Method::GET, "/api/trash", None).await;
    assert_eq!(trash["items"], json!([]));
}

#[tokio::test]
async fn deleting_a_repo_skill_trashes_the_repo() {
    let ws = Workspace::new();
    ws.write_skill("_team/lint", CLEAN_SKILL);
    ws.write_skill("pdf", CLEAN_SKILL);
    std::fs::create_dir_all(ws.source().join("_team/.git")).unwrap();
    let app = app(&ws, &[]);

    let (status, deleted) = call(&app, Method::DELETE, "/api/skills/_team__lint", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["name"], "_team");
    assert!(!ws.source().join("_team").exists());
    assert!(ws.source().join("pdf").exists());

    let (_, trash) = call(&app, Method::GET, "/api/trash", None).await;
    assert_eq!(trash["items"][0]["name"], "_team");
}

#[tokio::test]
async fn skill_files_are_served_inside_the_skill_only() {
    let ws = Workspace::new();
    let dir = ws.write_skill("pdf", CLEAN_SKILL);
    std::fs::write(dir.join("notes.md"), "# notes").unwrap();
    let app = app(&ws, &[]);

    let (status, detail) = call(&app, Method::GET, "/api/skills/pdf", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["skillMdContent"], CLEAN_SKILL);
    assert_eq!(detail["files"], json!(["SKILL.md", "notes.md"]));

    let (status, file) = call(&app, Method::GET, "/api/skills/pdf/files/notes.md", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(file["content"], "# notes");

    let (status, _) = call(&app, Method::GET, "/api/skills/pdf/files/..%2F..%2Fconfig.toml", None).await;
    assert_ne!(status, StatusCode::OK);
}
