use std::path::Path;

use axum::Json;
use axum::extract::{Path as UrlPath, State};
use serde::Serialize;
use serde_json::{Value, json};

use crate::error::SkillshareError;
use crate::security::{safe_join, validate_relative};
use crate::server::AppState;
use crate::server::error::ApiResult;
use crate::store::{SKILL_FILE, SkillView, find_skill, list_skill_files};
use crate::trash::delete_skill;

pub async fn list(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let skills = state
        .read(|ctx, _| {
            let skills = ctx.skills()?;
            Ok(skills.iter().map(SkillView::from).collect::<Vec<_>>())
        })
        .await?;
    Ok(Json(json!({ "skills": skills })))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillDetail {
    pub skill: SkillView,
    pub skill_md_content: String,
    pub files: Vec<String>,
}

pub async fn detail(State(state): State<AppState>, UrlPath(name): UrlPath<String>) -> ApiResult<Json<SkillDetail>> {
    let detail = state
        .read(move |ctx, _| {
            let skills = ctx.skills()?;
            let skill = find_skill(&skills, &name)?;
            let skill_md_content = std::fs::read_to_string(skill.source_path.join(SKILL_FILE)).unwrap_or_default();
            Ok(SkillDetail {
                skill: SkillView::from(skill),
                skill_md_content,
                files: list_skill_files(&skill.source_path),
            })
        })
        .await?;
    Ok(Json(detail))
}

pub async fn delete(State(state): State<AppState>, UrlPath(name): UrlPath<String>) -> ApiResult<Json<Value>> {
    let args = json!({ "name": name });
    let (name, _) = state
        .write("delete", args, move |ctx, clock| {
            let skills = ctx.skills()?;
            delete_skill(&ctx.trash(), &ctx.config.source, &skills, &name, clock)
        })
        .await?;
    Ok(Json(json!({ "success": true, "name": name })))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileContent {
    pub content: String,
    pub content_type: String,
    pub filename: String,
}

fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()).unwrap_or_default() {
        "md" => "text/markdown",
        "json" => "application/json",
        "yaml" | "yml" => "text/yaml",
        "toml" => "application/toml",
        "sh" | "bash" | "zsh" => "text/x-shellscript",
        "py" => "text/x-python",
        "js" => "text/javascript",
        _ => "text/plain",
    }
}

pub async fn file(
    State(state): State<AppState>,
    UrlPath((name, filepath)): UrlPath<(String, String)>,
) -> ApiResult<Json<FileContent>> {
    validate_relative(&filepath).map_err(SkillshareError::from)?;
    let content = state
        .read(move |ctx, _| {
            let skills = ctx.skills()?;
            let skill = find_skill(&skills, &name)?;
            let path = safe_join(&skill.source_path, &filepath, true)?;
            if !path.is_file() {
                return Err(SkillshareError::NotFound(format!("file {filepath} in {name}")));
            }
            let bytes = std::fs::read(&path)?;
            Ok(FileContent {
                content: String::from_utf8_lossy(&bytes).into_owned(),
                content_type: content_type(&path).to_string(),
                filename: path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            })
        })
        .await?;
    Ok(Json(content))
}
