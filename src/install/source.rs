//! Parsing install sources: GitHub shorthands, git URLs and local paths.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SkillshareError};
use crate::utils::fs::{absolutize, expand_tilde};

static GITHUB: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^(?:https?://)?github\.com/([^/]+)/([^/]+?)(?:\.git)?(?:/(.+))?$").ok()
});
static GIT_SSH: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^git@([^:]+):([^/]+)/(.+?)(?:\.git)?$").ok());
static GIT_HTTPS: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^https?://([^/]+)/([^/]+)/([^/]+?)(?:\.git)?(?:/(.+))?$").ok()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Github,
    Git,
    Local,
}

/// A parsed install source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallSource {
    /// Input as typed, after shorthand expansion.
    pub raw: String,
    pub kind: SourceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clone_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subdir: Option<String>,
    /// Derived skill name: last subdir segment, repo or directory name.
    pub name: String,
}

impl InstallSource {
    #[must_use]
    pub const fn is_git(&self) -> bool {
        matches!(self.kind, SourceKind::Github | SourceKind::Git)
    }

    /// Value recorded as `type` in the install metadata.
    #[must_use]
    pub fn meta_type(&self) -> String {
        let base = match self.kind {
            SourceKind::Github => "github",
            SourceKind::Git => "git",
            SourceKind::Local => "local",
        };
        if self.subdir.is_some() {
            format!("{base}-subdir")
        } else {
            base.to_string()
        }
    }

    /// The same source narrowed to `rel` below its current root.
    #[must_use]
    pub fn child(&self, rel: &str) -> Self {
        if rel == "." || rel.is_empty() {
            return self.clone();
        }
        let mut child = self.clone();
        child.raw = format!("{}/{rel}", self.raw.trim_end_matches('/'));
        child.name = last_segment(rel);
        match self.kind {
            SourceKind::Local => {
                child.path = self.path.as_ref().map(|p| p.join(rel));
            }
            SourceKind::Github | SourceKind::Git => {
                child.subdir = Some(match &self.subdir {
                    Some(parent) => format!("{parent}/{rel}"),
                    None => rel.to_string(),
                });
            }
        }
        child
    }
}

fn last_segment(path: &str) -> String {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(path)
        .to_string()
}

fn looks_local(input: &str) -> bool {
    input.starts_with('/')
        || input.starts_with('~')
        || input.starts_with("./")
        || input.starts_with("../")
        || input == "."
}

/// Drop a `tree/<branch>/` or `blob/<branch>/` prefix from a GitHub path.
fn strip_branch_prefix(subdir: &str) -> Option<String> {
    let parts: Vec<&str> = subdir.splitn(3, '/').collect();
    let stripped = match parts.as_slice() {
        ["tree" | "blob", _branch, rest] => (*rest).to_string(),
        ["tree" | "blob", _branch] => String::new(),
        _ => subdir.to_string(),
    };
    let stripped = stripped.trim_matches('/').to_string();
    (!stripped.is_empty()).then_some(stripped)
}

fn captures<'a>(re: &LazyLock<Option<Regex>>, input: &'a str) -> Option<regex::Captures<'a>> {
    re.as_ref().and_then(|re| re.captures(input))
}

/// Parse user input into an [`InstallSource`].
pub fn parse_source(input: &str) -> Result<InstallSource> {
    let input = input.trim();
    if input.is_empty() {
        return Err(SkillshareError::InvalidInput("source cannot be empty".to_string()));
    }

    if let Some(path) = input.strip_prefix("file://") {
        let path = absolutize(&expand_tilde(path));
        return Ok(InstallSource {
            raw: input.to_string(),
            kind: SourceKind::Git,
            clone_url: Some(format!("file://{}", path.display())),
            path: None,
            subdir: None,
            name: dir_name(&path),
        });
    }

    if looks_local(input) || (!input.contains("://") && !input.starts_with("git@") && Path::new(input).is_dir()) {
        let path = absolutize(&expand_tilde(input));
        return Ok(InstallSource {
            raw: input.to_string(),
            kind: SourceKind::Local,
            clone_url: None,
            name: dir_name(&path),
            path: Some(path),
            subdir: None,
        });
    }

    let expanded = if input.starts_with("github.com/") || input.contains("://") || input.starts_with("git@") {
        input.to_string()
    } else if input.contains('/') {
        format!("github.com/{input}")
    } else {
        return Err(SkillshareError::InvalidInput(format!(
            "unrecognized source format: {input}"
        )));
    };

    if let Some(caps) = captures(&GITHUB, &expanded) {
        let owner = &caps[1];
        let repo = &caps[2];
        let subdir = caps.get(3).and_then(|m| strip_branch_prefix(m.as_str()));
        let name = subdir.as_deref().map_or_else(|| repo.to_string(), last_segment);
        return Ok(InstallSource {
            raw: expanded.clone(),
            kind: SourceKind::Github,
            clone_url: Some(format!("https://github.com/{owner}/{repo}.git")),
            path: None,
            subdir,
            name,
        });
    }

    if let Some(caps) = captures(&GIT_SSH, &expanded) {
        let repo = caps[3].to_string();
        return Ok(InstallSource {
            raw: expanded.clone(),
            kind: SourceKind::Git,
            clone_url: Some(format!("git@{}:{}/{repo}.git", &caps[1], &caps[2])),
            path: None,
            subdir: None,
            name: last_segment(&repo),
        });
    }

    if let Some(caps) = captures(&GIT_HTTPS, &expanded) {
        let scheme = if expanded.starts_with("http://") { "http" } else { "https" };
        let repo = &caps[3];
        let subdir = caps.get(4).map(|m| m.as_str().trim_matches('/').to_string());
        let name = subdir.as_deref().map_or_else(|| repo.to_string(), last_segment);
        return Ok(InstallSource {
            raw: expanded.clone(),
            kind: SourceKind::Git,
            clone_url: Some(format!("{scheme}://{}/{}/{repo}.git", &caps[1], &caps[2])),
            path: None,
            subdir,
            name,
        });
    }

    Err(SkillshareError::InvalidInput(format!(
        "unrecognized source format: {input}"
    )))
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| "skill".to_string(), |n| n.to_string_lossy().to_string())
}
