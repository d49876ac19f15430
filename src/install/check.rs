//! Update availability for tracked repos and installed skills. Nothing is
//! changed on disk besides fetching tracked repos' remote refs.

use std::path::Path;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, SkillshareError};
use crate::storage::SourceRepo;
use crate::storage::git::remote_head;
use crate::store::meta::{SkillMeta, read_meta};
use crate::store::repos::tracked_repo_paths;
use crate::store::{Skill, discover_source_skills};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    UpToDate,
    /// Tracked repo with remote commits not yet pulled.
    Behind,
    /// Tracked repo with uncommitted changes; not fetched.
    Dirty,
    /// Installed skill whose source moved past the recorded version.
    UpdateAvailable,
    /// Installed from a local directory; nothing to compare against.
    Local,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoCheck {
    pub name: String,
    pub status: CheckStatus,
    pub behind: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillCheck {
    pub name: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest: Option<String>,
    pub status: CheckStatus,
    pub installed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckReport {
    pub tracked_repos: Vec<RepoCheck>,
    pub skills: Vec<SkillCheck>,
}

impl CheckReport {
    /// Repos behind their remote plus skills with a newer source.
    #[must_use]
    pub fn updatable(&self) -> usize {
        let repos = self
            .tracked_repos
            .iter()
            .filter(|repo| repo.status == CheckStatus::Behind)
            .count();
        let skills = self
            .skills
            .iter()
            .filter(|skill| skill.status == CheckStatus::UpdateAvailable)
            .count();
        repos + skills
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tracked_repos.is_empty() && self.skills.is_empty()
    }
}

/// Check the tracked repos and installed skills in `source`. An empty
/// `names` checks everything; otherwise each name must match a repo (with or
/// without its leading `_`) or an installed skill.
pub fn check_updates(source: &Path, names: &[String]) -> Result<CheckReport> {
    let repos = tracked_repo_paths(source);
    let installed: Vec<(Skill, SkillMeta)> = if source.is_dir() {
        discover_source_skills(source)?
            .into_iter()
            .filter(|skill| !skill.is_in_repo)
            .filter_map(|skill| read_meta(&skill.source_path).map(|meta| (skill, meta)))
            .collect()
    } else {
        Vec::new()
    };

    let (repos, installed) = if names.is_empty() {
        (repos, installed)
    } else {
        select(names, repos, installed)?
    };

    let tracked_repos = repos
        .par_iter()
        .map(|rel| check_repo(rel, &source.join(rel)))
        .collect();
    let skills = installed
        .par_iter()
        .map(|(skill, meta)| check_skill(&skill.flat_name, meta))
        .collect();
    let report = CheckReport { tracked_repos, skills };
    info!(
        repos = report.tracked_repos.len(),
        skills = report.skills.len(),
        updatable = report.updatable(),
        "update check finished"
    );
    Ok(report)
}

type Selection = (Vec<String>, Vec<(Skill, SkillMeta)>);

fn select(names: &[String], repos: Vec<String>, installed: Vec<(Skill, SkillMeta)>) -> Result<Selection> {
    let mut picked_repos = Vec::new();
    let mut picked_skills = Vec::new();
    for name in names {
        let wanted = name.trim_matches('/');
        if let Some(repo) = repos
            .iter()
            .find(|r| r.as_str() == wanted || r.as_str() == format!("_{wanted}"))
        {
            if !picked_repos.contains(repo) {
                picked_repos.push(repo.clone());
            }
            continue;
        }
        let found = installed
            .iter()
            .find(|(s, _)| s.name == wanted || s.flat_name == wanted || s.rel_path == wanted)
            .ok_or_else(|| SkillshareError::NotFound(format!("installed skill or tracked repo {wanted}")))?;
        if !picked_skills.iter().any(|(s, _): &(Skill, SkillMeta)| s.flat_name == found.0.flat_name) {
            picked_skills.push(found.clone());
        }
    }
    Ok((picked_repos, picked_skills))
}

fn check_repo(rel: &str, path: &Path) -> RepoCheck {
    let check = |status, behind, message: Option<String>| RepoCheck {
        name: rel.to_string(),
        status,
        behind,
        message,
    };
    let repo = match SourceRepo::require(path) {
        Ok(repo) => repo,
        Err(err) => return check(CheckStatus::Error, 0, Some(err.to_string())),
    };
    match repo.is_dirty() {
        Ok(true) => return check(CheckStatus::Dirty, 0, Some("has uncommitted changes".to_string())),
        Ok(false) => {}
        Err(err) => return check(CheckStatus::Error, 0, Some(err.to_string())),
    }
    match repo.behind_count() {
        Ok(0) => check(CheckStatus::UpToDate, 0, None),
        Ok(behind) => {
            debug!(repo = rel, behind, "tracked repo behind remote");
            check(CheckStatus::Behind, behind, None)
        }
        Err(err) => check(CheckStatus::Error, 0, Some(err.to_string())),
    }
}

fn check_skill(name: &str, meta: &SkillMeta) -> SkillCheck {
    let mut check = SkillCheck {
        name: name.to_string(),
        source: meta.source.clone(),
        version: meta.version.clone(),
        latest: None,
        status: CheckStatus::Local,
        installed_at: meta.installed_at,
        message: None,
    };
    let Some(url) = meta.repo_url.as_deref() else {
        return check;
    };
    match remote_head(url) {
        Ok(latest) => {
            check.status = match meta.version.as_deref() {
                Some(version) if version == latest => CheckStatus::UpToDate,
                _ => CheckStatus::UpdateAvailable,
            };
            check.latest = Some(latest);
        }
        Err(err) => {
            check.status = CheckStatus::Error;
            check.message = Some(err.to_string());
        }
    }
    check
}
