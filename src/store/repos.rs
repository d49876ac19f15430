//! Tracked repositories: `_`-prefixed git checkouts inside the source.

use std::path::Path;

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::store::{Skill, is_tracked_repo_dir};
use crate::storage::SourceRepo;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedRepo {
    /// Path relative to the source, e.g. `_team-skills` or `org/_shared`.
    pub name: String,
    pub skill_count: usize,
    /// Uncommitted changes in the checkout.
    pub dirty: bool,
}

/// Relative paths of tracked repos below `source`. Tracked repos are not
/// searched for nested repos.
#[must_use]
pub fn tracked_repo_paths(source: &Path) -> Vec<String> {
    let mut repos = Vec::new();
    let mut walker = WalkDir::new(source).min_depth(1).sort_by_file_name().into_iter();
    while let Some(entry) = walker.next() {
        let Ok(entry) = entry else {
            continue;
        };
        if !entry.file_type().is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if name == ".git" {
            walker.skip_current_dir();
            continue;
        }
        if is_tracked_repo_dir(&name) && entry.path().join(".git").exists() {
            if let Ok(rel) = entry.path().strip_prefix(source) {
                repos.push(rel.to_string_lossy().replace('\\', "/"));
            }
            walker.skip_current_dir();
        }
    }
    repos
}

/// Tracked repos with their skill counts and dirty flag.
#[must_use]
pub fn tracked_repos(source: &Path, skills: &[Skill]) -> Vec<TrackedRepo> {
    tracked_repo_paths(source)
        .into_iter()
        .map(|name| {
            let prefix = format!("{name}/");
            let skill_count = skills
                .iter()
                .filter(|skill| skill.rel_path.starts_with(&prefix))
                .count();
            let dirty = SourceRepo::open(&source.join(&name))
                .ok()
                .flatten()
                .and_then(|repo| repo.is_dirty().ok())
                .unwrap_or(false);
            TrackedRepo {
                name,
                skill_count,
                dirty,
            }
        })
        .collect()
}
