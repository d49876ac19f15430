//! The skill source directory.
//!
//! Any directory below the source that holds a `SKILL.md` is a skill. Nested
//! skills are addressed by their flat name (`frontend/react` becomes
//! `frontend__react`), which is also the directory name used in targets.

pub mod frontmatter;
pub mod gitignore;
pub mod meta;
pub mod repos;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;
use walkdir::WalkDir;

use crate::error::{Result, SkillshareError};
use crate::utils::fs::is_hidden;

pub use frontmatter::{Frontmatter, SKILL_FILE};
pub use meta::{META_FILE, SkillMeta, read_meta, write_meta};
pub use repos::{TrackedRepo, tracked_repos};

/// Separator that replaces `/` in flat names.
pub const FLAT_SEPARATOR: &str = "__";

/// A skill discovered in the source directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skill {
    /// Last path segment.
    pub name: String,
    pub flat_name: String,
    /// `/`-separated path relative to the source.
    pub rel_path: String,
    pub source_path: PathBuf,
    /// Lives inside a tracked repo (`_`-prefixed top-level directory).
    pub is_in_repo: bool,
    /// Frontmatter `targets:` restriction.
    pub targets: Option<Vec<String>>,
}

impl Skill {
    /// Whether the frontmatter restriction lets this skill into `target`.
    #[must_use]
    pub fn allows_target(&self, target: &str) -> bool {
        self.targets
            .as_ref()
            .is_none_or(|targets| targets.iter().any(|t| t == target))
    }

    /// Top-level tracked repo directory this skill belongs to.
    #[must_use]
    pub fn repo_name(&self) -> Option<&str> {
        if !self.is_in_repo {
            return None;
        }
        self.rel_path.split('/').next()
    }
}

#[must_use]
pub fn flat_name(rel_path: &str) -> String {
    rel_path.replace('/', FLAT_SEPARATOR)
}

#[must_use]
pub fn is_tracked_repo_dir(name: &str) -> bool {
    name.starts_with('_')
}

/// Walk `source` and return every skill, sorted by relative path.
///
/// Unreadable entries are skipped. When two skills flatten to the same name
/// the first one (by path order) wins and the other is reported.
pub fn discover_source_skills(source: &Path) -> Result<Vec<Skill>> {
    if !source.is_dir() {
        return Err(SkillshareError::NotFound(format!(
            "source directory {}",
            source.display()
        )));
    }

    let walker = WalkDir::new(source)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !(entry.file_type().is_dir() && entry.file_name() == ".git"));

    let mut skills = Vec::new();
    let mut seen = HashSet::new();
    for entry in walker.filter_map(std::result::Result::ok) {
        if !entry.file_type().is_file() || entry.file_name() != SKILL_FILE {
            continue;
        }
        let Some(dir) = entry.path().parent() else {
            continue;
        };
        let Ok(rel) = dir.strip_prefix(source) else {
            continue;
        };
        if rel.as_os_str().is_empty() {
            continue;
        }
        let rel_path = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let flat = flat_name(&rel_path);
        if !seen.insert(flat.clone()) {
            warn!(skill = %rel_path, flat_name = %flat, "duplicate flat name, skipping");
            continue;
        }

        let name = rel_path.rsplit('/').next().unwrap_or(&rel_path).to_string();
        let is_in_repo = rel_path
            .split('/')
            .next()
            .is_some_and(is_tracked_repo_dir);
        let targets = frontmatter::read(dir)?.targets;

        skills.push(Skill {
            name,
            flat_name: flat,
            rel_path,
            source_path: dir.to_path_buf(),
            is_in_repo,
            targets,
        });
    }
    skills.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    Ok(skills)
}

/// Look a skill up by flat name or nested path, falling back to its base
/// name when that is unambiguous.
pub fn find_skill<'a>(skills: &'a [Skill], name: &str) -> Result<&'a Skill> {
    if let Some(skill) = skills
        .iter()
        .find(|skill| skill.flat_name == name || skill.rel_path == name)
    {
        return Ok(skill);
    }
    let mut by_name = skills.iter().filter(|skill| skill.name == name);
    match (by_name.next(), by_name.next()) {
        (Some(skill), None) => Ok(skill),
        (Some(_), Some(_)) => Err(SkillshareError::Conflict(format!(
            "skill name {name:?} is ambiguous; use the flat name"
        ))),
        _ => Err(SkillshareError::NotFound(format!("skill {name}"))),
    }
}

/// Non-hidden directories directly below the source.
#[must_use]
pub fn top_level_count(source: &Path) -> usize {
    std::fs::read_dir(source)
        .map(|entries| {
            entries
                .filter_map(std::result::Result::ok)
                .filter(|entry| entry.file_type().is_ok_and(|ft| ft.is_dir()))
                .filter(|entry| !is_hidden(&entry.file_name().to_string_lossy()))
                .count()
        })
        .unwrap_or(0)
}

/// JSON shape of a skill, enriched with install metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillView {
    pub name: String,
    pub flat_name: String,
    pub rel_path: String,
    pub source_path: String,
    pub is_in_repo: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installed_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub targets: Option<Vec<String>>,
}

impl From<&Skill> for SkillView {
    fn from(skill: &Skill) -> Self {
        let meta = read_meta(&skill.source_path);
        Self {
            name: skill.name.clone(),
            flat_name: skill.flat_name.clone(),
            rel_path: skill.rel_path.clone(),
            source_path: skill.source_path.display().to_string(),
            is_in_repo: skill.is_in_repo,
            installed_at: meta
                .as_ref()
                .map(|m| m.installed_at.format("%Y-%m-%dT%H:%M:%SZ").to_string()),
            source: meta.as_ref().map(|m| m.source.clone()),
            kind: meta.as_ref().map(|m| m.kind.clone()),
            repo_url: meta.as_ref().and_then(|m| m.repo_url.clone()),
            version: meta.and_then(|m| m.version),
            targets: skill.targets.clone(),
        }
    }
}

/// Files inside a skill (relative, `/`-separated), skipping hidden directories.
#[must_use]
pub fn list_skill_files(skill_dir: &Path) -> Vec<String> {
    WalkDir::new(skill_dir)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            !(entry.file_type().is_dir() && is_hidden(&entry.file_name().to_string_lossy()))
        })
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            entry.path().strip_prefix(skill_dir).ok().map(|rel| {
                rel.components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/")
            })
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::Path;

    /// Create `<source>/<rel>/SKILL.md` with an optional frontmatter block.
    pub fn write_skill(source: &Path, rel: &str, frontmatter: Option<&str>) {
        let dir = source.join(rel);
        std::fs::create_dir_all(&dir).unwrap();
        let body = match frontmatter {
            Some(fm) => format!("---\n{fm}\n---\n# {rel}\n"),
            None => format!("# {rel}\n"),
        };
        std::fs::write(dir.join("SKILL.md"), body).unwrap();
    }
}
