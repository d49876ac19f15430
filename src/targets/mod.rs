//! Target registry: the CLI skills directories skillshare syncs into.
//!
//! Targets live in `config.toml`. Functions here mutate a [`Config`] in
//! memory and touch the target directories; persisting the config is the
//! caller's job.

mod known;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{Config, SyncMode, TargetConfig, merge_unique};
use crate::error::{Result, SkillshareError};
use crate::security::validate_path_component;
use crate::store::Skill;
use crate::sync::{Manifest, SkillFilter};
use crate::utils::fs::{
    absolutize, copy_dir, expand_tilde, is_hidden, is_symlink, is_within, resolve_link,
};

pub use known::{KNOWN_TARGETS, KnownTarget, known_targets};

/// Observed state of a target directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetStatus {
    #[serde(rename = "merged")]
    Merged,
    #[serde(rename = "copied")]
    Copied,
    #[serde(rename = "linked")]
    Linked,
    #[serde(rename = "not exist")]
    NotExist,
    #[serde(rename = "has files")]
    HasFiles,
    #[serde(rename = "conflict")]
    Conflict,
    #[serde(rename = "broken")]
    Broken,
    #[serde(rename = "unknown")]
    Unknown,
}

impl TargetStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Merged => "merged",
            Self::Copied => "copied",
            Self::Linked => "linked",
            Self::NotExist => "not exist",
            Self::HasFiles => "has files",
            Self::Conflict => "conflict",
            Self::Broken => "broken",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for TargetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status plus entry counts for one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetState {
    pub status: TargetStatus,
    /// Symlinks into the source (merge) or managed copies (copy).
    pub linked: usize,
    pub local: usize,
}

impl TargetState {
    const fn bare(status: TargetStatus) -> Self {
        Self {
            status,
            linked: 0,
            local: 0,
        }
    }
}

/// Inspect a target the way its mode sees it.
#[must_use]
pub fn inspect(path: &Path, source: &Path, mode: SyncMode) -> TargetState {
    match mode {
        SyncMode::Merge => inspect_merge(path, source),
        SyncMode::Copy => inspect_copy(path),
        SyncMode::Symlink => TargetState::bare(inspect_symlink(path, source)),
    }
}

fn root_kind(path: &Path) -> std::result::Result<fs::Metadata, TargetStatus> {
    match fs::symlink_metadata(path) {
        Ok(meta) => Ok(meta),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Err(TargetStatus::NotExist),
        Err(_) => Err(TargetStatus::Unknown),
    }
}

fn inspect_symlink(path: &Path, source: &Path) -> TargetStatus {
    let meta = match root_kind(path) {
        Ok(meta) => meta,
        Err(status) => return status,
    };
    if meta.file_type().is_symlink() {
        let Ok(link) = resolve_link(path) else {
            return TargetStatus::Unknown;
        };
        if link != absolutize(source) {
            return TargetStatus::Conflict;
        }
        if !path.exists() {
            return TargetStatus::Broken;
        }
        return TargetStatus::Linked;
    }
    if meta.is_dir() {
        TargetStatus::HasFiles
    } else {
        TargetStatus::Unknown
    }
}

fn inspect_merge(path: &Path, source: &Path) -> TargetState {
    let meta = match root_kind(path) {
        Ok(meta) => meta,
        Err(status) => return TargetState::bare(status),
    };
    if meta.file_type().is_symlink() {
        let status = match resolve_link(path) {
            Ok(link) if link == absolutize(source) => TargetStatus::Linked,
            Ok(_) => TargetStatus::Conflict,
            Err(_) => TargetStatus::Unknown,
        };
        return TargetState::bare(status);
    }
    if !meta.is_dir() {
        return TargetState::bare(TargetStatus::Broken);
    }
    let Ok(entries) = fs::read_dir(path) else {
        return TargetState::bare(TargetStatus::Broken);
    };

    let source = absolutize(source);
    let (mut linked, mut local) = (0, 0);
    for entry in entries.filter_map(std::result::Result::ok) {
        if is_hidden(&entry.file_name().to_string_lossy()) {
            continue;
        }
        let entry_path = entry.path();
        let into_source = is_symlink(&entry_path)
            && resolve_link(&entry_path).is_ok_and(|link| is_within(&link, &source));
        if into_source {
            linked += 1;
        } else {
            local += 1;
        }
    }

    let status = if linked > 0 {
        TargetStatus::Merged
    } else {
        TargetStatus::HasFiles
    };
    TargetState {
        status,
        linked,
        local,
    }
}

fn inspect_copy(path: &Path) -> TargetState {
    let meta = match root_kind(path) {
        Ok(meta) => meta,
        Err(status) => return TargetState::bare(status),
    };
    if meta.file_type().is_symlink() {
        return TargetState::bare(TargetStatus::Linked);
    }
    if !meta.is_dir() {
        return TargetState::bare(TargetStatus::Broken);
    }
    let Ok(entries) = fs::read_dir(path) else {
        return TargetState::bare(TargetStatus::Broken);
    };

    let manifest = Manifest::read(path);
    let local = entries
        .filter_map(std::result::Result::ok)
        .filter(|entry| !is_hidden(&entry.file_name().to_string_lossy()))
        .filter(|entry| entry.file_type().is_ok_and(|ft| ft.is_dir()))
        .filter(|entry| !manifest.is_managed(&entry.file_name().to_string_lossy()))
        .count();

    let status = if manifest.managed.is_empty() {
        TargetStatus::HasFiles
    } else {
        TargetStatus::Copied
    };
    TargetState {
        status,
        linked: manifest.managed.len(),
        local,
    }
}

/// JSON shape of one target.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetView {
    pub name: String,
    pub path: String,
    pub mode: SyncMode,
    pub status: TargetStatus,
    pub linked_count: usize,
    pub local_count: usize,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub expected_skill_count: usize,
    /// Fewer delivered skills than the filters select.
    pub drift: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetList {
    pub targets: Vec<TargetView>,
    pub source_skill_count: usize,
}

/// Every configured target with status and counts, sorted by name.
pub fn list(config: &Config, skills: &[Skill]) -> Result<TargetList> {
    let mut targets = Vec::with_capacity(config.targets.len());
    for (name, tc) in &config.targets {
        let mode = config.mode_for(tc);
        let filter = SkillFilter::new(&tc.include, &tc.exclude).map_err(|err| {
            SkillshareError::InvalidInput(format!("invalid include/exclude for target {name}: {err}"))
        })?;
        let expected = filter.select(skills, name).len();
        let state = inspect(&tc.path, &config.source, mode);
        let drift = matches!(
            (mode, state.status),
            (SyncMode::Merge, TargetStatus::Merged) | (SyncMode::Copy, TargetStatus::Copied)
        ) && state.linked < expected;

        targets.push(TargetView {
            name: name.clone(),
            path: tc.path.display().to_string(),
            mode,
            status: state.status,
            linked_count: state.linked,
            local_count: state.local,
            include: tc.include.clone(),
            exclude: tc.exclude.clone(),
            expected_skill_count: expected,
            drift,
        });
    }
    Ok(TargetList {
        targets,
        source_skill_count: skills.len(),
    })
}

/// Register a new target.
pub fn add(config: &mut Config, name: &str, path: &str, mode: Option<SyncMode>) -> Result<()> {
    validate_path_component(name)?;
    if path.trim().is_empty() {
        return Err(SkillshareError::InvalidInput("target path is required".to_string()));
    }
    if config.targets.contains_key(name) {
        return Err(SkillshareError::Conflict(format!("target already exists: {name}")));
    }
    let mut tc = TargetConfig::new(expand_tilde(path.trim()));
    tc.mode = mode;
    info!(target = %name, path = %tc.path.display(), "target added");
    config.targets.insert(name.to_string(), tc);
    Ok(())
}

/// Partial target update. `None` leaves a field alone; an empty list clears it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TargetUpdate {
    #[serde(default)]
    pub include: Option<Vec<String>>,
    #[serde(default)]
    pub exclude: Option<Vec<String>>,
    #[serde(default)]
    pub mode: Option<SyncMode>,
}

pub fn update(config: &mut Config, name: &str, patch: TargetUpdate) -> Result<()> {
    let tc = config
        .targets
        .get_mut(name)
        .ok_or_else(|| SkillshareError::NotFound(format!("target {name}")))?;

    let include = patch.include.map(|values| merge_unique(values, &[]));
    let exclude = patch.exclude.map(|values| merge_unique(values, &[]));
    SkillFilter::new(
        include.as_deref().unwrap_or(&tc.include),
        exclude.as_deref().unwrap_or(&tc.exclude),
    )?;

    if let Some(include) = include {
        tc.include = include;
    }
    if let Some(exclude) = exclude {
        tc.exclude = exclude;
    }
    if let Some(mode) = patch.mode {
        tc.mode = Some(mode);
    }
    debug!(target = %name, "target updated");
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovedTarget {
    pub name: String,
    pub path: PathBuf,
    /// Skill symlinks removed from a merge target.
    pub unlinked: usize,
    /// A symlink-mode root was replaced by a real copy of the source.
    pub materialized: bool,
}

/// Unregister a target, leaving its directory usable without skillshare:
/// merge symlinks into the source are removed, a symlink-mode root becomes
/// a real copy, and the copy manifest is dropped.
pub fn remove(config: &mut Config, name: &str) -> Result<RemovedTarget> {
    let tc = config
        .targets
        .get(name)
        .ok_or_else(|| SkillshareError::NotFound(format!("target {name}")))?;
    let path = tc.path.clone();
    let source = absolutize(&config.source);

    let mut removed = RemovedTarget {
        name: name.to_string(),
        path: path.clone(),
        unlinked: 0,
        materialized: false,
    };

    if is_symlink(&path) {
        let points_at_source = resolve_link(&path).is_ok_and(|link| link == source);
        fs::remove_file(&path)?;
        if points_at_source && source.is_dir() {
            copy_dir(&source, &path)?;
            removed.materialized = true;
        }
    } else if path.is_dir() {
        Manifest::remove(&path)?;
        for entry in fs::read_dir(&path)?.filter_map(std::result::Result::ok) {
            let entry_path = entry.path();
            if is_symlink(&entry_path)
                && resolve_link(&entry_path).is_ok_and(|link| is_within(&link, &source))
            {
                fs::remove_file(&entry_path)?;
                removed.unlinked += 1;
            }
        }
    }

    config.targets.remove(name);
    info!(
        target = %name,
        unlinked = removed.unlinked,
        materialized = removed.materialized,
        "target removed"
    );
    Ok(removed)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableTarget {
    pub name: String,
    pub path: String,
    pub installed: bool,
    pub detected: bool,
}

/// Well-known targets, flagged as configured or detected on disk (the
/// tool's config directory exists).
#[must_use]
pub fn available(config: &Config) -> Vec<AvailableTarget> {
    known_targets()
        .into_iter()
        .map(|known| {
            let installed = config.targets.contains_key(known.name);
            let detected = !installed && known.detected();
            AvailableTarget {
                name: known.name.to_string(),
                path: known.path.display().to_string(),
                installed,
                detected,
            }
        })
        .collect()
}
