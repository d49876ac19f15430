//! Reconciliation of the source directory into targets.
//!
//! Every target is handled in two phases. [`ReconcileStrategy::plan`] reads
//! the target and produces a list of [`Action`]s without touching the disk;
//! [`ReconcileStrategy::apply`] executes them one at a time. A dry run stops
//! after planning and `diff` renders the plan, so sync, dry-run and diff are
//! always computed by the same code.

pub mod filter;
pub mod manifest;
pub mod strategy;

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{Config, SyncMode};
use crate::error::{Result, SkillshareError};
use crate::store::Skill;

pub use filter::SkillFilter;
pub use manifest::{MANIFEST_FILE, Manifest, dir_checksum};
pub use strategy::{
    CopyStrategy, MergeStrategy, PlanInput, ReconcileStrategy, SymlinkStrategy, strategy_for,
};

/// Name used for the single action of a symlink-mode target.
pub const WHOLE_DIRECTORY: &str = "(entire directory)";

#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    pub dry_run: bool,
    pub force: bool,
    /// Restrict to one target.
    pub target: Option<String>,
}

/// Diff verb for one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffAction {
    Link,
    Update,
    Skip,
    Prune,
    Local,
    Copy,
}

impl DiffAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Link => "link",
            Self::Update => "update",
            Self::Skip => "skip",
            Self::Prune => "prune",
            Self::Local => "local",
            Self::Copy => "copy",
        }
    }
}

/// Result bucket an action is reported under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Report {
    Linked,
    Updated,
    Skipped,
    Pruned,
    Nothing,
}

/// The filesystem effect of an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Already in the desired state.
    Keep,
    /// Create a symlink to the given source path.
    Link(PathBuf),
    /// Replace whatever is there with a symlink to the given source path.
    Relink(PathBuf),
    /// Copy the given source directory in, replacing any existing entry.
    Copy { src: PathBuf, checksum: String },
    /// Leave a local entry alone.
    Skip,
    /// Remove the entry.
    Prune,
    /// A local entry outside skillshare's control; diff only.
    Local,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    /// Entry name in the target (flat skill name).
    pub name: String,
    pub step: Step,
    pub report: Report,
    pub diff: Option<DiffAction>,
    pub reason: String,
}

/// How the target root itself must change before actions run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RootFix {
    #[default]
    Keep,
    /// The directory does not exist yet.
    Create,
    /// The root is a symlink (symlink mode); replace it with a directory.
    Unlink,
}

/// Everything one target needs, computed without side effects.
#[derive(Debug, Clone)]
pub struct Plan {
    pub target: String,
    pub mode: SyncMode,
    pub path: PathBuf,
    pub root: RootFix,
    pub actions: Vec<Action>,
    pub warnings: Vec<String>,
    /// Set when the target could not be inspected; no actions run.
    pub broken: bool,
    /// Copy-mode manifest as read at plan time.
    pub manifest: Manifest,
}

impl Plan {
    #[must_use]
    pub fn new(target: &str, mode: SyncMode, path: &Path) -> Self {
        Self {
            target: target.to_string(),
            mode,
            path: path.to_path_buf(),
            root: RootFix::Keep,
            actions: Vec::new(),
            warnings: Vec::new(),
            broken: false,
            manifest: Manifest::default(),
        }
    }

    /// Mark the target broken with a warning.
    #[must_use]
    pub fn into_broken(mut self, reason: impl Into<String>) -> Self {
        self.broken = true;
        self.actions.clear();
        self.warnings.push(reason.into());
        self
    }

    pub fn push(
        &mut self,
        name: &str,
        step: Step,
        report: Report,
        diff: Option<DiffAction>,
        reason: &str,
    ) {
        self.actions.push(Action {
            name: name.to_string(),
            step,
            report,
            diff,
            reason: reason.to_string(),
        });
    }
}

/// Outcome of syncing one target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    pub target: String,
    pub mode: SyncMode,
    pub linked: Vec<String>,
    pub updated: Vec<String>,
    pub skipped: Vec<String>,
    pub pruned: Vec<String>,
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub broken: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub dry_run: bool,
}

impl SyncResult {
    fn from_plan_header(plan: &Plan) -> Self {
        Self {
            target: plan.target.clone(),
            mode: plan.mode,
            warnings: plan.warnings.clone(),
            broken: plan.broken,
            ..Self::default()
        }
    }

    fn record(&mut self, action: &Action) {
        let bucket = match action.report {
            Report::Linked => &mut self.linked,
            Report::Updated => &mut self.updated,
            Report::Skipped => &mut self.skipped,
            Report::Pruned => &mut self.pruned,
            Report::Nothing => return,
        };
        bucket.push(action.name.clone());
    }

    /// What applying `plan` would report.
    #[must_use]
    pub fn preview(plan: &Plan) -> Self {
        let mut result = Self::from_plan_header(plan);
        result.dry_run = true;
        for action in &plan.actions {
            result.record(action);
        }
        result
    }

    /// Nothing changed on disk.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.updated.is_empty() && self.pruned.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffItem {
    pub skill: String,
    pub action: DiffAction,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffTarget {
    pub target: String,
    pub mode: SyncMode,
    pub items: Vec<DiffItem>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl From<&Plan> for DiffTarget {
    fn from(plan: &Plan) -> Self {
        Self {
            target: plan.target.clone(),
            mode: plan.mode,
            items: plan
                .actions
                .iter()
                .filter_map(|action| {
                    action.diff.map(|diff| DiffItem {
                        skill: action.name.clone(),
                        action: diff,
                        reason: action.reason.clone(),
                    })
                })
                .collect(),
            warnings: plan.warnings.clone(),
        }
    }
}

/// Plan every selected target. Unknown targets and invalid filters reject
/// the whole request; a target that cannot be inspected becomes a broken
/// plan instead.
pub fn plan_targets(
    config: &Config,
    skills: &[Skill],
    target: Option<&str>,
    force: bool,
) -> Result<Vec<Plan>> {
    let selected: Vec<_> = match target {
        Some(name) => vec![(name, config.target(name)?)],
        None => config
            .targets
            .iter()
            .map(|(name, tc)| (name.as_str(), tc))
            .collect(),
    };

    let mut prepared = Vec::with_capacity(selected.len());
    for (name, tc) in selected {
        let filter = SkillFilter::new(&tc.include, &tc.exclude).map_err(|err| match err {
            SkillshareError::InvalidInput(msg) => {
                SkillshareError::InvalidInput(format!("target {name}: {msg}"))
            }
            other => other,
        })?;
        prepared.push((name, tc, filter));
    }

    let plans = prepared
        .par_iter()
        .map(|(name, tc, filter)| {
            let mode = config.mode_for(tc);
            let input = PlanInput {
                target: name,
                path: &tc.path,
                source: &config.source,
                skills,
                selected: filter.select(skills, name),
                filter,
                force,
            };
            strategy_for(mode)
                .plan(&input)
                .unwrap_or_else(|err| Plan::new(name, mode, &tc.path).into_broken(err.to_string()))
        })
        .collect();
    Ok(plans)
}

/// Apply one plan, isolating per-action failures as warnings.
#[must_use]
pub fn apply_plan(plan: &Plan) -> SyncResult {
    let mut result = SyncResult::from_plan_header(plan);
    if plan.broken {
        warn!(target = %plan.target, "target is broken, skipped");
        return result;
    }

    let strategy = strategy_for(plan.mode);
    if let Err(err) = strategy.prepare(plan) {
        result.broken = true;
        result.warnings.push(format!("cannot prepare target: {err}"));
        return result;
    }

    let mut manifest = plan.manifest.clone();
    for action in &plan.actions {
        match strategy.apply(plan, action, &mut manifest) {
            Ok(()) => result.record(action),
            Err(err) => {
                warn!(target = %plan.target, entry = %action.name, error = %err, "sync action failed");
                result.warnings.push(format!("{}: {err}", action.name));
            }
        }
    }
    if let Err(err) = strategy.finish(plan, &mut manifest) {
        result.warnings.push(format!("failed to finalize target: {err}"));
    }

    info!(
        target = %plan.target,
        mode = %plan.mode,
        linked = result.linked.len(),
        updated = result.updated.len(),
        skipped = result.skipped.len(),
        pruned = result.pruned.len(),
        "synced target"
    );
    result
}

/// Sync the source into every target (or one). Results are sorted by target.
pub fn sync(config: &Config, skills: &[Skill], opts: &SyncOptions) -> Result<Vec<SyncResult>> {
    let plans = plan_targets(config, skills, opts.target.as_deref(), opts.force)?;
    if opts.dry_run {
        debug!(targets = plans.len(), "dry run");
        return Ok(plans.iter().map(SyncResult::preview).collect());
    }
    let mut results: Vec<_> = plans.par_iter().map(apply_plan).collect();
    results.sort_by(|a, b| a.target.cmp(&b.target));
    Ok(results)
}

/// Pending changes per target, as a sync without `force` would make them.
pub fn diff(config: &Config, skills: &[Skill], target: Option<&str>) -> Result<Vec<DiffTarget>> {
    let plans = plan_targets(config, skills, target, false)?;
    Ok(plans.iter().map(DiffTarget::from).collect())
}
