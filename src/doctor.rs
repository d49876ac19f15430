//! Environment and target health checks.
//!
//! Checks only read, apart from a symlink created in a scratch directory
//! and a write test in each target. Problems are reported, never repaired.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tracing::debug;

use crate::app::AppContext;
use crate::config::{Config, SyncMode, TargetConfig};
use crate::storage::git;
use crate::store::gitignore::is_ignored;
use crate::store::repos::tracked_repo_paths;
use crate::store::{Skill, discover_source_skills};
use crate::sync::SkillFilter;
use crate::targets::{TargetStatus, inspect};
use crate::utils::fs::{create_symlink, is_hidden, is_symlink, resolve_link};
use crate::utils::format::format_size;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Health {
    Ok,
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    /// `config`, `source`, `git`, `target:<name>`, ...
    pub area: String,
    pub health: Health,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DoctorReport {
    pub checks: Vec<Finding>,
    pub errors: usize,
    pub warnings: usize,
}

impl DoctorReport {
    fn push(&mut self, area: impl Into<String>, health: Health, message: impl Into<String>) {
        match health {
            Health::Error => self.errors += 1,
            Health::Warning => self.warnings += 1,
            Health::Ok | Health::Info => {}
        }
        self.checks.push(Finding {
            area: area.into(),
            health,
            message: message.into(),
        });
    }

    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.errors == 0
    }

    /// Findings for one area, in check order.
    pub fn area<'a>(&'a self, area: &'a str) -> impl Iterator<Item = &'a Finding> {
        self.checks.iter().filter(move |finding| finding.area == area)
    }
}

/// Run every check against the context's configuration.
#[must_use]
pub fn diagnose(ctx: &AppContext) -> DoctorReport {
    let mut report = DoctorReport::default();
    if ctx.config_path.is_file() {
        report.push("config", Health::Ok, ctx.config_path.display().to_string());
    } else {
        report.push(
            "config",
            Health::Warning,
            format!("{} not found; defaults in use (run `skillshare init`)", ctx.config_path.display()),
        );
    }

    let skills = check_source(&ctx.config.source, &mut report);
    check_link_support(&mut report);
    check_git(&ctx.config.source, &mut report);
    for (name, target) in &ctx.config.targets {
        check_target(&ctx.config, name, target, &skills, &mut report);
    }

    match ctx.backups().list() {
        Ok(list) => {
            let latest = list.backups.first().map_or_else(|| "none".to_string(), |b| b.timestamp.clone());
            report.push("backups", Health::Info, format!("{} backup(s), latest {latest}", list.backups.len()));
        }
        Err(err) => report.push("backups", Health::Warning, format!("cannot read backups: {err}")),
    }
    let trash = ctx.trash().snapshot();
    report.push(
        "trash",
        Health::Info,
        format!("{} item(s), {}", trash.items.len(), format_size(trash.total_size)),
    );

    debug!(errors = report.errors, warnings = report.warnings, "doctor finished");
    report
}

fn check_source(source: &Path, report: &mut DoctorReport) -> Vec<Skill> {
    if !source.exists() {
        report.push("source", Health::Error, format!("{} not found", source.display()));
        return Vec::new();
    }
    if !source.is_dir() {
        report.push("source", Health::Error, format!("{} is not a directory", source.display()));
        return Vec::new();
    }
    match discover_source_skills(source) {
        Ok(skills) => {
            report.push("source", Health::Ok, format!("{} ({} skills)", source.display(), skills.len()));
            skills
        }
        Err(err) => {
            report.push("source", Health::Error, format!("cannot read {}: {err}", source.display()));
            Vec::new()
        }
    }
}

fn check_link_support(report: &mut DoctorReport) {
    let outcome = TempDir::new().map_err(crate::error::SkillshareError::from).and_then(|tmp| {
        let dir = tmp.path().join("dir");
        fs::create_dir(&dir)?;
        create_symlink(&dir, &tmp.path().join("link"))
    });
    match outcome {
        Ok(()) => report.push("links", Health::Ok, "symlinks supported"),
        Err(err) => report.push("links", Health::Error, format!("cannot create symlinks: {err}")),
    }
}

fn check_git(source: &Path, report: &mut DoctorReport) {
    let status = match git::status(source) {
        Ok(status) => status,
        Err(err) => {
            report.push("git", Health::Warning, format!("cannot read repository: {err}"));
            return;
        }
    };
    if !status.is_repo {
        report.push("git", Health::Warning, "source is not a git repository (push and pull unavailable)");
        return;
    }
    if status.is_dirty {
        report.push("git", Health::Warning, format!("{} uncommitted change(s)", status.files.len()));
    } else {
        report.push("git", Health::Ok, format!("{} (clean)", status.branch));
    }
    if !status.has_remote {
        report.push("git", Health::Info, "no remote configured");
    }

    for repo in tracked_repo_paths(source) {
        if !is_ignored(source, &repo) {
            report.push(
                "git",
                Health::Warning,
                format!("tracked repo {repo} is not in .gitignore; push would stage it as an embedded repository"),
            );
        }
    }
}

fn check_target(config: &Config, name: &str, target: &TargetConfig, skills: &[Skill], report: &mut DoctorReport) {
    let area = format!("target:{name}");
    let mode = config.mode_for(target);
    let filter = match SkillFilter::new(&target.include, &target.exclude) {
        Ok(filter) => filter,
        Err(err) => {
            report.push(area, Health::Error, format!("invalid include/exclude: {err}"));
            return;
        }
    };
    if mode == SyncMode::Symlink && !filter.is_empty() {
        report.push(&area, Health::Warning, "include/exclude ignored in symlink mode");
    }

    let issues = path_issues(&target.path);
    if !issues.is_empty() {
        report.push(area, Health::Error, format!("[{mode}] {}", issues.join(", ")));
        return;
    }

    let state = inspect(&target.path, &config.source, mode);
    let summary = match (mode, state.status) {
        (SyncMode::Merge, TargetStatus::Merged) => format!("merged ({} shared, {} local)", state.linked, state.local),
        (SyncMode::Copy, TargetStatus::Copied) => format!("copied ({} managed, {} local)", state.linked, state.local),
        (SyncMode::Merge | SyncMode::Copy, TargetStatus::Linked) | (SyncMode::Symlink, TargetStatus::HasFiles) => {
            report.push(&area, Health::Warning, format!("[{mode}] {} (run sync to apply {mode} mode)", state.status));
            return;
        }
        (_, TargetStatus::Conflict) => {
            let link = resolve_link(&target.path).map_or_else(|_| "?".to_string(), |p| p.display().to_string());
            report.push(&area, Health::Error, format!("[{mode}] symlink points to wrong location: {link}"));
            return;
        }
        (_, TargetStatus::Broken) => {
            report.push(&area, Health::Error, format!("[{mode}] broken"));
            return;
        }
        (_, status) => status.to_string(),
    };
    report.push(&area, Health::Ok, format!("[{mode}] {summary}"));

    let expected = filter.select(skills, name).len();
    let delivered = matches!(state.status, TargetStatus::Merged | TargetStatus::Copied);
    if delivered && state.linked < expected {
        report.push(
            &area,
            Health::Warning,
            format!("{} skill(s) not synced ({}/{expected})", expected - state.linked, state.linked),
        );
    }
    if mode == SyncMode::Merge {
        let broken = broken_links(&target.path);
        if !broken.is_empty() {
            report.push(
                &area,
                Health::Warning,
                format!("{} broken link(s): {} (run sync)", broken.len(), broken.join(", ")),
            );
        }
    }
}

/// Reasons a target path cannot be synced into.
fn path_issues(path: &Path) -> Vec<String> {
    let mut issues = Vec::new();
    match fs::symlink_metadata(path) {
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            if !path.parent().is_some_and(Path::exists) {
                issues.push("parent directory not found".to_string());
            }
        }
        Err(err) => issues.push(format!("access error: {err}")),
        Ok(meta) if meta.is_dir() => {
            let test_file = path.join(".skillshare-write-test");
            match fs::write(&test_file, b"") {
                Ok(()) => {
                    let _ = fs::remove_file(&test_file);
                }
                Err(_) => issues.push("not writable".to_string()),
            }
        }
        Ok(_) => {}
    }
    issues
}

/// Names of entries that are symlinks whose destination is gone.
fn broken_links(target: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(target) else {
        return Vec::new();
    };
    let mut broken: Vec<String> = entries
        .filter_map(std::result::Result::ok)
        .filter(|entry| !is_hidden(&entry.file_name().to_string_lossy()))
        .filter(|entry| is_symlink(&entry.path()) && !entry.path().exists())
        .map(|entry| entry.file_name().to_string_lossy().to_string())
        .collect();
    broken.sort();
    broken
}
