//! skillshare status - Show source, targets and git state

use clap::Args;
use colored::Colorize;
use serde::Serialize;

use crate::app::AppContext;
use crate::cli::commands::emit;
use crate::cli::output::HumanLayout;
use crate::error::Result;
use crate::storage::git::{self, GitStatus};
use crate::store::{TrackedRepo, tracked_repos};
use crate::targets::{self, TargetStatus, TargetView};

#[derive(Args, Debug)]
pub struct StatusArgs {}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusReport {
    source: String,
    skill_count: usize,
    targets: Vec<TargetView>,
    tracked_repos: Vec<TrackedRepo>,
    git: GitStatus,
}

fn status_label(status: TargetStatus) -> String {
    let label = status.as_str();
    match status {
        TargetStatus::Merged | TargetStatus::Copied | TargetStatus::Linked => label.green().to_string(),
        TargetStatus::NotExist | TargetStatus::Unknown => label.dimmed().to_string(),
        TargetStatus::HasFiles => label.yellow().to_string(),
        TargetStatus::Conflict | TargetStatus::Broken => label.red().to_string(),
    }
}

pub fn run(ctx: &mut AppContext, _args: &StatusArgs) -> Result<()> {
    let skills = ctx.skills()?;
    let list = targets::list(&ctx.config, &skills)?;
    let report = StatusReport {
        source: ctx.config.source.display().to_string(),
        skill_count: skills.len(),
        targets: list.targets,
        tracked_repos: tracked_repos(&ctx.config.source, &skills),
        git: git::status(&ctx.config.source)?,
    };

    emit(ctx, &report, |report| {
        let mut layout = HumanLayout::new();
        layout
            .title("skillshare status")
            .kv("Source", &report.source)
            .kv("Skills", &report.skill_count.to_string());
        if report.git.is_repo {
            let state = if report.git.is_dirty {
                format!("{} ({} changed)", report.git.branch, report.git.files.len())
            } else {
                format!("{} (clean)", report.git.branch)
            };
            layout.kv("Git", &state);
        }

        layout.blank().section("Targets");
        if report.targets.is_empty() {
            layout.push_line("none configured");
        }
        for target in &report.targets {
            let mut line = format!(
                "{:<12} {:<8} {} {}/{} skills",
                target.name,
                target.mode.to_string(),
                status_label(target.status),
                target.linked_count,
                target.expected_skill_count
            );
            if target.local_count > 0 {
                line.push_str(&format!(", {} local", target.local_count));
            }
            if target.drift {
                line.push_str(&format!(" {}", "(run sync)".yellow()));
            }
            layout.bullet(&line);
        }

        if !report.tracked_repos.is_empty() {
            layout.blank().section("Tracked repos");
            for repo in &report.tracked_repos {
                let dirty = if repo.dirty { " (modified)".yellow().to_string() } else { String::new() };
                layout.bullet(&format!("{} {} skills{dirty}", repo.name, repo.skill_count));
            }
        }
        layout
    })
}
