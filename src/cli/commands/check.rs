//! skillshare check - Show which tracked repos and installed skills have updates

use std::time::Duration;

use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};

use crate::app::AppContext;
use crate::cli::commands::emit;
use crate::cli::output::HumanLayout;
use crate::error::Result;
use crate::install::{CheckStatus, check_updates};

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Skills or tracked repos to check (default: all)
    pub names: Vec<String>,
}

pub fn run(ctx: &mut AppContext, args: &CheckArgs) -> Result<()> {
    let spinner = if ctx.robot_mode {
        ProgressBar::hidden()
    } else {
        ProgressBar::new_spinner()
    };
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message("checking for updates");
    spinner.enable_steady_tick(Duration::from_millis(100));
    let report = check_updates(&ctx.config.source, &args.names);
    spinner.finish_and_clear();
    let report = report?;

    emit(ctx, &report, |report| {
        let mut layout = HumanLayout::new();
        layout.title("check");
        if report.is_empty() {
            layout.push_line("No tracked repos or installed skills to check.");
            layout.push_line("Use `skillshare install <repo> --track` to track a repository.");
            return layout;
        }
        if !report.tracked_repos.is_empty() {
            layout.section("Tracked repos");
            for repo in &report.tracked_repos {
                let (verb, detail) = match repo.status {
                    CheckStatus::Behind => ("update", format!("{} commit(s) behind", repo.behind)),
                    CheckStatus::Dirty => ("skipped", "has uncommitted changes".to_string()),
                    CheckStatus::Error => ("error", repo.message.clone().unwrap_or_default()),
                    _ => ("ok", "up to date".to_string()),
                };
                layout.action(verb, &format!("{} ({detail})", repo.name));
            }
            layout.blank();
        }
        if !report.skills.is_empty() {
            layout.section("Installed skills");
            for skill in &report.skills {
                let (verb, detail) = match skill.status {
                    CheckStatus::UpdateAvailable => ("update", "update available"),
                    CheckStatus::Local => ("ok", "local source"),
                    CheckStatus::Error => ("error", "cannot reach remote"),
                    _ => ("ok", "up to date"),
                };
                layout.action(verb, &format!("{} ({detail}) {}", skill.name, skill.source));
            }
            layout.blank();
        }
        match report.updatable() {
            0 => layout.push_line("Everything is up to date."),
            n => layout.push_line(format!(
                "{n} update(s) available. Run `skillshare update <name>` or `skillshare update --all`."
            )),
        };
        layout
    })
}
