//! skillshare sync - Reconcile targets with the source directory

use clap::Args;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;

use crate::app::AppContext;
use crate::cli::commands::{emit, mutate};
use crate::cli::output::HumanLayout;
use crate::error::Result;
use crate::sync::{self, SyncResult, apply_plan, plan_targets};

#[derive(Args, Debug, Default)]
pub struct SyncArgs {
    /// Show what would change without touching targets
    #[arg(long)]
    pub dry_run: bool,

    /// Replace local entries that collide with source skills
    #[arg(long, short)]
    pub force: bool,

    /// Only sync this target
    #[arg(long, short)]
    pub target: Option<String>,
}

pub fn run(ctx: &mut AppContext, args: &SyncArgs) -> Result<()> {
    let results = if args.dry_run {
        let skills = ctx.skills()?;
        let opts = sync::SyncOptions {
            dry_run: true,
            force: args.force,
            target: args.target.clone(),
        };
        sync::sync(&ctx.config, &skills, &opts)?
    } else {
        let record = json!({ "target": args.target, "force": args.force });
        mutate(ctx, "sync", record, |ctx| apply_with_progress(ctx, args))?
    };

    emit(ctx, &results, |results| {
        let mut layout = HumanLayout::new();
        let title = if args.dry_run { "sync (dry run)" } else { "sync" };
        layout.title(title);
        render_results(&mut layout, results);
        layout
    })
}

fn apply_with_progress(ctx: &AppContext, args: &SyncArgs) -> Result<Vec<SyncResult>> {
    let skills = ctx.skills()?;
    let plans = plan_targets(&ctx.config, &skills, args.target.as_deref(), args.force)?;

    let pb = if ctx.robot_mode {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(plans.len() as u64)
    };
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );

    let mut results = Vec::with_capacity(plans.len());
    for plan in &plans {
        pb.set_message(plan.target.clone());
        results.push(apply_plan(plan));
        pb.inc(1);
    }
    pb.finish_and_clear();
    Ok(results)
}

/// Per-target summary lines shared by `sync` and `pull`.
pub(crate) fn render_results(layout: &mut HumanLayout, results: &[SyncResult]) {
    if results.is_empty() {
        layout.push_line("No targets configured.");
        return;
    }
    for result in results {
        let header = format!("{} ({})", result.target, result.mode);
        if result.broken {
            layout.push_line(format!("{} {}", header.bold(), "broken".red()));
        } else {
            layout.push_line(format!(
                "{}  {} linked, {} updated, {} skipped, {} pruned",
                header.bold(),
                result.linked.len(),
                result.updated.len(),
                result.skipped.len(),
                result.pruned.len()
            ));
        }
        for name in &result.updated {
            layout.action("updated", name);
        }
        for name in &result.pruned {
            layout.action("pruned", name);
        }
        for name in &result.skipped {
            layout.action("skipped", name);
        }
        for warning in &result.warnings {
            layout.warning(warning);
        }
    }
}
