//! skillshare pull - Pull the source directory and sync every target

use clap::Args;
use serde_json::json;

use crate::app::AppContext;
use crate::cli::commands::sync::render_results;
use crate::cli::commands::{emit, mutate};
use crate::cli::output::HumanLayout;
use crate::error::Result;
use crate::remote::{self, PullRequest};

#[derive(Args, Debug)]
pub struct PullArgs {
    /// Check whether a pull could run without changing anything
    #[arg(long)]
    pub dry_run: bool,
}

pub fn run(ctx: &mut AppContext, args: &PullArgs) -> Result<()> {
    let request = PullRequest { dry_run: args.dry_run };
    let result = if args.dry_run {
        remote::pull(&ctx.config, &request)?
    } else {
        mutate(ctx, "pull", json!({}), |ctx| remote::pull(&ctx.config, &request))?
    };

    emit(ctx, &result, |result| {
        let mut layout = HumanLayout::new();
        if let Some(message) = &result.message {
            layout.push_line(message.clone());
        }
        if result.dry_run {
            return layout;
        }
        if result.up_to_date {
            layout.push_line("Already up to date.");
        } else {
            layout.title(&format!(
                "pulled {} commits ({} files, +{} -{})",
                result.commits.len(),
                result.stats.files_changed,
                result.stats.insertions,
                result.stats.deletions
            ));
            for commit in &result.commits {
                layout.bullet(&format!("{} {}", commit.hash, commit.message));
            }
        }
        layout.blank();
        render_results(&mut layout, &result.sync_results);
        layout
    })
}
