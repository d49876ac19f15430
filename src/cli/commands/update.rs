//! skillshare update - Re-install skills and pull tracked repos

use clap::Args;
use serde_json::json;

use crate::app::AppContext;
use crate::cli::commands::{emit, mutate};
use crate::cli::output::HumanLayout;
use crate::error::{Result, SkillshareError};
use crate::install::UpdateOptions;

#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Skill or tracked repo to update
    pub name: Option<String>,

    /// Update every installed skill and tracked repo
    #[arg(long, conflicts_with = "name")]
    pub all: bool,

    /// Discard local changes in tracked repos
    #[arg(long, short)]
    pub force: bool,
}

pub fn run(ctx: &mut AppContext, args: &UpdateArgs) -> Result<()> {
    if args.name.is_none() && !args.all {
        return Err(SkillshareError::InvalidInput(
            "name a skill or repo to update, or pass --all".to_string(),
        ));
    }

    let opts = UpdateOptions {
        name: args.name.clone(),
        all: args.all,
        force: args.force,
    };
    let record = json!({ "name": args.name, "all": args.all, "force": args.force });
    let report = mutate(ctx, "update", record, |ctx| {
        let scanner = ctx.scanner()?;
        ctx.installer(&scanner).update(&opts)
    })?;

    emit(ctx, &report, |report| {
        let mut layout = HumanLayout::new();
        layout.title("update");
        if report.results.is_empty() {
            layout.push_line("Nothing to update.");
        }
        for item in &report.results {
            let text = match &item.message {
                Some(message) => format!("{} ({message})", item.name),
                None => item.name.clone(),
            };
            layout.action(&item.action, &text);
        }
        layout
    })
}
