//! skillshare diff - Show what a sync would change

use clap::Args;
use colored::Colorize;

use crate::app::AppContext;
use crate::cli::commands::emit;
use crate::cli::output::HumanLayout;
use crate::error::Result;
use crate::sync::{self, DiffAction};

#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Only diff this target
    #[arg(long, short)]
    pub target: Option<String>,
}

pub fn run(ctx: &mut AppContext, args: &DiffArgs) -> Result<()> {
    let skills = ctx.skills()?;
    let diffs = sync::diff(&ctx.config, &skills, args.target.as_deref())?;

    emit(ctx, &diffs, |diffs| {
        let mut layout = HumanLayout::new();
        layout.title("diff");
        for target in diffs {
            layout.push_line(format!("{} ({})", target.target.bold(), target.mode));
            let pending: Vec<_> = target
                .items
                .iter()
                .filter(|item| item.action != DiffAction::Skip || !item.reason.is_empty())
                .collect();
            if pending.is_empty() {
                layout.push_line("  in sync".green().to_string());
            }
            for item in pending {
                let text = if item.reason.is_empty() {
                    item.skill.clone()
                } else {
                    format!("{} {}", item.skill, format!("({})", item.reason).dimmed())
                };
                layout.action(item.action.as_str(), &text);
            }
            for warning in &target.warnings {
                layout.warning(warning);
            }
        }
        layout
    })
}
