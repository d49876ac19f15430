//! skillshare list - List skills in the source directory

use clap::Args;
use colored::Colorize;
use tracing::debug;

use crate::app::AppContext;
use crate::cli::commands::emit;
use crate::cli::output::HumanLayout;
use crate::error::Result;
use crate::store::SkillView;
use crate::utils::format::truncate_string;

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only show skills whose name contains this text
    pub pattern: Option<String>,

    /// Only show skills inside tracked repos
    #[arg(long)]
    pub repos: bool,
}

pub fn run(ctx: &mut AppContext, args: &ListArgs) -> Result<()> {
    let needle = args.pattern.as_deref().map(str::to_lowercase);
    let views: Vec<SkillView> = ctx
        .skills()?
        .iter()
        .filter(|skill| !args.repos || skill.is_in_repo)
        .filter(|skill| {
            needle
                .as_deref()
                .is_none_or(|needle| skill.rel_path.to_lowercase().contains(needle))
        })
        .map(SkillView::from)
        .collect();
    debug!(count = views.len(), "listing skills");

    emit(ctx, &views, |views| {
        let mut layout = HumanLayout::new();
        layout.title(&format!("{} skills", views.len()));
        for view in views {
            let origin = match (&view.source, view.is_in_repo) {
                (_, true) => "tracked".cyan().to_string(),
                (Some(source), false) => truncate_string(source, 48).dimmed().to_string(),
                (None, false) => "local".dimmed().to_string(),
            };
            layout.push_line(format!("{:<32} {origin}", view.rel_path));
        }
        layout
    })
}
