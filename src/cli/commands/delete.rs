//! skillshare delete - Move a skill or tracked repo to the trash

use clap::Args;
use serde_json::json;

use crate::app::AppContext;
use crate::cli::commands::{emit, mutate};
use crate::cli::output::HumanLayout;
use crate::error::Result;
use crate::trash::{delete_repo, delete_skill};
use crate::utils::clock::SystemClock;

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Skill name (nested or flat) or tracked repo name
    pub name: String,

    /// Delete a whole tracked repo
    #[arg(long)]
    pub repo: bool,
}

pub fn run(ctx: &mut AppContext, args: &DeleteArgs) -> Result<()> {
    let record = json!({ "name": args.name, "repo": args.repo });
    let (name, trashed) = mutate(ctx, "delete", record, |ctx| {
        let store = ctx.trash();
        if args.repo {
            delete_repo(&store, &ctx.config.source, &args.name, &SystemClock)
        } else {
            let skills = ctx.skills()?;
            delete_skill(&store, &ctx.config.source, &skills, &args.name, &SystemClock)
        }
    })?;

    let data = json!({ "name": name, "trashPath": trashed.display().to_string() });
    emit(ctx, &data, |_| {
        let mut layout = HumanLayout::new();
        layout.action("removed", &format!("{name} (moved to trash)"));
        layout.push_line("Run `skillshare sync` to drop it from targets.");
        layout
    })
}
