//! skillshare restore - Restore a target from a backup

use clap::Args;
use serde_json::json;

use crate::app::AppContext;
use crate::cli::commands::{emit, mutate};
use crate::cli::output::HumanLayout;
use crate::error::Result;

#[derive(Args, Debug)]
pub struct RestoreArgs {
    /// Target to restore
    pub target: String,

    /// Backup timestamp (default: newest backup containing the target)
    #[arg(long)]
    pub from: Option<String>,

    /// Replace a non-empty target directory
    #[arg(long, short)]
    pub force: bool,
}

pub fn run(ctx: &mut AppContext, args: &RestoreArgs) -> Result<()> {
    let record = json!({ "target": args.target, "from": args.from, "force": args.force });
    let timestamp = mutate(ctx, "restore", record, |ctx| {
        ctx.backups()
            .restore(&ctx.config, &args.target, args.from.as_deref(), args.force)
    })?;

    let data = json!({ "target": args.target, "timestamp": timestamp });
    emit(ctx, &data, |_| {
        let mut layout = HumanLayout::new();
        layout.action("restored", &format!("{} from backup {timestamp}", args.target));
        layout
    })
}
