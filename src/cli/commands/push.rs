//! skillshare push - Commit and push the source directory

use clap::Args;
use serde_json::json;

use crate::app::AppContext;
use crate::cli::commands::{emit, mutate};
use crate::cli::output::HumanLayout;
use crate::error::Result;
use crate::remote::{self, PushRequest};

#[derive(Args, Debug)]
pub struct PushArgs {
    /// Commit message
    #[arg(long, short)]
    pub message: Option<String>,

    /// Show what would be committed
    #[arg(long)]
    pub dry_run: bool,
}

pub fn run(ctx: &mut AppContext, args: &PushArgs) -> Result<()> {
    let request = PushRequest {
        message: args.message.clone(),
        dry_run: args.dry_run,
    };
    let result = if args.dry_run {
        remote::push(&ctx.config, &request)?
    } else {
        mutate(ctx, "push", json!({ "message": args.message }), |ctx| {
            remote::push(&ctx.config, &request)
        })?
    };

    emit(ctx, &result, |result| {
        let mut layout = HumanLayout::new();
        layout.push_line(result.message.clone());
        layout
    })
}
