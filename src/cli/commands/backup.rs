//! skillshare backup - Snapshot target directories

use clap::{Args, Subcommand};
use serde_json::json;

use crate::app::AppContext;
use crate::cli::commands::{emit, mutate};
use crate::cli::output::HumanLayout;
use crate::error::Result;
use crate::utils::clock::SystemClock;

#[derive(Args, Debug)]
pub struct BackupArgs {
    #[command(subcommand)]
    pub command: Option<BackupCommand>,

    /// Only back up this target (when no subcommand is given)
    #[arg(long, short)]
    pub target: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum BackupCommand {
    /// Snapshot every target (or one)
    Create {
        #[arg(long, short)]
        target: Option<String>,
    },
    /// List snapshots, newest first
    List,
    /// Apply the retention policy from config
    Cleanup,
}

pub fn run(ctx: &mut AppContext, args: &BackupArgs) -> Result<()> {
    match &args.command {
        None => create(ctx, args.target.as_deref()),
        Some(BackupCommand::Create { target }) => create(ctx, target.as_deref().or(args.target.as_deref())),
        Some(BackupCommand::List) => list(ctx),
        Some(BackupCommand::Cleanup) => cleanup(ctx),
    }
}

fn create(ctx: &mut AppContext, target: Option<&str>) -> Result<()> {
    let created = mutate(ctx, "backup", json!({ "target": target }), |ctx| {
        ctx.backups().create(&ctx.config, target, &SystemClock)
    })?;

    emit(ctx, &created, |created| {
        let mut layout = HumanLayout::new();
        match &created.timestamp {
            Some(ts) => {
                layout.title(&format!("backup {ts}"));
                for name in &created.backed_up_targets {
                    layout.action("saved", name);
                }
            }
            None => {
                layout.push_line("Nothing to back up.");
            }
        }
        layout
    })
}

fn list(ctx: &AppContext) -> Result<()> {
    let list = ctx.backups().list()?;
    emit(ctx, &list, |list| {
        let mut layout = HumanLayout::new();
        layout.title(&format!("{} backups ({:.1} MB)", list.backups.len(), list.total_size_mb));
        for backup in &list.backups {
            layout.bullet(&format!(
                "{}  {:>7.1} MB  {}",
                backup.timestamp,
                backup.size_mb,
                backup.targets.join(", ")
            ));
        }
        layout
    })
}

fn cleanup(ctx: &mut AppContext) -> Result<()> {
    let removed = mutate(ctx, "backup", json!({ "cleanup": true }), |ctx| {
        ctx.backups().cleanup(&ctx.config.backup, &SystemClock)
    })?;
    let data = json!({ "removed": removed.len(), "timestamps": removed });
    emit(ctx, &data, |_| {
        let mut layout = HumanLayout::new();
        layout.title(&format!("removed {} backups", removed.len()));
        for ts in &removed {
            layout.action("removed", ts);
        }
        layout
    })
}
