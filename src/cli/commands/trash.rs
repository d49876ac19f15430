//! skillshare trash - Inspect and restore trashed skills

use clap::{Args, Subcommand};
use serde_json::json;

use crate::app::AppContext;
use crate::cli::commands::{emit, mutate};
use crate::cli::output::HumanLayout;
use crate::error::Result;
use crate::utils::clock::SystemClock;
use crate::utils::format::format_size;

#[derive(Args, Debug)]
pub struct TrashArgs {
    #[command(subcommand)]
    pub command: Option<TrashCommand>,
}

#[derive(Subcommand, Debug)]
pub enum TrashCommand {
    /// List trashed entries, newest first
    List,
    /// Move an entry back into the source
    Restore {
        name: String,
        /// Trash the existing skill at the destination first
        #[arg(long, short)]
        force: bool,
    },
    /// Permanently delete one entry
    Delete { name: String },
    /// Permanently delete everything in the trash
    Empty,
}

pub fn run(ctx: &mut AppContext, args: &TrashArgs) -> Result<()> {
    match args.command.as_ref().unwrap_or(&TrashCommand::List) {
        TrashCommand::List => list(ctx),
        TrashCommand::Restore { name, force } => restore(ctx, name, *force),
        TrashCommand::Delete { name } => delete(ctx, name),
        TrashCommand::Empty => empty(ctx),
    }
}

fn list(ctx: &mut AppContext) -> Result<()> {
    let ttl = ctx.config.trash.ttl_days;
    let list = mutate(ctx, "trash", json!({ "list": true }), |ctx| {
        Ok(ctx.trash().list(ttl, &SystemClock))
    })?;

    emit(ctx, &list, |list| {
        let mut layout = HumanLayout::new();
        layout.title(&format!("{} in trash ({})", list.items.len(), format_size(list.total_size)));
        for item in &list.items {
            layout.bullet(&format!("{:<28} {}  {}", item.name, item.timestamp, format_size(item.size)));
        }
        layout
    })
}

fn restore(ctx: &mut AppContext, name: &str, force: bool) -> Result<()> {
    let entry = mutate(ctx, "trash", json!({ "restore": name, "force": force }), |ctx| {
        ctx.trash().restore(name, &ctx.config.source, force, &SystemClock)
    })?;
    emit(ctx, &entry, |entry| {
        let mut layout = HumanLayout::new();
        layout.action("restored", &entry.name);
        layout.push_line("Run `skillshare sync` to distribute it.");
        layout
    })
}

fn delete(ctx: &mut AppContext, name: &str) -> Result<()> {
    let entry = mutate(ctx, "trash", json!({ "delete": name }), |ctx| ctx.trash().delete(name))?;
    emit(ctx, &entry, |entry| {
        let mut layout = HumanLayout::new();
        layout.action("removed", &format!("{} permanently", entry.entry_name));
        layout
    })
}

fn empty(ctx: &mut AppContext) -> Result<()> {
    let removed = mutate(ctx, "trash", json!({ "empty": true }), |ctx| ctx.trash().empty())?;
    let data = json!({ "removed": removed });
    emit(ctx, &data, |_| {
        let mut layout = HumanLayout::new();
        layout.push_line(format!("Removed {removed} entries from trash."));
        layout
    })
}
