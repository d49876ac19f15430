//! skillshare target - Manage sync targets

use clap::{Args, Subcommand};
use colored::Colorize;
use serde_json::json;

use crate::app::AppContext;
use crate::cli::commands::{emit, mutate};
use crate::cli::output::HumanLayout;
use crate::config::SyncMode;
use crate::error::{Result, SkillshareError};
use crate::targets::{self, TargetUpdate, known_targets};

#[derive(Args, Debug)]
pub struct TargetArgs {
    #[command(subcommand)]
    pub command: Option<TargetCommand>,
}

#[derive(Subcommand, Debug)]
pub enum TargetCommand {
    /// List configured targets with status
    List,

    /// Add a target; the path defaults to the known location for that name
    Add {
        name: String,
        path: Option<String>,
        /// Sync mode override for this target
        #[arg(long)]
        mode: Option<SyncMode>,
    },

    /// Remove a target, leaving its directory usable
    Remove { name: String },

    /// Change mode or include/exclude filters
    Update {
        name: String,
        /// Glob of skills to include (repeatable)
        #[arg(long = "include")]
        include: Vec<String>,
        /// Glob of skills to exclude (repeatable)
        #[arg(long = "exclude")]
        exclude: Vec<String>,
        #[arg(long)]
        mode: Option<SyncMode>,
        /// Drop all include/exclude patterns
        #[arg(long)]
        clear_filters: bool,
    },

    /// Show well-known agent CLIs and whether they are configured
    Available,
}

pub fn run(ctx: &mut AppContext, args: &TargetArgs) -> Result<()> {
    match args.command.as_ref().unwrap_or(&TargetCommand::List) {
        TargetCommand::List => list(ctx),
        TargetCommand::Add { name, path, mode } => add(ctx, name, path.as_deref(), *mode),
        TargetCommand::Remove { name } => remove(ctx, name),
        TargetCommand::Update {
            name,
            include,
            exclude,
            mode,
            clear_filters,
        } => {
            let patch = TargetUpdate {
                include: filter_patch(include, *clear_filters),
                exclude: filter_patch(exclude, *clear_filters),
                mode: *mode,
            };
            update(ctx, name, patch)
        }
        TargetCommand::Available => available(ctx),
    }
}

fn filter_patch(values: &[String], clear: bool) -> Option<Vec<String>> {
    if clear {
        Some(Vec::new())
    } else if values.is_empty() {
        None
    } else {
        Some(values.to_vec())
    }
}

fn list(ctx: &AppContext) -> Result<()> {
    let skills = ctx.skills()?;
    let list = targets::list(&ctx.config, &skills)?;
    emit(ctx, &list, |list| {
        let mut layout = HumanLayout::new();
        layout.title(&format!("{} targets", list.targets.len()));
        for target in &list.targets {
            layout.push_line(format!("{} ({}, {})", target.name.bold(), target.mode, target.status));
            layout.kv("  path", &target.path);
            if !target.include.is_empty() {
                layout.kv("  include", &target.include.join(", "));
            }
            if !target.exclude.is_empty() {
                layout.kv("  exclude", &target.exclude.join(", "));
            }
        }
        layout
    })
}

fn add(ctx: &mut AppContext, name: &str, path: Option<&str>, mode: Option<SyncMode>) -> Result<()> {
    let path = match path {
        Some(path) => path.to_string(),
        None => known_targets()
            .into_iter()
            .find(|known| known.name == name)
            .map(|known| known.path.display().to_string())
            .ok_or_else(|| {
                SkillshareError::InvalidInput(format!("unknown target {name}; pass a path"))
            })?,
    };

    let record = json!({ "name": name, "path": path });
    mutate(ctx, "target", record, |ctx| {
        targets::add(&mut ctx.config, name, &path, mode)?;
        ctx.save_config()
    })?;

    let data = json!({ "name": name, "path": path });
    emit(ctx, &data, |_| {
        let mut layout = HumanLayout::new();
        layout.action("added", &format!("target {name} -> {path}"));
        layout
    })
}

fn remove(ctx: &mut AppContext, name: &str) -> Result<()> {
    let removed = mutate(ctx, "target", json!({ "remove": name }), |ctx| {
        let removed = targets::remove(&mut ctx.config, name)?;
        ctx.save_config()?;
        Ok(removed)
    })?;

    emit(ctx, &removed, |removed| {
        let mut layout = HumanLayout::new();
        layout.action("removed", &format!("target {}", removed.name));
        if removed.unlinked > 0 {
            layout.bullet(&format!("{} skill links removed", removed.unlinked));
        }
        if removed.materialized {
            layout.bullet("symlinked directory replaced with a copy of the source");
        }
        layout
    })
}

fn update(ctx: &mut AppContext, name: &str, patch: TargetUpdate) -> Result<()> {
    let record = json!({
        "name": name,
        "include": patch.include,
        "exclude": patch.exclude,
        "mode": patch.mode,
    });
    mutate(ctx, "target", record, |ctx| {
        targets::update(&mut ctx.config, name, patch)?;
        ctx.save_config()
    })?;

    let tc = ctx.config.target(name)?;
    let data = json!({
        "name": name,
        "mode": ctx.config.mode_for(tc),
        "include": tc.include,
        "exclude": tc.exclude,
    });
    emit(ctx, &data, |_| {
        let mut layout = HumanLayout::new();
        layout.action("updated", &format!("target {name}"));
        layout.push_line("Run `skillshare sync` to apply.");
        layout
    })
}

fn available(ctx: &AppContext) -> Result<()> {
    let known = targets::available(&ctx.config);
    emit(ctx, &known, |known| {
        let mut layout = HumanLayout::new();
        layout.title("known targets");
        for target in known {
            let state = if target.installed {
                "configured".green().to_string()
            } else if target.detected {
                "detected".yellow().to_string()
            } else {
                "-".dimmed().to_string()
            };
            layout.push_line(format!("{:<14} {:<12} {}", target.name, state, target.path));
        }
        layout
    })
}
