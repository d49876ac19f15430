//! skillshare init - Create the data root, source directory and config

use clap::Args;
use serde::Serialize;
use tracing::info;

use crate::app::AppContext;
use crate::cli::commands::emit;
use crate::cli::output::HumanLayout;
use crate::config::{SyncMode, TargetConfig};
use crate::error::{Result, SkillshareError};
use crate::targets::known_targets;
use crate::utils::fs::{absolutize, ensure_dir, expand_tilde};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Source directory for skills (default: <root>/skills)
    #[arg(long)]
    pub source: Option<String>,

    /// Default sync mode for targets: merge, copy or symlink
    #[arg(long)]
    pub mode: Option<SyncMode>,

    /// Do not add detected agent CLIs as targets
    #[arg(long)]
    pub no_detect: bool,

    /// Overwrite an existing config
    #[arg(long, short)]
    pub force: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InitReport {
    root: String,
    config_path: String,
    source: String,
    targets: Vec<String>,
}

pub fn run(ctx: &mut AppContext, args: &InitArgs) -> Result<()> {
    if ctx.config_path.exists() && !args.force {
        return Err(SkillshareError::Conflict(format!(
            "already initialized: {} (use --force to overwrite)",
            ctx.config_path.display()
        )));
    }

    ensure_dir(&ctx.root)?;
    if let Some(source) = &args.source {
        ctx.config.source = absolutize(&expand_tilde(source));
    }
    if let Some(mode) = args.mode {
        ctx.config.mode = mode;
    }
    ensure_dir(&ctx.config.source)?;

    if !args.no_detect {
        for known in known_targets().into_iter().filter(|k| k.detected()) {
            ctx.config
                .targets
                .entry(known.name.to_string())
                .or_insert_with(|| TargetConfig::new(known.path.clone()));
        }
    }
    ctx.save_config()?;
    info!(root = %ctx.root.display(), targets = ctx.config.targets.len(), "initialized");

    let report = InitReport {
        root: ctx.root.display().to_string(),
        config_path: ctx.config_path.display().to_string(),
        source: ctx.config.source.display().to_string(),
        targets: ctx.config.targets.keys().cloned().collect(),
    };
    emit(ctx, &report, |report| {
        let mut layout = HumanLayout::new();
        layout
            .title("skillshare initialized")
            .kv("Root", &report.root)
            .kv("Config", &report.config_path)
            .kv("Source", &report.source);
        if report.targets.is_empty() {
            layout.blank().push_line("No agent CLIs detected; add one with `skillshare target add`.");
        } else {
            layout.blank().section("Targets");
            for name in &report.targets {
                layout.bullet(name);
            }
            layout.blank().push_line("Run `skillshare sync` to link your skills.");
        }
        layout
    })
}
