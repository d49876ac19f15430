//! skillshare collect - Copy local skills from targets back into the source

use clap::Args;
use serde_json::json;

use crate::app::AppContext;
use crate::cli::commands::{emit, mutate};
use crate::cli::output::{self, HumanLayout};
use crate::collect::{self, CollectRequest, CollectResult, ScanResult};
use crate::error::{Result, SkillshareError};
use crate::utils::format::format_size;

#[derive(Args, Debug)]
pub struct CollectArgs {
    /// Only look at this target
    pub target: Option<String>,

    /// Skills to collect; without names (or --all) only lists candidates
    #[arg(long = "skill", short = 's')]
    pub skills: Vec<String>,

    /// Collect every local skill found
    #[arg(long, conflicts_with = "skills")]
    pub all: bool,

    /// Overwrite skills that already exist in the source
    #[arg(long, short)]
    pub force: bool,

    /// Show what would be collected
    #[arg(long)]
    pub dry_run: bool,
}

pub fn run(ctx: &mut AppContext, args: &CollectArgs) -> Result<()> {
    let scan = collect::scan(&ctx.config, args.target.as_deref())?;
    if args.skills.is_empty() && !args.all {
        return show_scan(ctx, &scan);
    }

    let requests = select(&scan, args)?;
    let result = if args.dry_run {
        collect::collect(&ctx.config, &requests, args.force, true)
    } else {
        let record = json!({
            "skills": requests.iter().map(|r| &r.name).collect::<Vec<_>>(),
            "force": args.force,
        });
        mutate(ctx, "collect", record, |ctx| {
            Ok(collect::collect(&ctx.config, &requests, args.force, false))
        })?
    };

    if ctx.robot_mode {
        let failed = result.failed.len();
        let completed = result.pulled.len() + result.skipped.len();
        return output::emit_robot(&output::robot_partial(&result, completed, failed));
    }
    output::emit_human(render_result(&result, args.dry_run));
    Ok(())
}

fn select(scan: &ScanResult, args: &CollectArgs) -> Result<Vec<CollectRequest>> {
    let found = scan.targets.iter().flat_map(|t| t.skills.iter());
    if args.all {
        return Ok(found
            .map(|s| CollectRequest {
                name: s.name.clone(),
                target_name: s.target_name.clone(),
            })
            .collect());
    }

    let candidates: Vec<_> = found.collect();
    args.skills
        .iter()
        .map(|name| {
            candidates
                .iter()
                .find(|s| &s.name == name)
                .map(|s| CollectRequest {
                    name: s.name.clone(),
                    target_name: s.target_name.clone(),
                })
                .ok_or_else(|| SkillshareError::NotFound(format!("local skill {name}")))
        })
        .collect()
}

fn show_scan(ctx: &AppContext, scan: &ScanResult) -> Result<()> {
    emit(ctx, scan, |scan| {
        let mut layout = HumanLayout::new();
        layout.title(&format!("{} local skills", scan.total_count));
        for target in scan.targets.iter().filter(|t| !t.skills.is_empty()) {
            layout.section(&target.target_name);
            for skill in &target.skills {
                layout.bullet(&format!("{} ({})", skill.name, format_size(skill.size)));
            }
            layout.blank();
        }
        if scan.total_count > 0 {
            layout.push_line("Collect with `skillshare collect --all` or `--skill <name>`.");
        }
        layout
    })
}

fn render_result(result: &CollectResult, dry_run: bool) -> HumanLayout {
    let mut layout = HumanLayout::new();
    layout.title(if dry_run { "collect (dry run)" } else { "collect" });
    for name in &result.pulled {
        layout.action("pulled", name);
    }
    for name in &result.skipped {
        layout.action("skipped", &format!("{name} (exists in source, use --force)"));
    }
    for (name, err) in &result.failed {
        layout.action("failed", &format!("{name}: {err}"));
    }
    if !dry_run && !result.pulled.is_empty() {
        layout.blank().push_line("Run `skillshare sync` to distribute them.");
    }
    layout
}
