//! skillshare install - Install skills from a git repository or local directory

use clap::Args;
use colored::Colorize;
use serde_json::json;

use crate::app::AppContext;
use crate::cli::commands::{emit, mutate};
use crate::cli::output::{self, HumanLayout};
use crate::error::Result;
use crate::install::{self, BatchOptions, BatchResult, InstallOptions};

#[derive(Args, Debug)]
pub struct InstallArgs {
    /// owner/repo, git URL (optionally with /tree/<branch>/<path>) or local path
    pub source: String,

    /// Install under a different name (single-skill sources only)
    #[arg(long)]
    pub name: Option<String>,

    /// Overwrite existing skills and install despite audit findings
    #[arg(long, short)]
    pub force: bool,

    /// Do not run the security audit
    #[arg(long)]
    pub skip_audit: bool,

    /// Clone the whole repository as a tracked repo
    #[arg(long)]
    pub track: bool,

    /// Install below this subdirectory of the source
    #[arg(long)]
    pub into: Option<String>,

    /// Install only these skills from a multi-skill source (repeatable)
    #[arg(long = "skill", short = 's', conflicts_with_all = ["name", "track"])]
    pub skills: Vec<String>,

    /// List the skills a source provides without installing
    #[arg(long)]
    pub list: bool,
}

pub fn run(ctx: &mut AppContext, args: &InstallArgs) -> Result<()> {
    if args.list {
        return discover(ctx, &args.source);
    }
    if !args.skills.is_empty() {
        return batch(ctx, args);
    }

    let opts = InstallOptions {
        source: args.source.clone(),
        name: args.name.clone(),
        force: args.force,
        skip_audit: args.skip_audit,
        track: args.track,
        into: args.into.clone(),
    };
    let record = json!({ "source": args.source, "track": args.track, "force": args.force });
    let result = mutate(ctx, "install", record, |ctx| {
        let scanner = ctx.scanner()?;
        ctx.installer(&scanner).install(&opts)
    })?;

    emit(ctx, &result, |result| {
        let mut layout = HumanLayout::new();
        let name = result
            .repo_name
            .as_deref()
            .or(result.skill_name.as_deref())
            .unwrap_or(&args.source);
        layout.action(&result.action, name);
        if let Some(skills) = &result.skills {
            for skill in skills {
                layout.bullet(skill);
            }
        }
        for warning in &result.warnings {
            layout.warning(warning);
        }
        layout.blank().push_line("Run `skillshare sync` to distribute.");
        layout
    })
}

fn discover(ctx: &AppContext, source: &str) -> Result<()> {
    let found = install::discover(source)?;
    emit(ctx, &found, |found| {
        let mut layout = HumanLayout::new();
        layout.title(&format!("{} skills in {}", found.skills.len(), found.source.raw));
        for skill in &found.skills {
            layout.push_line(format!("{:<28} {}", skill.name, skill.path.dimmed()));
        }
        layout
    })
}

fn batch(ctx: &mut AppContext, args: &InstallArgs) -> Result<()> {
    let opts = BatchOptions {
        source: args.source.clone(),
        skills: args.skills.clone(),
        force: args.force,
        skip_audit: args.skip_audit,
        into: args.into.clone(),
    };
    let record = json!({ "source": args.source, "skills": args.skills });
    let result = mutate(ctx, "install", record, |ctx| {
        let scanner = ctx.scanner()?;
        ctx.installer(&scanner).install_batch(&opts)
    })?;

    if ctx.robot_mode {
        let failed = result.results.iter().filter(|item| item.error.is_some()).count();
        let completed = result.results.len() - failed;
        return output::emit_robot(&output::robot_partial(&result, completed, failed));
    }
    output::emit_human(render_batch(&result));
    Ok(())
}

fn render_batch(result: &BatchResult) -> HumanLayout {
    let mut layout = HumanLayout::new();
    layout.title(&result.summary);
    for item in &result.results {
        match (&item.error, &item.action) {
            (Some(err), _) => layout.action("failed", &format!("{}: {err}", item.name)),
            (None, Some(action)) => layout.action(action, &item.name),
            (None, None) => layout.bullet(&item.name),
        };
        for warning in &item.warnings {
            layout.warning(warning);
        }
    }
    layout
}
