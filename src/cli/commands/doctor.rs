//! skillshare doctor - Check the environment, source and targets

use clap::Args;
use colored::Colorize;

use crate::app::AppContext;
use crate::cli::commands::emit;
use crate::cli::output::HumanLayout;
use crate::doctor::{Health, diagnose};
use crate::error::Result;

#[derive(Args, Debug)]
pub struct DoctorArgs {
    /// Also show informational findings
    #[arg(long)]
    pub verbose: bool,
}

pub fn run(ctx: &mut AppContext, args: &DoctorArgs) -> Result<()> {
    let report = diagnose(ctx);
    let verbose = args.verbose || ctx.verbosity > 0;

    emit(ctx, &report, |report| {
        let mut layout = HumanLayout::new();
        layout.title("skillshare doctor");
        for finding in &report.checks {
            let marker = match finding.health {
                Health::Ok => "✓".green(),
                Health::Info if verbose => "·".dimmed(),
                Health::Info => continue,
                Health::Warning => "!".yellow(),
                Health::Error => "✗".red(),
            };
            layout.push_line(format!("{marker} {:<16} {}", finding.area, finding.message));
        }
        layout.blank();
        let summary = match (report.errors, report.warnings) {
            (0, 0) => "All checks passed.".green().to_string(),
            (0, warnings) => format!("{warnings} warning(s)").yellow().to_string(),
            (errors, warnings) => format!("{errors} error(s), {warnings} warning(s)").red().to_string(),
        };
        layout.push_line(summary);
        layout
    })
}
