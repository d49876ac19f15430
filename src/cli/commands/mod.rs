//! CLI command implementations
//!
//! Each subcommand has its own module with:
//! - Args struct for command-line arguments
//! - run() function to execute the command

use std::time::Instant;

use clap::Subcommand;
use serde::Serialize;

pub mod audit;
pub mod backup;
pub mod check;
pub mod collect;
pub mod completions;
pub mod delete;
pub mod diff;
pub mod doctor;
pub mod init;
pub mod install;
pub mod list;
pub mod log;
pub mod pull;
pub mod push;
pub mod restore;
pub mod status;
pub mod sync;
pub mod target;
pub mod trash;
pub mod ui;
pub mod update;

use crate::app::AppContext;
use crate::cli::output::{self, HumanLayout};
use crate::error::Result;

pub fn run(ctx: &mut AppContext, command: &Commands) -> Result<()> {
    match command {
        Commands::Init(args) => init::run(ctx, args),
        Commands::Status(args) => status::run(ctx, args),
        Commands::Doctor(args) => doctor::run(ctx, args),
        Commands::List(args) => list::run(ctx, args),
        Commands::Target(args) => target::run(ctx, args),
        Commands::Sync(args) => sync::run(ctx, args),
        Commands::Diff(args) => diff::run(ctx, args),
        Commands::Collect(args) => collect::run(ctx, args),
        Commands::Backup(args) => backup::run(ctx, args),
        Commands::Restore(args) => restore::run(ctx, args),
        Commands::Delete(args) => delete::run(ctx, args),
        Commands::Trash(args) => trash::run(ctx, args),
        Commands::Install(args) => install::run(ctx, args),
        Commands::Update(args) => update::run(ctx, args),
        Commands::Check(args) => check::run(ctx, args),
        Commands::Audit(args) => audit::run(ctx, args),
        Commands::Push(args) => push::run(ctx, args),
        Commands::Pull(args) => pull::run(ctx, args),
        Commands::Log(args) => log::run(ctx, args),
        Commands::Ui(args) => ui::run(ctx, args),
        Commands::Completions(args) => completions::run(args),
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the data root, source directory and config
    Init(init::InitArgs),

    /// Show source, targets and git state
    Status(status::StatusArgs),

    /// Check the environment, source and targets for problems
    Doctor(doctor::DoctorArgs),

    /// List skills in the source directory
    List(list::ListArgs),

    /// Manage sync targets
    Target(target::TargetArgs),

    /// Reconcile every target with the source
    Sync(sync::SyncArgs),

    /// Show what a sync would change
    Diff(diff::DiffArgs),

    /// Copy local skills from targets back into the source
    Collect(collect::CollectArgs),

    /// Snapshot target directories
    Backup(backup::BackupArgs),

    /// Restore a target from a backup
    Restore(restore::RestoreArgs),

    /// Move a skill or tracked repo to the trash
    Delete(delete::DeleteArgs),

    /// Inspect and restore trashed skills
    Trash(trash::TrashArgs),

    /// Install skills from a git repository or local directory
    Install(install::InstallArgs),

    /// Update installed skills and tracked repos
    Update(update::UpdateArgs),

    /// Show which tracked repos and installed skills have updates
    Check(check::CheckArgs),

    /// Scan skills for risky content
    Audit(audit::AuditArgs),

    /// Commit and push the source directory
    Push(push::PushArgs),

    /// Pull the source directory and sync
    Pull(pull::PullArgs),

    /// Show the operation log
    Log(log::LogArgs),

    /// Serve the JSON API and open the web UI
    Ui(ui::UiArgs),

    /// Generate shell completions
    Completions(completions::CompletionsArgs),
}

/// Run a mutation under the source lock and record it in the operation log.
pub(crate) fn mutate<T>(
    ctx: &mut AppContext,
    cmd: &str,
    args: serde_json::Value,
    f: impl FnOnce(&mut AppContext) -> Result<T>,
) -> Result<T> {
    let started = Instant::now();
    let outcome = match ctx.lock() {
        Ok(lock) => {
            let outcome = f(ctx);
            drop(lock);
            outcome
        }
        Err(err) => Err(err),
    };
    ctx.record(cmd, started, args, &outcome);
    outcome
}

/// Print `data` as a robot envelope or through the human renderer.
pub(crate) fn emit<T: Serialize>(ctx: &AppContext, data: &T, human: impl FnOnce(&T) -> HumanLayout) -> Result<()> {
    if ctx.robot_mode {
        output::emit_robot(&output::robot_ok(data))
    } else {
        output::emit_human(human(data));
        Ok(())
    }
}
