//! skillshare log - Show the operation or audit log

use chrono::Utc;
use clap::Args;
use colored::Colorize;
use serde_json::json;

use crate::app::AppContext;
use crate::cli::commands::emit;
use crate::cli::output::HumanLayout;
use crate::error::Result;
use crate::storage::oplog::{LogKind, LogQuery, parse_since};

#[derive(Args, Debug)]
pub struct LogArgs {
    /// Show the audit log instead of the operation log
    #[arg(long)]
    pub audit: bool,

    /// Maximum entries to show, newest first
    #[arg(long, short = 'n', default_value = "20")]
    pub limit: usize,

    /// Only entries for this command
    #[arg(long)]
    pub cmd: Option<String>,

    /// Only entries with this status (ok, error, partial, blocked)
    #[arg(long)]
    pub status: Option<String>,

    /// Only entries newer than a duration (30m, 2h, 7d) or RFC 3339 time
    #[arg(long)]
    pub since: Option<String>,

    /// Delete the log file
    #[arg(long)]
    pub clear: bool,
}

pub fn run(ctx: &mut AppContext, args: &LogArgs) -> Result<()> {
    let kind = if args.audit { LogKind::Audit } else { LogKind::Ops };
    let log = ctx.oplog();

    if args.clear {
        log.clear(kind)?;
        let data = json!({ "cleared": kind.file_name() });
        return emit(ctx, &data, |_| {
            let mut layout = HumanLayout::new();
            layout.push_line(format!("Cleared {}.", kind.file_name()));
            layout
        });
    }

    let query = LogQuery {
        limit: Some(args.limit),
        cmd: args.cmd.clone(),
        status: args.status.clone(),
        since: args.since.as_deref().map(|s| parse_since(s, Utc::now())).transpose()?,
    };
    let page = log.read(kind, &query)?;

    emit(ctx, &page, |page| {
        let mut layout = HumanLayout::new();
        layout.title(&format!("{} of {} entries", page.entries.len(), page.total));
        for entry in &page.entries {
            let status = match entry.status.as_str() {
                "ok" => entry.status.green().to_string(),
                "partial" => entry.status.yellow().to_string(),
                _ => entry.status.red().to_string(),
            };
            let mut line = format!(
                "{}  {:<10} {status}",
                entry.ts.format("%Y-%m-%d %H:%M:%S"),
                entry.cmd
            );
            if let Some(ms) = entry.ms {
                line.push_str(&format!(" {}", format!("{ms}ms").dimmed()));
            }
            if let Some(msg) = &entry.msg {
                line.push_str(&format!("  {msg}"));
            }
            layout.push_line(line);
        }
        layout
    })
}
