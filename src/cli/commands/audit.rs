//! skillshare audit - Scan skills for risky content

use std::time::Instant;

use clap::Args;
use colored::Colorize;
use serde_json::json;

use crate::app::AppContext;
use crate::audit::{self, AuditReport, AuditResult, AuditSummary, Severity};
use crate::cli::commands::emit;
use crate::cli::output::{self, HumanLayout};
use crate::error::{Result, SkillshareError};
use crate::storage::oplog::{LogEntry, LogKind};
use crate::store::find_skill;

#[derive(Args, Debug)]
pub struct AuditArgs {
    /// Audit a single skill
    pub name: Option<String>,

    /// Block threshold for this run: CRITICAL, HIGH, MEDIUM, LOW or INFO
    #[arg(long)]
    pub threshold: Option<Severity>,

    /// Write a starter rules override file and exit
    #[arg(long)]
    pub init_rules: bool,
}

pub fn run(ctx: &mut AppContext, args: &AuditArgs) -> Result<()> {
    if args.init_rules {
        let path = ctx.audit_rules_path();
        audit::init_rules_file(&path)?;
        let data = json!({ "path": path.display().to_string() });
        return emit(ctx, &data, |_| {
            let mut layout = HumanLayout::new();
            layout.action("created", &path.display().to_string());
            layout
        });
    }

    let started = Instant::now();
    let threshold = args.threshold.unwrap_or_else(|| ctx.threshold());
    let scanner = ctx.scanner()?;
    let skills = ctx.skills()?;
    let report = match &args.name {
        Some(name) => {
            let skill = find_skill(&skills, name)?;
            let result = audit::audit_skill(&scanner, &skill.source_path, &skill.flat_name, threshold)?;
            let summary = AuditSummary::from_results(std::slice::from_ref(&result), threshold, 0);
            AuditReport {
                results: vec![result],
                summary,
            }
        }
        None => audit::audit_all(&scanner, &skills, threshold),
    };

    let summary = &report.summary;
    let status = if summary.failed > 0 { "blocked" } else { "ok" };
    let entry = LogEntry::new("audit", status, started)
        .with_args(json!({ "name": args.name, "threshold": threshold }))
        .with_msg(format!(
            "{} scanned, {} failed, {} warning",
            summary.total, summary.failed, summary.warning
        ));
    ctx.oplog().record(LogKind::Audit, &entry);

    if ctx.robot_mode {
        let completed = summary.total - summary.failed;
        return output::emit_robot(&output::robot_partial(&report, completed, summary.failed));
    }

    output::emit_human(render(&report));
    if summary.failed > 0 {
        return Err(SkillshareError::AuditBlocked(format!(
            "{} of {} skills blocked at threshold {threshold}",
            summary.failed, summary.total
        )));
    }
    Ok(())
}

fn render(report: &AuditReport) -> HumanLayout {
    let mut layout = HumanLayout::new();
    layout.title("audit");
    for result in report.results.iter().filter(|r| !r.findings.is_empty()) {
        render_result(&mut layout, result);
    }

    let s = &report.summary;
    layout
        .section("Summary")
        .kv("Scanned", &s.total.to_string())
        .kv("Passed", &s.passed.to_string().green().to_string())
        .kv("Warning", &s.warning.to_string().yellow().to_string())
        .kv("Failed", &s.failed.to_string().red().to_string())
        .kv("Threshold", s.threshold.as_str())
        .kv("Max risk", &format!("{} ({})", s.risk_label, s.risk_score));
    if s.scan_errors > 0 {
        layout.warning(&format!("{} skills could not be scanned", s.scan_errors));
    }
    layout
}

fn render_result(layout: &mut HumanLayout, result: &AuditResult) {
    let verdict = if result.is_blocked {
        "BLOCKED".red().bold().to_string()
    } else {
        "warn".yellow().to_string()
    };
    layout.push_line(format!(
        "{} {verdict} risk {} ({})",
        result.skill_name.bold(),
        result.risk_label,
        result.risk_score
    ));
    for finding in &result.findings {
        let severity = match finding.severity {
            Severity::Critical | Severity::High => finding.severity.as_str().red().to_string(),
            Severity::Medium => finding.severity.as_str().yellow().to_string(),
            Severity::Low | Severity::Info => finding.severity.as_str().dimmed().to_string(),
        };
        layout.push_line(format!(
            "  {severity:<10} {}:{} {}",
            finding.file, finding.line, finding.message
        ));
    }
    layout.blank();
}
