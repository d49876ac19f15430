//! Security audit engine.
//!
//! Skills are scanned line by line against a regex rule set (built-in rules
//! plus an optional user override file). Findings roll up into a risk score,
//! a risk label and a block decision against the configured threshold.

pub mod rules;
pub mod scan;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, SkillshareError};
use crate::store::Skill;

pub use rules::{Rule, RuleSpec, RulesFile, init_rules_file, load_rules, read_rules_file, write_rules_file};
pub use scan::Scanner;

/// Severity of a finding. Declaration order is rank order (most severe first).
#[derive(
    Debug, Clone, Copy, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub enum Severity {
    #[default]
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl Severity {
    pub const ALL: [Self; 5] = [
        Self::Critical,
        Self::High,
        Self::Medium,
        Self::Low,
        Self::Info,
    ];

    /// Lower rank means more severe.
    #[must_use]
    pub const fn rank(self) -> u8 {
        self as u8
    }

    /// Contribution of one finding to the risk score.
    #[must_use]
    pub const fn weight(self) -> u32 {
        match self {
            Self::Critical => 25,
            Self::High => 15,
            Self::Medium => 8,
            Self::Low => 3,
            Self::Info => 1,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "CRITICAL",
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
            Self::Info => "INFO",
        }
    }

    /// Risk label at which a result is blocked for this threshold.
    #[must_use]
    pub const fn blocking_label(self) -> RiskLabel {
        match self {
            Self::Critical => RiskLabel::Critical,
            Self::High => RiskLabel::High,
            Self::Medium => RiskLabel::Medium,
            Self::Low | Self::Info => RiskLabel::Low,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = SkillshareError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_uppercase().as_str() {
            "CRITICAL" => Ok(Self::Critical),
            "HIGH" => Ok(Self::High),
            "MEDIUM" => Ok(Self::Medium),
            "LOW" => Ok(Self::Low),
            "INFO" => Ok(Self::Info),
            _ => Err(SkillshareError::InvalidInput(format!(
                "invalid severity {value:?} (expected CRITICAL|HIGH|MEDIUM|LOW|INFO)"
            ))),
        }
    }
}

impl TryFrom<String> for Severity {
    type Error = SkillshareError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Severity> for String {
    fn from(value: Severity) -> Self {
        value.as_str().to_string()
    }
}

/// Bucketed risk score.
#[derive(
    Debug, Clone, Copy, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum RiskLabel {
    #[default]
    Clean,
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLabel {
    #[must_use]
    pub const fn from_score(score: u32) -> Self {
        match score {
            0 => Self::Clean,
            1..=25 => Self::Low,
            26..=50 => Self::Medium,
            51..=75 => Self::High,
            _ => Self::Critical,
        }
    }
}

impl fmt::Display for RiskLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clean => write!(f, "clean"),
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// A single rule match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub severity: Severity,
    /// Rule family, e.g. `prompt-injection`.
    pub pattern: String,
    pub message: String,
    /// Path relative to the scanned skill.
    pub file: String,
    /// 1-based line number.
    pub line: usize,
    pub snippet: String,
}

/// Sum of finding weights, capped at 100.
#[must_use]
pub fn risk_score(findings: &[Finding]) -> u32 {
    findings
        .iter()
        .map(|finding| finding.severity.weight())
        .sum::<u32>()
        .min(100)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditResult {
    pub skill_name: String,
    pub findings: Vec<Finding>,
    pub risk_score: u32,
    pub risk_label: RiskLabel,
    pub threshold: Severity,
    pub is_blocked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_target: Option<String>,
}

impl AuditResult {
    #[must_use]
    pub fn new(skill_name: impl Into<String>, mut findings: Vec<Finding>, threshold: Severity) -> Self {
        findings.sort_by(|a, b| {
            a.severity
                .cmp(&b.severity)
                .then_with(|| a.file.cmp(&b.file))
                .then_with(|| a.line.cmp(&b.line))
        });
        let risk_score = risk_score(&findings);
        let mut result = Self {
            skill_name: skill_name.into(),
            findings,
            risk_score,
            risk_label: RiskLabel::from_score(risk_score),
            threshold,
            is_blocked: false,
            scan_target: None,
        };
        result.is_blocked = result.blocked_at(threshold);
        result
    }

    /// Re-evaluate the block decision for another threshold from the stored
    /// findings; nothing is rescanned.
    #[must_use]
    pub fn with_threshold(&self, threshold: Severity) -> Self {
        let mut result = self.clone();
        result.threshold = threshold;
        result.is_blocked = result.blocked_at(threshold);
        result
    }

    /// Blocked when a finding reaches the threshold severity or the aggregate
    /// label reaches the threshold's label.
    #[must_use]
    pub fn blocked_at(&self, threshold: Severity) -> bool {
        self.findings
            .iter()
            .any(|finding| finding.severity.rank() <= threshold.rank())
            || (self.risk_label != RiskLabel::Clean && self.risk_label >= threshold.blocking_label())
    }

    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.findings
            .iter()
            .filter(|finding| finding.severity == severity)
            .count()
    }

    /// Highest-severity finding at or above the threshold, for error messages.
    #[must_use]
    pub fn blocking_summary(&self) -> String {
        let counts = Severity::ALL
            .iter()
            .filter(|severity| severity.rank() <= self.threshold.rank())
            .map(|severity| (severity, self.count(*severity)))
            .filter(|(_, count)| *count > 0)
            .map(|(severity, count)| format!("{count} {severity}"))
            .collect::<Vec<_>>();
        if counts.is_empty() {
            format!("risk {} ({})", self.risk_label, self.risk_score)
        } else {
            counts.join(", ")
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditSummary {
    pub total: usize,
    pub passed: usize,
    pub warning: usize,
    pub failed: usize,
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub info: usize,
    pub threshold: Severity,
    pub risk_score: u32,
    pub risk_label: RiskLabel,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub scan_errors: usize,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_zero(value: &usize) -> bool {
    *value == 0
}

impl AuditSummary {
    #[must_use]
    pub fn from_results(results: &[AuditResult], threshold: Severity, scan_errors: usize) -> Self {
        let mut summary = Self {
            threshold,
            scan_errors,
            ..Self::default()
        };
        for result in results {
            summary.total += 1;
            if result.is_blocked {
                summary.failed += 1;
            } else if result.findings.is_empty() {
                summary.passed += 1;
            } else {
                summary.warning += 1;
            }
            summary.critical += result.count(Severity::Critical);
            summary.high += result.count(Severity::High);
            summary.medium += result.count(Severity::Medium);
            summary.low += result.count(Severity::Low);
            summary.info += result.count(Severity::Info);
            summary.risk_score = summary.risk_score.max(result.risk_score);
        }
        summary.risk_label = RiskLabel::from_score(summary.risk_score);
        summary
    }
}

/// Results for a batch of skills plus their summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditReport {
    pub results: Vec<AuditResult>,
    pub summary: AuditSummary,
}

/// Scan one skill directory.
pub fn audit_skill(scanner: &Scanner, dir: &Path, name: &str, threshold: Severity) -> Result<AuditResult> {
    let findings = scanner.scan_dir(dir)?;
    let mut result = AuditResult::new(name, findings, threshold);
    result.scan_target = Some(dir.display().to_string());
    debug!(skill = name, score = result.risk_score, blocked = result.is_blocked, "audited skill");
    Ok(result)
}

/// Scan every skill in parallel. Unscannable skills are counted, not fatal.
#[must_use]
pub fn audit_all(scanner: &Scanner, skills: &[Skill], threshold: Severity) -> AuditReport {
    let outcomes: Vec<_> = skills
        .par_iter()
        .map(|skill| audit_skill(scanner, &skill.source_path, &skill.flat_name, threshold))
        .collect();

    let mut results = Vec::with_capacity(outcomes.len());
    let mut scan_errors = 0;
    for (skill, outcome) in skills.iter().zip(outcomes) {
        match outcome {
            Ok(result) => results.push(result),
            Err(err) => {
                warn!(skill = %skill.flat_name, error = %err, "audit scan failed");
                scan_errors += 1;
            }
        }
    }
    results.sort_by(|a, b| a.skill_name.cmp(&b.skill_name));
    let summary = AuditSummary::from_results(&results, threshold, scan_errors);
    AuditReport { results, summary }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(severity: Severity) -> Finding {
        Finding {
            severity,
            pattern: "test".to_string(),
            message: "test".to_string(),
            file: "SKILL.md".to_string(),
            line: 1,
            snippet: String::new(),
        }
    }

    #[test]
    fn severity_parses_case_insensitively() {
        assert_eq!("high".parse::<Severity>().unwrap(), Severity::High);
        assert_eq!(" Info ".parse::<Severity>().unwrap(), Severity::Info);
        assert!("severe".parse::<Severity>().is_err());
    }

    #[test]
    fn severity_serializes_uppercase() {
        let json = serde_json::to_string(&Severity::Medium).unwrap();
        assert_eq!(json, "\"MEDIUM\"");
        let back: Severity = serde_json::from_str("\"low\"").unwrap();
        assert_eq!(back, Severity::Low);
    }

    #[test]
    fn risk_score_is_weighted_and_capped() {
        assert_eq!(risk_score(&[]), 0);
        assert_eq!(risk_score(&[finding(Severity::High), finding(Severity::Low)]), 18);
        let many = vec![finding(Severity::Critical); 5];
        assert_eq!(risk_score(&many), 100);
    }

    #[test]
    fn risk_score_is_monotonic_in_severity() {
        let mut previous = 0;
        for severity in Severity::ALL.iter().rev() {
            let score = risk_score(&[finding(*severity)]);
            assert!(score > previous, "{severity} should outweigh lower severities");
            previous = score;
        }
    }

    #[test]
    fn risk_labels_bucket_scores() {
        assert_eq!(RiskLabel::from_score(0), RiskLabel::Clean);
        assert_eq!(RiskLabel::from_score(25), RiskLabel::Low);
        assert_eq!(RiskLabel::from_score(26), RiskLabel::Medium);
        assert_eq!(RiskLabel::from_score(75), RiskLabel::High);
        assert_eq!(RiskLabel::from_score(76), RiskLabel::Critical);
    }

    #[test]
    fn default_threshold_blocks_only_critical_findings() {
        let high = AuditResult::new("a", vec![finding(Severity::High)], Severity::Critical);
        assert!(!high.is_blocked);
        let critical = AuditResult::new("b", vec![finding(Severity::Critical)], Severity::Critical);
        assert!(critical.is_blocked);
    }

    #[test]
    fn aggregate_label_blocks_without_single_severe_finding() {
        // 4 MEDIUM findings score 32 (medium label) with no HIGH finding.
        let result = AuditResult::new("m", vec![finding(Severity::Medium); 4], Severity::High);
        assert!(!result.is_blocked);
        let stricter = result.with_threshold(Severity::Medium);
        assert!(stricter.is_blocked);
        assert_eq!(stricter.findings, result.findings);
    }

    #[test]
    fn with_threshold_recomputes_without_rescan() {
        let result = AuditResult::new("x", vec![finding(Severity::High)], Severity::Critical);
        assert!(!result.is_blocked);
        assert!(result.with_threshold(Severity::High).is_blocked);
        assert!(!result.with_threshold(Severity::High).with_threshold(Severity::Critical).is_blocked);
    }

    #[test]
    fn summary_counts_outcomes() {
        let results = vec![
            AuditResult::new("clean", vec![], Severity::High),
            AuditResult::new("warn", vec![finding(Severity::Low)], Severity::High),
            AuditResult::new("fail", vec![finding(Severity::Critical)], Severity::High),
        ];
        let summary = AuditSummary::from_results(&results, Severity::High, 2);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.warning, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.critical, 1);
        assert_eq!(summary.low, 1);
        assert_eq!(summary.risk_score, 25);
        assert_eq!(summary.scan_errors, 2);
    }
}
