//! Audit rule definitions.
//!
//! Built-in rules ship as embedded YAML. A user file with the same shape is
//! merged over them by rule id.

use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::audit::Severity;
use crate::error::{Result, SkillshareError};
use crate::utils::fs::read_optional;

const BUILTIN_RULES: &str = include_str!("rules.yaml");

/// Starter file written by `audit rules init`.
pub const STARTER_RULES: &str = r#"# Custom audit rules, merged over the built-in set by `id`.
#
#   - same id + enabled: false   disables a built-in rule
#   - same id                    replaces a built-in rule
#   - new id                     adds a rule
#
# rules:
#   - id: destructive-sudo
#     enabled: false
#   - id: internal-hostname
#     severity: MEDIUM
#     pattern: internal-hostname
#     message: References an internal host
#     regex: '\bcorp\.internal\b'
rules: []
"#;

/// Uncompiled rule as it appears in YAML.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSpec {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub pattern: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub regex: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

impl RuleSpec {
    fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }
}

#[derive(Debug, Default, Deserialize)]
struct RulesDoc {
    #[serde(default)]
    rules: Vec<RuleSpec>,
}

/// A compiled rule.
#[derive(Debug, Clone)]
pub struct Rule {
    pub id: String,
    pub severity: Severity,
    pub pattern: String,
    pub message: String,
    pub regex: Regex,
    pub exclude: Option<Regex>,
}

impl Rule {
    fn compile(spec: &RuleSpec) -> Result<Self> {
        let severity = spec.severity.ok_or_else(|| {
            SkillshareError::InvalidInput(format!("rule {}: missing severity", spec.id))
        })?;
        if spec.regex.is_empty() {
            return Err(SkillshareError::InvalidInput(format!(
                "rule {}: missing regex",
                spec.id
            )));
        }
        let regex = Regex::new(&spec.regex)
            .map_err(|err| SkillshareError::InvalidInput(format!("rule {}: {err}", spec.id)))?;
        let exclude = spec
            .exclude
            .as_deref()
            .filter(|value| !value.is_empty())
            .map(Regex::new)
            .transpose()
            .map_err(|err| SkillshareError::InvalidInput(format!("rule {}: {err}", spec.id)))?;
        let pattern = if spec.pattern.is_empty() {
            spec.id.clone()
        } else {
            spec.pattern.clone()
        };

        Ok(Self {
            id: spec.id.clone(),
            severity,
            pattern,
            message: spec.message.clone(),
            regex,
            exclude,
        })
    }

    /// True when the line triggers this rule.
    #[must_use]
    pub fn matches(&self, line: &str) -> bool {
        self.regex.is_match(line)
            && !self
                .exclude
                .as_ref()
                .is_some_and(|exclude| exclude.is_match(line))
    }
}

/// Parse a rules YAML document without compiling it.
pub fn parse_specs(raw: &str) -> Result<Vec<RuleSpec>> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    let file: RulesDoc = serde_yaml::from_str(raw)?;
    for spec in &file.rules {
        if spec.id.trim().is_empty() {
            return Err(SkillshareError::InvalidInput(
                "every rule needs an id".to_string(),
            ));
        }
    }
    Ok(file.rules)
}

/// The embedded rule set.
pub fn builtin_specs() -> Result<Vec<RuleSpec>> {
    parse_specs(BUILTIN_RULES)
}

/// Merge `overrides` over `base` by id: disable, replace, or append.
#[must_use]
pub fn merge_specs(base: Vec<RuleSpec>, overrides: Vec<RuleSpec>) -> Vec<RuleSpec> {
    let mut merged = base;
    for over in overrides {
        match merged.iter().position(|spec| spec.id == over.id) {
            Some(idx) if !over.is_enabled() => {
                merged[idx].enabled = Some(false);
            }
            Some(idx) => merged[idx] = over,
            None => merged.push(over),
        }
    }
    merged
}

/// Compile all enabled specs.
pub fn compile(specs: &[RuleSpec]) -> Result<Vec<Rule>> {
    specs
        .iter()
        .filter(|spec| spec.is_enabled())
        .map(Rule::compile)
        .collect()
}

/// Built-in rules merged with the optional user file at `user_path`.
pub fn load_rules(user_path: Option<&Path>) -> Result<Vec<Rule>> {
    let mut specs = builtin_specs()?;
    if let Some(path) = user_path
        && let Some(raw) = read_optional(path)?
    {
        let overrides = parse_specs(&raw)?;
        debug!(path = %path.display(), count = overrides.len(), "loaded user audit rules");
        specs = merge_specs(specs, overrides);
    }
    compile(&specs)
}

/// Validate a user rules document by merging and compiling it.
pub fn validate(raw: &str) -> Result<()> {
    let merged = merge_specs(builtin_specs()?, parse_specs(raw)?);
    compile(&merged).map(|_| ())
}

/// The user rules file as served by `GET /audit/rules`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesFile {
    pub exists: bool,
    pub raw: String,
    pub path: String,
}

pub fn read_rules_file(path: &Path) -> Result<RulesFile> {
    let raw = read_optional(path)?;
    Ok(RulesFile {
        exists: raw.is_some(),
        raw: raw.unwrap_or_default(),
        path: path.display().to_string(),
    })
}

/// Validate `raw` and write it to `path`.
pub fn write_rules_file(path: &Path, raw: &str) -> Result<()> {
    validate(raw)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, raw)?;
    debug!(path = %path.display(), "audit rules saved");
    Ok(())
}

/// Write the commented starter file. An existing file is left alone.
pub fn init_rules_file(path: &Path) -> Result<()> {
    if path.exists() {
        return Err(SkillshareError::Conflict(format!(
            "rules file already exists: {}",
            path.display()
        )));
    }
    write_rules_file(path, STARTER_RULES)
}
