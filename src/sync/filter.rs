//! Per-target include/exclude filters over flat skill names.
//!
//! Patterns are globs. A pattern without glob metacharacters matches as a
//! literal prefix, so `frontend` selects `frontend__react` as well as
//! `frontend`. Include is applied first (empty means everything), then any
//! exclude match removes the name.

use glob::Pattern;

use crate::error::{Result, SkillshareError};
use crate::store::Skill;

#[derive(Debug, Clone)]
enum Matcher {
    Prefix(String),
    Glob(Pattern),
}

impl Matcher {
    fn parse(raw: &str) -> Result<Option<Self>> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        if raw.contains(['*', '?', '[', ']']) {
            let pattern = Pattern::new(raw).map_err(|err| {
                SkillshareError::InvalidInput(format!("invalid filter pattern {raw:?}: {err}"))
            })?;
            Ok(Some(Self::Glob(pattern)))
        } else {
            Ok(Some(Self::Prefix(raw.to_string())))
        }
    }

    fn matches(&self, name: &str) -> bool {
        match self {
            Self::Prefix(prefix) => name.starts_with(prefix.as_str()),
            Self::Glob(pattern) => pattern.matches(name),
        }
    }
}

/// Compiled include/exclude lists of one target.
#[derive(Debug, Clone, Default)]
pub struct SkillFilter {
    include: Vec<Matcher>,
    exclude: Vec<Matcher>,
}

impl SkillFilter {
    /// Compile both lists. Any invalid pattern rejects the whole filter.
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self> {
        let compile = |patterns: &[String]| -> Result<Vec<Matcher>> {
            patterns
                .iter()
                .filter_map(|raw| Matcher::parse(raw).transpose())
                .collect()
        };
        Ok(Self {
            include: compile(include)?,
            exclude: compile(exclude)?,
        })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    /// Whether `flat_name` passes the filter.
    #[must_use]
    pub fn matches(&self, flat_name: &str) -> bool {
        let included =
            self.include.is_empty() || self.include.iter().any(|m| m.matches(flat_name));
        included && !self.exclude.iter().any(|m| m.matches(flat_name))
    }

    /// Skills delivered to `target`: filter match plus the skill's own
    /// frontmatter `targets` restriction.
    #[must_use]
    pub fn select<'a>(&self, skills: &'a [Skill], target: &str) -> Vec<&'a Skill> {
        skills
            .iter()
            .filter(|skill| self.matches(&skill.flat_name) && skill.allows_target(target))
            .collect()
    }
}
