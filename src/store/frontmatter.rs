//! `SKILL.md` YAML frontmatter.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::utils::fs::read_optional;

pub const SKILL_FILE: &str = "SKILL.md";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Frontmatter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Restricts delivery to the named targets. Accepts a list or a single
    /// string.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "string_or_list"
    )]
    pub targets: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

fn string_or_list<'de, D>(deserializer: D) -> std::result::Result<Option<Vec<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => None,
        Some(OneOrMany::One(value)) => Some(vec![value]),
        Some(OneOrMany::Many(values)) => Some(values),
    })
}

/// The raw YAML block between the leading `---` fences, if any.
#[must_use]
pub fn extract(content: &str) -> Option<&str> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let rest = content
        .strip_prefix("---\r\n")
        .or_else(|| content.strip_prefix("---\n"))?;
    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            return Some(&rest[..offset]);
        }
        offset += line.len();
    }
    None
}

/// Parse frontmatter leniently: malformed YAML yields the default.
#[must_use]
pub fn parse(content: &str) -> Frontmatter {
    let Some(raw) = extract(content) else {
        return Frontmatter::default();
    };
    if raw.trim().is_empty() {
        return Frontmatter::default();
    }
    match serde_yaml::from_str(raw) {
        Ok(frontmatter) => frontmatter,
        Err(err) => {
            debug!(error = %err, "ignoring malformed frontmatter");
            Frontmatter::default()
        }
    }
}

/// Frontmatter of `<dir>/SKILL.md`; default when the file is missing.
pub fn read(skill_dir: &Path) -> Result<Frontmatter> {
    Ok(read_optional(skill_dir.join(SKILL_FILE))?
        .map(|content| parse(&content))
        .unwrap_or_default())
}
