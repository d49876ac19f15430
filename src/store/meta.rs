//! Install metadata stored next to each installed skill.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;

pub const META_FILE: &str = ".skillshare-meta.json";

/// Where an installed skill came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillMeta {
    /// The install source as the user typed it.
    pub source: String,
    /// `github`, `github-subdir`, `git`, `git-subdir` or `local`.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subdir: Option<String>,
    pub installed_at: DateTime<Utc>,
    /// Short commit hash for git sources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Read `<dir>/.skillshare-meta.json`. A missing or unreadable file is `None`.
pub fn read_meta(skill_dir: &Path) -> Option<SkillMeta> {
    let path = skill_dir.join(META_FILE);
    let raw = fs::read_to_string(&path).ok()?;
    match serde_json::from_str(&raw) {
        Ok(meta) => Some(meta),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "ignoring corrupt install metadata");
            None
        }
    }
}

pub fn write_meta(skill_dir: &Path, meta: &SkillMeta) -> Result<()> {
    let json = serde_json::to_string_pretty(meta)?;
    fs::write(skill_dir.join(META_FILE), json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn write_then_read() {
        let tmp = TempDir::new().unwrap();
        let meta = SkillMeta {
            source: "anthropics/skills/skills/pdf".to_string(),
            kind: "github-subdir".to_string(),
            repo_url: Some("https://github.com/anthropics/skills.git".to_string()),
            subdir: Some("skills/pdf".to_string()),
            installed_at: Utc::now(),
            version: Some("abc1234".to_string()),
        };
        write_meta(tmp.path(), &meta).unwrap();
        assert_eq!(read_meta(tmp.path()), Some(meta));

        let raw = fs::read_to_string(tmp.path().join(META_FILE)).unwrap();
        assert!(raw.contains("\"type\": \"github-subdir\""));
        assert!(raw.contains("\"repo_url\""));
    }

    #[test]
    fn corrupt_meta_reads_as_none() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(META_FILE), "{not json").unwrap();
        assert_eq!(read_meta(tmp.path()), None);
    }
}
