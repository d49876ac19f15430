//! Collect locally-authored skills from targets back into the source.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{Result, SkillshareError};
use crate::security::validate_path_component;
use crate::sync::Manifest;
use crate::utils::fs::{copy_dir, dir_size, is_hidden, lexists, remove_entry};

/// A real directory in a target that skillshare does not manage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalSkillInfo {
    pub name: String,
    pub path: String,
    pub target_name: String,
    /// Bytes.
    pub size: u64,
    pub mod_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetScan {
    pub target_name: String,
    pub skills: Vec<LocalSkillInfo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub targets: Vec<TargetScan>,
    pub total_count: usize,
}

/// Local skills in one target directory. Missing targets and symlinked
/// roots have none.
pub fn find_local_skills(target_name: &str, target_path: &Path) -> Result<Vec<LocalSkillInfo>> {
    let meta = match fs::symlink_metadata(target_path) {
        Ok(meta) => meta,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };
    if meta.file_type().is_symlink() || !meta.is_dir() {
        return Ok(Vec::new());
    }

    let manifest = Manifest::read(target_path);
    let mut skills = Vec::new();
    for entry in fs::read_dir(target_path)?.filter_map(std::result::Result::ok) {
        let name = entry.file_name().to_string_lossy().to_string();
        if is_hidden(&name) || manifest.is_managed(&name) {
            continue;
        }
        let Ok(meta) = fs::symlink_metadata(entry.path()) else {
            continue;
        };
        if !meta.is_dir() {
            continue;
        }
        let mod_time = meta
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        skills.push(LocalSkillInfo {
            path: entry.path().display().to_string(),
            size: dir_size(&entry.path()),
            target_name: target_name.to_string(),
            name,
            mod_time,
        });
    }
    skills.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(skills)
}

/// Scan every target (or one) for local skills.
pub fn scan(config: &Config, target: Option<&str>) -> Result<ScanResult> {
    let selected: Vec<_> = match target {
        Some(name) => vec![(name.to_string(), config.target(name)?.path.clone())],
        None => config
            .targets
            .iter()
            .map(|(name, tc)| (name.clone(), tc.path.clone()))
            .collect(),
    };

    let mut result = ScanResult::default();
    for (name, path) in selected {
        let skills = match find_local_skills(&name, &path) {
            Ok(skills) => skills,
            Err(err) => {
                warn!(target = %name, error = %err, "cannot scan target");
                continue;
            }
        };
        if skills.is_empty() {
            continue;
        }
        result.total_count += skills.len();
        result.targets.push(TargetScan {
            target_name: name,
            skills,
        });
    }
    Ok(result)
}

/// One skill to collect.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectRequest {
    pub name: String,
    pub target_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectResult {
    pub pulled: Vec<String>,
    pub skipped: Vec<String>,
    /// name -> error message
    pub failed: BTreeMap<String, String>,
}

/// Copy each requested skill into `source/<name>`. Failures are recorded
/// per skill and never abort the batch.
pub fn collect(
    config: &Config,
    requests: &[CollectRequest],
    force: bool,
    dry_run: bool,
) -> CollectResult {
    let mut result = CollectResult::default();
    for request in requests {
        match collect_one(config, request, force, dry_run) {
            Ok(true) => result.pulled.push(request.name.clone()),
            Ok(false) => result.skipped.push(request.name.clone()),
            Err(err) => {
                warn!(skill = %request.name, error = %err, "collect failed");
                result.failed.insert(request.name.clone(), err.to_string());
            }
        }
    }
    info!(
        pulled = result.pulled.len(),
        skipped = result.skipped.len(),
        failed = result.failed.len(),
        "collect finished"
    );
    result
}

fn collect_one(config: &Config, request: &CollectRequest, force: bool, dry_run: bool) -> Result<bool> {
    validate_path_component(&request.name)?;
    let tc = config.target(&request.target_name)?;
    let from = tc.path.join(&request.name);
    let meta = fs::symlink_metadata(&from).map_err(|_| {
        SkillshareError::NotFound(format!("{} in target {}", request.name, request.target_name))
    })?;
    if meta.file_type().is_symlink() || !meta.is_dir() {
        return Err(SkillshareError::InvalidInput(format!(
            "{} is not a local skill directory",
            request.name
        )));
    }

    let dest = config.source.join(&request.name);
    if lexists(&dest) && !force {
        return Ok(false);
    }
    if dry_run {
        return Ok(true);
    }
    remove_entry(&dest)?;
    copy_dir(&from, &dest)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TargetConfig;
    use crate::utils::fs::create_symlink;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Config) {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::parse("", tmp.path()).unwrap();
        fs::create_dir_all(&config.source).unwrap();
        let target = tmp.path().join("claude");
        fs::create_dir_all(target.join("mine")).unwrap();
        fs::write(target.join("mine/SKILL.md"), "# mine\n").unwrap();
        fs::create_dir_all(target.join(".hidden")).unwrap();
        fs::write(target.join("stray.txt"), "x").unwrap();
        create_symlink(&config.source, &target.join("linked")).unwrap();
        config
            .targets
            .insert("claude".to_string(), TargetConfig::new(&target));
        (tmp, config)
    }

    #[test]
    fn scan_finds_real_unmanaged_dirs() {
        let (_tmp, config) = setup();
        let result = scan(&config, None).unwrap();
        assert_eq!(result.total_count, 1);
        let skill = &result.targets[0].skills[0];
        assert_eq!(skill.name, "mine");
        assert_eq!(skill.target_name, "claude");
        assert_eq!(skill.size, 7);
    }

    #[test]
    fn scan_unknown_target_is_not_found() {
        let (_tmp, config) = setup();
        assert!(matches!(
            scan(&config, Some("nope")),
            Err(SkillshareError::NotFound(_))
        ));
    }

    #[test]
    fn collect_copies_and_skips_existing() {
        let (_tmp, config) = setup();
        let requests = vec![
            CollectRequest {
                name: "mine".to_string(),
                target_name: "claude".to_string(),
            },
            CollectRequest {
                name: "ghost".to_string(),
                target_name: "claude".to_string(),
            },
        ];

        let first = collect(&config, &requests, false, false);
        assert_eq!(first.pulled, vec!["mine"]);
        assert!(first.failed.contains_key("ghost"));
        assert!(config.source.join("mine/SKILL.md").is_file());

        let second = collect(&config, &requests[..1], false, false);
        assert_eq!(second.skipped, vec!["mine"]);

        fs::write(config.targets["claude"].path.join("mine/SKILL.md"), "# v2\n").unwrap();
        let forced = collect(&config, &requests[..1], true, false);
        assert_eq!(forced.pulled, vec!["mine"]);
        assert_eq!(
            fs::read_to_string(config.source.join("mine/SKILL.md")).unwrap(),
            "# v2\n"
        );
    }
}
