//! Timestamped target snapshots under `<root>/backups/`.
//!
//! Layout is `backups/<YYYY-MM-DD_HH-MM-SS>/<target>/...`. Only real content
//! is captured; skill symlinks are recreated by the next sync anyway.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{BackupConfig, Config};
use crate::error::{Result, SkillshareError};
use crate::security::validate_path_component;
use crate::utils::clock::{Clock, format_timestamp, parse_timestamp};
use crate::utils::format::bytes_to_mb;
use crate::utils::fs::{copy_dir, dir_size, is_empty_dir, is_hidden, lexists, remove_entry, replace_dir};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupInfo {
    pub timestamp: String,
    pub path: String,
    pub targets: Vec<String>,
    pub date: DateTime<Utc>,
    #[serde(rename = "sizeMB")]
    pub size_mb: f64,
    #[serde(skip)]
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupList {
    pub backups: Vec<BackupInfo>,
    #[serde(rename = "totalSizeMB")]
    pub total_size_mb: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupCreated {
    pub timestamp: Option<String>,
    pub backed_up_targets: Vec<String>,
}

/// Handle on the backups directory.
#[derive(Debug, Clone)]
pub struct BackupStore {
    dir: PathBuf,
}

impl BackupStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Snapshot every target (or one) that holds real content.
    pub fn create(
        &self,
        config: &Config,
        target: Option<&str>,
        clock: &dyn Clock,
    ) -> Result<BackupCreated> {
        let selected: Vec<_> = match target {
            Some(name) => vec![(name, config.target(name)?)],
            None => config.targets.iter().map(|(n, tc)| (n.as_str(), tc)).collect(),
        };

        // Never reuse a snapshot taken earlier in the same second.
        let mut at = clock.now();
        let mut timestamp = format_timestamp(at);
        while lexists(&self.dir.join(&timestamp)) {
            at += Duration::seconds(1);
            timestamp = format_timestamp(at);
        }
        let snapshot = self.dir.join(&timestamp);
        let mut created = BackupCreated::default();

        for (name, tc) in selected {
            if !has_real_content(&tc.path) {
                debug!(target = %name, "nothing to back up");
                continue;
            }
            if let Err(err) = copy_dir(&tc.path, &snapshot.join(name)) {
                warn!(target = %name, error = %err, "backup failed, discarding snapshot");
                let _ = remove_entry(&snapshot);
                return Err(err);
            }
            created.backed_up_targets.push(name.to_string());
        }

        if created.backed_up_targets.is_empty() {
            if snapshot.is_dir() && is_empty_dir(&snapshot) {
                fs::remove_dir(&snapshot)?;
            }
        } else {
            info!(timestamp = %timestamp, targets = ?created.backed_up_targets, "backup created");
            created.timestamp = Some(timestamp);
        }
        Ok(created)
    }

    /// Every snapshot, newest first.
    pub fn list(&self) -> Result<BackupList> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(BackupList::default());
            }
            Err(err) => return Err(err.into()),
        };

        let mut backups = Vec::new();
        for entry in entries.filter_map(std::result::Result::ok) {
            let name = entry.file_name().to_string_lossy().to_string();
            if is_hidden(&name) || !entry.file_type().is_ok_and(|ft| ft.is_dir()) {
                continue;
            }
            let path = entry.path();
            let date = parse_timestamp(&name).unwrap_or_else(|| {
                entry
                    .metadata()
                    .and_then(|meta| meta.modified())
                    .map_or_else(|_| Utc::now(), DateTime::<Utc>::from)
            });
            let mut targets: Vec<String> = fs::read_dir(&path)?
                .filter_map(std::result::Result::ok)
                .filter(|t| t.file_type().is_ok_and(|ft| ft.is_dir()))
                .map(|t| t.file_name().to_string_lossy().to_string())
                .collect();
            targets.sort();
            let size_bytes = dir_size(&path);
            backups.push(BackupInfo {
                timestamp: name,
                path: path.display().to_string(),
                targets,
                date,
                size_mb: round_mb(size_bytes),
                size_bytes,
            });
        }
        backups.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| b.timestamp.cmp(&a.timestamp)));

        let total: u64 = backups.iter().map(|b| b.size_bytes).sum();
        Ok(BackupList {
            backups,
            total_size_mb: round_mb(total),
        })
    }

    /// Apply the retention policy, newest first. A limit of 0 disables it.
    pub fn cleanup(&self, policy: &BackupConfig, clock: &dyn Clock) -> Result<Vec<String>> {
        let now = clock.now();
        let max_age = Duration::days(i64::from(policy.max_age_days));
        let max_bytes = policy.max_size_mb.saturating_mul(1024 * 1024);

        let mut removed = Vec::new();
        let mut cumulative = 0u64;
        for (index, backup) in self.list()?.backups.into_iter().enumerate() {
            cumulative += backup.size_bytes;
            let too_old = policy.max_age_days > 0 && now - backup.date > max_age;
            let too_many = policy.max_count > 0 && index >= policy.max_count;
            let too_big = policy.max_size_mb > 0 && cumulative > max_bytes;
            if !(too_old || too_many || too_big) {
                continue;
            }
            match fs::remove_dir_all(&backup.path) {
                Ok(()) => {
                    debug!(timestamp = %backup.timestamp, too_old, too_many, too_big, "backup removed");
                    removed.push(backup.timestamp);
                }
                Err(err) => warn!(timestamp = %backup.timestamp, error = %err, "cannot remove backup"),
            }
        }
        if !removed.is_empty() {
            info!(removed = removed.len(), "backup cleanup");
        }
        Ok(removed)
    }

    /// Restore one target from a snapshot, or from the newest snapshot that
    /// contains it when `timestamp` is `None`. Returns the timestamp used.
    pub fn restore(
        &self,
        config: &Config,
        target: &str,
        timestamp: Option<&str>,
        force: bool,
    ) -> Result<String> {
        validate_path_component(target)?;
        let dest = config.target(target)?.path.clone();

        let timestamp = match timestamp {
            Some(ts) => {
                validate_path_component(ts)?;
                if !self.dir.join(ts).is_dir() {
                    return Err(SkillshareError::NotFound(format!("backup {ts}")));
                }
                ts.to_string()
            }
            None => self
                .list()?
                .backups
                .into_iter()
                .find(|b| b.targets.iter().any(|t| t == target))
                .map(|b| b.timestamp)
                .ok_or_else(|| SkillshareError::NotFound(format!("no backup for target {target}")))?,
        };

        let from = self.dir.join(&timestamp).join(target);
        if !from.is_dir() {
            return Err(SkillshareError::NotFound(format!(
                "target {target} in backup {timestamp}"
            )));
        }

        match fs::symlink_metadata(&dest) {
            Ok(meta) if meta.file_type().is_symlink() => {}
            Ok(meta) if meta.is_dir() => {
                if !force && !is_empty_dir(&dest) {
                    return Err(SkillshareError::Conflict(format!(
                        "destination is not empty: {} (use force to overwrite)",
                        dest.display()
                    )));
                }
            }
            Ok(_) => {
                return Err(SkillshareError::Conflict(format!(
                    "destination exists and is not a directory: {}",
                    dest.display()
                )));
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        // Staged copy swapped in by rename; the old content survives a failure.
        replace_dir(&from, &dest)?;
        info!(target = %target, timestamp = %timestamp, "backup restored");
        Ok(timestamp)
    }
}

/// A real, non-empty directory. Missing targets and symlinked roots have no
/// content of their own.
fn has_real_content(path: &Path) -> bool {
    lexists(path)
        && fs::symlink_metadata(path).is_ok_and(|meta| meta.is_dir())
        && !is_empty_dir(path)
}

fn round_mb(bytes: u64) -> f64 {
    (bytes_to_mb(bytes) * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TargetConfig;
    use crate::utils::clock::FixedClock;
    use crate::utils::fs::{create_symlink, is_symlink};
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Config, BackupStore) {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::parse("", tmp.path()).unwrap();
        let claude = tmp.path().join("claude");
        fs::create_dir_all(claude.join("mine")).unwrap();
        fs::write(claude.join("mine/SKILL.md"), "# mine\n").unwrap();
        fs::create_dir_all(&config.source).unwrap();
        create_symlink(&config.source, &claude.join("linked")).unwrap();
        config
            .targets
            .insert("claude".to_string(), TargetConfig::new(&claude));
        config
            .targets
            .insert("empty".to_string(), TargetConfig::new(tmp.path().join("missing")));
        let store = BackupStore::new(tmp.path().join("backups"));
        (tmp, config, store)
    }

    fn at(day: u32, second: u32) -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2026, 1, day, 12, 0, second).unwrap())
    }

    #[test]
    fn create_skips_missing_targets_and_symlinks() {
        let (_tmp, config, store) = setup();
        let created = store.create(&config, None, &at(1, 0)).unwrap();
        assert_eq!(created.backed_up_targets, vec!["claude"]);
        assert_eq!(created.timestamp.as_deref(), Some("2026-01-01_12-00-00"));

        let snap = store.dir().join("2026-01-01_12-00-00/claude");
        assert!(snap.join("mine/SKILL.md").is_file());
        assert!(!lexists(&snap.join("linked")));
    }

    #[test]
    fn create_with_nothing_leaves_no_snapshot() {
        let (_tmp, config, store) = setup();
        let created = store.create(&config, Some("empty"), &at(1, 0)).unwrap();
        assert!(created.backed_up_targets.is_empty());
        assert!(store.list().unwrap().backups.is_empty());
    }

    #[test]
    fn same_second_snapshots_do_not_collide() {
        let (_tmp, config, store) = setup();
        let first = store.create(&config, None, &at(1, 0)).unwrap();
        let second = store.create(&config, None, &at(1, 0)).unwrap();
        assert_eq!(first.timestamp.as_deref(), Some("2026-01-01_12-00-00"));
        assert_eq!(second.timestamp.as_deref(), Some("2026-01-01_12-00-01"));
        assert_eq!(store.list().unwrap().backups.len(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn failed_target_discards_the_whole_snapshot() {
        let (tmp, mut config, store) = setup();
        let broken = tmp.path().join("zz");
        fs::create_dir_all(&broken).unwrap();
        // sockets cannot be copied
        let _listener = std::os::unix::net::UnixListener::bind(broken.join("sock")).unwrap();
        config.targets.insert("zz".to_string(), TargetConfig::new(&broken));

        assert!(store.create(&config, None, &at(1, 0)).is_err());
        assert!(!lexists(&store.dir().join("2026-01-01_12-00-00")));
        assert!(store.list().unwrap().backups.is_empty());
    }

    #[test]
    fn restore_replaces_a_symlinked_root() {
        let (tmp, config, store) = setup();
        store.create(&config, Some("claude"), &at(1, 0)).unwrap();
        let claude = tmp.path().join("claude");
        fs::remove_dir_all(&claude).unwrap();
        create_symlink(&config.source, &claude).unwrap();

        store.restore(&config, "claude", None, false).unwrap();
        assert!(!is_symlink(&claude));
        assert!(claude.join("mine/SKILL.md").is_file());
        assert!(config.source.is_dir());
    }

    #[test]
    fn list_is_newest_first() {
        let (_tmp, config, store) = setup();
        store.create(&config, None, &at(1, 0)).unwrap();
        store.create(&config, None, &at(3, 0)).unwrap();
        store.create(&config, None, &at(2, 0)).unwrap();

        let list = store.list().unwrap();
        let stamps: Vec<_> = list.backups.iter().map(|b| b.timestamp.as_str()).collect();
        assert_eq!(
            stamps,
            vec!["2026-01-03_12-00-00", "2026-01-02_12-00-00", "2026-01-01_12-00-00"]
        );
        assert_eq!(list.backups[0].targets, vec!["claude"]);
    }

    #[test]
    fn cleanup_applies_age_and_count() {
        let (_tmp, config, store) = setup();
        for day in 1..=5 {
            store.create(&config, None, &at(day, 0)).unwrap();
        }
        let policy = BackupConfig {
            max_age_days: 3,
            max_count: 10,
            max_size_mb: 0,
        };
        let removed = store.cleanup(&policy, &at(6, 0)).unwrap();
        assert_eq!(removed, vec!["2026-01-02_12-00-00", "2026-01-01_12-00-00"]);

        let policy = BackupConfig {
            max_age_days: 0,
            max_count: 1,
            max_size_mb: 0,
        };
        assert_eq!(store.cleanup(&policy, &at(6, 0)).unwrap().len(), 2);
        assert_eq!(store.list().unwrap().backups.len(), 1);
    }

    #[test]
    fn restore_requires_force_over_content() {
        let (tmp, config, store) = setup();
        store.create(&config, Some("claude"), &at(1, 0)).unwrap();
        let claude = tmp.path().join("claude");

        let err = store.restore(&config, "claude", None, false).unwrap_err();
        assert!(matches!(err, SkillshareError::Conflict(_)));

        fs::write(claude.join("mine/SKILL.md"), "# changed\n").unwrap();
        let ts = store.restore(&config, "claude", None, true).unwrap();
        assert_eq!(ts, "2026-01-01_12-00-00");
        assert_eq!(
            fs::read_to_string(claude.join("mine/SKILL.md")).unwrap(),
            "# mine\n"
        );

        assert!(matches!(
            store.restore(&config, "claude", Some("2020-01-01_00-00-00"), true),
            Err(SkillshareError::NotFound(_))
        ));
        assert!(matches!(
            store.restore(&config, "empty", Some("2026-01-01_12-00-00"), true),
            Err(SkillshareError::NotFound(_))
        ));
    }
}
