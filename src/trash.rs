//! Soft-delete for skills and tracked repos.
//!
//! Deleted directories move to `<root>/trash/<name>_<YYYY-MM-DD_HH-MM-SS>`
//! and are purged once older than the configured TTL. Each entry carries an
//! origin file with its path relative to the source, so a restore puts it
//! back exactly where it was.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Result, SkillshareError};
use crate::security::{validate_path_component, validate_relative};
use crate::store::gitignore::{add_ignore_entry, remove_ignore_entry};
use crate::store::repos::tracked_repo_paths;
use crate::store::{FLAT_SEPARATOR, Skill, find_skill, is_tracked_repo_dir};
use crate::utils::clock::{Clock, TIMESTAMP_LEN, format_timestamp, parse_timestamp};
use crate::utils::fs::{dir_size, is_hidden, lexists, move_dir, read_optional};

/// Origin path recorded inside each trash entry; removed again on restore.
pub const ORIGIN_FILE: &str = ".skillshare-origin";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrashEntry {
    /// Original skill or repo name.
    pub name: String,
    /// Directory name inside the trash.
    pub entry_name: String,
    pub timestamp: String,
    pub date: DateTime<Utc>,
    /// Bytes.
    pub size: u64,
    pub path: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrashList {
    pub items: Vec<TrashEntry>,
    pub total_size: u64,
}

/// Split `<name>_<timestamp>` into its parts.
#[must_use]
pub fn parse_entry_name(dir_name: &str) -> Option<(&str, &str)> {
    if dir_name.len() < TIMESTAMP_LEN + 2 || !dir_name.is_char_boundary(dir_name.len() - TIMESTAMP_LEN) {
        return None;
    }
    let (head, ts) = dir_name.split_at(dir_name.len() - TIMESTAMP_LEN);
    let name = head.strip_suffix('_')?;
    if name.is_empty() {
        return None;
    }
    parse_timestamp(ts)?;
    Some((name, ts))
}

/// Handle on the trash directory.
#[derive(Debug, Clone)]
pub struct TrashStore {
    dir: PathBuf,
}

impl TrashStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Move `src` into the trash under `name`, remembering `origin` (its
    /// path relative to the source). Returns the entry path.
    pub fn move_to_trash(&self, src: &Path, name: &str, origin: &str, clock: &dyn Clock) -> Result<PathBuf> {
        validate_path_component(name)?;
        validate_relative(origin)?;
        fs::create_dir_all(&self.dir)?;
        let mut at = clock.now();
        let mut dest = self.dir.join(format!("{name}_{}", format_timestamp(at)));
        while lexists(&dest) {
            at += Duration::seconds(1);
            dest = self.dir.join(format!("{name}_{}", format_timestamp(at)));
        }
        move_dir(src, &dest)?;
        if let Err(err) = fs::write(dest.join(ORIGIN_FILE), origin) {
            warn!(entry = %dest.display(), error = %err, "could not record trash origin");
        }
        info!(name = %name, entry = %dest.display(), "moved to trash");
        Ok(dest)
    }

    /// Entries, newest first. Directories that do not follow the naming
    /// scheme are ignored.
    #[must_use]
    pub fn entries(&self) -> Vec<TrashEntry> {
        let Ok(dir) = fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        let mut items: Vec<TrashEntry> = dir
            .filter_map(std::result::Result::ok)
            .filter(|entry| entry.file_type().is_ok_and(|ft| ft.is_dir()))
            .filter_map(|entry| {
                let entry_name = entry.file_name().to_string_lossy().to_string();
                if is_hidden(&entry_name) {
                    return None;
                }
                let (name, ts) = parse_entry_name(&entry_name)?;
                Some(TrashEntry {
                    name: name.to_string(),
                    timestamp: ts.to_string(),
                    date: parse_timestamp(ts)?,
                    size: dir_size(&entry.path()),
                    path: entry.path().display().to_string(),
                    entry_name: entry_name.clone(),
                })
            })
            .collect();
        items.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.name.cmp(&b.name)));
        items
    }

    /// Current entries with their total size. Does not purge.
    #[must_use]
    pub fn snapshot(&self) -> TrashList {
        let items = self.entries();
        let total_size = items.iter().map(|item| item.size).sum();
        TrashList { items, total_size }
    }

    /// Purge the expired entries, then list the rest.
    pub fn list(&self, ttl_days: u32, clock: &dyn Clock) -> TrashList {
        self.cleanup(ttl_days, clock);
        self.snapshot()
    }

    /// Purge entries older than `ttl_days`. Returns the purged entry names;
    /// entries that cannot be removed are logged and left for the next sweep.
    pub fn cleanup(&self, ttl_days: u32, clock: &dyn Clock) -> Vec<String> {
        let cutoff = clock.now() - Duration::days(i64::from(ttl_days));
        let mut removed = Vec::new();
        for item in self.entries() {
            if item.date >= cutoff {
                continue;
            }
            if let Err(err) = fs::remove_dir_all(&item.path) {
                warn!(entry = %item.entry_name, error = %err, "could not purge expired trash entry");
                continue;
            }
            debug!(entry = %item.entry_name, "expired trash entry purged");
            removed.push(item.entry_name);
        }
        if !removed.is_empty() {
            info!(removed = removed.len(), "trash cleanup");
        }
        removed
    }

    /// Newest entry matching a trash entry name or an original name.
    pub fn find(&self, name: &str) -> Result<TrashEntry> {
        self.entries()
            .into_iter()
            .find(|item| item.entry_name == name || item.name == name)
            .ok_or_else(|| SkillshareError::NotFound(format!("{name} in trash")))
    }

    /// Restore an entry into `source`. With `force`, an existing skill at
    /// the destination is trashed first instead of being overwritten.
    pub fn restore(
        &self,
        name: &str,
        source: &Path,
        force: bool,
        clock: &dyn Clock,
    ) -> Result<TrashEntry> {
        let entry = self.find(name)?;
        let rel = origin(Path::new(&entry.path), &entry.name)?;
        let dest = source.join(&rel);
        if lexists(&dest) {
            if !force {
                return Err(SkillshareError::Conflict(format!(
                    "{rel} already exists in source (use force to replace)"
                )));
            }
            warn!(name = %entry.name, "trashing existing skill before restore");
            self.move_to_trash(&dest, &entry.name, &rel, clock)?;
        }
        move_dir(Path::new(&entry.path), &dest)?;
        if let Err(err) = fs::remove_file(dest.join(ORIGIN_FILE)) {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!(dest = %dest.display(), error = %err, "could not remove trash origin file");
            }
        }
        if dest.join(".git").exists() {
            if let Err(err) = add_ignore_entry(source, &rel) {
                warn!(repo = %rel, error = %err, "could not update source .gitignore");
            }
        }
        info!(name = %entry.name, dest = %dest.display(), "restored from trash");
        Ok(entry)
    }

    /// Purge one entry for good.
    pub fn delete(&self, name: &str) -> Result<TrashEntry> {
        let entry = self.find(name)?;
        fs::remove_dir_all(&entry.path)?;
        info!(entry = %entry.entry_name, "trash entry deleted");
        Ok(entry)
    }

    /// Purge everything. Returns the number of entries removed.
    pub fn empty(&self) -> Result<usize> {
        let items = self.entries();
        for item in &items {
            fs::remove_dir_all(&item.path)?;
        }
        info!(removed = items.len(), "trash emptied");
        Ok(items.len())
    }
}

/// Source-relative path an entry returns to. Entries without an origin
/// file fall back to un-flattening the name.
fn origin(entry: &Path, name: &str) -> Result<String> {
    let rel = match read_optional(entry.join(ORIGIN_FILE))? {
        Some(raw) if !raw.trim().is_empty() => raw.trim().to_string(),
        _ => name.replace(FLAT_SEPARATOR, "/"),
    };
    validate_relative(&rel)?;
    Ok(rel)
}

/// Trash one skill. A skill inside a tracked repo takes the whole repo with
/// it. Returns the trashed name and the entry path.
pub fn delete_skill(
    store: &TrashStore,
    source: &Path,
    skills: &[Skill],
    name: &str,
    clock: &dyn Clock,
) -> Result<(String, PathBuf)> {
    let skill = find_skill(skills, name)?;
    if skill.is_in_repo {
        let prefix_of = |repo: &String| skill.rel_path.starts_with(&format!("{repo}/"));
        if let Some(repo) = tracked_repo_paths(source).into_iter().find(prefix_of) {
            info!(skill = %skill.flat_name, repo = %repo, "skill belongs to a tracked repo; trashing the repo");
            return trash_repo(store, source, &repo, clock);
        }
    }
    let entry = store.move_to_trash(&skill.source_path, &skill.flat_name, &skill.rel_path, clock)?;
    Ok((skill.flat_name.clone(), entry))
}

/// Trash a whole tracked repo. `name` may omit the leading `_`.
pub fn delete_repo(
    store: &TrashStore,
    source: &Path,
    name: &str,
    clock: &dyn Clock,
) -> Result<(String, PathBuf)> {
    validate_path_component(name)?;
    let dir_name = if is_tracked_repo_dir(name) {
        name.to_string()
    } else {
        format!("_{name}")
    };
    if !source.join(&dir_name).join(".git").exists() {
        return Err(SkillshareError::NotFound(format!("tracked repo {dir_name}")));
    }
    trash_repo(store, source, &dir_name, clock)
}

/// Move the repo at `rel` to the trash and drop its `.gitignore` entry.
fn trash_repo(store: &TrashStore, source: &Path, rel: &str, clock: &dyn Clock) -> Result<(String, PathBuf)> {
    let name = rel.replace('/', FLAT_SEPARATOR);
    let entry = store.move_to_trash(&source.join(rel), &name, rel, clock)?;
    if let Err(err) = remove_ignore_entry(source, rel) {
        warn!(repo = %rel, error = %err, "could not update source .gitignore");
    }
    Ok((name, entry))
}
