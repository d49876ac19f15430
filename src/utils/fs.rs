//! Filesystem utilities.
//!
//! Helper functions for directory copies, symlinks and size accounting.

use std::fs;
use std::path::{Component, Path, PathBuf};

use uuid::Uuid;
use walkdir::WalkDir;

use crate::error::Result;

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if !path.exists() {
        fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Read a file to string, returning None if it doesn't exist.
pub fn read_optional(path: impl AsRef<Path>) -> Result<Option<String>> {
    let path = path.as_ref();
    if path.exists() {
        Ok(Some(fs::read_to_string(path)?))
    } else {
        Ok(None)
    }
}

/// Dotfiles and dot-directories are never treated as skills.
#[must_use]
pub fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

#[must_use]
pub fn is_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok_and(|meta| meta.file_type().is_symlink())
}

/// True for an entry that exists at all, including dangling symlinks.
#[must_use]
pub fn lexists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Expand a leading `~` to the home directory.
#[must_use]
pub fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        return dirs::home_dir().unwrap_or_else(|| PathBuf::from(path));
    }
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(path)
}

/// Make a path absolute and lexically normalized without touching the disk.
///
/// Dangling symlinks cannot be canonicalized, so comparisons between link
/// targets and source paths go through this instead.
#[must_use]
pub fn absolutize(path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Absolute target of a symlink, resolved relative to the link's directory.
pub fn resolve_link(link: &Path) -> Result<PathBuf> {
    let target = fs::read_link(link)?;
    let resolved = if target.is_absolute() {
        target
    } else {
        link.parent().unwrap_or_else(|| Path::new("")).join(target)
    };
    Ok(absolutize(&resolved))
}

/// Whether `path` lives strictly below `root`.
#[must_use]
pub fn is_within(path: &Path, root: &Path) -> bool {
    path != root && path.starts_with(root)
}

#[cfg(unix)]
pub fn create_symlink(original: &Path, link: &Path) -> Result<()> {
    std::os::unix::fs::symlink(original, link)?;
    Ok(())
}

#[cfg(windows)]
pub fn create_symlink(original: &Path, link: &Path) -> Result<()> {
    std::os::windows::fs::symlink_dir(original, link)?;
    Ok(())
}

/// Remove whatever sits at `path`: symlink, file, or directory tree.
pub fn remove_entry(path: &Path) -> Result<()> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(err.into()),
    };
    if meta.is_dir() {
        fs::remove_dir_all(path)?;
    } else {
        fs::remove_file(path)?;
    }
    Ok(())
}

/// Recursively copy `src` into `dst`, skipping symlinks and `.git`.
///
/// Returns the number of bytes copied.
pub fn copy_dir(src: &Path, dst: &Path) -> Result<u64> {
    fs::create_dir_all(dst)?;
    let mut copied = 0;
    let walker = WalkDir::new(src)
        .min_depth(1)
        .into_iter()
        .filter_entry(|entry| entry.file_name() != ".git");
    for entry in walker {
        let entry = entry?;
        let Ok(rel) = entry.path().strip_prefix(src) else {
            continue;
        };
        let out = dst.join(rel);
        let file_type = entry.file_type();
        if file_type.is_symlink() {
            continue;
        }
        if file_type.is_dir() {
            fs::create_dir_all(&out)?;
        } else {
            copied += fs::copy(entry.path(), &out)?;
        }
    }
    Ok(copied)
}

/// Copy `src` over `dst` so readers never observe a half-written directory.
///
/// Content lands in a sibling temp directory first and is renamed into place;
/// any previous `dst` is moved aside and removed afterwards.
pub fn replace_dir(src: &Path, dst: &Path) -> Result<()> {
    let parent = dst.parent().unwrap_or_else(|| Path::new("."));
    let name = dst
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let staging = parent.join(format!(".{name}.tmp-{}", Uuid::new_v4().simple()));

    if let Err(err) = copy_dir(src, &staging) {
        let _ = fs::remove_dir_all(&staging);
        return Err(err);
    }

    let previous = if lexists(dst) {
        let aside = parent.join(format!(".{name}.old-{}", Uuid::new_v4().simple()));
        fs::rename(dst, &aside)?;
        Some(aside)
    } else {
        None
    };

    if let Err(err) = fs::rename(&staging, dst) {
        if let Some(aside) = &previous {
            let _ = fs::rename(aside, dst);
        }
        let _ = fs::remove_dir_all(&staging);
        return Err(err.into());
    }

    if let Some(aside) = previous {
        remove_entry(&aside)?;
    }
    Ok(())
}

/// Move a directory, falling back to copy + delete across filesystems.
pub fn move_dir(src: &Path, dst: &Path) -> Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }
    if fs::rename(src, dst).is_ok() {
        return Ok(());
    }
    copy_tree(src, dst)?;
    fs::remove_dir_all(src)?;
    Ok(())
}

/// Full-fidelity recursive copy that keeps `.git` and recreates symlinks.
fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst)?;
    for entry in WalkDir::new(src).min_depth(1) {
        let entry = entry?;
        let Ok(rel) = entry.path().strip_prefix(src) else {
            continue;
        };
        let out = dst.join(rel);
        let file_type = entry.file_type();
        if file_type.is_symlink() {
            let target = fs::read_link(entry.path())?;
            create_symlink(&target, &out)?;
        } else if file_type.is_dir() {
            fs::create_dir_all(&out)?;
        } else {
            fs::copy(entry.path(), &out)?;
        }
    }
    Ok(())
}

/// Total size in bytes of regular files below `path` (symlinks not followed).
#[must_use]
pub fn dir_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|meta| meta.len())
        .sum()
}

/// True when a directory has no entries (or cannot be read as one).
#[must_use]
pub fn is_empty_dir(path: &Path) -> bool {
    fs::read_dir(path).map_or(true, |mut entries| entries.next().is_none())
}
