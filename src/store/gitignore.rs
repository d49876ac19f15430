//! Managed block in the source `.gitignore`.
//!
//! Tracked repos are nested git checkouts; listing them here keeps
//! `push` from staging them as embedded repositories.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::Result;
use crate::utils::fs::read_optional;

pub const GITIGNORE_FILE: &str = ".gitignore";
const BLOCK_START: &str = "# BEGIN SKILLSHARE MANAGED - DO NOT EDIT";
const BLOCK_END: &str = "# END SKILLSHARE MANAGED";

fn dir_entry(entry: &str) -> String {
    format!("{}/", entry.trim_end_matches('/'))
}

fn matches(line: &str, entry: &str) -> bool {
    let line = line.trim().trim_start_matches('/');
    line == entry || line == entry.trim_end_matches('/')
}

fn read_lines(path: &Path) -> Result<Vec<String>> {
    let Some(raw) = read_optional(path)? else {
        return Ok(Vec::new());
    };
    let mut lines: Vec<String> = raw.replace("\r\n", "\n").split('\n').map(str::to_string).collect();
    while lines.last().is_some_and(String::is_empty) {
        lines.pop();
    }
    Ok(lines)
}

fn write_lines(path: &Path, lines: &[String]) -> Result<()> {
    let mut content = lines.join("\n");
    if !content.is_empty() {
        content.push('\n');
    }
    fs::write(path, content)?;
    Ok(())
}

/// Index of the start and end markers, when both exist in order.
fn find_block(lines: &[String]) -> Option<(usize, usize)> {
    let start = lines.iter().position(|line| line.trim() == BLOCK_START)?;
    let end = lines[start + 1..]
        .iter()
        .position(|line| line.trim() == BLOCK_END)?;
    Some((start, start + 1 + end))
}

/// Add `entry` (as a directory pattern) to the managed block of
/// `<dir>/.gitignore`, creating the file or block as needed. Returns false
/// when the entry was already present.
pub fn add_ignore_entry(dir: &Path, entry: &str) -> Result<bool> {
    let path = dir.join(GITIGNORE_FILE);
    let entry = dir_entry(entry);
    let mut lines = read_lines(&path)?;
    let (start, end) = match find_block(&lines) {
        Some(block) => block,
        None => {
            if !lines.is_empty() {
                lines.push(String::new());
            }
            lines.push(BLOCK_START.to_string());
            lines.push(BLOCK_END.to_string());
            (lines.len() - 2, lines.len() - 1)
        }
    };
    if lines[start + 1..end].iter().any(|line| matches(line, &entry)) {
        return Ok(false);
    }
    lines.insert(end, entry.clone());
    write_lines(&path, &lines)?;
    debug!(entry = %entry, "gitignore entry added");
    Ok(true)
}

/// Remove `entry` from the managed block. Lines outside the block are left
/// alone. Returns whether anything was removed.
pub fn remove_ignore_entry(dir: &Path, entry: &str) -> Result<bool> {
    let path = dir.join(GITIGNORE_FILE);
    let entry = dir_entry(entry);
    let mut lines = read_lines(&path)?;
    let Some((start, end)) = find_block(&lines) else {
        return Ok(false);
    };
    let before = lines.len();
    let kept: Vec<String> = lines
        .drain(start + 1..end)
        .filter(|line| !matches(line, &entry))
        .collect();
    let removed = before - lines.len() - kept.len();
    if removed == 0 {
        return Ok(false);
    }
    lines.splice(start + 1..start + 1, kept);
    write_lines(&path, &lines)?;
    debug!(entry = %entry, "gitignore entry removed");
    Ok(true)
}

/// Whether any line of `<dir>/.gitignore` names `entry` as a directory.
#[must_use]
pub fn is_ignored(dir: &Path, entry: &str) -> bool {
    let entry = dir_entry(entry);
    read_lines(&dir.join(GITIGNORE_FILE))
        .is_ok_and(|lines| lines.iter().any(|line| matches(line, &entry)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn read(dir: &Path) -> String {
        fs::read_to_string(dir.join(GITIGNORE_FILE)).unwrap()
    }

    #[test]
    fn adds_block_after_existing_rules() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(GITIGNORE_FILE), ".DS_Store\r\n").unwrap();

        assert!(add_ignore_entry(tmp.path(), "_team").unwrap());
        assert!(!add_ignore_entry(tmp.path(), "_team/").unwrap());
        assert!(add_ignore_entry(tmp.path(), "_other").unwrap());
        assert_eq!(
            read(tmp.path()),
            ".DS_Store\n\n# BEGIN SKILLSHARE MANAGED - DO NOT EDIT\n_team/\n_other/\n# END SKILLSHARE MANAGED\n"
        );
    }

    #[test]
    fn removes_only_inside_the_block() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(GITIGNORE_FILE),
            "_team/\n# BEGIN SKILLSHARE MANAGED - DO NOT EDIT\n_team\n_other/\n# END SKILLSHARE MANAGED\n",
        )
        .unwrap();

        assert!(remove_ignore_entry(tmp.path(), "_team").unwrap());
        assert!(!remove_ignore_entry(tmp.path(), "_team").unwrap());
        assert_eq!(
            read(tmp.path()),
            "_team/\n# BEGIN SKILLSHARE MANAGED - DO NOT EDIT\n_other/\n# END SKILLSHARE MANAGED\n"
        );
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let tmp = TempDir::new().unwrap();
        assert!(!remove_ignore_entry(tmp.path(), "_team").unwrap());
        assert!(!tmp.path().join(GITIGNORE_FILE).exists());
        assert!(!is_ignored(tmp.path(), "_team"));
        fs::write(tmp.path().join(GITIGNORE_FILE), "/_team/\n").unwrap();
        assert!(is_ignored(tmp.path(), "_team"));
    }
}
