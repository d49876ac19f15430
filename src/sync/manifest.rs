//! Copy-mode bookkeeping: which target entries skillshare owns, and the
//! content checksum each was copied with.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;
use walkdir::WalkDir;

use crate::error::Result;

pub const MANIFEST_FILE: &str = ".skillshare-manifest.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// flat name -> directory checksum
    #[serde(default)]
    pub managed: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Manifest {
    /// Read the manifest in `target`. Missing or corrupt files read as empty
    /// so the next sync rebuilds them.
    #[must_use]
    pub fn read(target: &Path) -> Self {
        let path = target.join(MANIFEST_FILE);
        let Ok(raw) = fs::read_to_string(&path) else {
            return Self::default();
        };
        serde_json::from_str(&raw).unwrap_or_else(|err| {
            warn!(path = %path.display(), error = %err, "corrupt manifest, treating as empty");
            Self::default()
        })
    }

    pub fn write(&mut self, target: &Path) -> Result<()> {
        self.updated_at = Some(Utc::now());
        let json = serde_json::to_string_pretty(self)?;
        fs::write(target.join(MANIFEST_FILE), json)?;
        Ok(())
    }

    /// Delete the manifest from `target`, if present.
    pub fn remove(target: &Path) -> Result<()> {
        match fs::remove_file(target.join(MANIFEST_FILE)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    #[must_use]
    pub fn is_managed(&self, flat_name: &str) -> bool {
        self.managed.contains_key(flat_name)
    }
}

/// SHA-256 over sorted relative paths and contents (`path\0content\0`),
/// ignoring `.git`.
pub fn dir_checksum(dir: &Path) -> Result<String> {
    let mut files = Vec::new();
    let walker = WalkDir::new(dir)
        .min_depth(1)
        .into_iter()
        .filter_entry(|entry| !(entry.file_type().is_dir() && entry.file_name() == ".git"));
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(dir) else {
            continue;
        };
        let rel = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        files.push((rel, entry.into_path()));
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));

    let mut hasher = Sha256::new();
    for (rel, path) in files {
        hasher.update(rel.as_bytes());
        hasher.update([0]);
        hasher.update(fs::read(path)?);
        hasher.update([0]);
    }
    Ok(hex::encode(hasher.finalize()))
}
