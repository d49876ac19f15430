use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::audit::Severity;
use crate::error::{Result, SkillshareError};
use crate::utils::fs::expand_tilde;

/// How a target receives skills from the source directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// One symlink per skill inside a real target directory.
    #[default]
    Merge,
    /// Full content copies tracked by a checksum manifest.
    Copy,
    /// The whole target directory is a single symlink to the source.
    Symlink,
}

impl SyncMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Merge => "merge",
            Self::Copy => "copy",
            Self::Symlink => "symlink",
        }
    }
}

impl std::fmt::Display for SyncMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SyncMode {
    type Err = SkillshareError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "merge" => Ok(Self::Merge),
            "copy" => Ok(Self::Copy),
            "symlink" => Ok(Self::Symlink),
            _ => Err(SkillshareError::InvalidInput(format!(
                "invalid mode {value} (expected merge|copy|symlink)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding every skill; defaults to `<root>/skills`.
    #[serde(default)]
    pub source: PathBuf,
    /// Mode used by targets that do not set their own.
    #[serde(default)]
    pub mode: SyncMode,
    #[serde(default)]
    pub targets: BTreeMap<String, TargetConfig>,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub backup: BackupConfig,
    #[serde(default)]
    pub trash: TrashConfig,
    #[serde(default)]
    pub lock: LockConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: PathBuf::new(),
            mode: SyncMode::Merge,
            targets: BTreeMap::new(),
            audit: AuditConfig::default(),
            backup: BackupConfig::default(),
            trash: TrashConfig::default(),
            lock: LockConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Config {
    pub fn load(explicit_path: Option<&Path>, root: &Path) -> Result<Self> {
        let mut config = Self::default();

        let explicit = explicit_path
            .map(PathBuf::from)
            .or_else(|| std::env::var("SKILLSHARE_CONFIG").ok().map(PathBuf::from));

        if let Some(path) = explicit {
            if let Some(patch) = Self::load_patch(&path)? {
                config.merge_patch(patch);
            }
        } else {
            if let Some(global) = Self::load_global()? {
                config.merge_patch(global);
            }
            if let Some(local) = Self::load_patch(&root.join("config.toml"))? {
                config.merge_patch(local);
            }
        }

        config.apply_env_overrides()?;
        config.finalize(root);

        Ok(config)
    }

    /// Parse a full config document, e.g. one submitted through the API.
    pub fn parse(raw: &str, root: &Path) -> Result<Self> {
        let patch: ConfigPatch = toml::from_str(raw)?;
        let mut config = Self::default();
        config.merge_patch(patch);
        config.finalize(root);
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = toml::to_string_pretty(self)?;
        std::fs::write(path, raw)?;
        Ok(())
    }

    /// Effective mode for a target, falling back to the global mode.
    #[must_use]
    pub fn mode_for(&self, target: &TargetConfig) -> SyncMode {
        target.mode.unwrap_or(self.mode)
    }

    pub fn target(&self, name: &str) -> Result<&TargetConfig> {
        self.targets
            .get(name)
            .ok_or_else(|| SkillshareError::NotFound(format!("target {name}")))
    }

    fn load_global() -> Result<Option<ConfigPatch>> {
        let Some(dir) = dirs::config_dir() else {
            return Ok(None);
        };
        Self::load_patch(&dir.join("skillshare/config.toml"))
    }

    fn load_patch(path: &Path) -> Result<Option<ConfigPatch>> {
        if !path.exists() {
            return Ok(None);
        }

        let raw = std::fs::read_to_string(path).map_err(|err| {
            SkillshareError::Config(format!("read config {}: {err}", path.display()))
        })?;
        let patch = toml::from_str(&raw).map_err(|err| {
            SkillshareError::Config(format!("parse config {}: {err}", path.display()))
        })?;
        Ok(Some(patch))
    }

    fn merge_patch(&mut self, patch: ConfigPatch) {
        if let Some(source) = patch.source {
            self.source = source;
        }
        if let Some(mode) = patch.mode {
            self.mode = mode;
        }
        if let Some(targets) = patch.targets {
            // Later layers replace whole target entries by name.
            self.targets.extend(targets);
        }
        if let Some(patch) = patch.audit {
            self.audit.merge(patch);
        }
        if let Some(patch) = patch.backup {
            self.backup.merge(patch);
        }
        if let Some(patch) = patch.trash {
            self.trash.merge(patch);
        }
        if let Some(patch) = patch.lock {
            self.lock.merge(patch);
        }
        if let Some(patch) = patch.server {
            self.server.merge(patch);
        }
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(value) = env_string("SKILLSHARE_SOURCE") {
            self.source = PathBuf::from(value);
        }
        if let Some(value) = env_string("SKILLSHARE_MODE") {
            self.mode = value.parse()?;
        }
        if let Some(value) = env_string("SKILLSHARE_AUDIT_THRESHOLD") {
            self.audit.block_threshold = value
                .parse()
                .map_err(|err| SkillshareError::Config(format!("SKILLSHARE_AUDIT_THRESHOLD: {err}")))?;
        }
        if let Some(value) = env_u32("SKILLSHARE_BACKUP_MAX_AGE_DAYS")? {
            self.backup.max_age_days = value;
        }
        if let Some(value) = env_u32("SKILLSHARE_BACKUP_MAX_COUNT")? {
            self.backup.max_count = value as usize;
        }
        if let Some(value) = env_u64("SKILLSHARE_BACKUP_MAX_SIZE_MB")? {
            self.backup.max_size_mb = value;
        }
        if let Some(value) = env_u32("SKILLSHARE_TRASH_TTL_DAYS")? {
            self.trash.ttl_days = value;
        }
        if let Some(value) = env_u64("SKILLSHARE_LOCK_TIMEOUT_SECS")? {
            self.lock.timeout = Duration::from_secs(value);
        }
        if let Some(value) = env_u32("SKILLSHARE_PORT")? {
            self.server.port = u16::try_from(value)
                .map_err(|_| SkillshareError::Config(format!("invalid SKILLSHARE_PORT {value}")))?;
        }
        Ok(())
    }

    /// Fill the source default and expand `~` in every path.
    fn finalize(&mut self, root: &Path) {
        if self.source.as_os_str().is_empty() {
            self.source = root.join("skills");
        } else {
            self.source = expand_tilde(&self.source.to_string_lossy());
        }
        for target in self.targets.values_mut() {
            target.path = expand_tilde(&target.path.to_string_lossy());
            target.include = merge_unique(std::mem::take(&mut target.include), &[]);
            target.exclude = merge_unique(std::mem::take(&mut target.exclude), &[]);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetConfig {
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<SyncMode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
}

impl TargetConfig {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Findings at or above this severity block installation.
    #[serde(default)]
    pub block_threshold: Severity,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            block_threshold: Severity::Critical,
        }
    }
}

impl AuditConfig {
    fn merge(&mut self, patch: AuditPatch) {
        if let Some(value) = patch.block_threshold {
            self.block_threshold = value;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    pub max_age_days: u32,
    pub max_count: usize,
    pub max_size_mb: u64,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            max_age_days: 30,
            max_count: 10,
            max_size_mb: 500,
        }
    }
}

impl BackupConfig {
    fn merge(&mut self, patch: BackupPatch) {
        if let Some(value) = patch.max_age_days {
            self.max_age_days = value;
        }
        if let Some(value) = patch.max_count {
            self.max_count = value;
        }
        if let Some(value) = patch.max_size_mb {
            self.max_size_mb = value;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrashConfig {
    pub ttl_days: u32,
}

impl Default for TrashConfig {
    fn default() -> Self {
        Self { ttl_days: 7 }
    }
}

impl TrashConfig {
    fn merge(&mut self, patch: TrashPatch) {
        if let Some(value) = patch.ttl_days {
            self.ttl_days = value;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockConfig {
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
        }
    }
}

impl LockConfig {
    fn merge(&mut self, patch: LockPatch) {
        if let Some(value) = patch.timeout {
            self.timeout = value;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 19420,
        }
    }
}

impl ServerConfig {
    fn merge(&mut self, patch: ServerPatch) {
        if let Some(value) = patch.host {
            self.host = value;
        }
        if let Some(value) = patch.port {
            self.port = value;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigPatch {
    pub source: Option<PathBuf>,
    pub mode: Option<SyncMode>,
    pub targets: Option<BTreeMap<String, TargetConfig>>,
    pub audit: Option<AuditPatch>,
    pub backup: Option<BackupPatch>,
    pub trash: Option<TrashPatch>,
    pub lock: Option<LockPatch>,
    pub server: Option<ServerPatch>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct AuditPatch {
    pub block_threshold: Option<Severity>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct BackupPatch {
    pub max_age_days: Option<u32>,
    pub max_count: Option<usize>,
    pub max_size_mb: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct TrashPatch {
    pub ttl_days: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct LockPatch {
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ServerPatch {
    pub host: Option<String>,
    pub port: Option<u16>,
}

pub(crate) fn merge_unique(values: Vec<String>, existing: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for value in values.into_iter().chain(existing.iter().cloned()) {
        let value = value.trim().to_string();
        if value.is_empty() {
            continue;
        }
        if seen.insert(value.clone()) {
            out.push(value);
        }
    }
    out
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn env_u32(key: &str) -> Result<Option<u32>> {
    match std::env::var(key) {
        Ok(value) => value.trim().parse::<u32>().map(Some).map_err(|err| {
            SkillshareError::Config(format!("invalid {key} value {value}: {err}"))
        }),
        Err(_) => Ok(None),
    }
}

fn env_u64(key: &str) -> Result<Option<u64>> {
    match std::env::var(key) {
        Ok(value) => value.trim().parse::<u64>().map(Some).map_err(|err| {
            SkillshareError::Config(format!("invalid {key} value {value}: {err}"))
        }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn parse_fills_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = Config::parse("", tmp.path()).unwrap();
        assert_eq!(config.source, tmp.path().join("skills"));
        assert_eq!(config.mode, SyncMode::Merge);
        assert_eq!(config.backup.max_count, 10);
        assert_eq!(config.backup.max_age_days, 30);
        assert_eq!(config.backup.max_size_mb, 500);
        assert_eq!(config.trash.ttl_days, 7);
        assert_eq!(config.audit.block_threshold, Severity::Critical);
    }

    #[test]
    fn parse_targets_and_threshold() {
        let tmp = TempDir::new().unwrap();
        let raw = r#"
source = "/data/skills"
mode = "copy"

[audit]
block_threshold = "high"

[lock]
timeout = "5s"

[targets.claude]
path = "/home/u/.claude/skills"
include = ["a*", "a*"]

[targets.codex]
path = "/home/u/.codex/skills"
mode = "merge"
"#;
        let config = Config::parse(raw, tmp.path()).unwrap();
        assert_eq!(config.source, PathBuf::from("/data/skills"));
        assert_eq!(config.mode, SyncMode::Copy);
        assert_eq!(config.audit.block_threshold, Severity::High);
        assert_eq!(config.lock.timeout, Duration::from_secs(5));

        let claude = config.target("claude").unwrap();
        assert_eq!(claude.include, vec!["a*".to_string()]);
        assert_eq!(config.mode_for(claude), SyncMode::Copy);
        let codex = config.target("codex").unwrap();
        assert_eq!(config.mode_for(codex), SyncMode::Merge);
    }

    #[test]
    fn unknown_target_is_not_found() {
        let config = Config::default();
        assert!(matches!(
            config.target("nope"),
            Err(SkillshareError::NotFound(_))
        ));
    }

    #[test]
    fn save_then_load_round_trips_targets() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::parse("", tmp.path()).unwrap();
        config
            .targets
            .insert("claude".to_string(), TargetConfig::new(tmp.path().join("t")));
        let path = tmp.path().join("config.toml");
        config.save(&path).unwrap();

        let loaded = Config::load(Some(&path), tmp.path()).unwrap();
        assert!(loaded.targets.contains_key("claude"));
    }

    #[test]
    fn invalid_mode_is_rejected() {
        assert!("weird".parse::<SyncMode>().is_err());
        assert_eq!("Copy".parse::<SyncMode>().unwrap(), SyncMode::Copy);
    }
}
