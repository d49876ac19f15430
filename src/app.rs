use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::audit::{Scanner, Severity};
use crate::backup::BackupStore;
use crate::config::Config;
use crate::error::{Result, SkillshareError};
use crate::install::Installer;
use crate::storage::{LogEntry, LogKind, OpLog, SourceLock};
use crate::store::{Skill, discover_source_skills};
use crate::trash::TrashStore;

pub const AUDIT_RULES_FILE: &str = "audit-rules.yaml";

/// Everything a command or request handler needs: the data root, the
/// resolved configuration and output preferences.
#[derive(Debug, Clone)]
pub struct AppContext {
    pub root: PathBuf,
    pub config_path: PathBuf,
    pub config: Config,
    pub robot_mode: bool,
    pub verbosity: u8,
}

impl AppContext {
    pub fn from_cli(cli: &crate::cli::Cli) -> Result<Self> {
        let root = Self::find_root()?;
        let mut ctx = Self::open(&root, cli.config.as_deref())?;
        ctx.robot_mode = cli.robot;
        ctx.verbosity = cli.verbose;
        Ok(ctx)
    }

    /// Load the configuration layered for `root`.
    pub fn open(root: &Path, explicit_config: Option<&Path>) -> Result<Self> {
        let config_path = explicit_config
            .map(PathBuf::from)
            .or_else(|| std::env::var("SKILLSHARE_CONFIG").ok().map(PathBuf::from))
            .unwrap_or_else(|| default_config_path(root));
        let config = Config::load(explicit_config, root)?;
        Ok(Self::with_config(root, config_path, config))
    }

    #[must_use]
    pub fn with_config(root: &Path, config_path: PathBuf, config: Config) -> Self {
        Self {
            root: root.to_path_buf(),
            config_path,
            config,
            robot_mode: false,
            verbosity: 0,
        }
    }

    /// `SKILLSHARE_ROOT`, else the nearest `.skillshare` directory above the
    /// working directory, else the platform data directory.
    pub fn find_root() -> Result<PathBuf> {
        if let Ok(root) = std::env::var("SKILLSHARE_ROOT") {
            return Ok(PathBuf::from(root));
        }
        let cwd = std::env::current_dir()?;
        if let Some(found) = find_upwards(&cwd, ".skillshare") {
            return Ok(found);
        }

        let data_dir = dirs::data_dir()
            .ok_or_else(|| SkillshareError::MissingConfig("data directory not found".to_string()))?;
        Ok(data_dir.join("skillshare"))
    }

    /// Project mode: the root is a `.skillshare` directory inside a project.
    #[must_use]
    pub fn is_project_mode(&self) -> bool {
        self.root.ends_with(".skillshare")
    }

    pub fn save_config(&self) -> Result<()> {
        self.config.save(&self.config_path)
    }

    /// Re-read the configuration layers, e.g. after the file was replaced.
    pub fn reload_config(&mut self) -> Result<()> {
        let explicit = (self.config_path != default_config_path(&self.root)).then(|| self.config_path.clone());
        self.config = Config::load(explicit.as_deref(), &self.root)?;
        Ok(())
    }

    pub fn skills(&self) -> Result<Vec<Skill>> {
        discover_source_skills(&self.config.source)
    }

    #[must_use]
    pub fn backups(&self) -> BackupStore {
        BackupStore::new(self.root.join("backups"))
    }

    #[must_use]
    pub fn trash(&self) -> TrashStore {
        TrashStore::new(self.root.join("trash"))
    }

    #[must_use]
    pub fn oplog(&self) -> OpLog {
        OpLog::new(&self.root)
    }

    #[must_use]
    pub fn audit_rules_path(&self) -> PathBuf {
        self.root.join(AUDIT_RULES_FILE)
    }

    /// Built-in rules merged with the user rules file, if any.
    pub fn scanner(&self) -> Result<Scanner> {
        let user = self.audit_rules_path();
        Scanner::load(user.is_file().then_some(user.as_path()))
    }

    #[must_use]
    pub fn threshold(&self) -> Severity {
        self.config.audit.block_threshold
    }

    #[must_use]
    pub fn installer<'a>(&self, scanner: &'a Scanner) -> Installer<'a> {
        Installer {
            source_dir: self.config.source.clone(),
            scanner,
            threshold: self.threshold(),
        }
    }

    /// Exclusive lock on the source, held until the guard drops.
    pub fn lock(&self) -> Result<SourceLock> {
        SourceLock::acquire_timeout(&self.root, &self.config.source, self.config.lock.timeout)
    }

    /// Append an operation record. Logging failures never fail the command.
    pub fn record<T>(&self, cmd: &str, started: Instant, args: serde_json::Value, outcome: &Result<T>) {
        let entry = match outcome {
            Ok(_) => LogEntry::new(cmd, "ok", started),
            Err(err) => LogEntry::new(cmd, "error", started).with_msg(err.to_string()),
        };
        let entry = if args.is_null() { entry } else { entry.with_args(args) };
        self.oplog().record(LogKind::Ops, &entry);
    }
}

fn default_config_path(root: &Path) -> PathBuf {
    root.join("config.toml")
}

fn find_upwards(start: &Path, name: &str) -> Option<PathBuf> {
    let mut current = Some(start);
    while let Some(dir) = current {
        let candidate = dir.join(name);
        if candidate.is_dir() {
            return Some(candidate);
        }
        current = dir.parent();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn find_upwards_locates_project_root() {
        let tmp = TempDir::new().unwrap();
        let project = tmp.path().join(".skillshare");
        let nested = tmp.path().join("a/b");
        std::fs::create_dir_all(&project).unwrap();
        std::fs::create_dir_all(&nested).unwrap();
        assert_eq!(find_upwards(&nested, ".skillshare"), Some(project));
    }

    #[test]
    fn paths_hang_off_the_root() {
        let tmp = TempDir::new().unwrap();
        let config = Config::parse("", tmp.path()).unwrap();
        let ctx = AppContext::with_config(tmp.path(), tmp.path().join("config.toml"), config);
        assert_eq!(ctx.backups().dir(), tmp.path().join("backups"));
        assert_eq!(ctx.trash().dir(), tmp.path().join("trash"));
        assert_eq!(ctx.audit_rules_path(), tmp.path().join(AUDIT_RULES_FILE));
        assert_eq!(ctx.config.source, tmp.path().join("skills"));
        assert!(!ctx.is_project_mode());
    }
}
