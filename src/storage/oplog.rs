//! Append-only JSONL operation log.
//!
//! Mutating commands write one record per run to `logs/operations.log`;
//! audit runs go to `logs/audit.log`. Reads return newest first.

use std::collections::BTreeSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Instant;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Result, SkillshareError};

pub const DEFAULT_LIMIT: usize = 100;

/// Which log file a record belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    #[default]
    Ops,
    Audit,
}

impl LogKind {
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Ops => "operations.log",
            Self::Audit => "audit.log",
        }
    }
}

impl FromStr for LogKind {
    type Err = SkillshareError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "" | "ops" | "operations" => Ok(Self::Ops),
            "audit" => Ok(Self::Audit),
            other => Err(SkillshareError::InvalidInput(format!(
                "unknown log type {other:?} (expected ops|audit)"
            ))),
        }
    }
}

/// One log record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub ts: DateTime<Utc>,
    pub cmd: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<serde_json::Value>,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ms: Option<u64>,
}

impl LogEntry {
    /// Record for a command that started at `started`.
    #[must_use]
    pub fn new(cmd: &str, status: &str, started: Instant) -> Self {
        Self {
            ts: Utc::now(),
            cmd: cmd.to_string(),
            args: None,
            status: status.to_string(),
            msg: None,
            ms: Some(u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)),
        }
    }

    #[must_use]
    pub fn with_args(mut self, args: serde_json::Value) -> Self {
        self.args = Some(args);
        self
    }

    #[must_use]
    pub fn with_msg(mut self, msg: impl Into<String>) -> Self {
        let msg = msg.into();
        if !msg.is_empty() {
            self.msg = Some(msg);
        }
        self
    }
}

/// Filters for [`OpLog::read`].
#[derive(Debug, Clone, Default)]
pub struct LogQuery {
    pub limit: Option<usize>,
    pub cmd: Option<String>,
    pub status: Option<String>,
    pub since: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogPage {
    pub entries: Vec<LogEntry>,
    /// Records matching the filters.
    pub total: usize,
    /// Records in the file.
    pub total_all: usize,
    /// Distinct commands in the file, sorted.
    pub commands: Vec<String>,
}

/// Handle on the `logs/` directory of a data root.
#[derive(Debug, Clone)]
pub struct OpLog {
    dir: PathBuf,
}

impl OpLog {
    #[must_use]
    pub fn new(root: &Path) -> Self {
        Self {
            dir: root.join("logs"),
        }
    }

    #[must_use]
    pub fn path(&self, kind: LogKind) -> PathBuf {
        self.dir.join(kind.file_name())
    }

    pub fn append(&self, kind: LogKind, entry: &LogEntry) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path(kind))?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    /// Append, logging instead of failing. The operation being recorded has
    /// already happened, so a log write error must not turn it into a failure.
    pub fn record(&self, kind: LogKind, entry: &LogEntry) {
        if let Err(err) = self.append(kind, entry) {
            warn!(cmd = %entry.cmd, error = %err, "failed to write operation log");
        }
    }

    /// Read matching records, newest first. Malformed lines are skipped.
    pub fn read(&self, kind: LogKind, query: &LogQuery) -> Result<LogPage> {
        let path = self.path(kind);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(err) => return Err(err.into()),
        };

        let mut all: Vec<LogEntry> = content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect();
        all.reverse();

        let commands = all
            .iter()
            .map(|entry| entry.cmd.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let total_all = all.len();

        let matching: Vec<LogEntry> = all
            .into_iter()
            .filter(|entry| query.cmd.as_deref().is_none_or(|cmd| entry.cmd == cmd))
            .filter(|entry| {
                query
                    .status
                    .as_deref()
                    .is_none_or(|status| entry.status == status)
            })
            .filter(|entry| query.since.is_none_or(|since| entry.ts >= since))
            .collect();
        let total = matching.len();
        let limit = query.limit.filter(|limit| *limit > 0).unwrap_or(DEFAULT_LIMIT);

        Ok(LogPage {
            entries: matching.into_iter().take(limit).collect(),
            total,
            total_all,
            commands,
        })
    }

    /// Truncate one log file.
    pub fn clear(&self, kind: LogKind) -> Result<()> {
        let path = self.path(kind);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// Parse a `since` filter: a relative duration (`30m`, `24h`, `7days`), an
/// RFC 3339 timestamp or a `YYYY-MM-DD` date.
pub fn parse_since(value: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        && let Some(midnight) = date.and_hms_opt(0, 0, 0)
    {
        return Ok(midnight.and_utc());
    }
    let duration = humantime_serde::re::humantime::parse_duration(value)
        .map_err(|err| SkillshareError::InvalidInput(format!("invalid since {value:?}: {err}")))?;
    let delta = chrono::Duration::from_std(duration)
        .map_err(|err| SkillshareError::InvalidInput(format!("invalid since {value:?}: {err}")))?;
    Ok(now - delta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn entry(cmd: &str, status: &str, ts: DateTime<Utc>) -> LogEntry {
        LogEntry {
            ts,
            cmd: cmd.to_string(),
            args: None,
            status: status.to_string(),
            msg: None,
            ms: Some(1),
        }
    }

    #[test]
    fn read_returns_newest_first_with_filters() {
        let tmp = TempDir::new().unwrap();
        let log = OpLog::new(tmp.path());
        let base = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        log.append(LogKind::Ops, &entry("sync", "ok", base)).unwrap();
        log.append(LogKind::Ops, &entry("install", "error", base + chrono::Duration::hours(1)))
            .unwrap();
        log.append(LogKind::Ops, &entry("sync", "ok", base + chrono::Duration::hours(2)))
            .unwrap();

        let page = log.read(LogKind::Ops, &LogQuery::default()).unwrap();
        assert_eq!(page.total_all, 3);
        assert_eq!(page.entries[0].ts, base + chrono::Duration::hours(2));
        assert_eq!(page.commands, vec!["install", "sync"]);

        let page = log
            .read(
                LogKind::Ops,
                &LogQuery {
                    cmd: Some("sync".to_string()),
                    limit: Some(1),
                    ..LogQuery::default()
                },
            )
            .unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.entries.len(), 1);

        let page = log
            .read(
                LogKind::Ops,
                &LogQuery {
                    since: Some(base + chrono::Duration::minutes(30)),
                    status: Some("ok".to_string()),
                    ..LogQuery::default()
                },
            )
            .unwrap();
        assert_eq!(page.total, 1);
    }

    #[test]
    fn malformed_lines_are_skipped_and_clear_empties() {
        let tmp = TempDir::new().unwrap();
        let log = OpLog::new(tmp.path());
        log.append(LogKind::Audit, &entry("audit", "ok", Utc::now())).unwrap();
        let mut file = OpenOptions::new()
            .append(true)
            .open(log.path(LogKind::Audit))
            .unwrap();
        writeln!(file, "not json").unwrap();

        assert_eq!(log.read(LogKind::Audit, &LogQuery::default()).unwrap().total_all, 1);
        log.clear(LogKind::Audit).unwrap();
        assert_eq!(log.read(LogKind::Audit, &LogQuery::default()).unwrap().total_all, 0);
    }

    #[test]
    fn parse_since_accepts_durations_and_dates() {
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        assert_eq!(parse_since("2h", now).unwrap(), now - chrono::Duration::hours(2));
        assert_eq!(
            parse_since("2026-03-01", now).unwrap(),
            Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()
        );
        assert!(parse_since("yesterday-ish", now).is_err());
    }

    #[test]
    fn log_kind_parses() {
        assert_eq!("audit".parse::<LogKind>().unwrap(), LogKind::Audit);
        assert_eq!("".parse::<LogKind>().unwrap(), LogKind::Ops);
        assert!("debug".parse::<LogKind>().is_err());
    }
}
