//! Error types for skillshare.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, SkillshareError>;

#[derive(Debug, Error)]
pub enum SkillshareError {
    /// Unknown skill, target, backup or trash entry.
    #[error("not found: {0}")]
    NotFound(String),

    /// A destructive operation would overwrite local state; retry with force.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Installation blocked by the security audit.
    #[error("{0}")]
    AuditBlocked(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("missing configuration: {0}")]
    MissingConfig(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("timed out waiting for lock on {0}")]
    LockTimeout(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("git error: {0}")]
    Git(#[from] git2::Error),
}

impl SkillshareError {
    /// Short machine-readable code used by robot output and the HTTP layer.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::AuditBlocked(_) => "audit_blocked",
            Self::InvalidInput(_) => "invalid_input",
            Self::Config(_) => "config",
            Self::MissingConfig(_) => "missing_config",
            Self::Serialization(_) => "serialization",
            Self::LockTimeout(_) => "lock_timeout",
            Self::Io(_) => "io",
            Self::Git(_) => "git",
        }
    }
}

impl From<serde_json::Error> for SkillshareError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for SkillshareError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for SkillshareError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for SkillshareError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<glob::PatternError> for SkillshareError {
    fn from(err: glob::PatternError) -> Self {
        Self::InvalidInput(format!("invalid pattern: {err}"))
    }
}

impl From<regex::Error> for SkillshareError {
    fn from(err: regex::Error) -> Self {
        Self::InvalidInput(format!("invalid regex: {err}"))
    }
}

impl From<walkdir::Error> for SkillshareError {
    fn from(err: walkdir::Error) -> Self {
        match err.into_io_error() {
            Some(io) => Self::Io(io),
            None => Self::Io(std::io::Error::other("filesystem loop detected")),
        }
    }
}
