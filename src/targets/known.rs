//! Skills directories of well-known agent CLIs.

use std::path::PathBuf;

use crate::utils::fs::expand_tilde;

/// `(name, path)` pairs; paths may start with `~`.
pub const KNOWN_TARGETS: &[(&str, &str)] = &[
    ("amp", "~/.config/agents/skills"),
    ("claude", "~/.claude/skills"),
    ("codex", "~/.codex/skills"),
    ("copilot", "~/.copilot/skills"),
    ("cursor", "~/.cursor/skills"),
    ("gemini", "~/.gemini/skills"),
    ("goose", "~/.config/goose/skills"),
    ("kiro", "~/.kiro/skills"),
    ("opencode", "~/.config/opencode/skill"),
    ("windsurf", "~/.codeium/windsurf/skills"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownTarget {
    pub name: &'static str,
    pub path: PathBuf,
}

impl KnownTarget {
    /// The tool looks installed: the parent of its skills directory exists.
    #[must_use]
    pub fn detected(&self) -> bool {
        self.path.parent().is_some_and(std::path::Path::is_dir)
    }
}

#[must_use]
pub fn known_targets() -> Vec<KnownTarget> {
    KNOWN_TARGETS
        .iter()
        .map(|(name, path)| KnownTarget {
            name,
            path: expand_tilde(path),
        })
        .collect()
}
