//! Validation for user-supplied names and relative paths.
//!
//! Skill names, target names, trash entries and the `/skills/:name/files/*`
//! endpoint all take strings from the outside world that end up joined onto
//! the source or data root. Everything goes through here first.

use std::path::{Component, Path, PathBuf};

use crate::error::{Result, SkillshareError};

/// Ways a user-supplied path can break out of its root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPolicyViolation {
    /// `..` or `.` used as a name, or `..` inside a relative path.
    TraversalAttempt,
    /// Absolute paths and drive prefixes are not accepted where a relative
    /// path is expected.
    NotRelative { path: String },
    /// A symlink along the path resolves outside the root.
    SymlinkEscape { symlink: PathBuf, root: PathBuf },
    InvalidComponent { component: String, reason: String },
}

impl std::fmt::Display for PathPolicyViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TraversalAttempt => write!(f, "path contains traversal sequences"),
            Self::NotRelative { path } => write!(f, "path {path:?} must be relative"),
            Self::SymlinkEscape { symlink, root } => {
                write!(f, "symlink {symlink:?} points outside {root:?}")
            }
            Self::InvalidComponent { component, reason } => {
                write!(f, "invalid name {component:?}: {reason}")
            }
        }
    }
}

impl std::error::Error for PathPolicyViolation {}

impl From<PathPolicyViolation> for SkillshareError {
    fn from(violation: PathPolicyViolation) -> Self {
        Self::InvalidInput(violation.to_string())
    }
}

/// Validate a single name (skill, target, repo, trash entry).
///
/// Rejects empty names, `.`/`..`, separators and NUL bytes.
pub fn validate_path_component(component: &str) -> std::result::Result<(), PathPolicyViolation> {
    let invalid = |reason: &str| PathPolicyViolation::InvalidComponent {
        component: component.to_string(),
        reason: reason.to_string(),
    };

    if component.trim().is_empty() {
        return Err(invalid("empty name"));
    }
    if component.contains('\0') {
        return Err(invalid("contains null byte"));
    }
    if component == ".." || component == "." {
        return Err(PathPolicyViolation::TraversalAttempt);
    }
    if component.contains('/') || component.contains('\\') {
        return Err(invalid("contains directory separator"));
    }
    Ok(())
}

/// Validate a `/`-separated relative path such as a skill `relPath` or the
/// `into` directory of an install.
pub fn validate_relative(relative: &str) -> std::result::Result<(), PathPolicyViolation> {
    if relative.contains('\0') {
        return Err(PathPolicyViolation::InvalidComponent {
            component: relative.to_string(),
            reason: "contains null byte".to_string(),
        });
    }
    if relative.starts_with('/') || relative.starts_with('\\') {
        return Err(PathPolicyViolation::NotRelative {
            path: relative.to_string(),
        });
    }
    for component in Path::new(relative).components() {
        match component {
            Component::ParentDir => return Err(PathPolicyViolation::TraversalAttempt),
            Component::RootDir | Component::Prefix(_) => {
                return Err(PathPolicyViolation::NotRelative {
                    path: relative.to_string(),
                });
            }
            Component::CurDir | Component::Normal(_) => {}
        }
    }
    Ok(())
}

/// Walk `path` below `root` and fail if any symlink component resolves
/// outside `root`. Dangling links are left for the caller's open to report.
pub fn deny_symlink_escape(
    path: &Path,
    root: &Path,
) -> std::result::Result<(), PathPolicyViolation> {
    let Ok(canonical_root) = root.canonicalize() else {
        return Ok(());
    };
    let Ok(rel) = path.strip_prefix(root) else {
        return Ok(());
    };

    let mut current = root.to_path_buf();
    for component in rel.components() {
        let Component::Normal(name) = component else {
            continue;
        };
        current.push(name);
        if !current.is_symlink() {
            continue;
        }
        if let Ok(resolved) = current.canonicalize()
            && !resolved.starts_with(&canonical_root)
        {
            return Err(PathPolicyViolation::SymlinkEscape {
                symlink: current,
                root: canonical_root,
            });
        }
    }
    Ok(())
}

/// Join a user-supplied relative path onto `root`.
///
/// With `check_escape`, symlinks along the joined path must stay inside
/// `root` as well.
pub fn safe_join(root: &Path, relative: &str, check_escape: bool) -> Result<PathBuf> {
    validate_relative(relative)?;
    let joined = root.join(relative);
    if check_escape {
        deny_symlink_escape(&joined, root)?;
    }
    Ok(joined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn component_accepts_plain_names() {
        for name in ["my-skill", "skill_123", "_team-repo", "frontend__react", "a.b"] {
            assert!(validate_path_component(name).is_ok(), "{name}");
        }
    }

    #[test]
    fn component_rejects_traversal_and_separators() {
        assert_eq!(
            validate_path_component(".."),
            Err(PathPolicyViolation::TraversalAttempt)
        );
        assert!(validate_path_component("foo/bar").is_err());
        assert!(validate_path_component("foo\\bar").is_err());
        assert!(validate_path_component("").is_err());
        assert!(validate_path_component("   ").is_err());
        assert!(validate_path_component("foo\0bar").is_err());
    }

    #[test]
    fn safe_join_keeps_relative_paths() {
        let root = Path::new("/data/skills");
        assert_eq!(
            safe_join(root, "my-skill/references/api.md", false).unwrap(),
            PathBuf::from("/data/skills/my-skill/references/api.md")
        );
    }

    #[test]
    fn safe_join_blocks_traversal_and_absolute() {
        let root = Path::new("/data/skills");
        assert!(safe_join(root, "../escape", false).is_err());
        assert!(safe_join(root, "foo/../../etc/passwd", false).is_err());
        assert!(safe_join(root, "/etc/passwd", false).is_err());
    }

    #[test]
    fn violations_map_to_invalid_input() {
        let err: SkillshareError = PathPolicyViolation::TraversalAttempt.into();
        assert_eq!(err.code(), "invalid_input");
    }

    #[cfg(unix)]
    #[test]
    fn symlink_escape_is_detected() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("root");
        fs::create_dir(&root).unwrap();
        fs::write(root.join("inside.txt"), "safe").unwrap();
        let outside = temp.path().join("outside.txt");
        fs::write(&outside, "secret").unwrap();
        std::os::unix::fs::symlink(&outside, root.join("escape")).unwrap();

        assert!(matches!(
            safe_join(&root, "escape", true),
            Err(SkillshareError::InvalidInput(_))
        ));
        assert!(safe_join(&root, "inside.txt", true).is_ok());
    }
}
