//! Input hardening for names and paths that arrive from the CLI or HTTP API.

pub mod path_policy;

pub use path_policy::{
    PathPolicyViolation, deny_symlink_escape, safe_join, validate_path_component,
    validate_relative,
};
