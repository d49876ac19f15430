//! Property suite: invariants that must hold for any sequence of operations.

#[path = "../common/mod.rs"]
mod common;
mod install_props;
mod maintenance_props;
mod sync_props;
