//! E2E test suite entry point.

mod api_workflow;
#[path = "../common/mod.rs"]
mod common;
mod git_workflow;
mod skill_lifecycle;
