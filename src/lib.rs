//! skillshare - one source of agent skills, synced to every CLI.
//!
//! The library holds the engines (sync, collect, backup, trash, install,
//! audit) and the HTTP API; `main.rs` is a thin clap front end over it.

pub mod app;
pub mod audit;
pub mod backup;
pub mod cli;
pub mod collect;
pub mod config;
pub mod doctor;
pub mod error;
pub mod install;
pub mod remote;
pub mod security;
pub mod server;
pub mod storage;
pub mod store;
pub mod sync;
pub mod targets;
pub mod trash;
pub mod utils;

pub use error::{Result, SkillshareError};
