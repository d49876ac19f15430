//! On-disk state that is not skill content: the source lock, the operation
//! log and git access to the source directory.

pub mod git;
pub mod lock;
pub mod oplog;

pub use git::{GitStatus, PullInfo, SourceRepo};
pub use lock::SourceLock;
pub use oplog::{LogEntry, LogKind, LogQuery, OpLog};
