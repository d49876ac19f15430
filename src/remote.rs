//! Sharing the source directory through its git remote.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::Config;
use crate::error::{Result, SkillshareError};
use crate::storage::SourceRepo;
use crate::storage::git::{CommitInfo, DiffStats};
use crate::store::discover_source_skills;
use crate::sync::{SyncOptions, SyncResult, sync};

pub const DEFAULT_COMMIT_MESSAGE: &str = "Update skills";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PushRequest {
    pub message: Option<String>,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushResult {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PullRequest {
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullResult {
    pub success: bool,
    pub up_to_date: bool,
    pub commits: Vec<CommitInfo>,
    pub stats: DiffStats,
    pub sync_results: Vec<SyncResult>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub dry_run: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

fn open_with_remote(config: &Config) -> Result<SourceRepo> {
    let repo = SourceRepo::require(&config.source)?;
    if !repo.has_remote() {
        return Err(SkillshareError::InvalidInput(
            "source repository has no remote; add one with `git remote add origin <url>`".to_string(),
        ));
    }
    Ok(repo)
}

/// Stage everything, commit and push to `origin`.
pub fn push(config: &Config, request: &PushRequest) -> Result<PushResult> {
    let repo = open_with_remote(config)?;
    let dirty = repo.dirty_files()?;

    if request.dry_run {
        let message = if dirty.is_empty() {
            "nothing to commit; would push current branch".to_string()
        } else {
            format!("would commit {} file(s) and push", dirty.len())
        };
        return Ok(PushResult {
            success: true,
            message,
            dry_run: true,
        });
    }

    let commit_message = request
        .message
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or(DEFAULT_COMMIT_MESSAGE);
    let commit = repo.commit_all(commit_message)?;
    repo.push()?;

    let message = match commit {
        Some(hash) => format!("committed {} file(s) as {hash} and pushed", dirty.len()),
        None => "nothing to commit; pushed".to_string(),
    };
    info!(%message, "push finished");
    Ok(PushResult {
        success: true,
        message,
        dry_run: false,
    })
}

/// Fast-forward the source from `origin`, then sync every target.
pub fn pull(config: &Config, request: &PullRequest) -> Result<PullResult> {
    let repo = open_with_remote(config)?;
    let dirty = repo.dirty_files()?;

    if request.dry_run {
        let message = if dirty.is_empty() {
            "would pull from origin and sync all targets".to_string()
        } else {
            format!("{} uncommitted file(s) would block the pull", dirty.len())
        };
        return Ok(PullResult {
            success: dirty.is_empty(),
            dry_run: true,
            message: Some(message),
            ..PullResult::default()
        });
    }

    if !dirty.is_empty() {
        return Err(SkillshareError::Conflict(format!(
            "source has {} uncommitted file(s); push or discard them before pulling",
            dirty.len()
        )));
    }

    let pulled = repo.pull(false)?;
    let skills = discover_source_skills(&config.source)?;
    let sync_results = sync(config, &skills, &SyncOptions::default())?;
    info!(
        up_to_date = pulled.up_to_date,
        commits = pulled.commits.len(),
        "pull finished"
    );
    Ok(PullResult {
        success: true,
        up_to_date: pulled.up_to_date,
        commits: pulled.commits,
        stats: pulled.stats,
        sync_results,
        dry_run: false,
        message: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TargetConfig;
    use crate::storage::git::clone_repo;
    use crate::storage::git::test_support::init_with_commit;
    use tempfile::TempDir;

    fn cloned() -> (TempDir, Config) {
        let tmp = TempDir::new().unwrap();
        let upstream = tmp.path().join("upstream");
        init_with_commit(&upstream, &[("pdf/SKILL.md", "# pdf\n")]);
        let mut config = Config::parse("", tmp.path()).unwrap();
        clone_repo(&upstream.display().to_string(), &config.source).unwrap();
        config
            .targets
            .insert("claude".to_string(), TargetConfig::new(tmp.path().join("claude")));
        (tmp, config)
    }

    #[test]
    fn pull_without_remote_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let config = Config::parse("", tmp.path()).unwrap();
        init_with_commit(&config.source, &[("pdf/SKILL.md", "# pdf\n")]);
        let err = pull(&config, &PullRequest::default()).unwrap_err();
        assert!(matches!(err, SkillshareError::InvalidInput(_)));
    }

    #[test]
    fn pull_up_to_date_still_syncs() {
        let (_tmp, config) = cloned();
        let result = pull(&config, &PullRequest::default()).unwrap();
        assert!(result.up_to_date);
        assert_eq!(result.sync_results.len(), 1);
        assert_eq!(result.sync_results[0].linked, vec!["pdf"]);
    }

    #[test]
    fn dirty_source_blocks_pull() {
        let (_tmp, config) = cloned();
        std::fs::write(config.source.join("pdf/notes.md"), "local").unwrap();

        let preview = pull(&config, &PullRequest { dry_run: true }).unwrap();
        assert!(!preview.success);
        assert!(matches!(
            pull(&config, &PullRequest::default()),
            Err(SkillshareError::Conflict(_))
        ));
    }

    #[test]
    fn push_dry_run_counts_changes() {
        let (_tmp, config) = cloned();
        std::fs::write(config.source.join("pdf/notes.md"), "local").unwrap();
        let result = push(
            &config,
            &PushRequest {
                message: None,
                dry_run: true,
            },
        )
        .unwrap();
        assert!(result.dry_run);
        assert!(result.message.contains("1 file"));
    }
}
