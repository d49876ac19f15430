//! Git operations on the source directory and tracked repos (git2).

use std::path::Path;

use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{
    AutotagOption, Cred, CredentialType, Direction, FetchOptions, IndexAddOption, Oid, PushOptions,
    RemoteCallbacks, Repository, ResetType, Signature, Status, StatusOptions,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, SkillshareError};

const REMOTE: &str = "origin";
const SHORT_HASH: usize = 7;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub hash: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffStats {
    pub files_changed: usize,
    pub insertions: usize,
    pub deletions: usize,
}

/// What a pull brought in.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullInfo {
    pub up_to_date: bool,
    pub commits: Vec<CommitInfo>,
    pub stats: DiffStats,
    pub before: String,
    pub after: String,
}

/// Summary used by `GET /git/status` and `skillshare status`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitStatus {
    pub is_repo: bool,
    pub has_remote: bool,
    pub branch: String,
    pub is_dirty: bool,
    pub files: Vec<String>,
    pub source_dir: String,
}

/// A working-tree repository: the source directory or a tracked repo.
pub struct SourceRepo {
    repo: Repository,
}

impl std::fmt::Debug for SourceRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceRepo")
            .field("path", &self.repo.workdir())
            .finish()
    }
}

impl SourceRepo {
    /// Open the repository rooted exactly at `path`; `None` when it is not one.
    pub fn open(path: &Path) -> Result<Option<Self>> {
        if !path.join(".git").exists() {
            return Ok(None);
        }
        match Repository::open(path) {
            Ok(repo) => Ok(Some(Self { repo })),
            Err(err) if err.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Like [`open`](Self::open) but a missing repo is an error.
    pub fn require(path: &Path) -> Result<Self> {
        Self::open(path)?.ok_or_else(|| {
            SkillshareError::InvalidInput(format!("{} is not a git repository", path.display()))
        })
    }

    #[must_use]
    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    #[must_use]
    pub fn has_remote(&self) -> bool {
        self.repo.find_remote(REMOTE).is_ok()
    }

    pub fn remote_url(&self) -> Option<String> {
        self.repo
            .find_remote(REMOTE)
            .ok()
            .and_then(|remote| remote.url().map(str::to_string))
    }

    /// Current branch name, empty for a detached or unborn HEAD.
    #[must_use]
    pub fn branch(&self) -> String {
        match self.repo.head() {
            Ok(head) if head.is_branch() => head.shorthand().unwrap_or_default().to_string(),
            Ok(_) => String::new(),
            Err(_) => self
                .repo
                .find_reference("HEAD")
                .ok()
                .and_then(|head| head.symbolic_target().map(str::to_string))
                .and_then(|target| target.strip_prefix("refs/heads/").map(str::to_string))
                .unwrap_or_default(),
        }
    }

    /// Short hash of HEAD, empty for an unborn repository.
    #[must_use]
    pub fn head_hash(&self) -> String {
        self.repo
            .head()
            .ok()
            .and_then(|head| head.target())
            .map(short)
            .unwrap_or_default()
    }

    /// Changed paths in `git status --short` form (`XY path`).
    pub fn dirty_files(&self) -> Result<Vec<String>> {
        let mut opts = StatusOptions::new();
        opts.include_untracked(true)
            .recurse_untracked_dirs(true)
            .include_ignored(false);
        let statuses = self.repo.statuses(Some(&mut opts))?;
        let mut files = Vec::new();
        for entry in statuses.iter() {
            let Some(path) = entry.path() else {
                continue;
            };
            files.push(format!("{} {path}", status_code(entry.status())));
        }
        Ok(files)
    }

    pub fn is_dirty(&self) -> Result<bool> {
        Ok(!self.dirty_files()?.is_empty())
    }

    /// Stage everything (including deletions) and commit. `None` when there
    /// was nothing to commit.
    pub fn commit_all(&self, message: &str) -> Result<Option<String>> {
        if !self.is_dirty()? {
            return Ok(None);
        }
        let mut index = self.repo.index()?;
        index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
        index.update_all(["*"].iter(), None)?;
        index.write()?;
        let tree = self.repo.find_tree(index.write_tree()?)?;

        let signature = self
            .repo
            .signature()
            .or_else(|_| Signature::now("skillshare", "skillshare@localhost"))?;
        let parent = self
            .repo
            .head()
            .ok()
            .and_then(|head| head.target())
            .map(|oid| self.repo.find_commit(oid))
            .transpose()?;
        let parents: Vec<_> = parent.iter().collect();

        let oid = self.repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            message,
            &tree,
            &parents,
        )?;
        info!(commit = %short(oid), "committed source changes");
        Ok(Some(short(oid)))
    }

    /// Push the current branch to `origin`.
    pub fn push(&self) -> Result<()> {
        let branch = self.branch();
        if branch.is_empty() {
            return Err(SkillshareError::InvalidInput(
                "cannot push from a detached HEAD".to_string(),
            ));
        }
        let config = self.repo.config()?;
        let mut callbacks = credential_callbacks(config);
        callbacks.push_update_reference(|refname, status| match status {
            Some(msg) => Err(git2::Error::from_str(&format!(
                "push of {refname} rejected: {msg}"
            ))),
            None => Ok(()),
        });
        let mut opts = PushOptions::new();
        opts.remote_callbacks(callbacks);

        let mut remote = self.repo.find_remote(REMOTE)?;
        let refspec = format!("refs/heads/{branch}:refs/heads/{branch}");
        remote.push(&[refspec.as_str()], Some(&mut opts))?;
        info!(%branch, "pushed to {REMOTE}");
        Ok(())
    }

    /// Fetch `origin` and fast-forward the current branch.
    ///
    /// With `force`, local history is reset to the remote branch instead of
    /// requiring a fast-forward.
    pub fn pull(&self, force: bool) -> Result<PullInfo> {
        let branch = self.branch();
        if branch.is_empty() {
            return Err(SkillshareError::InvalidInput(
                "cannot pull on a detached HEAD".to_string(),
            ));
        }
        let before = self.repo.head().ok().and_then(|head| head.target());
        let target = self.fetch_origin(&branch)?;

        if before == Some(target) {
            return Ok(PullInfo {
                up_to_date: true,
                before: before.map(short).unwrap_or_default(),
                after: short(target),
                ..PullInfo::default()
            });
        }

        let annotated = self.repo.find_annotated_commit(target)?;
        let (analysis, _) = self.repo.merge_analysis(&[&annotated])?;
        if analysis.is_up_to_date() {
            return Ok(PullInfo {
                up_to_date: true,
                before: before.map(short).unwrap_or_default(),
                after: before.map(short).unwrap_or_default(),
                ..PullInfo::default()
            });
        }

        if analysis.is_fast_forward() || analysis.is_unborn() {
            let local_ref = format!("refs/heads/{branch}");
            match self.repo.find_reference(&local_ref) {
                Ok(mut reference) => {
                    reference.set_target(target, "skillshare pull: fast-forward")?;
                }
                Err(_) => {
                    self.repo
                        .reference(&local_ref, target, true, "skillshare pull: initial")?;
                }
            }
            self.repo.set_head(&local_ref)?;
            self.repo
                .checkout_head(Some(CheckoutBuilder::new().force()))?;
        } else if force {
            let object = self.repo.find_object(target, None)?;
            self.repo.reset(&object, ResetType::Hard, None)?;
        } else {
            return Err(SkillshareError::Conflict(format!(
                "local branch {branch} has diverged from {REMOTE}; cannot fast-forward"
            )));
        }

        let commits = self.commits_between(before, target)?;
        let stats = self.diff_stats(before, target)?;
        debug!(commits = commits.len(), "pulled {REMOTE}/{branch}");
        Ok(PullInfo {
            up_to_date: false,
            commits,
            stats,
            before: before.map(short).unwrap_or_default(),
            after: short(target),
        })
    }

    /// Fetch `origin` and return the tip of `branch` on the remote.
    fn fetch_origin(&self, branch: &str) -> Result<Oid> {
        let config = self.repo.config()?;
        let mut fetch = FetchOptions::new();
        fetch
            .remote_callbacks(credential_callbacks(config))
            .download_tags(AutotagOption::None);
        let mut remote = self.repo.find_remote(REMOTE)?;
        remote.fetch(&[] as &[&str], Some(&mut fetch), None)?;

        let remote_ref = format!("refs/remotes/{REMOTE}/{branch}");
        match self.repo.find_reference(&remote_ref) {
            Ok(reference) => reference.target(),
            Err(_) => self
                .repo
                .find_reference("FETCH_HEAD")
                .ok()
                .and_then(|reference| reference.target()),
        }
        .ok_or_else(|| SkillshareError::NotFound(format!("remote branch {REMOTE}/{branch}")))
    }

    /// Fetch `origin` and count the remote commits the local branch lacks.
    /// Nothing is checked out.
    pub fn behind_count(&self) -> Result<usize> {
        let branch = self.branch();
        if branch.is_empty() {
            return Err(SkillshareError::InvalidInput(
                "cannot compare a detached HEAD".to_string(),
            ));
        }
        let target = self.fetch_origin(&branch)?;
        let Some(local) = self.repo.head().ok().and_then(|head| head.target()) else {
            return Ok(self.commits_between(None, target)?.len());
        };
        let (_, behind) = self.repo.graph_ahead_behind(local, target)?;
        Ok(behind)
    }

    fn commits_between(&self, from: Option<Oid>, to: Oid) -> Result<Vec<CommitInfo>> {
        let mut walk = self.repo.revwalk()?;
        walk.push(to)?;
        if let Some(from) = from {
            walk.hide(from)?;
        }
        let mut commits = Vec::new();
        for oid in walk {
            let oid = oid?;
            let commit = self.repo.find_commit(oid)?;
            commits.push(CommitInfo {
                hash: short(oid),
                message: commit.summary().unwrap_or_default().to_string(),
            });
        }
        Ok(commits)
    }

    fn diff_stats(&self, from: Option<Oid>, to: Oid) -> Result<DiffStats> {
        let old_tree = from
            .map(|oid| self.repo.find_commit(oid).and_then(|commit| commit.tree()))
            .transpose()?;
        let new_tree = self.repo.find_commit(to)?.tree()?;
        let diff = self
            .repo
            .diff_tree_to_tree(old_tree.as_ref(), Some(&new_tree), None)?;
        let stats = diff.stats()?;
        Ok(DiffStats {
            files_changed: stats.files_changed(),
            insertions: stats.insertions(),
            deletions: stats.deletions(),
        })
    }
}

/// Status summary of `path`; a non-repo yields `is_repo: false`.
pub fn status(path: &Path) -> Result<GitStatus> {
    let mut status = GitStatus {
        source_dir: path.display().to_string(),
        ..GitStatus::default()
    };
    let Some(repo) = SourceRepo::open(path)? else {
        return Ok(status);
    };
    status.is_repo = true;
    status.has_remote = repo.has_remote();
    status.branch = repo.branch();
    status.files = repo.dirty_files()?;
    status.is_dirty = !status.files.is_empty();
    Ok(status)
}

/// Clone `url` into `dest`. Remote URLs are fetched shallow.
pub fn clone_repo(url: &str, dest: &Path) -> Result<SourceRepo> {
    let mut fetch = FetchOptions::new();
    if !is_local_url(url) {
        fetch.depth(1);
        if let Ok(config) = git2::Config::open_default() {
            fetch.remote_callbacks(credential_callbacks(config));
        }
    }
    debug!(%url, dest = %dest.display(), "cloning");
    let repo = RepoBuilder::new().fetch_options(fetch).clone(url, dest)?;
    Ok(SourceRepo { repo })
}

/// Short hash of the default branch tip advertised by `url`, without
/// cloning.
pub fn remote_head(url: &str) -> Result<String> {
    let mut remote = git2::Remote::create_detached(url)?;
    let callbacks = if is_local_url(url) {
        RemoteCallbacks::new()
    } else {
        credential_callbacks(git2::Config::open_default()?)
    };
    let connection = remote.connect_auth(Direction::Fetch, Some(callbacks), None)?;
    let head = connection
        .list()?
        .iter()
        .find(|head| head.name() == "HEAD")
        .map(|head| short(head.oid()));
    head.ok_or_else(|| SkillshareError::NotFound(format!("HEAD of {url}")))
}

fn is_local_url(url: &str) -> bool {
    url.starts_with("file://") || url.starts_with('/') || Path::new(url).exists()
}

fn credential_callbacks<'a>(config: git2::Config) -> RemoteCallbacks<'a> {
    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(move |url, username, allowed| {
        if allowed.contains(CredentialType::SSH_KEY) {
            return Cred::ssh_key_from_agent(username.unwrap_or("git"));
        }
        if allowed.contains(CredentialType::USER_PASS_PLAINTEXT) {
            if let Ok(token) = std::env::var("GITHUB_TOKEN")
                && url.contains("github.com")
            {
                return Cred::userpass_plaintext("x-access-token", &token);
            }
            return Cred::credential_helper(&config, url, username);
        }
        Cred::default()
    });
    callbacks
}

fn short(oid: Oid) -> String {
    let full = oid.to_string();
    full[..SHORT_HASH.min(full.len())].to_string()
}

fn status_code(status: Status) -> &'static str {
    if status.contains(Status::WT_NEW) {
        "??"
    } else if status.intersects(Status::INDEX_NEW) {
        "A"
    } else if status.intersects(Status::INDEX_DELETED | Status::WT_DELETED) {
        "D"
    } else if status.intersects(Status::INDEX_RENAMED | Status::WT_RENAMED) {
        "R"
    } else {
        "M"
    }
}
