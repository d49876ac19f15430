//! E2E Scenario: two machines sharing one skills repository.
//!
//! Machine A commits and pushes new skills; machine B pulls them and every
//! configured target is synced in the same step.

use std::fs;

use git2::Repository;
use skillshare::config::SyncMode;
use skillshare::remote::{self, PullRequest, PushRequest};
use skillshare::storage::SourceRepo;
use skillshare::storage::git::clone_repo;

use super::common::{CLEAN_SKILL, Workspace, entries};

fn push_all(ws: &Workspace, message: &str) {
    let config = ws.config(&[]);
    let result = remote::push(
        &config,
        &PushRequest {
            message: Some(message.to_string()),
            dry_run: false,
        },
    )
    .unwrap();
    assert!(result.success, "{}", result.message);
}

#[test]
fn pushed_skills_arrive_on_the_other_machine() {
    let hub_dir = tempfile::TempDir::new().unwrap();
    let hub = Repository::init_bare(hub_dir.path()).unwrap();

    let machine_a = Workspace::new();
    let repo_a = Repository::init(machine_a.source()).unwrap();
    repo_a
        .remote("origin", &hub_dir.path().display().to_string())
        .unwrap();
    machine_a.write_skill("pdf", CLEAN_SKILL);
    push_all(&machine_a, "add pdf");

    let branch = SourceRepo::require(&machine_a.source()).unwrap().branch();
    hub.set_head(&format!("refs/heads/{branch}")).unwrap();

    let machine_b = Workspace::new();
    fs::remove_dir_all(machine_b.source()).unwrap();
    clone_repo(&hub_dir.path().display().to_string(), &machine_b.source()).unwrap();
    assert!(machine_b.source().join("pdf/SKILL.md").is_file());

    machine_a.write_skill("docx", CLEAN_SKILL);
    push_all(&machine_a, "add docx");

    let config_b = machine_b.config(&[("agent", SyncMode::Merge)]);
    let pulled = remote::pull(&config_b, &PullRequest::default()).unwrap();
    assert!(!pulled.up_to_date);
    assert_eq!(pulled.commits.len(), 1);
    assert_eq!(pulled.commits[0].message, "add docx");
    assert_eq!(pulled.sync_results.len(), 1);
    assert_eq!(entries(&machine_b.target_dir("agent")), vec!["docx", "pdf"]);

    let again = remote::pull(&config_b, &PullRequest::default()).unwrap();
    assert!(again.up_to_date);
}

#[test]
fn push_without_changes_still_succeeds() {
    let hub_dir = tempfile::TempDir::new().unwrap();
    Repository::init_bare(hub_dir.path()).unwrap();
    let ws = Workspace::new();
    let repo = Repository::init(ws.source()).unwrap();
    repo.remote("origin", &hub_dir.path().display().to_string()).unwrap();
    ws.write_skill("pdf", CLEAN_SKILL);
    push_all(&ws, "first");

    let result = remote::push(&ws.config(&[]), &PushRequest::default()).unwrap();
    assert!(result.message.starts_with("nothing to commit"));
}
