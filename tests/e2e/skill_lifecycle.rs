//! E2E Scenario: a skill's life from local edit to every target and back.
//!
//! - sync into merge, copy and symlink targets
//! - collect a skill written directly into a target
//! - back up a target, damage it, restore it
//! - remove a target without breaking its directory

use std::fs;

use chrono::{TimeZone, Utc};
use skillshare::backup::BackupStore;
use skillshare::collect::{self, CollectRequest};
use skillshare::config::SyncMode;
use skillshare::sync::{self, SyncOptions};
use skillshare::targets;
use skillshare::utils::clock::FixedClock;
use skillshare::utils::fs::{is_symlink, resolve_link};

use super::common::{CLEAN_SKILL, Workspace, entries};

#[test]
fn sync_delivers_to_every_mode() {
    let ws = Workspace::new();
    ws.write_skill("pdf", CLEAN_SKILL);
    ws.write_skill("frontend/react", CLEAN_SKILL);
    let config = ws.config(&[
        ("merged", SyncMode::Merge),
        ("copied", SyncMode::Copy),
        ("linked", SyncMode::Symlink),
    ]);

    let results = sync::sync(&config, &ws.skills(), &SyncOptions::default()).unwrap();
    let names: Vec<_> = results.iter().map(|r| r.target.as_str()).collect();
    assert_eq!(names, vec!["copied", "linked", "merged"]);

    let merged = ws.target_dir("merged");
    assert_eq!(entries(&merged), vec!["frontend__react", "pdf"]);
    assert!(is_symlink(&merged.join("pdf")));
    assert_eq!(resolve_link(&merged.join("pdf")).unwrap(), ws.source().join("pdf"));

    let copied = ws.target_dir("copied");
    assert!(!is_symlink(&copied.join("pdf")));
    assert_eq!(fs::read_to_string(copied.join("pdf/SKILL.md")).unwrap(), CLEAN_SKILL);

    assert!(is_symlink(&ws.target_dir("linked")));
}

#[test]
fn local_skill_collects_back_into_source() {
    let ws = Workspace::new();
    ws.write_skill("pdf", CLEAN_SKILL);
    let config = ws.config(&[("agent", SyncMode::Merge)]);
    sync::sync(&config, &ws.skills(), &SyncOptions::default()).unwrap();

    let handmade = ws.target_dir("agent").join("handmade");
    fs::create_dir_all(&handmade).unwrap();
    fs::write(handmade.join("SKILL.md"), "# handmade\n").unwrap();

    let scan = collect::scan(&config, None).unwrap();
    assert_eq!(scan.total_count, 1);
    assert_eq!(scan.targets[0].skills[0].name, "handmade");

    let request = CollectRequest {
        name: "handmade".to_string(),
        target_name: "agent".to_string(),
    };
    let result = collect::collect(&config, &[request.clone()], false, false);
    assert_eq!(result.pulled, vec!["handmade".to_string()]);
    assert!(ws.source().join("handmade/SKILL.md").is_file());

    // Collecting again without force leaves the source copy alone.
    let again = collect::collect(&config, &[request], false, false);
    assert_eq!(again.skipped, vec!["handmade".to_string()]);

    // After a forced sync the local directory becomes a managed link.
    sync::sync(
        &config,
        &ws.skills(),
        &SyncOptions {
            force: true,
            ..SyncOptions::default()
        },
    )
    .unwrap();
    assert!(is_symlink(&handmade));
}

#[test]
fn backup_then_restore_recovers_a_damaged_target() {
    let ws = Workspace::new();
    ws.write_skill("pdf", CLEAN_SKILL);
    let config = ws.config(&[("agent", SyncMode::Copy)]);
    sync::sync(&config, &ws.skills(), &SyncOptions::default()).unwrap();

    let store = BackupStore::new(ws.root().join("backups"));
    let clock = FixedClock(Utc.with_ymd_and_hms(2026, 6, 1, 10, 0, 0).unwrap());
    let created = store.create(&config, Some("agent"), &clock).unwrap();
    let timestamp = created.timestamp.clone().unwrap();

    let target = ws.target_dir("agent");
    fs::write(target.join("pdf/SKILL.md"), "corrupted").unwrap();

    let err = store.restore(&config, "agent", None, false).unwrap_err();
    assert!(err.to_string().contains("not empty"));

    let used = store.restore(&config, "agent", None, true).unwrap();
    assert_eq!(used, timestamp);
    assert_eq!(fs::read_to_string(target.join("pdf/SKILL.md")).unwrap(), CLEAN_SKILL);
}

#[test]
fn removing_targets_leaves_usable_directories() {
    let ws = Workspace::new();
    ws.write_skill("pdf", CLEAN_SKILL);
    let mut config = ws.config(&[("merged", SyncMode::Merge), ("linked", SyncMode::Symlink)]);
    sync::sync(&config, &ws.skills(), &SyncOptions::default()).unwrap();

    let removed = targets::remove(&mut config, "merged").unwrap();
    assert_eq!(removed.unlinked, 1);
    assert!(entries(&ws.target_dir("merged")).is_empty());

    let removed = targets::remove(&mut config, "linked").unwrap();
    assert!(removed.materialized);
    let linked = ws.target_dir("linked");
    assert!(!is_symlink(&linked));
    assert!(linked.join("pdf/SKILL.md").is_file());
    assert!(config.targets.is_empty());
}
