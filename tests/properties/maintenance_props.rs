use std::fs;

use chrono::{Duration, TimeZone, Utc};
use skillshare::backup::BackupStore;
use skillshare::config::{BackupConfig, SyncMode};
use skillshare::trash::{TrashStore, delete_skill};
use skillshare::utils::clock::FixedClock;

use super::common::{CLEAN_SKILL, Workspace};

#[test]
fn retention_is_applied_once_and_then_stable() {
    let ws = Workspace::new();
    let config = ws.config(&[("agent", SyncMode::Copy)]);
    let target = ws.target_dir("agent");
    fs::create_dir_all(target.join("handmade")).unwrap();
    fs::write(target.join("handmade/SKILL.md"), CLEAN_SKILL).unwrap();

    let store = BackupStore::new(ws.root().join("backups"));
    let start = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
    for hour in 0..15 {
        let clock = FixedClock(start + Duration::hours(hour));
        let created = store.create(&config, None, &clock).unwrap();
        assert_eq!(created.backed_up_targets, vec!["agent".to_string()]);
    }
    assert_eq!(store.list().unwrap().backups.len(), 15);

    let policy = BackupConfig {
        max_age_days: 30,
        max_count: 10,
        max_size_mb: 500,
    };
    let now = FixedClock(start + Duration::days(1));
    let removed = store.cleanup(&policy, &now).unwrap();
    assert_eq!(removed.len(), 5);

    let kept = store.list().unwrap().backups;
    assert_eq!(kept.len(), 10);
    // Newest survive.
    assert!(kept.iter().all(|b| b.date >= start + Duration::hours(5)));

    assert!(store.cleanup(&policy, &now).unwrap().is_empty());
}

#[test]
fn age_limit_removes_old_snapshots_only() {
    let ws = Workspace::new();
    let config = ws.config(&[("agent", SyncMode::Copy)]);
    fs::create_dir_all(ws.target_dir("agent").join("local")).unwrap();
    fs::write(ws.target_dir("agent").join("local/SKILL.md"), CLEAN_SKILL).unwrap();

    let store = BackupStore::new(ws.root().join("backups"));
    let old = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let recent = Utc.with_ymd_and_hms(2026, 2, 20, 0, 0, 0).unwrap();
    store.create(&config, None, &FixedClock(old)).unwrap();
    store.create(&config, None, &FixedClock(recent)).unwrap();

    let policy = BackupConfig {
        max_age_days: 30,
        max_count: 0,
        max_size_mb: 0,
    };
    let now = FixedClock(Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap());
    let removed = store.cleanup(&policy, &now).unwrap();
    assert_eq!(removed, vec!["2026-01-01_00-00-00".to_string()]);
    assert_eq!(store.list().unwrap().backups.len(), 1);
}

#[test]
fn trash_round_trip_restores_identical_content() {
    let ws = Workspace::new();
    let dir = ws.write_skill("frontend/react", CLEAN_SKILL);
    fs::write(dir.join("notes.md"), "extra file").unwrap();
    let store = TrashStore::new(ws.root().join("trash"));
    let clock = FixedClock(Utc.with_ymd_and_hms(2026, 4, 2, 12, 0, 0).unwrap());

    delete_skill(&store, &ws.source(), &ws.skills(), "frontend/react", &clock).unwrap();
    assert!(!dir.exists());
    assert!(ws.skills().is_empty());

    let listed = store.list(7, &clock);
    assert_eq!(listed.items.len(), 1);
    assert_eq!(listed.items[0].name, "frontend__react");

    store.restore("frontend__react", &ws.source(), false, &clock).unwrap();
    assert_eq!(fs::read_to_string(dir.join("SKILL.md")).unwrap(), CLEAN_SKILL);
    assert_eq!(fs::read_to_string(dir.join("notes.md")).unwrap(), "extra file");
    assert!(store.entries().is_empty());
}

#[test]
fn expired_trash_is_swept_on_listing() {
    let ws = Workspace::new();
    ws.write_skill("pdf", CLEAN_SKILL);
    let store = TrashStore::new(ws.root().join("trash"));
    let deleted_at = FixedClock(Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap());
    delete_skill(&store, &ws.source(), &ws.skills(), "pdf", &deleted_at).unwrap();

    let within = FixedClock(Utc.with_ymd_and_hms(2026, 4, 5, 0, 0, 0).unwrap());
    assert_eq!(store.list(7, &within).items.len(), 1);

    let after = FixedClock(Utc.with_ymd_and_hms(2026, 4, 9, 0, 0, 0).unwrap());
    assert!(store.list(7, &after).items.is_empty());
}
