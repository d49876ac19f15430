use std::fs;

use proptest::prelude::*;
use skillshare::config::SyncMode;
use skillshare::sync::{self, DiffAction, SkillFilter, SyncOptions};

use super::common::{CLEAN_SKILL, Workspace, entries};

const MODES: [SyncMode; 3] = [SyncMode::Merge, SyncMode::Copy, SyncMode::Symlink];

fn seeded() -> Workspace {
    let ws = Workspace::new();
    ws.write_skill("pdf", CLEAN_SKILL);
    ws.write_skill("frontend/react", CLEAN_SKILL);
    ws.write_skill("frontend/vue", CLEAN_SKILL);
    ws
}

#[test]
fn second_sync_changes_nothing() {
    for mode in MODES {
        let ws = seeded();
        let config = ws.config(&[("agent", mode)]);
        let skills = ws.skills();

        sync::sync(&config, &skills, &SyncOptions::default()).unwrap();
        let before = entries(&ws.target_dir("agent"));
        let again = sync::sync(&config, &skills, &SyncOptions::default()).unwrap();

        assert!(again.iter().all(|r| r.is_noop()), "{mode}: {again:?}");
        assert_eq!(entries(&ws.target_dir("agent")), before, "{mode}");

        let pending = sync::diff(&config, &skills, None).unwrap();
        assert!(
            pending[0]
                .items
                .iter()
                .all(|item| !matches!(item.action, DiffAction::Link | DiffAction::Update | DiffAction::Prune)),
            "{mode}: {pending:?}"
        );
    }
}

#[test]
fn dry_run_predicts_the_real_sync() {
    for mode in [SyncMode::Merge, SyncMode::Copy] {
        let ws = seeded();
        let config = ws.config(&[("agent", mode)]);
        sync::sync(&config, &ws.skills(), &SyncOptions::default()).unwrap();

        // Drift: one skill removed from the source, one added, one local dir.
        fs::remove_dir_all(ws.source().join("pdf")).unwrap();
        ws.write_skill("docx", CLEAN_SKILL);
        fs::create_dir_all(ws.target_dir("agent").join("mine")).unwrap();
        let skills = ws.skills();

        let listing = entries(&ws.target_dir("agent"));
        let preview = sync::sync(
            &config,
            &skills,
            &SyncOptions {
                dry_run: true,
                ..SyncOptions::default()
            },
        )
        .unwrap();
        assert_eq!(entries(&ws.target_dir("agent")), listing, "dry run touched {mode} target");

        let diff = sync::diff(&config, &skills, None).unwrap();
        let diff_names = |action: DiffAction| -> Vec<String> {
            diff[0]
                .items
                .iter()
                .filter(|item| item.action == action)
                .map(|item| item.skill.clone())
                .collect()
        };
        assert_eq!(diff_names(DiffAction::Prune), preview[0].pruned, "{mode}");
        let delivery = if mode == SyncMode::Copy { DiffAction::Copy } else { DiffAction::Link };
        assert_eq!(diff_names(delivery), vec!["docx".to_string()], "{mode}");
        assert_eq!(diff_names(DiffAction::Local), vec!["mine".to_string()], "{mode}");

        let real = sync::sync(&config, &skills, &SyncOptions::default()).unwrap();
        assert_eq!(real[0].linked, preview[0].linked, "{mode}");
        assert_eq!(real[0].updated, preview[0].updated, "{mode}");
        assert_eq!(real[0].pruned, preview[0].pruned, "{mode}");
        assert_eq!(real[0].skipped, preview[0].skipped, "{mode}");
        assert!(ws.target_dir("agent").join("mine").is_dir(), "local skill removed in {mode}");
    }
}

#[test]
fn filters_limit_delivery_per_target() {
    let ws = seeded();
    let mut config = ws.config(&[("web", SyncMode::Merge), ("docs", SyncMode::Merge)]);
    let web = config.targets.get_mut("web").unwrap();
    web.include = vec!["frontend__*".to_string()];
    web.exclude = vec!["frontend__vue".to_string()];
    config.targets.get_mut("docs").unwrap().exclude = vec!["frontend__*".to_string()];

    sync::sync(&config, &ws.skills(), &SyncOptions::default()).unwrap();
    assert_eq!(entries(&ws.target_dir("web")), vec!["frontend__react"]);
    assert_eq!(entries(&ws.target_dir("docs")), vec!["pdf"]);
}

proptest! {
    /// Bare patterns match by prefix; an exclude hit removes a name the
    /// include list selected.
    #[test]
    fn exclude_always_wins(
        names in prop::collection::btree_set("[a-z]{1,6}", 1..12),
        pick in prop::collection::vec(any::<bool>(), 12),
    ) {
        let names: Vec<String> = names.into_iter().collect();
        let excluded: Vec<String> = names
            .iter()
            .zip(pick.iter())
            .filter(|(_, p)| **p)
            .map(|(n, _)| n.clone())
            .collect();
        let filter = SkillFilter::new(&names, &excluded).unwrap();
        for name in &names {
            let hit = excluded.iter().any(|e| name.starts_with(e.as_str()));
            prop_assert_eq!(filter.matches(name), !hit);
        }
    }

    #[test]
    fn empty_include_means_everything(name in "[a-z_]{1,16}") {
        let filter = SkillFilter::new(&[], &[]).unwrap();
        prop_assert!(filter.matches(&name));
    }
}
