use skillshare::audit::{Scanner, Severity};
use skillshare::error::SkillshareError;
use skillshare::install::{BatchOptions, InstallOptions, Installer};

use super::common::{CLEAN_SKILL, CRITICAL_SKILL, HIGH_SKILL, Workspace};

fn installer<'a>(ws: &Workspace, scanner: &'a Scanner, threshold: Severity) -> Installer<'a> {
    Installer {
        source_dir: ws.source(),
        scanner,
        threshold,
    }
}

fn local(path: &std::path::Path) -> InstallOptions {
    InstallOptions {
        source: path.display().to_string(),
        ..InstallOptions::default()
    }
}

#[test]
fn critical_finding_blocks_at_default_threshold() {
    let ws = Workspace::new();
    let scanner = Scanner::load(None).unwrap();
    let evil = ws.upstream_skill("evil", CRITICAL_SKILL);

    let err = installer(&ws, &scanner, Severity::Critical)
        .install(&local(&evil))
        .unwrap_err();
    assert!(matches!(err, SkillshareError::AuditBlocked(_)), "{err}");
    assert!(!ws.source().join("evil").exists());

    let skipped = InstallOptions {
        skip_audit: true,
        ..local(&evil)
    };
    let result = installer(&ws, &scanner, Severity::Critical).install(&skipped).unwrap();
    assert_eq!(result.action, "installed");
    assert!(ws.source().join("evil/SKILL.md").is_file());
}

#[test]
fn high_finding_depends_on_threshold() {
    let ws = Workspace::new();
    let scanner = Scanner::load(None).unwrap();
    let admin = ws.upstream_skill("admin", HIGH_SKILL);

    let err = installer(&ws, &scanner, Severity::High)
        .install(&local(&admin))
        .unwrap_err();
    assert!(matches!(err, SkillshareError::AuditBlocked(_)));
    assert!(!ws.source().join("admin").exists());

    let result = installer(&ws, &scanner, Severity::Critical)
        .install(&local(&admin))
        .unwrap();
    assert_eq!(result.action, "installed");
    assert!(ws.source().join("admin").is_dir());
}

#[test]
fn batch_of_three_with_blocked_middle_installs_the_other_two() {
    let ws = Workspace::new();
    let scanner = Scanner::load(None).unwrap();
    ws.upstream_skill("first", CLEAN_SKILL);
    ws.upstream_skill("second", CRITICAL_SKILL);
    ws.upstream_skill("third", CLEAN_SKILL);

    let result = installer(&ws, &scanner, Severity::Critical)
        .install_batch(&BatchOptions {
            source: ws.upstream().display().to_string(),
            skills: vec!["first".into(), "second".into(), "third".into()],
            ..BatchOptions::default()
        })
        .unwrap();

    assert_eq!(result.results.len(), 3);
    let errors: Vec<_> = result.results.iter().filter(|item| item.error.is_some()).collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].name, "second");
    assert_eq!(result.results.iter().filter(|item| item.error.is_none()).count(), 2);
    assert!(ws.source().join("first").is_dir());
    assert!(ws.source().join("third").is_dir());
    assert!(!ws.source().join("second").exists());
    assert_eq!(result.summary, "Installed 2 of 3 skills (some errors)");
}

#[test]
fn batch_failure_does_not_stop_siblings() {
    let ws = Workspace::new();
    let scanner = Scanner::load(None).unwrap();
    ws.upstream_skill("alpha", CLEAN_SKILL);
    ws.upstream_skill("bad", CRITICAL_SKILL);
    ws.upstream_skill("omega", CLEAN_SKILL);

    let result = installer(&ws, &scanner, Severity::Critical)
        .install_batch(&BatchOptions {
            source: ws.upstream().display().to_string(),
            skills: vec!["alpha".into(), "bad".into(), "omega".into(), "ghost".into()],
            ..BatchOptions::default()
        })
        .unwrap();

    let failed: Vec<_> = result
        .results
        .iter()
        .filter(|item| item.error.is_some())
        .map(|item| item.name.as_str())
        .collect();
    assert_eq!(failed, vec!["bad", "ghost"]);
    assert!(ws.source().join("alpha").is_dir());
    assert!(ws.source().join("omega").is_dir());
    assert!(!ws.source().join("bad").exists());
    assert_eq!(result.summary, "Installed 2 of 4 skills (some errors)");
}
