//! Criterion benchmarks for the sync hot paths.
//!
//! Performance targets:
//! - Skill discovery (500 skills): < 20ms
//! - Planning a converged merge target (500 skills): < 20ms
//! - Audit scan of one SKILL.md: < 100us

use std::fs;
use std::hint::black_box;
use std::path::Path;

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use tempfile::TempDir;

use skillshare::audit::Scanner;
use skillshare::config::{Config, SyncMode, TargetConfig};
use skillshare::store::discover_source_skills;
use skillshare::sync::{self, SyncOptions};

const SKILLS: usize = 500;

fn populate(source: &Path) {
    for i in 0..SKILLS {
        let dir = source.join(format!("group{}", i % 10)).join(format!("skill{i}"));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("SKILL.md"), format!("---\nname: skill{i}\n---\n# Skill {i}\n")).unwrap();
    }
}

fn workspace(mode: SyncMode) -> (TempDir, Config) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("root");
    let mut config = Config::parse("", &root).unwrap();
    populate(&config.source);
    let mut target = TargetConfig::new(tmp.path().join("target"));
    target.mode = Some(mode);
    config.targets.insert("bench".to_string(), target);
    (tmp, config)
}

fn discovery_benchmarks(c: &mut Criterion) {
    let (_tmp, config) = workspace(SyncMode::Merge);
    let mut group = c.benchmark_group("discovery");
    group.throughput(Throughput::Elements(SKILLS as u64));
    group.bench_function("discover_source_skills", |b| {
        b.iter(|| discover_source_skills(black_box(&config.source)).unwrap());
    });
    group.finish();
}

fn planning_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("planning");
    group.throughput(Throughput::Elements(SKILLS as u64));

    for mode in [SyncMode::Merge, SyncMode::Copy] {
        let (_tmp, config) = workspace(mode);
        let skills = discover_source_skills(&config.source).unwrap();
        sync::sync(&config, &skills, &SyncOptions::default()).unwrap();

        group.bench_function(format!("converged_{mode}"), |b| {
            b.iter(|| sync::plan_targets(black_box(&config), black_box(&skills), None, false).unwrap());
        });
    }

    let (_tmp, config) = workspace(SyncMode::Merge);
    let skills = discover_source_skills(&config.source).unwrap();
    group.bench_function("fresh_merge_diff", |b| {
        b.iter(|| sync::diff(black_box(&config), black_box(&skills), None).unwrap());
    });
    group.finish();
}

fn audit_benchmarks(c: &mut Criterion) {
    let scanner = Scanner::load(None).unwrap();
    let content = "---\nname: tables\n---\n# Tables\n\nFormat markdown tables.\n".repeat(20);
    c.bench_function("audit_scan_content", |b| {
        b.iter(|| scanner.scan_content(black_box(&content), "SKILL.md"));
    });
}

criterion_group!(benches, discovery_benchmarks, planning_benchmarks, audit_benchmarks);
criterion_main!(benches);
