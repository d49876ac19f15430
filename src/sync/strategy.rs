//! Per-mode reconciliation strategies.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;
use uuid::Uuid;

use super::{Action, DiffAction, Manifest, Plan, Report, RootFix, SkillFilter, Step, WHOLE_DIRECTORY};
use crate::config::SyncMode;
use crate::error::Result;
use crate::store::{FLAT_SEPARATOR, Skill, is_tracked_repo_dir};
use crate::sync::manifest::dir_checksum;
use crate::utils::fs::{
    absolutize, create_symlink, is_empty_dir, is_hidden, is_symlink, is_within, remove_entry,
    replace_dir, resolve_link,
};

/// Inputs for planning one target.
pub struct PlanInput<'a> {
    pub target: &'a str,
    pub path: &'a Path,
    pub source: &'a Path,
    /// Every skill in the source.
    pub skills: &'a [Skill],
    /// Skills this target should receive.
    pub selected: Vec<&'a Skill>,
    pub filter: &'a SkillFilter,
    pub force: bool,
}

/// One way of delivering skills into a target.
pub trait ReconcileStrategy: Send + Sync {
    fn mode(&self) -> SyncMode;

    /// Inspect the target and decide every action. Must not write.
    fn plan(&self, input: &PlanInput<'_>) -> Result<Plan>;

    /// Fix up the target root before actions run.
    fn prepare(&self, plan: &Plan) -> Result<()> {
        match plan.root {
            RootFix::Keep => Ok(()),
            RootFix::Create => Ok(fs::create_dir_all(&plan.path)?),
            RootFix::Unlink => {
                fs::remove_file(&plan.path)?;
                Ok(fs::create_dir_all(&plan.path)?)
            }
        }
    }

    fn apply(&self, plan: &Plan, action: &Action, manifest: &mut Manifest) -> Result<()>;

    fn finish(&self, _plan: &Plan, _manifest: &mut Manifest) -> Result<()> {
        Ok(())
    }
}

pub struct MergeStrategy;
pub struct CopyStrategy;
pub struct SymlinkStrategy;

static MERGE: MergeStrategy = MergeStrategy;
static COPY: CopyStrategy = CopyStrategy;
static SYMLINK: SymlinkStrategy = SymlinkStrategy;

#[must_use]
pub fn strategy_for(mode: SyncMode) -> &'static dyn ReconcileStrategy {
    match mode {
        SyncMode::Merge => &MERGE,
        SyncMode::Copy => &COPY,
        SyncMode::Symlink => &SYMLINK,
    }
}

/// What sits at one name inside a target directory.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Entry {
    Symlink { target: PathBuf, live: bool },
    Dir,
    File,
}

/// State of the target root for the per-entry modes.
enum Root {
    Missing,
    /// A symlink, typically left behind by symlink mode.
    Symlink,
    Dir(BTreeMap<String, Entry>),
    Broken(String),
}

fn inspect_root(path: &Path) -> Root {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Root::Missing,
        Err(err) => return Root::Broken(format!("cannot inspect {}: {err}", path.display())),
    };
    if meta.file_type().is_symlink() {
        return Root::Symlink;
    }
    if !meta.is_dir() {
        return Root::Broken(format!("{} is not a directory", path.display()));
    }
    match list_entries(path) {
        Ok(entries) => Root::Dir(entries),
        Err(err) => Root::Broken(format!("cannot read {}: {err}", path.display())),
    }
}

fn list_entries(dir: &Path) -> io::Result<BTreeMap<String, Entry>> {
    let mut entries = BTreeMap::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if is_hidden(&name) {
            continue;
        }
        let path = entry.path();
        let file_type = entry.file_type()?;
        let kind = if file_type.is_symlink() {
            match resolve_link(&path) {
                Ok(target) => Entry::Symlink {
                    live: path.exists(),
                    target,
                },
                Err(_) => Entry::File,
            }
        } else if file_type.is_dir() {
            Entry::Dir
        } else {
            Entry::File
        };
        entries.insert(name, kind);
    }
    Ok(entries)
}

/// Replace `dst` with a symlink to `src`. An existing symlink is swapped
/// through a rename so the name never disappears.
fn relink(src: &Path, dst: &Path) -> Result<()> {
    if is_symlink(dst) {
        let parent = dst.parent().unwrap_or_else(|| Path::new("."));
        let name = dst
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let tmp = parent.join(format!(".{name}.link-{}", Uuid::new_v4().simple()));
        create_symlink(src, &tmp)?;
        if let Err(err) = fs::rename(&tmp, dst) {
            let _ = fs::remove_file(&tmp);
            return Err(err.into());
        }
        return Ok(());
    }
    remove_entry(dst)?;
    create_symlink(src, dst)
}

/// True when the copy at `path` no longer matches the checksum recorded
/// when it was delivered.
fn locally_modified(path: &Path, recorded: &str) -> bool {
    !dir_checksum(path).is_ok_and(|sum| sum == recorded)
}

fn root_entries(plan: &mut Plan, path: &Path) -> Option<BTreeMap<String, Entry>> {
    match inspect_root(path) {
        Root::Missing => {
            plan.root = RootFix::Create;
            Some(BTreeMap::new())
        }
        Root::Symlink => {
            plan.root = RootFix::Unlink;
            Some(BTreeMap::new())
        }
        Root::Dir(entries) => Some(entries),
        Root::Broken(reason) => {
            plan.broken = true;
            plan.warnings.push(reason);
            None
        }
    }
}

impl ReconcileStrategy for MergeStrategy {
    fn mode(&self) -> SyncMode {
        SyncMode::Merge
    }

    fn plan(&self, input: &PlanInput<'_>) -> Result<Plan> {
        let mut plan = Plan::new(input.target, SyncMode::Merge, input.path);
        let Some(entries) = root_entries(&mut plan, input.path) else {
            return Ok(plan);
        };
        let source = absolutize(input.source);
        // Checksums left by an earlier copy-mode sync, if any.
        let leftover = Manifest::read(input.path);

        let mut valid = HashSet::new();
        for skill in &input.selected {
            let name = skill.flat_name.as_str();
            valid.insert(name);
            let src = absolutize(&skill.source_path);
            match entries.get(name) {
                None => plan.push(name, Step::Link(src), Report::Linked, Some(DiffAction::Link), "missing"),
                Some(Entry::Symlink { target, live }) if *live && *target == src => {
                    plan.push(name, Step::Keep, Report::Linked, None, "");
                }
                Some(Entry::Symlink { live, .. }) => {
                    let reason = if *live { "symlink points elsewhere" } else { "broken symlink" };
                    plan.push(name, Step::Relink(src), Report::Updated, Some(DiffAction::Update), reason);
                }
                Some(Entry::Dir | Entry::File) if input.force => plan.push(
                    name,
                    Step::Relink(src),
                    Report::Updated,
                    Some(DiffAction::Update),
                    "replace local copy (--force)",
                ),
                Some(Entry::Dir | Entry::File) => plan.push(
                    name,
                    Step::Skip,
                    Report::Skipped,
                    Some(DiffAction::Skip),
                    "local copy (sync --force to replace)",
                ),
            }
        }

        let known: HashSet<&str> = input.skills.iter().map(|s| s.flat_name.as_str()).collect();
        for (name, entry) in &entries {
            if valid.contains(name.as_str()) {
                continue;
            }
            let in_scope = input.filter.matches(name);
            match entry {
                Entry::Symlink { target, live } => {
                    if is_within(target, &source) {
                        let reason = if !in_scope || known.contains(name.as_str()) {
                            "excluded by filter"
                        } else {
                            "orphan symlink"
                        };
                        plan.push(name, Step::Prune, Report::Pruned, Some(DiffAction::Prune), reason);
                    } else if !in_scope {
                        continue;
                    } else if !live {
                        plan.push(name, Step::Prune, Report::Pruned, Some(DiffAction::Prune), "broken external symlink");
                    } else if input.force {
                        plan.push(name, Step::Prune, Report::Pruned, Some(DiffAction::Prune), "external symlink (--force)");
                    } else {
                        plan.warnings.push(format!(
                            "{name}: symlink to external location {}, kept (sync --force to remove)",
                            target.display()
                        ));
                    }
                }
                Entry::Dir if in_scope => {
                    if name.contains(FLAT_SEPARATOR) || is_tracked_repo_dir(name) {
                        let pristine = leftover
                            .managed
                            .get(name)
                            .is_some_and(|sum| !locally_modified(&input.path.join(name), sum));
                        if pristine || input.force {
                            plan.push(name, Step::Prune, Report::Pruned, Some(DiffAction::Prune), "orphan copy");
                        } else {
                            plan.push(
                                name,
                                Step::Skip,
                                Report::Skipped,
                                Some(DiffAction::Skip),
                                "locally modified (sync --force to remove)",
                            );
                        }
                    } else {
                        plan.push(name, Step::Local, Report::Nothing, Some(DiffAction::Local), "local only");
                    }
                }
                Entry::Dir | Entry::File => {}
            }
        }
        Ok(plan)
    }

    fn prepare(&self, plan: &Plan) -> Result<()> {
        match plan.root {
            RootFix::Keep => Manifest::remove(&plan.path),
            RootFix::Create => Ok(fs::create_dir_all(&plan.path)?),
            RootFix::Unlink => {
                fs::remove_file(&plan.path)?;
                Ok(fs::create_dir_all(&plan.path)?)
            }
        }
    }

    fn apply(&self, plan: &Plan, action: &Action, _manifest: &mut Manifest) -> Result<()> {
        let dst = plan.path.join(&action.name);
        match &action.step {
            Step::Link(src) => create_symlink(src, &dst),
            Step::Relink(src) => relink(src, &dst),
            Step::Prune => {
                debug!(entry = %dst.display(), "pruning");
                remove_entry(&dst)
            }
            Step::Keep | Step::Skip | Step::Local | Step::Copy { .. } => Ok(()),
        }
    }
}

impl ReconcileStrategy for CopyStrategy {
    fn mode(&self) -> SyncMode {
        SyncMode::Copy
    }

    fn plan(&self, input: &PlanInput<'_>) -> Result<Plan> {
        let mut plan = Plan::new(input.target, SyncMode::Copy, input.path);
        let Some(entries) = root_entries(&mut plan, input.path) else {
            return Ok(plan);
        };
        if plan.root == RootFix::Keep {
            plan.manifest = Manifest::read(input.path);
        }

        let mut valid = HashSet::new();
        for skill in &input.selected {
            let name = skill.flat_name.as_str();
            valid.insert(name);
            let checksum = match dir_checksum(&skill.source_path) {
                Ok(sum) => sum,
                Err(err) => {
                    plan.warnings.push(format!("{name}: cannot read source: {err}"));
                    continue;
                }
            };
            let src = skill.source_path.clone();
            let managed = plan.manifest.managed.get(name).cloned();
            match entries.get(name) {
                None => plan.push(
                    name,
                    Step::Copy { src, checksum },
                    Report::Linked,
                    Some(DiffAction::Copy),
                    "missing",
                ),
                Some(Entry::Symlink { .. }) => plan.push(
                    name,
                    Step::Copy { src, checksum },
                    Report::Linked,
                    Some(DiffAction::Copy),
                    "replace symlink with copy",
                ),
                Some(Entry::Dir | Entry::File) => {
                    if !input.force && managed.as_deref() == Some(checksum.as_str()) {
                        plan.push(name, Step::Keep, Report::Skipped, None, "");
                    } else if !input.force
                        && managed
                            .as_deref()
                            .is_some_and(|sum| locally_modified(&input.path.join(name), sum))
                    {
                        plan.push(
                            name,
                            Step::Skip,
                            Report::Skipped,
                            Some(DiffAction::Skip),
                            "locally modified (sync --force to overwrite)",
                        );
                    } else if managed.is_some() || input.force {
                        let reason = match managed {
                            Some(ref sum) if *sum != checksum => "content changed",
                            Some(_) => "forced refresh",
                            None => "replace local copy (--force)",
                        };
                        plan.push(
                            name,
                            Step::Copy { src, checksum },
                            Report::Updated,
                            Some(DiffAction::Update),
                            reason,
                        );
                    } else {
                        plan.push(
                            name,
                            Step::Skip,
                            Report::Skipped,
                            Some(DiffAction::Skip),
                            "local copy (sync --force to replace)",
                        );
                    }
                }
            }
        }

        let orphans: Vec<String> = plan
            .manifest
            .managed
            .keys()
            .filter(|name| !valid.contains(name.as_str()))
            .cloned()
            .collect();
        for name in &orphans {
            let modified = entries.contains_key(name)
                && plan
                    .manifest
                    .managed
                    .get(name)
                    .is_some_and(|sum| locally_modified(&input.path.join(name), sum));
            if modified && !input.force {
                plan.push(
                    name,
                    Step::Skip,
                    Report::Skipped,
                    Some(DiffAction::Skip),
                    "locally modified (sync --force to remove)",
                );
            } else {
                plan.push(name, Step::Prune, Report::Pruned, Some(DiffAction::Prune), "orphan copy");
            }
        }

        for (name, entry) in &entries {
            if *entry == Entry::Dir
                && !valid.contains(name.as_str())
                && !plan.manifest.is_managed(name)
            {
                plan.push(name, Step::Local, Report::Nothing, Some(DiffAction::Local), "local only");
            }
        }
        Ok(plan)
    }

    fn apply(&self, plan: &Plan, action: &Action, manifest: &mut Manifest) -> Result<()> {
        let dst = plan.path.join(&action.name);
        match &action.step {
            Step::Copy { src, checksum } => {
                if is_symlink(&dst) {
                    fs::remove_file(&dst)?;
                }
                replace_dir(src, &dst)?;
                manifest.managed.insert(action.name.clone(), checksum.clone());
                Ok(())
            }
            Step::Prune => {
                remove_entry(&dst)?;
                manifest.managed.remove(&action.name);
                Ok(())
            }
            Step::Keep | Step::Skip | Step::Local | Step::Link(_) | Step::Relink(_) => Ok(()),
        }
    }

    fn finish(&self, plan: &Plan, manifest: &mut Manifest) -> Result<()> {
        manifest.write(&plan.path)
    }
}

impl ReconcileStrategy for SymlinkStrategy {
    fn mode(&self) -> SyncMode {
        SyncMode::Symlink
    }

    fn plan(&self, input: &PlanInput<'_>) -> Result<Plan> {
        let mut plan = Plan::new(input.target, SyncMode::Symlink, input.path);
        let source = absolutize(input.source);
        let name = WHOLE_DIRECTORY;

        let meta = match fs::symlink_metadata(input.path) {
            Ok(meta) => meta,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                plan.push(name, Step::Link(source), Report::Linked, Some(DiffAction::Link), "missing");
                return Ok(plan);
            }
            Err(err) => {
                return Ok(plan.into_broken(format!("cannot inspect {}: {err}", input.path.display())));
            }
        };

        if meta.file_type().is_symlink() {
            let target = resolve_link(input.path)?;
            if target == source && input.path.exists() {
                plan.push(name, Step::Keep, Report::Linked, None, "");
            } else {
                let reason = if input.path.exists() { "symlink points elsewhere" } else { "broken symlink" };
                plan.push(name, Step::Relink(source), Report::Updated, Some(DiffAction::Update), reason);
            }
        } else if meta.is_dir() && is_empty_dir(input.path) {
            plan.push(name, Step::Relink(source), Report::Updated, Some(DiffAction::Update), "replace empty directory");
        } else if input.force {
            plan.push(
                name,
                Step::Relink(source),
                Report::Updated,
                Some(DiffAction::Update),
                "replace local files (--force)",
            );
        } else {
            let reason = if meta.is_dir() {
                "has files (sync --force to replace)"
            } else {
                "not a directory (sync --force to replace)"
            };
            plan.push(name, Step::Skip, Report::Skipped, Some(DiffAction::Skip), reason);
        }
        Ok(plan)
    }

    fn prepare(&self, plan: &Plan) -> Result<()> {
        if let Some(parent) = plan.path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    fn apply(&self, plan: &Plan, action: &Action, _manifest: &mut Manifest) -> Result<()> {
        match &action.step {
            Step::Link(src) => create_symlink(src, &plan.path),
            Step::Relink(src) => relink(src, &plan.path),
            Step::Keep | Step::Skip | Step::Local | Step::Prune | Step::Copy { .. } => Ok(()),
        }
    }
}
