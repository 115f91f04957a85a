//! Plan-scoped backups.
//!
//! Every file a run is about to mutate is first copied into
//! `<root>/backup_<planId>/<relative path>`, together with a copy of the plan
//! definition. Restoring is a plain file copy back out of that directory.
//! A copy from an earlier run is never replaced: different bytes go to the
//! next free `<name>.1`, `<name>.2`, ...

use std::ffi::OsString;
use std::fs::{self, File, FileTimes, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tracing::{debug, info, warn};

use crate::plan::LoadedPlan;

#[derive(Debug, Clone, Serialize)]
pub struct BackupEntry {
    pub original: PathBuf,
    pub backup: PathBuf,
    /// Backup bytes hash the same as the bytes that were patched.
    pub verified: bool,
    /// An identical backup from an earlier run was found and left as it was.
    pub reused: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct BackupRecord {
    pub plan_id: String,
    pub created_at: String,
    pub directory: PathBuf,
    pub plan_copy: PathBuf,
    pub entries: Vec<BackupEntry>,
}

#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    #[error("creating backup directory {}: {source}", path.display())]
    CreateDir { path: PathBuf, source: io::Error },
    #[error("copying plan definition to {}: {source}", path.display())]
    PlanCopy { path: PathBuf, source: io::Error },
    #[error("copying {} to {}: {source}", from.display(), to.display())]
    Copy {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },
    #[error("backup {} does not match the original contents", path.display())]
    Mismatch { path: PathBuf },
}

pub struct BackupManager<'a> {
    root: PathBuf,
    plan: &'a LoadedPlan,
    record: Option<BackupRecord>,
}

impl<'a> BackupManager<'a> {
    pub fn new(root: &Path, plan: &'a LoadedPlan) -> Self {
        Self {
            root: root.to_path_buf(),
            plan,
            record: None,
        }
    }

    pub fn directory(&self) -> PathBuf {
        self.root.join(self.plan.plan.backup_dir_name())
    }

    /// Backs up `relative` (a target path under the root) unless this run
    /// already did. `original` is the content about to be patched; the copy
    /// must hash the same.
    pub fn ensure_backup(
        &mut self,
        relative: &Path,
        original: &[u8],
    ) -> Result<BackupEntry, BackupError> {
        if let Some(existing) = self.find(relative) {
            debug!(file = %relative.display(), "backup already taken this run");
            return Ok(existing.clone());
        }
        let directory = self.ensure_directory()?;

        let source = self.root.join(relative);
        let primary = directory.join(relative);
        let (destination, existing) =
            free_or_matching_slot(&primary, original).map_err(|err| BackupError::Copy {
                from: source.clone(),
                to: primary.clone(),
                source: err,
            })?;
        let entry = if existing {
            debug!(
                backup = %destination.display(),
                "earlier backup already holds these bytes"
            );
            BackupEntry {
                original: relative.to_path_buf(),
                backup: destination,
                verified: true,
                reused: true,
            }
        } else {
            if destination != primary {
                warn!(
                    kept = %primary.display(),
                    saved = %destination.display(),
                    "earlier backup differs from current contents; saving alongside it"
                );
            }
            copy_preserving(&source, &destination)?;
            let copied = fs::read(&destination).map_err(|err| BackupError::Copy {
                from: source.clone(),
                to: destination.clone(),
                source: err,
            })?;
            if digest(&copied) != digest(original) {
                return Err(BackupError::Mismatch { path: destination });
            }
            info!(
                from = %source.display(),
                to = %destination.display(),
                "backup saved"
            );
            BackupEntry {
                original: relative.to_path_buf(),
                backup: destination,
                verified: true,
                reused: false,
            }
        };

        if let Some(record) = self.record.as_mut() {
            record.entries.push(entry.clone());
        }
        Ok(entry)
    }

    pub fn into_record(self) -> Option<BackupRecord> {
        self.record
    }

    fn find(&self, relative: &Path) -> Option<&BackupEntry> {
        self.record
            .as_ref()?
            .entries
            .iter()
            .find(|entry| entry.original == relative)
    }

    fn ensure_directory(&mut self) -> Result<PathBuf, BackupError> {
        if let Some(record) = &self.record {
            return Ok(record.directory.clone());
        }
        let directory = self.directory();
        fs::create_dir_all(&directory).map_err(|source| BackupError::CreateDir {
            path: directory.clone(),
            source,
        })?;
        let base = directory.join(self.plan.backup_copy_name());
        let (plan_copy, existing) = free_or_matching_slot(&base, &self.plan.source_bytes)
            .map_err(|source| BackupError::PlanCopy { path: base, source })?;
        if !existing {
            fs::write(&plan_copy, &self.plan.source_bytes).map_err(|source| {
                BackupError::PlanCopy {
                    path: plan_copy.clone(),
                    source,
                }
            })?;
        }
        let created_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| "unknown".into());
        info!(directory = %directory.display(), "backup directory ready");
        self.record = Some(BackupRecord {
            plan_id: self.plan.plan.id.clone(),
            created_at,
            directory: directory.clone(),
            plan_copy,
            entries: Vec::new(),
        });
        Ok(directory)
    }
}

fn copy_preserving(from: &Path, to: &Path) -> Result<(), BackupError> {
    let copy_err = |source| BackupError::Copy {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).map_err(|source| BackupError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    // fs::copy carries the permission bits over
    fs::copy(from, to).map_err(copy_err)?;
    let modified = fs::metadata(from).and_then(|meta| meta.modified());
    if let Ok(modified) = modified {
        let file = OpenOptions::new().write(true).open(to).map_err(copy_err)?;
        if let Err(err) = file.set_times(FileTimes::new().set_modified(modified)) {
            debug!(error = %err, "could not carry modification time to backup");
        }
    }
    Ok(())
}

/// First of `path`, `path.1`, `path.2`, ... that is either free or already
/// holds `bytes`; the flag is true in the second case. Earlier copies are
/// never replaced.
fn free_or_matching_slot(path: &Path, bytes: &[u8]) -> io::Result<(PathBuf, bool)> {
    let wanted = digest(bytes);
    let mut index = 0usize;
    loop {
        let candidate = indexed_candidate(path, index);
        match fs::read(&candidate) {
            Ok(existing) if digest(&existing) == wanted => return Ok((candidate, true)),
            Ok(_) => index += 1,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok((candidate, false)),
            Err(err) => return Err(err),
        }
    }
}

fn indexed_candidate(path: &Path, index: usize) -> PathBuf {
    if index == 0 {
        return path.to_path_buf();
    }
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(format!(".{index}"));
    path.with_file_name(name)
}

fn digest(bytes: &[u8]) -> Vec<u8> {
    Sha256::digest(bytes).to_vec()
}

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error(
        "{} exists: another run of this plan is in progress (remove it if that run crashed)",
        path.display()
    )]
    Held { path: PathBuf },
    #[error("creating lock {}: {source}", path.display())]
    Create { path: PathBuf, source: io::Error },
}

/// Exclusive marker for one run of a plan; removed on drop.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    pub fn acquire(root: &Path, plan: &LoadedPlan) -> Result<Self, LockError> {
        let path = root.join(format!("{}.lock", plan.plan.backup_dir_name()));
        let file = OpenOptions::new().write(true).create_new(true).open(&path);
        let mut file: File = match file {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                return Err(LockError::Held { path });
            }
            Err(source) => return Err(LockError::Create { path, source }),
        };
        let timestamp = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| "unknown".into());
        // the contents are informational only
        let _ = writeln!(file, "pid={} started={timestamp}", std::process::id());
        debug!(lock = %path.display(), "run lock acquired");
        Ok(Self { path })
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.path) {
            warn!(lock = %self.path.display(), error = %err, "failed to remove run lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn loaded() -> LoadedPlan {
        let yaml = "id: demo\nfiles:\n  - target: src/a.txt\n    operations:\n      - anchor: a\n        replacement: b\n        probe: b\n";
        LoadedPlan::from_bytes(yaml.as_bytes().to_vec(), "demo.yaml", false).unwrap()
    }

    #[test]
    fn backup_copies_file_and_plan_once() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::write(root.join("src/a.txt"), "original").unwrap();
        let plan = loaded();
        let mut manager = BackupManager::new(root, &plan);
        assert!(!manager.directory().exists());

        let entry = manager
            .ensure_backup(Path::new("src/a.txt"), b"original")
            .unwrap();
        assert!(entry.verified);
        assert!(!entry.reused);
        assert_eq!(entry.backup, root.join("backup_demo/src/a.txt"));
        assert_eq!(fs::read(&entry.backup).unwrap(), b"original");
        assert_eq!(
            fs::read(root.join("backup_demo/demo.plan.yaml")).unwrap(),
            plan.source_bytes
        );

        // Second call in the same run must not re-copy.
        fs::write(root.join("src/a.txt"), "changed").unwrap();
        manager
            .ensure_backup(Path::new("src/a.txt"), b"changed")
            .unwrap();
        assert_eq!(fs::read(&entry.backup).unwrap(), b"original");
        assert_eq!(manager.into_record().unwrap().entries.len(), 1);
    }

    #[test]
    fn earlier_backup_is_never_overwritten() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("backup_demo/src")).unwrap();
        fs::write(root.join("backup_demo/src/a.txt"), "pristine").unwrap();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::write(root.join("src/a.txt"), "half patched").unwrap();
        let plan = loaded();
        let mut manager = BackupManager::new(root, &plan);
        let entry = manager
            .ensure_backup(Path::new("src/a.txt"), b"half patched")
            .unwrap();
        assert!(entry.verified);
        assert!(!entry.reused);
        assert_eq!(entry.backup, root.join("backup_demo/src/a.txt.1"));
        assert_eq!(fs::read(&entry.backup).unwrap(), b"half patched");
        assert_eq!(
            fs::read(root.join("backup_demo/src/a.txt")).unwrap(),
            b"pristine"
        );
    }

    #[test]
    fn identical_earlier_backup_is_reused() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("backup_demo/src")).unwrap();
        fs::write(root.join("backup_demo/src/a.txt"), "pristine").unwrap();
        fs::write(root.join("backup_demo/src/a.txt.1"), "second").unwrap();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::write(root.join("src/a.txt"), "second").unwrap();
        let plan = loaded();
        let mut manager = BackupManager::new(root, &plan);
        let entry = manager
            .ensure_backup(Path::new("src/a.txt"), b"second")
            .unwrap();
        assert!(entry.reused && entry.verified);
        assert_eq!(entry.backup, root.join("backup_demo/src/a.txt.1"));
        assert!(!root.join("backup_demo/src/a.txt.2").exists());
    }

    #[test]
    fn changed_plan_definition_is_copied_alongside() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("backup_demo")).unwrap();
        fs::write(root.join("backup_demo/demo.plan.yaml"), "id: demo # old\n").unwrap();
        fs::write(root.join("a.txt"), "a").unwrap();
        let plan = loaded();
        let mut manager = BackupManager::new(root, &plan);
        manager.ensure_backup(Path::new("a.txt"), b"a").unwrap();
        let record = manager.into_record().unwrap();
        assert_eq!(record.plan_copy, root.join("backup_demo/demo.plan.yaml.1"));
        assert_eq!(fs::read(&record.plan_copy).unwrap(), plan.source_bytes);
        assert_eq!(
            fs::read_to_string(root.join("backup_demo/demo.plan.yaml")).unwrap(),
            "id: demo # old\n"
        );
    }

    #[test]
    fn missing_source_fails_the_copy() {
        let temp = tempdir().unwrap();
        let plan = loaded();
        let mut manager = BackupManager::new(temp.path(), &plan);
        let err = manager
            .ensure_backup(Path::new("src/a.txt"), b"")
            .unwrap_err();
        assert!(matches!(err, BackupError::Copy { .. }));
    }

    #[test]
    fn lock_is_exclusive_and_released() {
        let temp = tempdir().unwrap();
        let plan = loaded();
        let lock = RunLock::acquire(temp.path(), &plan).unwrap();
        assert!(temp.path().join("backup_demo.lock").exists());
        assert!(matches!(
            RunLock::acquire(temp.path(), &plan),
            Err(LockError::Held { .. })
        ));
        drop(lock);
        assert!(!temp.path().join("backup_demo.lock").exists());
        assert!(RunLock::acquire(temp.path(), &plan).is_ok());
    }
}
