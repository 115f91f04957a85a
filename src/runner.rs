//! Plan lifecycle: load → preview → confirm → back up → apply → report.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use tracing::{debug, info, warn};

use crate::backup::{BackupManager, RunLock};
use crate::confirm::Confirm;
use crate::diff::{self, DiffDisplayConfig};
use crate::files::{Target, write_via_temp};
use crate::plan::{FilePatch, LoadedPlan, PartialFailure};
use crate::report::{ExecutionReport, FileReport, OperationOutcome, RunStatus};
use crate::transform::{TransformResult, run_file_patch};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Loaded,
    Previewed,
    ConfirmPending,
    BackingUp,
    Applying,
    Reported,
}

impl RunState {
    fn can_advance_to(self, next: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, next),
            (Loaded, Previewed)
                | (Previewed, Reported)
                | (Previewed, ConfirmPending)
                | (ConfirmPending, Reported)
                | (ConfirmPending, BackingUp)
                | (BackingUp, Applying)
                | (Applying, Reported)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Report what would change; touch nothing.
    Preview,
    /// Preview, ask once, then back up and write.
    Execute,
}

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Directory that target paths and the backup directory are relative to.
    pub root: PathBuf,
    pub mode: RunMode,
    /// Overrides the plan's own `partial_failure` setting.
    pub partial_failure: Option<PartialFailure>,
    pub diff: DiffDisplayConfig,
}

impl RunnerConfig {
    pub fn new(root: impl Into<PathBuf>, mode: RunMode) -> Self {
        Self {
            root: root.into(),
            mode,
            partial_failure: None,
            diff: DiffDisplayConfig {
                context: 3,
                colorize: false,
            },
        }
    }
}

pub struct PatchRunner<'a> {
    plan: &'a LoadedPlan,
    config: RunnerConfig,
    state: RunState,
}

struct PreparedWrite {
    report_index: usize,
    target: Target,
    bytes: Vec<u8>,
}

impl<'a> PatchRunner<'a> {
    pub fn new(plan: &'a LoadedPlan, config: RunnerConfig) -> Self {
        Self {
            plan,
            config,
            state: RunState::Loaded,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    fn partial_failure(&self) -> PartialFailure {
        self.config
            .partial_failure
            .unwrap_or(self.plan.plan.settings.partial_failure)
    }

    fn advance(&mut self, next: RunState) -> Result<()> {
        if !self.state.can_advance_to(next) {
            bail!("invalid run transition {:?} -> {:?}", self.state, next);
        }
        debug!(from = ?self.state, to = ?next, plan = %self.plan.plan.id, "run state");
        self.state = next;
        Ok(())
    }

    /// Drives the whole lifecycle. Preview output goes to `out`; in execute
    /// mode `confirm` is asked exactly once.
    pub fn run(&mut self, confirm: &mut dyn Confirm, out: &mut dyn Write) -> Result<ExecutionReport> {
        let plan_id = self.plan.plan.id.clone();
        let previews = self.preview(out)?;

        if self.config.mode == RunMode::Preview {
            self.advance(RunState::Reported)?;
            return Ok(ExecutionReport::new(&plan_id, RunStatus::Previewed, previews, None));
        }

        self.advance(RunState::ConfirmPending)?;
        let prompt = format!(
            "Apply plan '{}' to {} file(s) under {}?",
            plan_id,
            self.plan.plan.files.len(),
            self.config.root.display()
        );
        if !confirm.confirm(&prompt)? {
            info!(plan = %plan_id, "run cancelled at confirmation");
            self.advance(RunState::Reported)?;
            return Ok(ExecutionReport::new(
                &plan_id,
                RunStatus::UserCancelled,
                Vec::new(),
                None,
            ));
        }

        let _lock = RunLock::acquire(&self.config.root, self.plan)?;
        self.advance(RunState::BackingUp)?;
        let mut backups = BackupManager::new(&self.config.root, self.plan);
        let mut reports = Vec::with_capacity(self.plan.plan.files.len());
        let mut pending = Vec::new();
        for file_patch in &self.plan.plan.files {
            let (report, prepared) = self.prepare(file_patch, &mut backups, reports.len())?;
            reports.push(report);
            pending.extend(prepared);
        }

        self.advance(RunState::Applying)?;
        for write in pending {
            let report = &mut reports[write.report_index];
            match write_via_temp(&write.target.path, &write.bytes) {
                Ok(()) => {
                    info!(file = %write.target.path.display(), "applied");
                    report.written = true;
                }
                Err(err) => {
                    warn!(file = %write.target.path.display(), error = %format!("{err:#}"), "write failed");
                    report.record(None, OperationOutcome::WriteFailed, Some(format!("{err:#}")));
                }
            }
        }

        self.advance(RunState::Reported)?;
        Ok(ExecutionReport::new(
            &plan_id,
            RunStatus::Completed,
            reports,
            backups.into_record(),
        ))
    }

    /// Simulates every FilePatch in memory and renders diffs. Nothing on disk
    /// is created, written or renamed.
    fn preview(&mut self, out: &mut dyn Write) -> Result<Vec<FileReport>> {
        let mut reports = Vec::with_capacity(self.plan.plan.files.len());
        for file_patch in &self.plan.plan.files {
            let target = Target::resolve(&self.config.root, &file_patch.target);
            let mut report = FileReport::new(file_patch.target.clone());
            let bytes = match self.read_target(&target, &mut report) {
                Some(bytes) => bytes,
                None => {
                    reports.push(report);
                    continue;
                }
            };
            let result = run_file_patch(file_patch, &bytes)?;
            record_resolutions(&mut report, &result);
            if result.changed() {
                writeln!(
                    out,
                    "--- preview: {} ({}) ---",
                    target.path.display(),
                    diff::summarize_lines(&result.decoded.text, &result.new_text)
                )
                .context("writing preview")?;
                out.write_all(
                    diff::render_diff(&result.decoded.text, &result.new_text, &self.config.diff)
                        .as_bytes(),
                )
                .context("writing preview")?;
            }
            reports.push(report);
        }
        self.advance(RunState::Previewed)?;
        Ok(reports)
    }

    /// Reads the target, recording `TargetMissing` when it cannot be read.
    fn read_target(&self, target: &Target, report: &mut FileReport) -> Option<Vec<u8>> {
        if !target.exists() {
            report.record(
                None,
                OperationOutcome::TargetMissing,
                Some(target.missing_detail(&self.config.root)),
            );
            return None;
        }
        match target.read() {
            Ok(Some(bytes)) => Some(bytes),
            Ok(None) => {
                report.record(
                    None,
                    OperationOutcome::TargetMissing,
                    Some(target.missing_detail(&self.config.root)),
                );
                None
            }
            Err(err) => {
                report.record(None, OperationOutcome::TargetMissing, Some(format!("{err:#}")));
                None
            }
        }
    }

    /// Transforms one FilePatch and, if it is going to be written, backs the
    /// pristine file up first.
    fn prepare(
        &self,
        file_patch: &FilePatch,
        backups: &mut BackupManager<'_>,
        report_index: usize,
    ) -> Result<(FileReport, Option<PreparedWrite>)> {
        let target = Target::resolve(&self.config.root, &file_patch.target);
        let mut report = FileReport::new(file_patch.target.clone());
        let Some(original) = self.read_target(&target, &mut report) else {
            return Ok((report, None));
        };

        let result = run_file_patch(file_patch, &original)?;
        record_resolutions(&mut report, &result);
        if !result.changed() {
            return Ok((report, None));
        }
        if result.halted() && self.partial_failure() == PartialFailure::Discard {
            info!(
                file = %target.path.display(),
                "operation failed; discarding partial changes"
            );
            return Ok((report, None));
        }

        let bytes = match result.encoded() {
            Ok(bytes) => bytes,
            Err(err) => {
                report.record(None, OperationOutcome::WriteFailed, Some(format!("{err:#}")));
                return Ok((report, None));
            }
        };
        if let Err(err) = backups.ensure_backup(&target.relative, &original) {
            warn!(file = %target.path.display(), error = %err, "backup failed; file skipped");
            report.record(None, OperationOutcome::BackupFailed, Some(err.to_string()));
            return Ok((report, None));
        }
        Ok((
            report,
            Some(PreparedWrite {
                report_index,
                target,
                bytes,
            }),
        ))
    }
}

fn record_resolutions(report: &mut FileReport, result: &TransformResult) {
    for (idx, resolution) in result.resolutions.iter().enumerate() {
        report.record(Some(idx + 1), resolution.outcome, resolution.detail.clone());
    }
    report.not_attempted = result.not_attempted;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confirm::PromptConfirm;
    use std::fs;
    use std::io::Cursor;
    use std::path::Path;
    use tempfile::tempdir;

    const STATUS_PLAN: &str = r#"
id: status
files:
  - target: A.py
    operations:
      - anchor: "status.set(X)"
        replacement: "status.set(Y)\nextra()"
        probe: "status.set(Y)"
"#;

    fn load(yaml: &str) -> LoadedPlan {
        LoadedPlan::from_bytes(yaml.as_bytes().to_vec(), "plan.yaml", false).expect("plan")
    }

    fn run(plan: &LoadedPlan, root: &Path, mode: RunMode, answer: &str) -> (ExecutionReport, String) {
        let mut confirm = PromptConfirm::new(Cursor::new(answer.as_bytes().to_vec()), Vec::new());
        let mut out = Vec::new();
        let mut runner = PatchRunner::new(plan, RunnerConfig::new(root, mode));
        let report = runner.run(&mut confirm, &mut out).expect("run");
        assert_eq!(runner.state(), RunState::Reported);
        (report, String::from_utf8(out).unwrap())
    }

    fn outcomes(report: &ExecutionReport) -> Vec<OperationOutcome> {
        report
            .files
            .iter()
            .flat_map(|file| file.records.iter().map(|r| r.outcome))
            .collect()
    }

    #[test]
    fn preview_reports_without_touching_disk() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("A.py");
        fs::write(&file, "before\nstatus.set(X)\nafter\n").unwrap();
        let mtime = fs::metadata(&file).unwrap().modified().unwrap();
        let plan = load(STATUS_PLAN);

        let (report, out) = run(&plan, temp.path(), RunMode::Preview, "");
        assert_eq!(report.status, RunStatus::Previewed);
        assert_eq!(outcomes(&report), [OperationOutcome::Applied]);
        assert_eq!(report.exit_code(), 0);
        assert!(report.render().contains("A.py [would modify]"));
        assert!(out.contains("+ status.set(Y)"), "{out}");

        assert_eq!(
            fs::read_to_string(&file).unwrap(),
            "before\nstatus.set(X)\nafter\n"
        );
        assert_eq!(fs::metadata(&file).unwrap().modified().unwrap(), mtime);
        assert!(!temp.path().join("backup_status").exists());
        assert!(!temp.path().join("backup_status.lock").exists());
    }

    #[test]
    fn execute_backs_up_then_writes_and_rerun_is_a_no_op() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("A.py");
        fs::write(&file, "status.set(X)\n").unwrap();
        let plan = load(STATUS_PLAN);

        let (report, _) = run(&plan, temp.path(), RunMode::Execute, "yes\n");
        assert_eq!(report.exit_code(), 0);
        assert_eq!(outcomes(&report), [OperationOutcome::Applied]);
        assert!(report.files[0].written);
        assert_eq!(fs::read_to_string(&file).unwrap(), "status.set(Y)\nextra()\n");

        let backup_dir = temp.path().join("backup_status");
        assert_eq!(
            fs::read_to_string(backup_dir.join("A.py")).unwrap(),
            "status.set(X)\n"
        );
        assert!(backup_dir.join("status.plan.yaml").exists());
        assert!(!temp.path().join("backup_status.lock").exists());
        let record = report.backup.as_ref().expect("backup record");
        assert_eq!(record.entries.len(), 1);
        assert!(record.entries[0].verified);

        let (again, _) = run(&plan, temp.path(), RunMode::Execute, "yes\n");
        assert_eq!(again.exit_code(), 0);
        assert_eq!(outcomes(&again), [OperationOutcome::AlreadyApplied]);
        assert!(again.backup.is_none());
        assert!(!again.files[0].written);
        assert_eq!(fs::read_to_string(&file).unwrap(), "status.set(Y)\nextra()\n");
        assert_eq!(
            fs::read_to_string(backup_dir.join("A.py")).unwrap(),
            "status.set(X)\n"
        );
    }

    #[test]
    fn missing_target_fails_without_backup() {
        let temp = tempdir().unwrap();
        let plan = load(STATUS_PLAN);
        let (preview, _) = run(&plan, temp.path(), RunMode::Preview, "");
        assert_eq!(outcomes(&preview), [OperationOutcome::TargetMissing]);
        assert_ne!(preview.exit_code(), 0);

        let (report, _) = run(&plan, temp.path(), RunMode::Execute, "yes\n");
        assert_eq!(outcomes(&report), [OperationOutcome::TargetMissing]);
        assert_ne!(report.exit_code(), 0);
        assert!(!temp.path().join("backup_status").exists());
    }

    #[test]
    fn declining_changes_nothing() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("A.py");
        fs::write(&file, "status.set(X)\n").unwrap();
        let plan = load(STATUS_PLAN);
        for answer in ["no\n", "\n", "", "y\n"] {
            let (report, _) = run(&plan, temp.path(), RunMode::Execute, answer);
            assert_eq!(report.status, RunStatus::UserCancelled);
            assert_eq!(report.exit_code(), 2);
            assert_eq!(fs::read_to_string(&file).unwrap(), "status.set(X)\n");
            assert!(!temp.path().join("backup_status").exists());
        }
    }

    #[test]
    fn held_lock_aborts_before_any_change() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("A.py");
        fs::write(&file, "status.set(X)\n").unwrap();
        fs::write(temp.path().join("backup_status.lock"), "pid=1").unwrap();
        let plan = load(STATUS_PLAN);

        let mut confirm = PromptConfirm::new(Cursor::new(b"yes\n".to_vec()), Vec::new());
        let mut runner = PatchRunner::new(&plan, RunnerConfig::new(temp.path(), RunMode::Execute));
        let err = runner.run(&mut confirm, &mut Vec::new()).unwrap_err();
        assert!(format!("{err:#}").contains("another run"));
        assert_eq!(fs::read_to_string(&file).unwrap(), "status.set(X)\n");
        assert!(!temp.path().join("backup_status").exists());
        // someone else's lock stays where it was
        assert!(temp.path().join("backup_status.lock").exists());
    }

    const MULTI_OP_PLAN: &str = r#"
id: multi
files:
  - target: app.py
    operations:
      - anchor: "first()"
        replacement: "first_v2()"
        probe: "first_v2"
      - anchor: "missing()"
        replacement: "found()"
        probe: "found()"
      - anchor: "third()"
        replacement: "third_v2()"
        probe: "third_v2"
"#;

    #[test]
    fn partial_failure_keep_writes_accumulated_buffer() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("app.py");
        fs::write(&file, "first()\nthird()\n").unwrap();
        let plan = load(MULTI_OP_PLAN);

        let (report, _) = run(&plan, temp.path(), RunMode::Execute, "yes\n");
        assert_eq!(
            outcomes(&report),
            [OperationOutcome::Applied, OperationOutcome::AnchorNotFound]
        );
        assert_eq!(report.files[0].not_attempted, 1);
        assert_eq!(report.exit_code(), 1);
        assert_eq!(fs::read_to_string(&file).unwrap(), "first_v2()\nthird()\n");
        assert_eq!(
            fs::read_to_string(temp.path().join("backup_multi/app.py")).unwrap(),
            "first()\nthird()\n"
        );
    }

    #[test]
    fn partial_failure_discard_leaves_target_untouched() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("app.py");
        fs::write(&file, "first()\nthird()\n").unwrap();
        let plan = load(MULTI_OP_PLAN);

        let mut config = RunnerConfig::new(temp.path(), RunMode::Execute);
        config.partial_failure = Some(PartialFailure::Discard);
        let mut confirm = PromptConfirm::new(Cursor::new(b"yes\n".to_vec()), Vec::new());
        let report = PatchRunner::new(&plan, config)
            .run(&mut confirm, &mut Vec::new())
            .unwrap();
        assert!(!report.overall_succeeded);
        assert!(!report.files[0].written);
        assert_eq!(fs::read_to_string(&file).unwrap(), "first()\nthird()\n");
        assert!(!temp.path().join("backup_multi").exists());
    }

    const TWO_FILE_PLAN: &str = r#"
id: two
files:
  - target: a.txt
    operations:
      - anchor: "a"
        replacement: "A"
        probe: "A"
  - target: b.txt
    operations:
      - anchor: "b"
        replacement: "B"
        probe: "B"
"#;

    #[test]
    fn backup_failure_is_local_to_its_file() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("a.txt"), "a").unwrap();
        fs::write(temp.path().join("b.txt"), "b").unwrap();
        // a directory where a.txt's backup should go makes that copy fail
        fs::create_dir_all(temp.path().join("backup_two/a.txt")).unwrap();
        let plan = load(TWO_FILE_PLAN);

        let (report, _) = run(&plan, temp.path(), RunMode::Execute, "yes\n");
        assert_eq!(
            outcomes(&report),
            [
                OperationOutcome::Applied,
                OperationOutcome::BackupFailed,
                OperationOutcome::Applied
            ]
        );
        assert_eq!(fs::read_to_string(temp.path().join("a.txt")).unwrap(), "a");
        assert_eq!(fs::read_to_string(temp.path().join("b.txt")).unwrap(), "B");
        assert_eq!(
            fs::read_to_string(temp.path().join("backup_two/b.txt")).unwrap(),
            "b"
        );
        assert_eq!(report.exit_code(), 1);
    }

    #[test]
    fn regex_plan_is_idempotent_and_keeps_crlf() {
        let plan = load(
            r#"
id: crlf
files:
  - target: frame.py
    operations:
      - anchor:
          pattern: 'self\.title\("Old"\)\n'
          mode: regex
        replacement: "self.title(\"New\")\nself.refresh()\n"
        probe: "self.refresh()"
      - anchor: "X"
        scope: "MARK"
        replacement: "Z"
        probe: "Z"
"#,
        );
        let temp = tempdir().unwrap();
        let file = temp.path().join("frame.py");
        fs::write(&file, "X\r\nself.title(\"Old\")\r\nMARK\r\nX\r\n").unwrap();

        let (first, _) = run(&plan, temp.path(), RunMode::Execute, "yes\n");
        assert!(first.overall_succeeded);
        let patched = fs::read_to_string(&file).unwrap();
        assert_eq!(
            patched,
            "X\r\nself.title(\"New\")\r\nself.refresh()\r\nMARK\r\nZ\r\n"
        );

        let (second, _) = run(&plan, temp.path(), RunMode::Execute, "yes\n");
        assert_eq!(
            outcomes(&second),
            [OperationOutcome::AlreadyApplied, OperationOutcome::AlreadyApplied]
        );
        assert_eq!(fs::read_to_string(&file).unwrap(), patched);
    }

    #[test]
    fn changed_file_is_backed_up_beside_an_older_backup() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("A.py");
        let backup_dir = temp.path().join("backup_status");
        fs::create_dir_all(&backup_dir).unwrap();
        fs::write(backup_dir.join("A.py"), "stale\n").unwrap();
        fs::write(&file, "status.set(X)\n").unwrap();
        let plan = load(STATUS_PLAN);

        let (report, _) = run(&plan, temp.path(), RunMode::Execute, "yes\n");
        assert_eq!(report.exit_code(), 0);
        assert!(report.files[0].written);
        assert_eq!(fs::read_to_string(backup_dir.join("A.py")).unwrap(), "stale\n");
        assert_eq!(
            fs::read_to_string(backup_dir.join("A.py.1")).unwrap(),
            "status.set(X)\n"
        );
        let entry = &report.backup.as_ref().expect("backup record").entries[0];
        assert_eq!(entry.backup, backup_dir.join("A.py.1"));
        assert!(entry.verified && !entry.reused);

        // restored by hand and run again: the matching copy is reused
        fs::write(&file, "status.set(X)\n").unwrap();
        let (again, _) = run(&plan, temp.path(), RunMode::Execute, "yes\n");
        let entry = &again.backup.as_ref().expect("backup record").entries[0];
        assert_eq!(entry.backup, backup_dir.join("A.py.1"));
        assert!(entry.reused);
        assert!(!backup_dir.join("A.py.2").exists());
    }

    fn temp_leftovers(dir: &Path) -> Vec<String> {
        fs::read_dir(dir)
            .unwrap()
            .flatten()
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with(".anchorpatch-tmp"))
            .collect()
    }

    #[test]
    fn unwritable_encoding_is_a_write_failure() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("legacy.txt");
        fs::write(&file, b"\x1b$)C payload").unwrap();
        // iso-2022-kr decodes to a single U+FFFD and has no encoder
        let plan = load(
            r#"
id: legacy
files:
  - target: legacy.txt
    encoding: iso-2022-kr
    operations:
      - anchor: "\uFFFD"
        replacement: "fixed"
        probe: "fixed"
"#,
        );

        let (report, _) = run(&plan, temp.path(), RunMode::Execute, "yes\n");
        assert_eq!(
            outcomes(&report),
            [OperationOutcome::Applied, OperationOutcome::WriteFailed]
        );
        assert!(!report.files[0].written);
        assert_eq!(report.exit_code(), 1);
        assert_eq!(fs::read(&file).unwrap(), b"\x1b$)C payload");
        assert!(!temp.path().join("backup_legacy").exists());
        assert!(temp_leftovers(temp.path()).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn failed_write_keeps_target_and_leaves_no_temp_file() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempdir().unwrap();
        let locked = temp.path().join("locked");
        fs::create_dir(&locked).unwrap();
        let file = locked.join("A.py");
        fs::write(&file, "status.set(X)\n").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o555)).unwrap();
        // permission bits do not bind a privileged user
        if fs::write(locked.join(".writable-check"), "").is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }
        let plan = load(
            r#"
id: locked
files:
  - target: locked/A.py
    operations:
      - anchor: "status.set(X)"
        replacement: "status.set(Y)"
        probe: "status.set(Y)"
"#,
        );

        let (report, _) = run(&plan, temp.path(), RunMode::Execute, "yes\n");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        assert_eq!(
            outcomes(&report),
            [OperationOutcome::Applied, OperationOutcome::WriteFailed]
        );
        assert!(!report.files[0].written);
        assert_eq!(report.exit_code(), 1);
        assert_eq!(fs::read_to_string(&file).unwrap(), "status.set(X)\n");
        assert!(temp_leftovers(&locked).is_empty());
        // the backup was still taken before the write was attempted
        assert_eq!(
            fs::read_to_string(temp.path().join("backup_locked/locked/A.py")).unwrap(),
            "status.set(X)\n"
        );
        assert!(report.render().contains("applied in memory, not written"));
    }

    #[test]
    fn runner_cannot_be_reused() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("A.py"), "status.set(X)\n").unwrap();
        let plan = load(STATUS_PLAN);
        let mut runner = PatchRunner::new(&plan, RunnerConfig::new(temp.path(), RunMode::Preview));
        let mut confirm = PromptConfirm::new(Cursor::new(Vec::new()), Vec::new());
        runner.run(&mut confirm, &mut Vec::new()).unwrap();
        assert!(runner.run(&mut confirm, &mut Vec::new()).is_err());
    }
}
