use std::fmt::{self, Write as _};
use std::path::PathBuf;

use serde::Serialize;

use crate::backup::BackupRecord;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationOutcome {
    Applied,
    AlreadyApplied,
    AnchorNotFound,
    AmbiguousAnchor,
    TargetMissing,
    BackupFailed,
    WriteFailed,
}

impl OperationOutcome {
    pub fn is_success(self) -> bool {
        matches!(self, OperationOutcome::Applied | OperationOutcome::AlreadyApplied)
    }

    pub fn label(self) -> &'static str {
        match self {
            OperationOutcome::Applied => "applied",
            OperationOutcome::AlreadyApplied => "already applied",
            OperationOutcome::AnchorNotFound => "anchor not found",
            OperationOutcome::AmbiguousAnchor => "ambiguous anchor",
            OperationOutcome::TargetMissing => "target missing",
            OperationOutcome::BackupFailed => "backup failed",
            OperationOutcome::WriteFailed => "write failed",
        }
    }
}

impl fmt::Display for OperationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Previewed,
    Completed,
    UserCancelled,
}

/// One outcome. File-level outcomes (missing target, backup or write
/// failures) carry no operation index.
#[derive(Clone, Debug, Serialize)]
pub struct OperationRecord {
    pub index: Option<usize>,
    pub outcome: OperationOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct FileReport {
    pub target: PathBuf,
    pub records: Vec<OperationRecord>,
    pub not_attempted: usize,
    pub written: bool,
}

impl FileReport {
    pub fn new(target: PathBuf) -> Self {
        Self {
            target,
            records: Vec::new(),
            not_attempted: 0,
            written: false,
        }
    }

    pub fn record(&mut self, index: Option<usize>, outcome: OperationOutcome, detail: Option<String>) {
        self.records.push(OperationRecord {
            index,
            outcome,
            detail,
        });
    }

    pub fn succeeded(&self) -> bool {
        self.not_attempted == 0 && self.records.iter().all(|r| r.outcome.is_success())
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ExecutionReport {
    pub plan_id: String,
    pub status: RunStatus,
    pub files: Vec<FileReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup: Option<BackupRecord>,
    pub overall_succeeded: bool,
}

#[derive(Default, Debug, PartialEq, Eq)]
struct Tally {
    applied: usize,
    already_applied: usize,
    failed: usize,
    not_attempted: usize,
}

impl ExecutionReport {
    pub fn new(
        plan_id: &str,
        status: RunStatus,
        files: Vec<FileReport>,
        backup: Option<BackupRecord>,
    ) -> Self {
        let overall_succeeded = match status {
            RunStatus::UserCancelled => false,
            RunStatus::Previewed | RunStatus::Completed => files.iter().all(FileReport::succeeded),
        };
        Self {
            plan_id: plan_id.to_string(),
            status,
            files,
            backup,
            overall_succeeded,
        }
    }

    /// 0 when every operation succeeded or would succeed, 1 on failure, 2
    /// when the operator declined.
    pub fn exit_code(&self) -> i32 {
        match self.status {
            RunStatus::UserCancelled => 2,
            _ if self.overall_succeeded => 0,
            _ => 1,
        }
    }

    fn tally(&self) -> Tally {
        let mut tally = Tally::default();
        for file in &self.files {
            tally.not_attempted += file.not_attempted;
            for record in &file.records {
                match record.outcome {
                    OperationOutcome::Applied => tally.applied += 1,
                    OperationOutcome::AlreadyApplied => tally.already_applied += 1,
                    _ => tally.failed += 1,
                }
            }
        }
        tally
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let preview = self.status == RunStatus::Previewed;
        let _ = writeln!(out, "plan: {}", self.plan_id);
        match self.status {
            RunStatus::Previewed => {
                let _ = writeln!(out, "mode: preview (rerun with --apply to write changes)");
            }
            RunStatus::Completed => {
                let _ = writeln!(out, "mode: apply");
            }
            RunStatus::UserCancelled => {
                let _ = writeln!(out, "cancelled by user; nothing was backed up or written.");
                return out;
            }
        }

        for file in &self.files {
            let verdict = if !file.succeeded() {
                "FAILED"
            } else if file.written {
                "modified"
            } else if preview && file.records.iter().any(|r| r.outcome == OperationOutcome::Applied) {
                "would modify"
            } else {
                "unchanged"
            };
            let _ = writeln!(out, "{} [{verdict}]", file.target.display());
            for record in &file.records {
                let label = match (preview, record.outcome) {
                    (true, OperationOutcome::Applied) => "would apply",
                    (false, OperationOutcome::Applied) if !file.written => "applied in memory, not written",
                    (_, outcome) => outcome.label(),
                };
                let index = record
                    .index
                    .map(|idx| format!("#{idx}"))
                    .unwrap_or_else(|| "file".to_string());
                match &record.detail {
                    Some(detail) => {
                        let _ = writeln!(out, "  {index} {label}: {detail}");
                    }
                    None => {
                        let _ = writeln!(out, "  {index} {label}");
                    }
                }
            }
            if file.not_attempted > 0 {
                let _ = writeln!(
                    out,
                    "  {} later operation(s) not attempted",
                    file.not_attempted
                );
            }
        }

        if let Some(backup) = &self.backup {
            let _ = writeln!(out, "backup: {}", backup.directory.display());
            for entry in &backup.entries {
                let state = match (entry.reused, entry.verified) {
                    (true, _) => "kept from earlier run",
                    (false, true) => "verified",
                    (false, false) => "UNVERIFIED",
                };
                let _ = writeln!(
                    out,
                    "  {} -> {} ({state})",
                    entry.original.display(),
                    entry.backup.display()
                );
            }
        }

        let tally = self.tally();
        let _ = writeln!(
            out,
            "summary: applied={}, already-applied={}, failed={}, not-attempted={}",
            tally.applied, tally.already_applied, tally.failed, tally.not_attempted
        );
        let _ = writeln!(
            out,
            "result: {}",
            if self.overall_succeeded { "ok" } else { "failed" }
        );
        out
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
