use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::encoding::EncodingStrategy;

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    #[default]
    Exact,
    Regex,
}

/// What to do when an anchor occurs more than once in its search region.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Occurrence {
    #[default]
    Unique,
    First,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PartialFailure {
    /// Write whatever the earlier operations of a failed FilePatch produced.
    #[default]
    Keep,
    /// Leave the target untouched when any of its operations fails.
    Discard,
}

#[derive(Debug, Clone)]
pub enum Pattern {
    Literal(String),
    Regex(Regex),
}

impl Pattern {
    pub fn source(&self) -> &str {
        match self {
            Pattern::Literal(text) => text,
            Pattern::Regex(regex) => regex.as_str(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "MatchSpecDef")]
pub struct MatchSpec {
    pub pattern: Pattern,
    pub normalize_line_endings: bool,
    pub occurrence: Occurrence,
}

impl MatchSpec {
    pub fn exact(pattern: impl Into<String>) -> Self {
        Self {
            pattern: Pattern::Literal(pattern.into()),
            normalize_line_endings: false,
            occurrence: Occurrence::Unique,
        }
    }

    #[cfg(test)]
    pub fn regex(pattern: &str) -> Result<Self, PlanError> {
        MatchSpec::try_from(MatchSpecDef::Full {
            pattern: pattern.to_string(),
            mode: MatchMode::Regex,
            normalize_line_endings: None,
            occurrence: Occurrence::Unique,
        })
    }

    #[cfg(test)]
    pub fn with_occurrence(mut self, occurrence: Occurrence) -> Self {
        self.occurrence = occurrence;
        self
    }

    pub fn mode(&self) -> MatchMode {
        match self.pattern {
            Pattern::Literal(_) => MatchMode::Exact,
            Pattern::Regex(_) => MatchMode::Regex,
        }
    }
}

impl fmt::Display for MatchSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mode() {
            MatchMode::Exact => write!(f, "{:?}", self.pattern.source()),
            MatchMode::Regex => write!(f, "/{}/", self.pattern.source()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MatchSpecDef {
    Bare(String),
    Full {
        pattern: String,
        #[serde(default)]
        mode: MatchMode,
        #[serde(default)]
        normalize_line_endings: Option<bool>,
        #[serde(default)]
        occurrence: Occurrence,
    },
}

impl TryFrom<MatchSpecDef> for MatchSpec {
    type Error = PlanError;

    fn try_from(def: MatchSpecDef) -> Result<Self, Self::Error> {
        match def {
            MatchSpecDef::Bare(pattern) => {
                if pattern.is_empty() {
                    return Err(PlanError::EmptyPattern);
                }
                Ok(MatchSpec::exact(pattern))
            }
            MatchSpecDef::Full {
                pattern,
                mode,
                normalize_line_endings,
                occurrence,
            } => {
                if pattern.is_empty() {
                    return Err(PlanError::EmptyPattern);
                }
                let pattern = match mode {
                    MatchMode::Exact => Pattern::Literal(pattern),
                    MatchMode::Regex => {
                        let regex = Regex::new(&pattern).map_err(|source| {
                            PlanError::InvalidRegex {
                                pattern: pattern.clone(),
                                source,
                            }
                        })?;
                        Pattern::Regex(regex)
                    }
                };
                Ok(MatchSpec {
                    normalize_line_endings: normalize_line_endings
                        .unwrap_or(mode == MatchMode::Regex),
                    pattern,
                    occurrence,
                })
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PatchOperation {
    pub anchor: MatchSpec,
    #[serde(default)]
    pub scope: Option<MatchSpec>,
    pub replacement: String,
    /// Fragment of `replacement` whose presence means the edit already happened.
    pub probe: String,
}

fn default_encoding() -> String {
    "utf-8".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct FilePatch {
    pub target: PathBuf,
    pub operations: Vec<PatchOperation>,
    #[serde(default = "default_encoding")]
    pub encoding: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PlanSettings {
    #[serde(default)]
    pub partial_failure: PartialFailure,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PatchPlan {
    pub id: String,
    pub files: Vec<FilePatch>,
    #[serde(default)]
    pub settings: PlanSettings,
}

impl PatchPlan {
    pub fn backup_dir_name(&self) -> String {
        format!("backup_{}", self.id)
    }

    pub fn validate(&self) -> Result<(), PlanError> {
        if self.id.is_empty() {
            return Err(PlanError::EmptyId);
        }
        if !self
            .id
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.'))
            || self.id.starts_with('.')
        {
            return Err(PlanError::InvalidId(self.id.clone()));
        }
        if self.files.is_empty() {
            return Err(PlanError::NoFiles);
        }

        let mut seen = HashSet::new();
        for file in &self.files {
            let normalized = normalize_target(&file.target)?;
            if !seen.insert(normalized) {
                return Err(PlanError::DuplicateTarget(file.target.clone()));
            }
            if file.operations.is_empty() {
                return Err(PlanError::NoOperations(file.target.clone()));
            }
            if EncodingStrategy::new(&file.encoding).is_err() {
                return Err(PlanError::UnknownEncoding {
                    target: file.target.clone(),
                    label: file.encoding.clone(),
                });
            }
            for (idx, op) in file.operations.iter().enumerate() {
                if op.probe.is_empty() {
                    return Err(PlanError::MissingProbe {
                        target: file.target.clone(),
                        index: idx + 1,
                    });
                }
                if !op.replacement.contains(&op.probe) {
                    return Err(PlanError::ProbeNotInReplacement {
                        target: file.target.clone(),
                        index: idx + 1,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Lexically normalised form of a target path; rejects paths that could leave
/// the working root.
pub fn normalize_target(path: &Path) -> Result<PathBuf, PlanError> {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(PlanError::TargetOutsideRoot(path.to_path_buf()));
            }
        }
    }
    if normalized.as_os_str().is_empty() {
        return Err(PlanError::TargetOutsideRoot(path.to_path_buf()));
    }
    Ok(normalized)
}

#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("plan id must not be empty")]
    EmptyId,
    #[error("plan id '{0}' may only contain ASCII letters, digits, '-', '_' and '.'")]
    InvalidId(String),
    #[error("plan lists no files")]
    NoFiles,
    #[error("{} appears in more than one file entry", .0.display())]
    DuplicateTarget(PathBuf),
    #[error("{} has no operations", .0.display())]
    NoOperations(PathBuf),
    #[error("{}: unknown encoding '{label}'", target.display())]
    UnknownEncoding { target: PathBuf, label: String },
    #[error("{} must be a relative path inside the working root", .0.display())]
    TargetOutsideRoot(PathBuf),
    #[error("{}#{index} needs a non-empty idempotency probe", target.display())]
    MissingProbe { target: PathBuf, index: usize },
    #[error("{}#{index}: probe must be a fragment of the replacement", target.display())]
    ProbeNotInReplacement { target: PathBuf, index: usize },
    #[error("anchor pattern must not be empty")]
    EmptyPattern,
    #[error("invalid regex '{pattern}': {source}")]
    InvalidRegex {
        pattern: String,
        source: regex::Error,
    },
}

/// A validated plan together with the bytes it was read from, so the
/// definition itself can be copied into the backup directory.
#[derive(Debug, Clone)]
pub struct LoadedPlan {
    pub plan: PatchPlan,
    pub source_name: String,
    pub source_bytes: Vec<u8>,
}

impl LoadedPlan {
    pub fn from_bytes(data: Vec<u8>, source_name: &str, json: bool) -> Result<Self> {
        let plan: PatchPlan = if json {
            serde_json::from_slice(&data)
                .with_context(|| format!("parsing plan {source_name}"))?
        } else {
            serde_yaml::from_slice(&data)
                .with_context(|| format!("parsing plan {source_name}"))?
        };
        plan.validate()
            .with_context(|| format!("validating plan {source_name}"))?;
        Ok(Self {
            plan,
            source_name: source_name.to_string(),
            source_bytes: data,
        })
    }

    /// File name used for the copy of the definition inside the backup dir.
    pub fn backup_copy_name(&self) -> String {
        let ext = Path::new(&self.source_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("yaml");
        format!("{}.plan.{ext}", self.plan.id)
    }
}

pub fn load_plan(path: &Path) -> Result<LoadedPlan> {
    let data = fs::read(path).with_context(|| format!("reading plan {}", path.display()))?;
    let json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("plan.yaml");
    LoadedPlan::from_bytes(data, name, json)
}
