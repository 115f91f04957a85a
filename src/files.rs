use std::ffi::OsStr;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use time::OffsetDateTime;

/// A FilePatch target resolved against the working root.
#[derive(Debug, Clone)]
pub struct Target {
    /// Path as written in the plan, relative to the root.
    pub relative: PathBuf,
    pub path: PathBuf,
}

impl Target {
    pub fn resolve(root: &Path, relative: &Path) -> Self {
        Self {
            relative: relative.to_path_buf(),
            path: root.join(relative),
        }
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Reads the target; `Ok(None)` when it does not exist.
    pub fn read(&self) -> Result<Option<Vec<u8>>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("reading {}", self.path.display())),
        }
    }

    /// Explains a missing target, with a nearby path that does exist if any.
    pub fn missing_detail(&self, root: &Path) -> String {
        match suggest_path_from(root, &self.relative) {
            Some(hint) => format!(
                "{} does not exist; did you mean {}?",
                self.path.display(),
                hint.strip_prefix(root).unwrap_or(&hint).display()
            ),
            None => format!("{} does not exist", self.path.display()),
        }
    }
}

/// Replaces `path` with `data` through a temp file in the same directory, so
/// the target is either fully old or fully new.
pub fn write_via_temp(path: &Path, data: &[u8]) -> Result<()> {
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
    let base_dir = parent.unwrap_or_else(|| Path::new("."));
    let unique = format!(
        ".anchorpatch-tmp-{}-{}",
        std::process::id(),
        OffsetDateTime::now_utc().unix_timestamp_nanos()
    );
    let temp_path = base_dir.join(unique);
    let permissions = fs::metadata(path).map(|meta| meta.permissions()).ok();
    let written = (|| -> Result<()> {
        let mut file = fs::File::create(&temp_path)
            .with_context(|| format!("creating temp file {}", temp_path.display()))?;
        file.write_all(data)
            .with_context(|| format!("writing temp file {}", temp_path.display()))?;
        file.sync_all()
            .with_context(|| format!("syncing temp file {}", temp_path.display()))?;
        if let Some(permissions) = permissions {
            fs::set_permissions(&temp_path, permissions)
                .with_context(|| format!("copying permissions to {}", temp_path.display()))?;
        }
        Ok(())
    })();
    if let Err(err) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(err);
    }
    fs::rename(&temp_path, path).or_else(|err| {
        let _ = fs::remove_file(&temp_path);
        Err(err).with_context(|| format!("replacing {}", path.display()))
    })?;
    Ok(())
}

/// Looks for `needle`'s file under the root or one directory below it,
/// keeping as much of its trailing path as possible.
fn suggest_path_from(root: &Path, needle: &Path) -> Option<PathBuf> {
    const MAX_DIRS: usize = 256;

    let parts: Vec<&OsStr> = needle
        .components()
        .filter_map(|component| match component {
            Component::Normal(name) => Some(name),
            _ => None,
        })
        .collect();
    // Longest tail first: the more of the original path survives, the better.
    let tails: Vec<PathBuf> = (0..parts.len())
        .map(|skip| parts[skip..].iter().collect())
        .collect();
    if tails.is_empty() {
        return None;
    }

    let mut bases = vec![root.to_path_buf()];
    if let Ok(entries) = fs::read_dir(root) {
        let mut dirs: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .take(MAX_DIRS)
            .collect();
        dirs.sort();
        bases.extend(dirs);
    }

    tails.iter().find_map(|tail| {
        bases
            .iter()
            .map(|base| base.join(tail))
            .find(|candidate| candidate.is_file())
    })
}
