//! Atomic file replacement (write temp files, then rename).
//!
//! A group of files is replaced together: every temp file is written before
//! any target is touched, and a failed rename puts the already replaced
//! targets back from their `.bak` copies.

use std::fs;
use std::path::{Path, PathBuf};

use super::ExportError;

/// Temp path used while `path` is being written: `<name>.tmp` in the same directory.
pub fn temp_path_for(path: &Path) -> PathBuf {
    sibling_with_suffix(path, ".tmp")
}

/// Copy of the previous file kept while a group commit is in flight.
pub fn backup_path_for(path: &Path) -> PathBuf {
    sibling_with_suffix(path, ".bak")
}

fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

/// Replace `path` with `bytes` so readers see either the old or the new file.
///
/// The parent directory is created if missing. On failure the temp file is
/// removed and the previous file at `path` is left untouched.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ExportError> {
    write_all_atomic(&[(path, bytes)])
}

/// Replace every `(path, bytes)` pair, or none of them.
pub fn write_all_atomic(files: &[(&Path, &[u8])]) -> Result<(), ExportError> {
    let mut staged = Vec::with_capacity(files.len());
    for (path, bytes) in files {
        match stage(path, bytes) {
            Ok(file) => staged.push(file),
            Err(e) => {
                staged.iter().for_each(StagedFile::discard);
                return Err(e);
            }
        }
    }
    commit_all(&staged)
}

/// A fully written temp file waiting to be renamed over its target.
struct StagedFile {
    target: PathBuf,
    tmp: PathBuf,
}

impl StagedFile {
    fn discard(&self) {
        let _ = fs::remove_file(&self.tmp);
    }
}

/// A target that has been replaced; holds what is needed to undo it.
struct Committed {
    target: PathBuf,
    backup: Option<PathBuf>,
}

impl Committed {
    fn roll_back(&self) {
        match &self.backup {
            Some(backup) => {
                let _ = fs::rename(backup, &self.target);
            }
            // There was no previous file
            None => {
                let _ = fs::remove_file(&self.target);
            }
        }
    }

    fn finish(&self) {
        if let Some(backup) = &self.backup {
            let _ = fs::remove_file(backup);
        }
    }
}

fn stage(path: &Path, bytes: &[u8]) -> Result<StagedFile, ExportError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| ExportError::io(parent, e))?;
    }

    let tmp = temp_path_for(path);
    if let Err(e) = fs::write(&tmp, bytes) {
        let _ = fs::remove_file(&tmp);
        return Err(ExportError::io(&tmp, e));
    }
    Ok(StagedFile {
        target: path.to_path_buf(),
        tmp,
    })
}

fn commit_all(staged: &[StagedFile]) -> Result<(), ExportError> {
    let mut committed: Vec<Committed> = Vec::with_capacity(staged.len());

    for (i, file) in staged.iter().enumerate() {
        match commit_one(file) {
            Ok(done) => committed.push(done),
            Err(e) => {
                staged[i..].iter().for_each(StagedFile::discard);
                committed.iter().rev().for_each(Committed::roll_back);
                return Err(e);
            }
        }
    }

    committed.iter().for_each(Committed::finish);
    Ok(())
}

/// The previous file is hard-linked (or copied) to `.bak` so the target
/// itself stays readable until the rename swaps it.
fn commit_one(file: &StagedFile) -> Result<Committed, ExportError> {
    let backup = if file.target.is_file() {
        let backup = backup_path_for(&file.target);
        let _ = fs::remove_file(&backup); // stale from an interrupted run
        if let Err(e) = fs::hard_link(&file.target, &backup)
            .or_else(|_| fs::copy(&file.target, &backup).map(|_| ()))
        {
            file.discard();
            return Err(ExportError::io(&backup, e));
        }
        Some(backup)
    } else {
        None
    };

    if let Err(e) = fs::rename(&file.tmp, &file.target) {
        file.discard();
        if let Some(backup) = &backup {
            let _ = fs::remove_file(backup);
        }
        return Err(ExportError::io(&file.target, e));
    }

    Ok(Committed {
        target: file.target.clone(),
        backup,
    })
}
