//! Discovery of the technique library on disk.

use crate::catalog::fs_reader::{DEFAULT_CATEGORY_FILE, FsReaderOptions};
use anyhow::{Result, bail};
use std::{
    env, fs,
    path::{Path, PathBuf},
};

/// Environment variable naming the library root explicitly.
pub const ROOT_ENV: &str = "TECHLIB_ROOT";
/// Directory name searched for when no explicit root is given.
pub const LIBRARY_DIR: &str = "techniques";

fn is_library_root(candidate: &Path) -> bool {
    candidate.join(DEFAULT_CATEGORY_FILE).is_file()
}

fn root_from_hint(hint: &str) -> Option<PathBuf> {
    if hint.is_empty() {
        return None;
    }
    let hint_path = PathBuf::from(hint);
    if !is_library_root(&hint_path) {
        return None;
    }
    fs::canonicalize(hint_path).ok()
}

/// Climb from `start` looking for `techniques/category.json`.
pub fn search_upwards(start: &Path) -> Option<PathBuf> {
    let mut dir = fs::canonicalize(start).ok()?;
    loop {
        let candidate = dir.join(LIBRARY_DIR);
        if is_library_root(&candidate) {
            return Some(candidate);
        }
        if !dir.pop() {
            return None;
        }
    }
}

/// Locate the technique library.
///
/// Honors `TECHLIB_ROOT` if it points at a directory holding the root
/// category file, then climbs up from the current directory.
pub fn find_techniques_root() -> Result<PathBuf> {
    if let Ok(env_root) = env::var(ROOT_ENV) {
        if let Some(root) = root_from_hint(&env_root) {
            return Ok(root);
        }
    }

    if let Ok(cwd) = env::current_dir() {
        if let Some(root) = search_upwards(&cwd) {
            return Ok(root);
        }
    }

    bail!(
        "Unable to locate the technique library. Set {ROOT_ENV} to a directory containing {DEFAULT_CATEGORY_FILE}."
    );
}

/// Default reader options for the discovered library.
pub fn reader_options() -> Result<FsReaderOptions> {
    Ok(FsReaderOptions::new(find_techniques_root()?))
}
