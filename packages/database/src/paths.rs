//! Canonical file paths for the campus data directory.
//!
//! All paths are relative to the project root's `data/` directory.

use std::path::{Path, PathBuf};

/// File name of the store written by the collection jobs.
pub const DEFAULT_DB_FILE: &str = "campus_data.db";

/// Returns the workspace root directory.
///
/// Resolved at compile time from `CARGO_MANIFEST_DIR`.
///
/// # Panics
///
/// Panics if the project root cannot be resolved.
#[must_use]
pub fn project_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .expect("Failed to find project root from CARGO_MANIFEST_DIR")
        .to_path_buf()
}

/// Returns the `data/` directory path.
#[must_use]
pub fn data_dir() -> PathBuf {
    project_root().join("data")
}

/// Returns the path of the historical store.
///
/// Honors `DATABASE_PATH` when set, otherwise `data/campus_data.db`.
#[must_use]
pub fn store_path() -> PathBuf {
    std::env::var("DATABASE_PATH")
        .map_or_else(|_| data_dir().join(DEFAULT_DB_FILE), PathBuf::from)
}
