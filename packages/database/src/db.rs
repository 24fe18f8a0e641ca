//! Database connection utilities.

use std::path::Path;

use switchy_database::Database;
use switchy_database_connection::init_sqlite_rusqlite;

use crate::{DbError, paths};

/// Opens the historical store at the path resolved by
/// [`paths::store_path`] (`DATABASE_PATH` or `data/campus_data.db`).
///
/// # Errors
///
/// Returns [`DbError`] if the file does not exist or cannot be opened.
pub fn connect_from_env() -> Result<Box<dyn Database>, DbError> {
    connect(&paths::store_path())
}

/// Opens an existing `SQLite` store.
///
/// The store is produced by the collection jobs, so a missing file is an
/// error rather than an invitation to create an empty database.
///
/// # Errors
///
/// Returns [`DbError`] if the file does not exist or cannot be opened.
pub fn connect(path: &Path) -> Result<Box<dyn Database>, DbError> {
    if !path.exists() {
        return Err(DbError::NotFound {
            path: path.display().to_string(),
        });
    }

    log::debug!("Opening store at {}", path.display());

    init_sqlite_rusqlite(Some(path)).map_err(|e| DbError::Connection {
        message: e.to_string(),
    })
}
