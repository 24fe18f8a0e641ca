#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Read-only access to the campus historical air quality store.
//!
//! Uses `switchy_database` over the `SQLite` file written by the collection
//! jobs. Every query here is a `SELECT`; the engine never writes to the
//! store.

pub mod db;
pub mod paths;
pub mod queries;

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// Database query error.
    #[error("Database error: {0}")]
    Database(#[from] switchy_database::DatabaseError),

    /// The store file does not exist.
    #[error("Store not found at {path}")]
    NotFound {
        /// Path that was looked up.
        path: String,
    },

    /// The store could not be opened.
    #[error("Connection error: {message}")]
    Connection {
        /// Description of what went wrong.
        message: String,
    },

    /// Data conversion error.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}
