/*!
Read-only access to the source database.

This module provides the `Database` struct which wraps a SQLite connection
opened without write access, and exposes the two operations the extractor
needs from the engine: a liveness probe and `VACUUM INTO`.
*/

use crate::error::Stage;
use anyhow::{Context, Result};
use log::debug;
use rusqlite::{Connection, OpenFlags};
use std::path::Path;

/// Read-only connection to the database being snapshotted.
///
/// The connection is closed when the value is dropped.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens an existing database without write access.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the source database file
    ///
    /// # Errors
    ///
    /// Returns a [`Stage::Open`] error if the file does not exist or cannot be
    /// opened. The file is never created.
    pub fn open_read_only<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context(Stage::Open)?;

        debug!("opened {} read-only", path.display());
        Ok(Database { conn })
    }

    /// Checks that the handle points at a usable database.
    ///
    /// SQLite opens lazily, so this reads the schema cookie from the file
    /// header. A file that is not a database fails here.
    ///
    /// # Errors
    ///
    /// Returns a [`Stage::Connect`] error if the header cannot be read.
    pub fn ping(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "schema_version", |row| row.get(0))
            .context(Stage::Connect)?;

        debug!("connection live, schema_version={}", version);
        Ok(())
    }

    /// Writes a compacted, transactionally consistent copy of the database
    /// to `dest` with `VACUUM INTO`.
    ///
    /// The engine reads the source inside a single read transaction, so
    /// concurrent writers are neither blocked nor observed half-way.
    /// `dest` must not exist or must be empty.
    ///
    /// # Errors
    ///
    /// Returns a [`Stage::Snapshot`] error if the path is not valid UTF-8 or
    /// the engine cannot write the copy.
    pub fn vacuum_into<P: AsRef<Path>>(&self, dest: P) -> Result<()> {
        let dest = dest.as_ref();
        let dest_str = dest
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("path is not valid UTF-8: {}", dest.display()))
            .context(Stage::Snapshot)?;

        self.conn
            .execute("VACUUM INTO ?1", [dest_str])
            .context(Stage::Snapshot)?;

        debug!("vacuumed into {}", dest.display());
        Ok(())
    }
}
