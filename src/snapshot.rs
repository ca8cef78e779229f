/*!
Snapshot extraction for vai-snapshot.

This module drives the whole extraction: open the source read-only, have the
engine write a consistent compacted copy to a temporary path, then stream that
copy through a base64 encoder into the output writer. The temporary file is
owned by a [`SnapshotGuard`] and removed on every exit path.
*/

use crate::db::Database;
use crate::error::Stage;
use crate::utils::{encoded_len, format_size};
use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::write::EncoderWriter;
use log::{debug, info, warn};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

/// Removes the snapshot file when dropped.
///
/// A missing file is not an error: the engine may have failed before
/// creating it.
pub struct SnapshotGuard {
    path: PathBuf,
}

impl SnapshotGuard {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        SnapshotGuard { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SnapshotGuard {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!("removed {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove snapshot {}: {}", self.path.display(), e),
        }
    }
}

/// First bytes of every SQLite database file.
const SQLITE_HEADER: &[u8; 16] = b"SQLite format 3\0";

/// Makes `path` ready to receive a `VACUUM INTO` copy of `source`.
///
/// `VACUUM INTO` refuses a non-empty target, so a snapshot left behind by an
/// interrupted run would make every later run fail. Only an empty file or a
/// SQLite file is treated as such a leftover and removed. Anything else at
/// the path, and the source database itself, is left alone.
///
/// # Errors
///
/// Returns a [`Stage::Snapshot`] error if `path` is the source database,
/// holds something other than a leftover snapshot, or cannot be removed.
pub fn prepare_snapshot_path<P: AsRef<Path>, Q: AsRef<Path>>(source: P, path: Q) -> Result<()> {
    let source = source.as_ref();
    let path = path.as_ref();
    if !path.exists() {
        return Ok(());
    }

    if is_same_file(source, path) {
        return Err(anyhow::anyhow!(
            "snapshot path {} is the source database",
            path.display()
        ))
        .context(Stage::Snapshot);
    }

    if !is_leftover_snapshot(path).context(Stage::Snapshot)? {
        return Err(anyhow::anyhow!(
            "refusing to replace {}: not a leftover snapshot",
            path.display()
        ))
        .context(Stage::Snapshot);
    }

    warn!("Removing stale snapshot {}", path.display());
    fs::remove_file(path)
        .with_context(|| format!("Failed to remove stale snapshot {}", path.display()))
        .context(Stage::Snapshot)
}

/// Empty files and SQLite files count as leftovers of an earlier run.
fn is_leftover_snapshot(path: &Path) -> io::Result<bool> {
    let mut header = Vec::with_capacity(SQLITE_HEADER.len());
    fs::File::open(path)?
        .take(SQLITE_HEADER.len() as u64)
        .read_to_end(&mut header)?;
    Ok(header.is_empty() || header == SQLITE_HEADER)
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    // Catches hard links as well as different spellings of one path.
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        if let (Ok(a), Ok(b)) = (fs::metadata(a), fs::metadata(b)) {
            return a.dev() == b.dev() && a.ino() == b.ino();
        }
    }

    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Copies `reader` into `writer` as padded standard base64.
///
/// Reads in 64KB chunks and never holds more than one chunk in memory.
/// The encoder is finished (final group padded with `=`/`==`) and `writer`
/// flushed before returning.
///
/// # Returns
///
/// The number of raw bytes consumed from `reader`
///
/// # Errors
///
/// Returns a [`Stage::Encode`] error if reading fails and a [`Stage::Write`]
/// error if writing, finishing or flushing fails. Bytes already written stay
/// written.
pub fn stream_base64<R: Read, W: Write>(mut reader: R, writer: W) -> Result<u64> {
    let mut encoder = EncoderWriter::new(writer, &STANDARD);
    let mut buffer = [0; 64 * 1024]; // 64KB buffer
    let mut total: u64 = 0;

    loop {
        let bytes_read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e).context(Stage::Encode),
        };
        encoder
            .write_all(&buffer[..bytes_read])
            .context(Stage::Write)?;
        total += bytes_read as u64;
    }

    let mut writer = encoder.finish().context(Stage::Write)?;
    writer.flush().context(Stage::Write)?;
    Ok(total)
}

/// Writes a base64 encoded, consistent snapshot of `source` to `out`.
///
/// `snapshot_path` is the scratch location the engine writes the compacted
/// copy to. It is removed before this function returns, whether it succeeds
/// or fails.
///
/// # Arguments
///
/// * `source` - Database to snapshot, opened read-only
/// * `snapshot_path` - Temporary location for the compacted copy
/// * `out` - Sink for the encoded stream
///
/// # Returns
///
/// The size in bytes of the snapshot that was encoded
///
/// # Errors
///
/// Returns an error tagged with the failing [`Stage`].
pub fn extract<P, Q, W>(source: P, snapshot_path: Q, out: W) -> Result<u64>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
    W: Write,
{
    let source = source.as_ref();
    let snapshot_path = snapshot_path.as_ref();

    let db = Database::open_read_only(source)?;
    db.ping()?;

    prepare_snapshot_path(source, snapshot_path)?;
    // Armed before the engine runs so a partial copy is removed too.
    let guard = SnapshotGuard::new(snapshot_path);
    db.vacuum_into(guard.path())?;

    encode_snapshot(&guard, out)
}

/// Opens the snapshot owned by `guard` and streams it into `out`.
///
/// # Errors
///
/// Returns a [`Stage::SnapshotOpen`] error if the file cannot be opened,
/// otherwise whatever [`stream_base64`] reports.
pub fn encode_snapshot<W: Write>(guard: &SnapshotGuard, out: W) -> Result<u64> {
    let snapshot = fs::File::open(guard.path()).context(Stage::SnapshotOpen)?;
    if let Ok(metadata) = snapshot.metadata() {
        info!(
            "Snapshot {} is {} ({} encoded bytes)",
            guard.path().display(),
            format_size(metadata.len()),
            encoded_len(metadata.len())
        );
    }

    let total = stream_base64(snapshot, out)?;
    debug!("encoded {} snapshot bytes", total);
    Ok(total)
}
