/*!
Stage descriptions attached to extraction errors.

Each fallible step of the extractor wraps its underlying cause with one of
these values as `anyhow` context, so the rendered chain reads
`<stage description>: <cause>` and the failing stage can be recovered with
`anyhow::Error::downcast_ref::<Stage>()`.
*/

use std::fmt;

/// The step of the extraction that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// The source database could not be opened read-only.
    Open,
    /// The liveness probe against the opened handle failed.
    Connect,
    /// The engine could not write the compacted copy.
    Snapshot,
    /// The freshly written snapshot could not be reopened for reading.
    SnapshotOpen,
    /// Reading the snapshot failed mid-stream.
    Encode,
    /// Writing or flushing the encoded stream failed.
    Write,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Open => "Failed to open VAI database",
            Stage::Connect => "Cannot connect to VAI database",
            Stage::Snapshot => "Failed to create VACUUM snapshot",
            Stage::SnapshotOpen => "Failed to open snapshot file",
            Stage::Encode => "Failed to encode snapshot",
            Stage::Write => "Failed to write encoded snapshot",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_stage_renders_ahead_of_cause() {
        let err = std::fs::File::open("/nonexistent/vai-snapshot-test")
            .context(Stage::SnapshotOpen)
            .unwrap_err();
        let rendered = format!("{:#}", err);
        assert!(rendered.starts_with("Failed to open snapshot file: "));
    }

    #[test]
    fn test_stage_recoverable_from_chain() {
        let err = Err::<(), _>(std::io::Error::other("boom"))
            .context(Stage::Write)
            .unwrap_err();
        assert_eq!(err.downcast_ref::<Stage>(), Some(&Stage::Write));
    }
}
