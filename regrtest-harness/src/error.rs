//! Error types surfaced by the harness.

use std::path::PathBuf;

/// Monolithic error type for a suite run.
///
/// Per-test outcomes (skips, failures, crashes) are never errors; see
/// [`crate::Signal`] and [`crate::RunOutcome`]. What reaches this type either
/// aborts the run before any test executes or stops it outright.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The requested options cannot be honored.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// The filesystem gateway reported a failure.
    #[error(transparent)]
    Filesystem(#[from] FilesystemError),

    /// Standard output could not be captured.
    #[error(transparent)]
    Capture(#[from] CaptureError),

    /// The operator asked for the run to stop.
    #[error("interrupted by operator")]
    Interrupted,

    /// An I/O error occurred while writing operator-facing output.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Fatal problems with the options or argument files given to a run.
#[derive(thiserror::Error, Debug)]
pub enum ConfigurationError {
    /// Two options were given that cannot be combined.
    #[error("{0}")]
    IncompatibleOptions(&'static str),

    /// An unknown resource was named in a `-u/--use` option.
    #[error("Invalid -u/--use option: {0}")]
    InvalidResource(String),

    /// An argument file contained a quoted argument with no closing quote.
    #[error("{}:{line}: expected closing quote for argument", path.display())]
    UnterminatedQuote {
        /// Path of the argument file.
        path: PathBuf,
        /// 1-based line number holding the unterminated quote.
        line: usize,
    },

    /// An argument file could not be read.
    #[error("failed to read argument file {}: {source}", path.display())]
    UnreadableArgumentFile {
        /// Path of the argument file.
        path: PathBuf,
        /// Underlying failure.
        #[source]
        source: FilesystemError,
    },
}

/// Failures reported by a [`crate::Filesystem`] implementation.
#[derive(thiserror::Error, Debug)]
pub enum FilesystemError {
    /// The path does not exist.
    #[error("no such file or directory: {}", .0.display())]
    NotFound(PathBuf),

    /// The operation failed for any other reason.
    #[error("failed to {operation} {}: {source}", path.display())]
    OperationFailed {
        /// Short description of the attempted operation.
        operation: &'static str,
        /// Path the operation was applied to.
        path: PathBuf,
        /// Underlying failure.
        #[source]
        source: std::io::Error,
    },
}

impl FilesystemError {
    pub(crate) fn from_io(operation: &'static str, path: PathBuf, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound(path)
        } else {
            Self::OperationFailed {
                operation,
                path,
                source,
            }
        }
    }
}

/// Failures acquiring the output capture.
#[derive(thiserror::Error, Debug)]
pub enum CaptureError {
    /// A capture is already in progress on the stream; captures do not nest.
    #[error("standard output is already being captured")]
    AlreadyActive,

    /// Output written before the capture could not be flushed to its destination.
    #[error("failed to flush standard output before capturing: {0}")]
    Flush(#[source] std::io::Error),
}

/// Failures parsing a memo file.
#[derive(thiserror::Error, Debug)]
pub enum MemoError {
    /// A line did not fit the memo grammar.
    #[error("memo line {line}: {message}")]
    Malformed {
        /// 1-based line number.
        line: usize,
        /// What was wrong with it.
        message: &'static str,
    },

    /// One of the three sections never appeared.
    #[error("memo is missing the `{0}` section")]
    MissingSection(&'static str),
}
