//! Error types for ArrayVault operations
//!
//! All ArrayVault errors are represented by the `ArrayFileError` enum, which
//! carries enough context (file path, offending values) to diagnose a field
//! incident without re-deriving it from a log line.

use std::error::Error;
use std::fmt;
use std::path::PathBuf;

/// ArrayVault error types with detailed context.
#[derive(Debug, Clone)]
pub enum ArrayFileError {
    /// Underlying file or mapping operation failed.
    Io {
        /// The file path where the error occurred, if known.
        path: Option<PathBuf>,
        /// The underlying I/O error kind.
        kind: std::io::ErrorKind,
        /// Human-readable description.
        message: String,
    },

    /// Header failed validation on load: version mismatch or `hwm < lwm`.
    CorruptHeader {
        /// Path to the file whose header failed validation.
        path: PathBuf,
        /// Description of what failed.
        reason: String,
    },

    /// Caller supplied `lwm > hwm` to `set_water_marks`.
    InvalidWaterMarks {
        /// Requested low water mark.
        lwm: u64,
        /// Requested high water mark.
        hwm: u64,
    },

    /// Caller requested a negative array length.
    InvalidLength {
        /// The rejected length.
        requested: i64,
    },

    /// `reset_all` was invoked on an ArrayFile whose element size isn't 8 bytes.
    ElementSizeMismatch {
        /// The element size the file actually has.
        actual: i32,
        /// The element size the operation required.
        required: i32,
    },

    /// A requested element size (new file, config) isn't in `{2, 4, 8}`.
    InvalidElementSize {
        /// The rejected element size.
        requested: i32,
    },

    /// Operation attempted on a handle that has already been closed.
    ClosedHandle {
        /// Path of the closed handle.
        path: PathBuf,
    },
}

impl fmt::Display for ArrayFileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArrayFileError::Io { path, kind, message } => {
                if let Some(path) = path {
                    write!(f, "I/O error in {}: {} ({})", path.display(), message, kind)
                } else {
                    write!(f, "I/O error: {} ({})", message, kind)
                }
            }

            ArrayFileError::CorruptHeader { path, reason } => {
                write!(f, "corrupt header in {}: {}", path.display(), reason)
            }

            ArrayFileError::InvalidWaterMarks { lwm, hwm } => {
                write!(f, "invalid water marks: lwm={} > hwm={}", lwm, hwm)
            }

            ArrayFileError::InvalidLength { requested } => {
                write!(f, "invalid array length: {} (must be >= 0)", requested)
            }

            ArrayFileError::ElementSizeMismatch { actual, required } => {
                write!(
                    f,
                    "element size mismatch: operation requires {} bytes per element, file has {}",
                    required, actual
                )
            }

            ArrayFileError::InvalidElementSize { requested } => {
                write!(f, "invalid element size: {} (must be one of {{2, 4, 8}})", requested)
            }

            ArrayFileError::ClosedHandle { path } => {
                write!(f, "operation attempted on closed handle for {}", path.display())
            }
        }
    }
}

impl Error for ArrayFileError {}

impl From<std::io::Error> for ArrayFileError {
    fn from(err: std::io::Error) -> Self {
        ArrayFileError::Io {
            path: None,
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Result type alias for ArrayVault operations.
pub type ArrayFileResult<T> = Result<T, ArrayFileError>;

/// Attach a path to an I/O error produced by a raw `std::io::Error`.
pub(crate) fn io_err(path: &std::path::Path, err: std::io::Error, context: &str) -> ArrayFileError {
    ArrayFileError::Io {
        path: Some(path.to_path_buf()),
        kind: err.kind(),
        message: format!("{}: {}", context, err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ArrayFileError::InvalidWaterMarks { lwm: 10, hwm: 5 };
        let display = format!("{}", err);
        assert!(display.contains("invalid water marks"));
        assert!(display.contains("10"));
        assert!(display.contains("5"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let mapped: ArrayFileError = io_err.into();
        match mapped {
            ArrayFileError::Io { kind, .. } => assert_eq!(kind, std::io::ErrorKind::NotFound),
            _ => panic!("expected Io error"),
        }
    }

    #[test]
    fn test_element_size_mismatch_display() {
        let err = ArrayFileError::ElementSizeMismatch { actual: 4, required: 8 };
        let display = format!("{}", err);
        assert!(display.contains('4'));
        assert!(display.contains('8'));
    }

    #[test]
    fn test_invalid_element_size_display() {
        let err = ArrayFileError::InvalidElementSize { requested: 3 };
        let display = format!("{}", err);
        assert!(display.contains('3'));
        assert!(display.contains("must be one of"));
    }
}
