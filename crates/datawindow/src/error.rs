//! Error types for datawindow

use std::fmt;

/// Opaque error raised by the fetch collaborator
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors surfaced through the error-handling collaborator
///
/// Fetch failures never reach `read`/`read_blocking` callers; those only
/// ever observe a present or absent value. Failures are reported through
/// the window's error handler and the affected page stays unfilled.
#[derive(Debug)]
pub enum Error {
    /// The fetch collaborator failed; forwarded verbatim
    Fetch(BoxError),

    /// The fetch collaborator returned a result whose length does not
    /// match the requested key batch; nothing was committed
    ShapeMismatch {
        /// Number of keys requested
        requested: usize,
        /// Number of values returned
        returned: usize,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Fetch(e) => write!(f, "Fetch failed: {}", e),
            Error::ShapeMismatch {
                requested,
                returned,
            } => write!(
                f,
                "Fetch result shape mismatch: requested {} keys, got {} values",
                requested, returned
            ),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Fetch(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<BoxError> for Error {
    fn from(err: BoxError) -> Self {
        Error::Fetch(err)
    }
}
