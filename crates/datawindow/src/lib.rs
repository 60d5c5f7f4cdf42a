//! # datawindow
//!
//! Bounded-memory paged window over a large, linearly-indexed sequence.
//!
//! The consumer holds the full ordered key sequence; values materialize
//! page by page through an injected batch fetcher running on a dedicated
//! worker thread. At most one fetch is in flight at a time; pages far
//! from the last fetch are purged by the underlying [`windowcache`].
//!
//! ## Access contract
//! - [`DataWindow::read`] never blocks: a miss schedules a prefetch and
//!   returns `None`
//! - [`DataWindow::read_blocking`] waits only when the missed index falls
//!   in the page currently being fetched
//! - Fetch failures go to the error handler; readers only ever see
//!   present or absent

#![warn(missing_docs)]

mod error;
mod window;

pub use error::{BoxError, Error};
pub use window::{DataWindow, ErrorHandler, Fetcher, ReadyHandler, DEFAULT_WINDOW_SIZE};
