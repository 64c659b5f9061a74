mod handle;
mod runner;

pub use handle::ViewerHandle;
pub use runner::{LogViewer, ViewerDeps};

use crate::backfill::BackfillError;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("viewer has stopped")]
    Stopped,

    #[error("invalid base URL {url}: {reason}")]
    BaseUrl { url: String, reason: String },

    #[error(transparent)]
    Backfill(#[from] BackfillError),
}

pub type Result<T> = std::result::Result<T, ViewerError>;

/// Lifecycle of one mounted viewer.
///
/// `Errored` is left only after every buffered and visible entry was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerState {
    Disconnected,
    Connecting,
    Open,
    Errored,
    Closed,
}

impl fmt::Display for ViewerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ViewerState::Disconnected => "disconnected",
            ViewerState::Connecting => "connecting",
            ViewerState::Open => "open",
            ViewerState::Errored => "errored",
            ViewerState::Closed => "closed",
        };
        f.write_str(name)
    }
}
