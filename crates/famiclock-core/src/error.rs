use thiserror::Error;

use crate::{cartridge, state::StateError};

/// Errors surfaced by [`crate::Nes`].
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Cartridge(#[from] cartridge::Error),
    #[error(transparent)]
    State(#[from] StateError),
    /// Output slice cannot hold a converted frame.
    #[error("frame needs {expected} bytes, buffer holds {actual}")]
    FrameBufferTooSmall { expected: usize, actual: usize },
}
