//! Crate-level error type.
//!
//! Only fatal conditions live here.  Recoverable channel faults (corrupt or
//! out-of-order frames, lost acks, timer expiry) are absorbed inside the
//! engines and show up in their stats instead.

use std::io;

use thiserror::Error;

use crate::fault::FaultError;
use crate::frame::FrameError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A fault probability outside `[0, 1)` was configured.
    #[error("invalid fault probability {0}")]
    InvalidProbability(f64),

    /// An engine was configured with unusable parameters.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The payload could not be framed.
    #[error("framing failed: {0}")]
    Frame(#[from] FrameError),

    /// Non-transient socket error; the session was aborted.
    #[error("transport failure: {0}")]
    TransportFailure(#[from] io::Error),

    /// The retransmission budget ran out without any window progress.
    #[error("no progress after {0} consecutive retransmission timeouts")]
    RetriesExhausted(u32),
}

impl From<FaultError> for Error {
    fn from(e: FaultError) -> Self {
        match e {
            FaultError::InvalidProbability(p) => Self::InvalidProbability(p),
        }
    }
}
