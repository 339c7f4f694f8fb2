//! Go-Back-N receive-side state machine.
//!
//! [`GbnReceiver`] implements the receiver side of Go-Back-N:
//!
//! - Only the frame with `seq == expected_seq` can be accepted.
//! - Out-of-order and duplicate frames are discarded **without** checksum
//!   validation; the caller re-sends the last ack actually sent, so a
//!   confused sender resynchronises against the receiver's true position.
//! - An in-order frame with a bad checksum is rejected the same way.
//! - An accepted frame produces a fresh ack, which becomes the new "last ack".
//!
//! Frame 0 is the metadata frame: it carries the declared frame count and
//! moves the machine from `AWAIT_INIT` to `RECEIVING`.
//!
//! This module only manages state; all socket I/O is the caller's
//! responsibility.

use crate::frame::{self, Ack, Frame};
use crate::state::ReceiverState;

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

/// Why a datagram was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Too short to carry a header, or a bad metadata record.
    Malformed,
    /// Sequence number is not `expected_seq`.
    SequenceMismatch,
    /// In-order frame whose checksum does not match its payload.
    ChecksumMismatch,
}

/// Result of feeding one datagram to the receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Frame accepted; send this new ack.
    Accepted(Ack),
    /// Frame rejected; re-send `resend` (the last ack sent) if there is one.
    Rejected {
        reason: Rejection,
        resend: Option<Ack>,
    },
}

impl Verdict {
    /// The ack the caller should put on the wire, if any.
    pub fn ack(&self) -> Option<&Ack> {
        match self {
            Self::Accepted(ack) => Some(ack),
            Self::Rejected { resend, .. } => resend.as_ref(),
        }
    }
}

// ---------------------------------------------------------------------------
// GbnReceiver
// ---------------------------------------------------------------------------

/// Go-Back-N receive-side state for one transfer.
#[derive(Debug, Default)]
pub struct GbnReceiver {
    state: ReceiverState,

    /// Sequence number of the only frame that can be accepted next.
    expected_seq: u32,

    /// Frame count declared by the metadata frame.
    total: Option<u32>,

    /// Most recent ack issued for an accepted frame.
    last_ack: Option<Ack>,

    /// In-order payload bytes reassembled so far.
    buffer: Vec<u8>,
}

impl GbnReceiver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ReceiverState {
        self.state
    }

    pub fn expected_seq(&self) -> u32 {
        self.expected_seq
    }

    /// Frame count declared by the sender, once the metadata frame arrived.
    pub fn total(&self) -> Option<u32> {
        self.total
    }

    pub fn last_ack(&self) -> Option<&Ack> {
        self.last_ack.as_ref()
    }

    /// Payload bytes reassembled so far.
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    pub fn is_complete(&self) -> bool {
        self.state == ReceiverState::Complete
    }

    /// Hand over the reassembled payload, but only once complete.
    ///
    /// An incomplete transfer yields `None`; a partial buffer never leaks.
    pub fn take_payload(&mut self) -> Option<Vec<u8>> {
        if self.is_complete() {
            Some(std::mem::take(&mut self.buffer))
        } else {
            None
        }
    }

    /// Decode and process one raw datagram.
    pub fn on_datagram(&mut self, raw: &[u8]) -> Verdict {
        match frame::decode(raw) {
            Ok(frame) => self.on_frame(&frame),
            Err(_) => self.reject(Rejection::Malformed),
        }
    }

    /// Process one decoded frame.
    pub fn on_frame(&mut self, frame: &Frame) -> Verdict {
        if self.is_complete() || frame.seq != self.expected_seq {
            return self.reject(Rejection::SequenceMismatch);
        }
        if !frame::verify(frame) {
            return self.reject(Rejection::ChecksumMismatch);
        }

        if self.state == ReceiverState::AwaitInit {
            match frame.metadata() {
                Ok(total) => {
                    self.total = Some(total);
                    self.state = ReceiverState::Receiving;
                }
                Err(_) => return self.reject(Rejection::Malformed),
            }
        } else {
            self.buffer.extend_from_slice(&frame.payload);
        }

        let ack = Ack::for_frame(frame);
        self.last_ack = Some(ack);
        self.expected_seq += 1;
        if Some(self.expected_seq) == self.total {
            self.state = ReceiverState::Complete;
        }
        Verdict::Accepted(ack)
    }

    fn reject(&self, reason: Rejection) -> Verdict {
        Verdict::Rejected {
            reason,
            resend: self.last_ack,
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
