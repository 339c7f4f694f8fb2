//! Go-Back-N send-side state machine.
//!
//! [`GbnSender`] owns the full frame sequence of one transfer and a sliding
//! window of up to `window_size` in-flight frames over it.
//!
//! # Protocol contract
//!
//! - At most `window_size` frames may be in flight at once:
//!   `next_seq - window_base <= window_size`.
//! - ACKs are **cumulative**: a valid ack for `seq` retires every frame up to
//!   and including `seq`, so `window_base` becomes `seq + 1`.
//! - An ack is valid only when its checksum was issued for the frame with
//!   that sequence number and the frame has actually been sent.
//! - Stale acks (`seq < window_base`) are ignored; this absorbs duplicates
//!   and reordering without an ack counter.
//! - On timeout, the caller retransmits **all** frames from `window_base`
//!   through the last one sent (go back to N).
//!
//! Sequence numbers run from 0 (the metadata frame) to `total - 1` and never
//! wrap within a transfer.
//!
//! This module only manages state; all socket I/O is the caller's responsibility.

use crate::frame::{Ack, Frame};
use crate::state::SenderState;

// ---------------------------------------------------------------------------
// AckOutcome
// ---------------------------------------------------------------------------

/// What an inbound ack did to the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// The window slid forward by `acked` frames.
    Advanced { acked: u32 },
    /// The ack is for a frame below `window_base`.
    Stale,
    /// Unknown sequence number, unsent frame, or checksum mismatch.
    Invalid,
}

// ---------------------------------------------------------------------------
// GbnSender
// ---------------------------------------------------------------------------

/// Go-Back-N send-side state for one transfer.
///
/// # Sequence-number layout
///
/// ```text
///  window_base        next_seq       window_base + N
///      │                  │                │
///  ────┼──────────────────┼────────────────┼──────▶ seq space
///      │ <── in flight ──▶│ <── sendable ─▶│
/// ```
#[derive(Debug)]
pub struct GbnSender {
    /// Every frame of the transfer, indexed by sequence number.
    frames: Vec<Frame>,

    /// Sequence number of the **oldest** unacked frame (left window edge).
    window_base: u32,

    /// Sequence number of the **next** frame never sent before.
    next_seq: u32,

    /// Maximum number of frames that may be in flight simultaneously (N).
    window_size: u32,

    state: SenderState,
}

impl GbnSender {
    /// Create a new [`GbnSender`] over `frames`.
    ///
    /// `frames[i].seq` must equal `i`, as produced by [`crate::frame::encode`].
    /// `window_size` is the GBN window size N (≥ 1).
    pub fn new(frames: Vec<Frame>, window_size: u32) -> Self {
        assert!(window_size >= 1, "window_size must be at least 1");
        debug_assert!(frames.iter().zip(0u32..).all(|(f, i)| f.seq == i));
        Self {
            frames,
            window_base: 0,
            next_seq: 0,
            window_size,
            state: SenderState::Idle,
        }
    }

    pub fn window_base(&self) -> u32 {
        self.window_base
    }

    pub fn next_seq(&self) -> u32 {
        self.next_seq
    }

    pub fn state(&self) -> SenderState {
        self.state
    }

    /// Total number of frames in the transfer, metadata frame included.
    pub fn total(&self) -> u32 {
        self.frames.len() as u32
    }

    /// Number of frames sent but not yet acknowledged.
    pub fn in_flight(&self) -> u32 {
        self.next_seq - self.window_base
    }

    /// `true` when at least one frame is awaiting acknowledgement.
    pub fn has_unacked(&self) -> bool {
        self.in_flight() > 0
    }

    /// `true` once every frame has been acknowledged.
    pub fn is_done(&self) -> bool {
        self.state == SenderState::Done
    }

    /// `true` when there is an unsent frame and room for it in the window.
    pub fn can_send(&self) -> bool {
        self.next_seq < self.total() && self.in_flight() < self.window_size
    }

    /// Take the next never-sent frame if the window has room for it.
    ///
    /// Advances `next_seq`; the caller must put the returned frame on the wire.
    pub fn next_to_send(&mut self) -> Option<&Frame> {
        if !self.can_send() {
            return None;
        }
        let idx = self.next_seq as usize;
        self.next_seq += 1;
        self.state = SenderState::AwaitingAck;
        self.frames.get(idx)
    }

    /// Process an inbound ack.
    pub fn on_ack(&mut self, ack: &Ack) -> AckOutcome {
        if ack.seq < self.window_base {
            return AckOutcome::Stale;
        }
        if ack.seq >= self.next_seq {
            // Never sent (or corrupted beyond the sequence space).
            return AckOutcome::Invalid;
        }
        let Some(frame) = self.frames.get(ack.seq as usize) else {
            return AckOutcome::Invalid;
        };
        if !ack.matches(frame) {
            return AckOutcome::Invalid;
        }

        let acked = ack.seq + 1 - self.window_base;
        self.window_base = ack.seq + 1;
        if self.window_base == self.total() {
            self.state = SenderState::Done;
        }
        AckOutcome::Advanced { acked }
    }

    /// The receiver reported completion; every frame counts as delivered.
    pub fn on_terminate(&mut self) {
        self.window_base = self.total();
        self.next_seq = self.total();
        self.state = SenderState::Done;
    }

    /// All in-flight frames from `window_base` to the last one sent.
    ///
    /// Used by the driver to retransmit the whole window on timeout (the
    /// "go back N" step).
    pub fn outstanding(&self) -> &[Frame] {
        &self.frames[self.window_base as usize..self.next_seq as usize]
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
