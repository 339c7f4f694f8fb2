//! Session finite-state-machine types.
//!
//! Transitions are driven by [`crate::gbn_sender`] and
//! [`crate::gbn_receiver`]; this module only names the states so both the
//! state machines and their logs agree on them.

/// Lifecycle of the sending side of a session.
///
/// ```text
//  IDLE ──first frame sent──▶ AWAITING_ACK ──window_base == total──▶ DONE
//                               │      ▲
//                               └──────┘  ack / timeout
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SenderState {
    /// Frames built, nothing transmitted yet.
    #[default]
    Idle,
    /// At least one frame is in flight.
    AwaitingAck,
    /// Every frame has been acknowledged.
    Done,
}

/// Lifecycle of the receiving side of a session.
///
/// ```text
//  AWAIT_INIT ──metadata frame──▶ RECEIVING ──expected_seq == total──▶ COMPLETE
//                                   │     ▲
//                                   └─────┘  out-of-order / corrupt
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReceiverState {
    /// Waiting for the metadata frame that declares the frame count.
    #[default]
    AwaitInit,
    /// Accepting data frames in order.
    Receiving,
    /// Declared frame count reached.
    Complete,
}

impl std::fmt::Display for SenderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "IDLE",
            Self::AwaitingAck => "AWAITING_ACK",
            Self::Done => "DONE",
        };
        f.write_str(name)
    }
}

impl std::fmt::Display for ReceiverState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::AwaitInit => "AWAIT_INIT",
            Self::Receiving => "RECEIVING",
            Self::Complete => "COMPLETE",
        };
        f.write_str(name)
    }
}
