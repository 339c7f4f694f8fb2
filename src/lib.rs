//! `gbn-transfer`: reliable, in-order delivery of a byte buffer over UDP
//! using Go-Back-N ARQ.
//!
//! # Architecture
//!
//! ```text
//!  ┌────────────────┐    frames    ┌──────────────────┐
//!  │  SenderEngine  │─────────────▶│  ReceiverEngine  │
//!  │  (GbnSender +  │              │  (GbnReceiver)   │
//!  │   timer)       │◀─────────────│                  │
//!  └───────┬────────┘  ACKs / END  └────────┬─────────┘
//!          │                                │
//!  ┌───────▼────────────────────────────────▼─────────┐
//!  │     FaultInjector (optional, per direction)      │
//!  └───────┬────────────────────────────────┬─────────┘
//!          │ raw UDP datagrams              │
//!  ┌───────▼──────┐                  ┌──────▼───────┐
//!  │    Socket    │                  │    Socket    │
//!  └──────────────┘                  └──────────────┘
//! ```
//!
//! Each module has a single responsibility:
//! - [`frame`]: wire format, framing and reassembly, digests
//! - [`fault`]: seedable checksum/sequence corruption and loss
//! - [`gbn_sender`]: GBN outbound window state machine
//! - [`gbn_receiver`]: GBN inbound in-order acknowledgment state machine
//! - [`sender`]: async sender engine (window + timer event loop)
//! - [`receiver`]: async receiver engine (validate, ack, reassemble)
//! - [`timer`]: retransmission deadline for the window base
//! - [`state`]: finite-state-machine types
//! - [`socket`]: async UDP socket abstraction
//! - [`error`]: crate error type
//! - [`app`]: file I/O collaborators used by the binary
//!
//! # Example
//!
//! ```ignore
//! let delivery = tokio::spawn(receiver::receive_bytes(bind, ReceiverConfig::default()));
//! sender::send_bytes(dest, &payload, SenderConfig::default()).await?;
//! assert_eq!(delivery.await??.payload, payload);
//! ```

pub mod app;
pub mod error;
pub mod fault;
pub mod frame;
pub mod gbn_receiver;
pub mod gbn_sender;
pub mod receiver;
pub mod sender;
pub mod socket;
pub mod state;
pub mod timer;

pub use error::{Error, Result};
pub use receiver::{Delivery, ReceiverConfig, ReceiverEngine};
pub use sender::{SenderConfig, SenderEngine, TransferStats};
