//! Wire-format definitions for frames and acknowledgments.
//!
//! Every datagram a sender puts on the wire is a [`Frame`]; every datagram a
//! receiver answers with is an [`Ack`] or the [`TERMINATE`] marker.  This
//! module is responsible for:
//! - Splitting a byte buffer into an ordered frame sequence (metadata frame
//!   first) and joining the data payloads back together.
//! - Serialising frames and acks into byte buffers ready for transmission.
//! - Parsing raw datagrams back into frames and acks, rejecting input that is
//!   too short to carry a header.
//! - Computing and verifying the per-frame digest.
//!
//! No I/O happens here.
//!
//! # Wire format
//!
//! All multi-byte integers are **big-endian**.
//!
//! ```text
//!  0               1               2               3
//!  0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                        Sequence Number                        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                                                               |
//! +                                                               +
//! |                  Checksum (128-bit digest)                    |
//! +                                                               +
//! |                                                               |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                        Payload ...                            |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! Total header size: [`HEADER_LEN`] = 20 bytes.  An ack uses the same
//! header with no payload ([`ACK_LEN`]).
//!
//! Frame 0 of every transfer is the metadata frame: its payload is
//! [`PREAMBLE`] followed by the total frame count (metadata frame included)
//! as a `u32`.

use sha2::{Digest, Sha256};
use thiserror::Error;

/// Byte length of the sequence-number field.
pub const SEQ_LEN: usize = 4;

/// Byte length of the checksum field (first 128 bits of SHA-256).
pub const CHECKSUM_LEN: usize = 16;

/// Byte length of the fixed-size header on the wire.
pub const HEADER_LEN: usize = SEQ_LEN + CHECKSUM_LEN;

/// Byte length of an encoded [`Ack`].
pub const ACK_LEN: usize = HEADER_LEN;

/// Largest payload a single frame may carry (IPv4 UDP maximum minus header).
pub const MAX_PAYLOAD_SIZE: usize = 65_507 - HEADER_LEN;

/// Sequence number reserved for the metadata frame.
pub const METADATA_SEQ: u32 = 0;

/// Leading bytes of a metadata payload.
pub const PREAMBLE: &[u8; 4] = b"GBN\x01";

/// Sent by a receiver once every frame has been delivered.
///
/// Shorter than [`HEADER_LEN`], so no frame or ack encoding can equal it.
pub const TERMINATE: &[u8] = b"\r\n";

const METADATA_LEN: usize = PREAMBLE.len() + 4;

/// 128-bit frame digest.
pub type Checksum = [u8; CHECKSUM_LEN];

/// Errors that can arise when building or parsing frames.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// Datagram shorter than the fixed header (or, for an ack, not exactly
    /// [`ACK_LEN`] bytes).
    #[error("malformed frame: {len} bytes, header needs {header}", header = HEADER_LEN)]
    Malformed { len: usize },
    /// Frame 0 payload is not a metadata record.
    #[error("metadata frame payload is not a valid frame count")]
    BadMetadata,
    /// Requested packet size cannot be carried by one datagram.
    #[error("packet size {0} outside 1..={max}", max = MAX_PAYLOAD_SIZE)]
    InvalidPacketSize(usize),
    /// Buffer needs more frames than the sequence space holds.
    #[error("payload needs more than u32::MAX frames")]
    TooManyFrames,
}

/// One unit on the wire: sequence number, digest, payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub seq: u32,
    pub checksum: Checksum,
    pub payload: Vec<u8>,
}

impl Frame {
    /// Build a frame whose checksum matches `payload`.
    pub fn new(seq: u32, payload: Vec<u8>) -> Self {
        Self {
            seq,
            checksum: checksum(&payload),
            payload,
        }
    }

    /// Build the metadata frame announcing `total_frames`.
    pub fn metadata_frame(total_frames: u32) -> Self {
        let mut payload = Vec::with_capacity(METADATA_LEN);
        payload.extend_from_slice(PREAMBLE);
        payload.extend_from_slice(&total_frames.to_be_bytes());
        Self::new(METADATA_SEQ, payload)
    }

    /// `true` for sequence number 0.
    pub fn is_metadata(&self) -> bool {
        self.seq == METADATA_SEQ
    }

    /// Parse the declared total frame count out of a metadata payload.
    ///
    /// A count of zero is rejected: the metadata frame itself counts.
    pub fn metadata(&self) -> Result<u32, FrameError> {
        if self.payload.len() != METADATA_LEN || !self.payload.starts_with(PREAMBLE) {
            return Err(FrameError::BadMetadata);
        }
        let total = read_u32(&self.payload[PREAMBLE.len()..]);
        if total == 0 {
            return Err(FrameError::BadMetadata);
        }
        Ok(total)
    }

    /// Serialise this frame into a newly allocated byte vector.
    ///
    /// The stored checksum is written as-is, so a tampered frame stays
    /// tampered on the wire.
    pub fn encode(&self) -> Vec<u8> {
        encode_parts(self.seq, &self.checksum, &self.payload)
    }
}

/// Serialise a frame from its parts without building a [`Frame`].
pub fn encode_parts(seq: u32, checksum: &Checksum, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_LEN + payload.len());
    buf.extend_from_slice(&seq.to_be_bytes());
    buf.extend_from_slice(checksum);
    buf.extend_from_slice(payload);
    buf
}

/// Split `payload` into a frame sequence, metadata frame first.
///
/// Returns [`Err`] if `packet_size` is zero or larger than
/// [`MAX_PAYLOAD_SIZE`], or if the sequence space would overflow.
pub fn encode(payload: &[u8], packet_size: usize) -> Result<Vec<Frame>, FrameError> {
    if packet_size == 0 || packet_size > MAX_PAYLOAD_SIZE {
        return Err(FrameError::InvalidPacketSize(packet_size));
    }

    let data_frames = payload.len().div_ceil(packet_size);
    let total = u32::try_from(data_frames + 1).map_err(|_| FrameError::TooManyFrames)?;

    let mut frames = Vec::with_capacity(data_frames + 1);
    frames.push(Frame::metadata_frame(total));
    for (seq, chunk) in (1..).zip(payload.chunks(packet_size)) {
        frames.push(Frame::new(seq, chunk.to_vec()));
    }
    Ok(frames)
}

/// Parse a [`Frame`] from a raw datagram.
///
/// The checksum is **not** verified here; see [`verify`].
pub fn decode(raw: &[u8]) -> Result<Frame, FrameError> {
    if raw.len() < HEADER_LEN {
        return Err(FrameError::Malformed { len: raw.len() });
    }
    let mut checksum = [0u8; CHECKSUM_LEN];
    checksum.copy_from_slice(&raw[SEQ_LEN..HEADER_LEN]);
    Ok(Frame {
        seq: read_u32(raw),
        checksum,
        payload: raw[HEADER_LEN..].to_vec(),
    })
}

/// `true` only when the stored checksum matches the payload exactly.
pub fn verify(frame: &Frame) -> bool {
    checksum(&frame.payload) == frame.checksum
}

/// Join the data payloads of an in-order frame sequence.
pub fn decode_stream(frames: &[Frame]) -> Vec<u8> {
    frames
        .iter()
        .filter(|f| !f.is_metadata())
        .flat_map(|f| f.payload.iter().copied())
        .collect()
}

/// First 16 bytes of the SHA-256 digest of `payload`.
pub fn checksum(payload: &[u8]) -> Checksum {
    truncate(&Sha256::digest(payload))
}

// ---------------------------------------------------------------------------
// Ack
// ---------------------------------------------------------------------------

/// Receiver → sender acknowledgment for one sequence number.
///
/// The checksum binds the sequence number to the acknowledged frame's digest,
/// so an ack only validates against the frame it was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    pub seq: u32,
    pub checksum: Checksum,
}

impl Ack {
    /// The ack a receiver issues after accepting `frame`.
    pub fn for_frame(frame: &Frame) -> Self {
        Self {
            seq: frame.seq,
            checksum: ack_checksum(frame.seq, &frame.checksum),
        }
    }

    /// `true` when this ack was issued for exactly `frame`.
    pub fn matches(&self, frame: &Frame) -> bool {
        self.seq == frame.seq && self.checksum == ack_checksum(frame.seq, &frame.checksum)
    }

    pub fn encode(&self) -> Vec<u8> {
        encode_parts(self.seq, &self.checksum, &[])
    }

    /// Parse an ack; anything other than exactly [`ACK_LEN`] bytes is
    /// malformed.
    pub fn decode(raw: &[u8]) -> Result<Self, FrameError> {
        if raw.len() != ACK_LEN {
            return Err(FrameError::Malformed { len: raw.len() });
        }
        let mut checksum = [0u8; CHECKSUM_LEN];
        checksum.copy_from_slice(&raw[SEQ_LEN..HEADER_LEN]);
        Ok(Self {
            seq: read_u32(raw),
            checksum,
        })
    }
}

fn ack_checksum(seq: u32, frame_checksum: &Checksum) -> Checksum {
    let mut hasher = Sha256::new();
    hasher.update(seq.to_be_bytes());
    hasher.update(frame_checksum);
    truncate(&hasher.finalize())
}

fn truncate(digest: &[u8]) -> Checksum {
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&digest[..CHECKSUM_LEN]);
    out
}

/// Caller guarantees `buf.len() >= 4`.
fn read_u32(buf: &[u8]) -> u32 {
    u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]])
}
