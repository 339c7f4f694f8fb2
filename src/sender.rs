//! Sender engine: drives one Go-Back-N transfer over a [`Socket`].
//!
//! # Event loop
//!
//! ```text
//!   fill window ──▶ select! ┬─ datagram ──▶ ack? ──▶ slide window, restart timer
//!        ▲                  │             TERMINATE ──▶ done
//!        │                  └─ timer ────▶ resend [window_base, next_seq)
//!        └──────────────────────────────────────┘
//! ```
//!
//! The timer and the ack wait are two futures raced in one biased
//! `tokio::select!`, socket first.  When the deadline passes, every reply
//! already queued on the socket is drained before anything is resent, so an
//! ack that races the timer still cancels the retransmission of the frames
//! it covers.  A late ack for a frame that has since been retransmitted is
//! validated against the current window like any other and dropped if stale.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::fault::{FaultConfig, FaultInjector};
use crate::frame::{self, Ack, Frame, MAX_PAYLOAD_SIZE, TERMINATE};
use crate::gbn_sender::{AckOutcome, GbnSender};
use crate::socket::{self, Socket};
use crate::timer::RetransmitTimer;

/// Tunables for one [`SenderEngine`].
#[derive(Debug, Clone)]
pub struct SenderConfig {
    /// Go-Back-N window size N (≥ 1).
    pub window_size: u32,
    /// Maximum payload bytes per data frame.
    pub packet_size: usize,
    /// Retransmission timeout for the oldest unacked frame.
    pub timeout: Duration,
    /// Consecutive timeouts without progress before the session aborts.
    pub max_retries: u32,
    /// Faults applied to frames before they leave.
    pub outbound: FaultConfig,
    /// Faults applied to acks as they arrive.
    pub inbound: FaultConfig,
    /// Seed for the fault injector; `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            window_size: 8,
            packet_size: 2048,
            timeout: Duration::from_millis(50),
            max_retries: 50,
            outbound: FaultConfig::NONE,
            inbound: FaultConfig::NONE,
            seed: None,
        }
    }
}

impl SenderConfig {
    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 {
            return Err(Error::InvalidConfig("window size must be at least 1".into()));
        }
        if self.packet_size == 0 || self.packet_size > MAX_PAYLOAD_SIZE {
            return Err(Error::InvalidConfig(format!(
                "packet size {} outside 1..={MAX_PAYLOAD_SIZE}",
                self.packet_size
            )));
        }
        if self.timeout.is_zero() {
            return Err(Error::InvalidConfig("timeout must be non-zero".into()));
        }
        if self.max_retries == 0 {
            return Err(Error::InvalidConfig("retry budget must be at least 1".into()));
        }
        self.outbound.validate()?;
        self.inbound.validate()?;
        Ok(())
    }
}

/// Counters for one completed transfer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferStats {
    /// Frames in the transfer, metadata frame included.
    pub frames: u32,
    /// Every transmission attempt, retransmissions included.
    pub transmissions: u64,
    /// Transmissions caused by a timer expiry.
    pub retransmissions: u64,
    /// Timer expiries.
    pub timeouts: u32,
    /// Acks for frames already below the window base.
    pub stale_acks: u64,
    /// Acks that failed validation or could not be decoded.
    pub invalid_acks: u64,
    /// Wall-clock time from first frame to completion.
    pub elapsed: Duration,
}

/// The sending end of a session.
#[derive(Debug)]
pub struct SenderEngine {
    socket: Socket,
    peer: SocketAddr,
    config: SenderConfig,
    faults: FaultInjector,
}

impl SenderEngine {
    /// Build an engine that delivers to `peer` through `socket`.
    ///
    /// Fails with [`Error::InvalidProbability`] or [`Error::InvalidConfig`]
    /// before any datagram is sent.
    pub fn new(socket: Socket, peer: SocketAddr, config: SenderConfig) -> Result<Self> {
        config.validate()?;
        if !(config.outbound.is_none() && config.inbound.is_none()) {
            log::info!(
                "[sender] fault injection on: outbound={:?} inbound={:?}",
                config.outbound,
                config.inbound
            );
        }
        let faults = FaultInjector::new(config.seed);
        Ok(Self {
            socket,
            peer,
            config,
            faults,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.socket.local_addr
    }

    /// Reliably deliver `payload` to the peer.
    ///
    /// Returns once every frame is acknowledged (or the receiver signals
    /// completion).  Transient channel faults are absorbed; only
    /// [`Error::TransportFailure`] and [`Error::RetriesExhausted`] abort.
    pub async fn send(&mut self, payload: &[u8]) -> Result<TransferStats> {
        let started = Instant::now();
        let frames = frame::encode(payload, self.config.packet_size)?;
        let mut window = GbnSender::new(frames, self.config.window_size);
        let mut timer = RetransmitTimer::new(self.config.timeout);
        let mut stats = TransferStats {
            frames: window.total(),
            ..TransferStats::default()
        };
        let mut retries = 0u32;

        log::info!(
            "[sender] {} bytes {} → {} in {} frame(s), window={}",
            payload.len(),
            self.local_addr(),
            self.peer,
            window.total(),
            self.config.window_size
        );

        while !window.is_done() {
            while let Some(frame) = window.next_to_send() {
                self.transmit(frame).await?;
                stats.transmissions += 1;
            }
            if window.has_unacked() {
                timer.arm_if_idle();
            }

            tokio::select! {
                biased;

                result = self.socket.recv_from() => {
                    let (bytes, addr) = match result {
                        Ok(v) => v,
                        Err(e) if socket::is_transient(&e) => {
                            log::debug!("[sender] transient recv error: {e}");
                            continue;
                        }
                        Err(e) => {
                            log::warn!("[sender] recv failed, aborting: {e}");
                            return Err(Error::TransportFailure(e));
                        }
                    };
                    if addr != self.peer {
                        continue;
                    }
                    if self.on_reply(&bytes, &mut window, &mut stats)? {
                        retries = 0;
                        restart_timer(&mut timer, &window);
                    }
                }

                _ = timer.expired(), if timer.is_armed() => {
                    // Replies that queued up behind the deadline still count.
                    if self.drain_replies(&mut window, &mut stats)? {
                        retries = 0;
                        restart_timer(&mut timer, &window);
                        continue;
                    }

                    stats.timeouts += 1;
                    retries += 1;
                    if retries >= self.config.max_retries {
                        log::warn!(
                            "[sender] {retries} timeouts without progress at base={} ({}); aborting",
                            window.window_base(),
                            window.state()
                        );
                        return Err(Error::RetriesExhausted(retries));
                    }

                    // Go-Back-N: resend everything from window_base to the last frame sent.
                    let outstanding = window.outstanding();
                    log::debug!(
                        "[sender] timeout after {:?}, retransmitting {} frame(s) from seq={}",
                        timer.timeout(),
                        outstanding.len(),
                        window.window_base()
                    );
                    for frame in outstanding {
                        self.transmit(frame).await?;
                        stats.transmissions += 1;
                        stats.retransmissions += 1;
                    }
                    timer.arm();
                }
            }
        }

        stats.elapsed = started.elapsed();
        log::info!(
            "[sender] done: {} frame(s), {} transmission(s), {} timeout(s) in {:?}",
            stats.frames,
            stats.transmissions,
            stats.timeouts,
            stats.elapsed
        );
        Ok(stats)
    }

    /// Handle every reply already queued on the socket without waiting.
    ///
    /// Returns `Ok(true)` when any of them advanced the window.
    fn drain_replies(
        &mut self,
        window: &mut GbnSender,
        stats: &mut TransferStats,
    ) -> Result<bool> {
        let mut progressed = false;
        while !window.is_done() {
            let (bytes, addr) = match self.socket.try_recv_from() {
                Ok(Some(v)) => v,
                Ok(None) => break,
                Err(e) if socket::is_transient(&e) => {
                    log::debug!("[sender] transient recv error: {e}");
                    break;
                }
                Err(e) => {
                    log::warn!("[sender] recv failed, aborting: {e}");
                    return Err(Error::TransportFailure(e));
                }
            };
            if addr == self.peer && self.on_reply(&bytes, window, stats)? {
                progressed = true;
            }
        }
        Ok(progressed)
    }

    /// Put one frame on the wire through the outbound fault injector.
    ///
    /// A transient socket error counts as a lost frame; the timer recovers it.
    async fn transmit(&mut self, frame: &Frame) -> Result<()> {
        let outbound = self.config.outbound;
        let Some((seq, checksum)) = self.faults.tamper(&outbound, frame.seq, frame.checksum)? else {
            log::debug!("[sender] → DATA seq={} dropped by injector", frame.seq);
            return Ok(());
        };
        let bytes = frame::encode_parts(seq, &checksum, &frame.payload);
        match self.socket.send_to(&bytes, self.peer).await {
            Ok(()) => {
                log::debug!("[sender] → DATA seq={} len={}", frame.seq, frame.payload.len());
                Ok(())
            }
            Err(e) if socket::is_transient(&e) => {
                log::debug!("[sender] transient send error on seq={}: {e}", frame.seq);
                Ok(())
            }
            Err(e) => {
                log::warn!("[sender] send to {} failed, aborting: {e}", self.peer);
                Err(Error::TransportFailure(e))
            }
        }
    }

    /// Handle one datagram from the peer.
    ///
    /// Returns `Ok(true)` when the window advanced.
    fn on_reply(
        &mut self,
        bytes: &[u8],
        window: &mut GbnSender,
        stats: &mut TransferStats,
    ) -> Result<bool> {
        if self.faults.maybe_drop(self.config.inbound.drop)? {
            log::debug!("[sender] ← reply dropped by injector");
            return Ok(false);
        }
        if bytes == TERMINATE {
            log::debug!("[sender] ← TERMINATE at base={}", window.window_base());
            window.on_terminate();
            return Ok(true);
        }

        let ack = match Ack::decode(bytes) {
            Ok(ack) => ack,
            Err(e) => {
                log::debug!("[sender] ← undecodable reply: {e}");
                stats.invalid_acks += 1;
                return Ok(false);
            }
        };
        let seq = self.faults.maybe_corrupt_sequence(ack.seq, self.config.inbound.sequence)?;
        let checksum = self
            .faults
            .maybe_corrupt_checksum(ack.checksum, self.config.inbound.checksum)?;
        let ack = Ack { seq, checksum };

        match window.on_ack(&ack) {
            AckOutcome::Advanced { acked } => {
                log::debug!(
                    "[sender] ← ACK seq={} slid={acked} base={}",
                    ack.seq,
                    window.window_base()
                );
                Ok(true)
            }
            AckOutcome::Stale => {
                log::debug!("[sender] ← stale ACK seq={} base={}", ack.seq, window.window_base());
                stats.stale_acks += 1;
                Ok(false)
            }
            AckOutcome::Invalid => {
                log::debug!("[sender] ← invalid ACK seq={}", ack.seq);
                stats.invalid_acks += 1;
                Ok(false)
            }
        }
    }
}

/// After window progress the timer covers the new `window_base`, if any.
fn restart_timer(timer: &mut RetransmitTimer, window: &GbnSender) {
    if window.has_unacked() {
        timer.arm();
    } else {
        timer.cancel();
    }
}

/// Bind an ephemeral socket and reliably deliver `payload` to `dest`.
pub async fn send_bytes(
    dest: SocketAddr,
    payload: &[u8],
    config: SenderConfig,
) -> Result<TransferStats> {
    let bind: SocketAddr = if dest.is_ipv4() {
        SocketAddr::from(([0, 0, 0, 0], 0))
    } else {
        SocketAddr::from(([0u16; 8], 0))
    };
    let socket = Socket::bind(bind).await?;
    SenderEngine::new(socket, dest, config)?.send(payload).await
}
