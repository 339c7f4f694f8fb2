//! Receiver engine: accepts one Go-Back-N transfer from a [`Socket`].
//!
//! The engine feeds every datagram through the inbound fault injector and
//! then the [`GbnReceiver`] state machine, and answers with whatever ack the
//! machine hands back.  The session binds to the address that sent the
//! metadata frame; datagrams from anyone else are ignored afterwards.
//!
//! Once the declared frame count is reached the engine sends
//! [`TERMINATE`] and lingers: every further datagram from the peer within
//! `linger` is answered with another `TERMINATE`, so a lost final ack cannot
//! leave the sender retransmitting into the void.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::{Error, Result};
use crate::fault::{FaultConfig, FaultInjector};
use crate::frame::{self, Ack, TERMINATE};
use crate::gbn_receiver::{GbnReceiver, Rejection, Verdict};
use crate::socket::{self, Socket};

/// Tunables for one [`ReceiverEngine`].
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    /// How long to keep answering the peer after completion.
    pub linger: Duration,
    /// Faults applied to frames as they arrive.
    pub inbound: FaultConfig,
    /// Faults applied to acks before they leave.
    pub outbound: FaultConfig,
    /// Seed for the fault injector; `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            linger: Duration::from_millis(250),
            inbound: FaultConfig::NONE,
            outbound: FaultConfig::NONE,
            seed: None,
        }
    }
}

impl ReceiverConfig {
    pub fn validate(&self) -> Result<()> {
        self.inbound.validate()?;
        self.outbound.validate()?;
        Ok(())
    }
}

/// Counters for one received transfer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceiverStats {
    /// Frames accepted in order, metadata frame included.
    pub accepted: u64,
    /// Frames rejected for carrying the wrong sequence number.
    pub out_of_order: u64,
    /// In-order frames rejected for a bad checksum.
    pub checksum_failures: u64,
    /// Datagrams too short to decode, or with a bad metadata record.
    pub malformed: u64,
    /// Datagrams discarded by the inbound fault injector.
    pub dropped: u64,
    /// Acks handed to the socket (new and re-sent).
    pub acks_sent: u64,
}

/// A completed transfer.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// The reassembled payload, byte-for-byte what the sender framed.
    pub payload: Vec<u8>,
    /// Address the transfer came from.
    pub peer: SocketAddr,
    pub stats: ReceiverStats,
}

/// The receiving end of a session.
#[derive(Debug)]
pub struct ReceiverEngine {
    socket: Socket,
    config: ReceiverConfig,
    faults: FaultInjector,
}

impl ReceiverEngine {
    pub fn new(socket: Socket, config: ReceiverConfig) -> Result<Self> {
        config.validate()?;
        if !(config.outbound.is_none() && config.inbound.is_none()) {
            log::info!(
                "[receiver] fault injection on: inbound={:?} outbound={:?}",
                config.inbound,
                config.outbound
            );
        }
        let faults = FaultInjector::new(config.seed);
        Ok(Self {
            socket,
            config,
            faults,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.socket.local_addr
    }

    /// Wait for one complete transfer and return it.
    pub async fn receive(&mut self) -> Result<Delivery> {
        let mut machine = GbnReceiver::new();
        let mut stats = ReceiverStats::default();
        let mut bound: Option<SocketAddr> = None;

        log::info!("[receiver] listening on {}", self.local_addr());

        let (payload, peer) = loop {
            let (bytes, addr) = match self.socket.recv_from().await {
                Ok(v) => v,
                Err(e) if socket::is_transient(&e) => {
                    log::debug!("[receiver] transient recv error: {e}");
                    continue;
                }
                Err(e) => {
                    log::warn!("[receiver] recv failed, aborting: {e}");
                    return Err(Error::TransportFailure(e));
                }
            };
            if bound.is_some_and(|peer| peer != addr) {
                log::debug!("[receiver] ignoring datagram from {addr}");
                continue;
            }
            if self.faults.maybe_drop(self.config.inbound.drop)? {
                stats.dropped += 1;
                continue;
            }

            let verdict = match frame::decode(&bytes) {
                Ok(mut frame) => {
                    frame.seq = self
                        .faults
                        .maybe_corrupt_sequence(frame.seq, self.config.inbound.sequence)?;
                    frame.checksum = self
                        .faults
                        .maybe_corrupt_checksum(frame.checksum, self.config.inbound.checksum)?;
                    machine.on_frame(&frame)
                }
                Err(_) => machine.on_datagram(&bytes),
            };

            match &verdict {
                Verdict::Accepted(ack) => {
                    stats.accepted += 1;
                    if bound.is_none() {
                        log::info!(
                            "[receiver] session from {addr}: {} frame(s)",
                            machine.total().unwrap_or_default()
                        );
                        bound = Some(addr);
                    }
                    log::debug!("[receiver] ← DATA seq={} accepted", ack.seq);
                }
                Verdict::Rejected { reason, .. } => {
                    match reason {
                        Rejection::Malformed => stats.malformed += 1,
                        Rejection::SequenceMismatch => stats.out_of_order += 1,
                        Rejection::ChecksumMismatch => stats.checksum_failures += 1,
                    }
                    log::debug!(
                        "[receiver] ← rejected ({reason:?}) in {}, expecting seq={}",
                        machine.state(),
                        machine.expected_seq()
                    );
                }
            }

            if let Some(ack) = verdict.ack() {
                if self.send_ack(ack, addr).await? {
                    stats.acks_sent += 1;
                }
            }

            if let Some(payload) = machine.take_payload() {
                break (payload, addr);
            }
        };

        log::info!(
            "[receiver] complete: {} bytes from {peer} ({} rejected)",
            payload.len(),
            stats.out_of_order + stats.checksum_failures + stats.malformed
        );
        self.linger(peer).await?;

        Ok(Delivery {
            payload,
            peer,
            stats,
        })
    }

    /// Announce completion and keep answering the peer until it goes quiet.
    async fn linger(&mut self, peer: SocketAddr) -> Result<()> {
        self.send_terminate(peer).await?;
        let mut deadline = Instant::now() + self.config.linger;
        loop {
            match tokio::time::timeout_at(deadline, self.socket.recv_from()).await {
                Err(_elapsed) => return Ok(()),
                Ok(Ok((_, addr))) if addr == peer => {
                    if !self.faults.maybe_drop(self.config.inbound.drop)? {
                        self.send_terminate(peer).await?;
                    }
                    deadline = Instant::now() + self.config.linger;
                }
                Ok(Ok(_)) => {}
                Ok(Err(e)) if socket::is_transient(&e) => {}
                Ok(Err(e)) => return Err(Error::TransportFailure(e)),
            }
        }
    }

    /// Send `ack` through the outbound fault injector.
    ///
    /// Returns `Ok(false)` when the injector dropped it or the send failed
    /// transiently.
    async fn send_ack(&mut self, ack: &Ack, dest: SocketAddr) -> Result<bool> {
        let outbound = self.config.outbound;
        let Some((seq, checksum)) = self.faults.tamper(&outbound, ack.seq, ack.checksum)? else {
            log::debug!("[receiver] → ACK seq={} dropped by injector", ack.seq);
            return Ok(false);
        };
        let wire = Ack { seq, checksum }.encode();
        self.send(&wire, dest).await
    }

    async fn send_terminate(&mut self, dest: SocketAddr) -> Result<bool> {
        if self.faults.maybe_drop(self.config.outbound.drop)? {
            log::debug!("[receiver] → TERMINATE dropped by injector");
            return Ok(false);
        }
        log::debug!("[receiver] → TERMINATE");
        self.send(TERMINATE, dest).await
    }

    async fn send(&self, bytes: &[u8], dest: SocketAddr) -> Result<bool> {
        match self.socket.send_to(bytes, dest).await {
            Ok(()) => Ok(true),
            Err(e) if socket::is_transient(&e) => {
                log::debug!("[receiver] transient send error: {e}");
                Ok(false)
            }
            Err(e) => {
                log::warn!("[receiver] send to {dest} failed, aborting: {e}");
                Err(Error::TransportFailure(e))
            }
        }
    }
}

/// Bind `bind` and wait for one reliably delivered byte buffer.
pub async fn receive_bytes(bind: SocketAddr, config: ReceiverConfig) -> Result<Delivery> {
    let socket = Socket::bind(bind).await?;
    ReceiverEngine::new(socket, config)?.receive().await
}
