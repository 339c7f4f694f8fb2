//! Async UDP socket abstraction.
//!
//! [`Socket`] is a thin wrapper around `tokio::net::UdpSocket` that moves
//! whole datagrams.  All protocol logic lives elsewhere; this module owns
//! only byte I/O and the decision of which OS errors are worth retrying.

use std::fmt;
use std::io;
use std::net::SocketAddr;

use tokio::net::UdpSocket;

/// Maximum UDP payload size (theoretical limit; frames stay well below it).
pub const MAX_DATAGRAM: usize = 65_535;

/// A datagram-oriented async UDP socket.
///
/// `recv_from` is cancel-safe to use inside `tokio::select!`.
pub struct Socket {
    /// Address this socket is bound to (filled in after OS assigns ephemeral port).
    pub local_addr: SocketAddr,
    inner: UdpSocket,
    /// Receive buffer reused across calls; only the datagram itself is copied out.
    buf: Box<[u8]>,
}

impl Socket {
    /// Bind a new socket to `local_addr`.
    ///
    /// Passing `0.0.0.0:0` lets the OS choose an ephemeral port.
    pub async fn bind(local_addr: SocketAddr) -> io::Result<Self> {
        let inner = UdpSocket::bind(local_addr).await?;
        let local_addr = inner.local_addr()?;
        Ok(Self {
            local_addr,
            inner,
            buf: vec![0u8; MAX_DATAGRAM].into_boxed_slice(),
        })
    }

    /// Send `bytes` as a single datagram to `dest`.
    pub async fn send_to(&self, bytes: &[u8], dest: SocketAddr) -> io::Result<()> {
        self.inner.send_to(bytes, dest).await?;
        Ok(())
    }

    /// Receive the next datagram.
    ///
    /// Returns `(bytes, sender_address)`.
    pub async fn recv_from(&mut self) -> io::Result<(Vec<u8>, SocketAddr)> {
        let (n, addr) = self.inner.recv_from(&mut self.buf).await?;
        Ok((self.buf[..n].to_vec(), addr))
    }

    /// Receive a datagram only if one is already queued.
    ///
    /// Returns `Ok(None)` instead of waiting when the socket has nothing to
    /// read.
    pub fn try_recv_from(&mut self) -> io::Result<Option<(Vec<u8>, SocketAddr)>> {
        match self.inner.try_recv_from(&mut self.buf) {
            Ok((n, addr)) => Ok(Some((self.buf[..n].to_vec(), addr))),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl fmt::Debug for Socket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Socket")
            .field("local_addr", &self.local_addr)
            .finish_non_exhaustive()
    }
}

/// `true` for socket errors that a retransmission may cure.
///
/// `ConnectionRefused` shows up on loopback when an ICMP port-unreachable
/// arrives before the peer has bound; the next timeout retries.  Everything
/// not listed (invalid destination, permission, address errors) is fatal.
pub fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock
            | io::ErrorKind::Interrupted
            | io::ErrorKind::TimedOut
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
    )
}
