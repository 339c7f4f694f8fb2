//! Entry point for `gbn-transfer`.
//!
//! Parses CLI arguments and dispatches into either **send** or **receive** mode.
//! All actual protocol work is delegated to library modules; `main.rs` owns only
//! process setup (logging, argument parsing, file I/O).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use gbn_transfer::app;
use gbn_transfer::fault::FaultConfig;
use gbn_transfer::receiver::{self, ReceiverConfig};
use gbn_transfer::sender::{self, SenderConfig};

/// Reliable file transfer over UDP using Go-Back-N.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Send a file to a listening receiver.
    Send {
        /// File whose bytes are sent.
        file: PathBuf,
        /// Receiver address (e.g. 127.0.0.1:12000).
        #[arg(short, long, default_value = "127.0.0.1:12000")]
        dest: SocketAddr,
        /// Go-Back-N window size.
        #[arg(short, long, default_value_t = 8)]
        window: u32,
        /// Payload bytes per frame.
        #[arg(short, long, default_value_t = 2048)]
        packet_size: usize,
        /// Retransmission timeout in milliseconds.
        #[arg(short, long, default_value_t = 50)]
        timeout_ms: u64,
        /// Consecutive timeouts without progress before giving up.
        #[arg(long, default_value_t = 50)]
        max_retries: u32,
        #[command(flatten)]
        faults: FaultArgs,
    },
    /// Receive one file and write it to disk.
    Receive {
        /// Where to write the delivered bytes.
        #[arg(short, long, default_value = "received.bin")]
        out: PathBuf,
        /// Local address to bind.
        #[arg(short, long, default_value = "0.0.0.0:12000")]
        bind: SocketAddr,
        /// Milliseconds to keep answering the sender after completion.
        #[arg(long, default_value_t = 250)]
        linger_ms: u64,
        #[command(flatten)]
        faults: FaultArgs,
    },
}

/// Fault-injection knobs; every probability must lie in [0, 1).
#[derive(Args)]
struct FaultArgs {
    /// Probability of corrupting an outgoing datagram's checksum.
    #[arg(long, default_value_t = 0.0)]
    corrupt_out: f64,
    /// Probability of corrupting an incoming datagram's checksum.
    #[arg(long, default_value_t = 0.0)]
    corrupt_in: f64,
    /// Probability of corrupting an outgoing datagram's sequence number.
    #[arg(long, default_value_t = 0.0)]
    seq_corrupt_out: f64,
    /// Probability of corrupting an incoming datagram's sequence number.
    #[arg(long, default_value_t = 0.0)]
    seq_corrupt_in: f64,
    /// Probability of dropping an outgoing datagram.
    #[arg(long, default_value_t = 0.0)]
    drop_out: f64,
    /// Probability of dropping an incoming datagram.
    #[arg(long, default_value_t = 0.0)]
    drop_in: f64,
    /// Seed for reproducible fault patterns.
    #[arg(long)]
    seed: Option<u64>,
}

impl FaultArgs {
    fn outbound(&self) -> FaultConfig {
        FaultConfig {
            checksum: self.corrupt_out,
            sequence: self.seq_corrupt_out,
            drop: self.drop_out,
        }
    }

    fn inbound(&self) -> FaultConfig {
        FaultConfig {
            checksum: self.corrupt_in,
            sequence: self.seq_corrupt_in,
            drop: self.drop_in,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise env_logger; set RUST_LOG to control verbosity.
    env_logger::init();

    let cli = Cli::parse();

    match cli.mode {
        Mode::Send {
            file,
            dest,
            window,
            packet_size,
            timeout_ms,
            max_retries,
            faults,
        } => {
            let payload = app::open_bytes(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let config = SenderConfig {
                window_size: window,
                packet_size,
                timeout: Duration::from_millis(timeout_ms),
                max_retries,
                outbound: faults.outbound(),
                inbound: faults.inbound(),
                seed: faults.seed,
            };
            let stats = sender::send_bytes(dest, &payload, config)
                .await
                .with_context(|| format!("sending {} to {dest}", file.display()))?;
            println!(
                "sent {} bytes in {} frames: {} transmissions, {} timeouts, {:.3}s",
                payload.len(),
                stats.frames,
                stats.transmissions,
                stats.timeouts,
                stats.elapsed.as_secs_f64()
            );
        }
        Mode::Receive {
            out,
            bind,
            linger_ms,
            faults,
        } => {
            let config = ReceiverConfig {
                linger: Duration::from_millis(linger_ms),
                inbound: faults.inbound(),
                outbound: faults.outbound(),
                seed: faults.seed,
            };
            let delivery = receiver::receive_bytes(bind, config)
                .await
                .with_context(|| format!("receiving on {bind}"))?;
            app::save_bytes(&out, &delivery.payload)
                .with_context(|| format!("writing {}", out.display()))?;
            log::info!(
                "saved {} bytes from {} to {}",
                delivery.payload.len(),
                delivery.peer,
                out.display()
            );
            println!("received {} bytes from {}", delivery.payload.len(), delivery.peer);
        }
    }

    Ok(())
}
