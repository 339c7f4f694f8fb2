//! Probabilistic fault injection for exercising the recovery paths.
//!
//! Real networks corrupt and drop datagrams, but loopback almost never does.
//! [`FaultInjector`] reproduces those faults on demand so the retransmission
//! machinery can be driven deterministically from a seed:
//!
//! | Fault               | Effect                                             |
//! |---------------------|----------------------------------------------------|
//! | Checksum corruption | Digest replaced by its complement; never verifies. |
//! | Sequence corruption | Sequence number complemented; never matches.       |
//! | Drop                | Datagram silently discarded.                       |
//!
//! A probability of exactly `0.0` short-circuits without drawing from the
//! RNG, so disabling a fault never perturbs the random stream of the others.
//! Probabilities outside `[0, 1)` are a caller bug and are reported as
//! [`FaultError::InvalidProbability`] instead of being clamped.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use crate::frame::Checksum;

/// Errors raised by the fault injector.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum FaultError {
    #[error("fault probability {0} outside [0, 1)")]
    InvalidProbability(f64),
}

/// Fault probabilities for one direction of traffic.
///
/// All probabilities must lie in `[0.0, 1.0)`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FaultConfig {
    /// Probability that a datagram's checksum is corrupted.
    pub checksum: f64,
    /// Probability that a datagram's sequence number is corrupted.
    pub sequence: f64,
    /// Probability that a datagram is dropped.
    pub drop: f64,
}

impl FaultConfig {
    /// No faults; a transparent pass-through.
    pub const NONE: Self = Self {
        checksum: 0.0,
        sequence: 0.0,
        drop: 0.0,
    };

    /// Only drop datagrams, with probability `p`.
    pub fn drop_only(p: f64) -> Self {
        Self {
            drop: p,
            ..Self::NONE
        }
    }

    /// Reject any probability outside `[0, 1)`.
    pub fn validate(&self) -> Result<(), FaultError> {
        check(self.checksum)?;
        check(self.sequence)?;
        check(self.drop)
    }

    /// `true` when every probability is zero.
    pub fn is_none(&self) -> bool {
        self.checksum == 0.0 && self.sequence == 0.0 && self.drop == 0.0
    }
}

/// Seedable source of channel faults.
#[derive(Debug)]
pub struct FaultInjector {
    rng: StdRng,
}

impl FaultInjector {
    /// Injector with a reproducible random stream.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Injector seeded from the operating system.
    pub fn from_os_rng() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    /// Seeded when `seed` is given, OS-seeded otherwise.
    pub fn new(seed: Option<u64>) -> Self {
        seed.map_or_else(Self::from_os_rng, Self::from_seed)
    }

    /// With probability `p`, return a checksum that cannot match the input.
    pub fn maybe_corrupt_checksum(
        &mut self,
        checksum: Checksum,
        p: f64,
    ) -> Result<Checksum, FaultError> {
        if self.roll(p)? {
            Ok(checksum.map(|b| !b))
        } else {
            Ok(checksum)
        }
    }

    /// With probability `p`, return a sequence number different from `seq`.
    pub fn maybe_corrupt_sequence(&mut self, seq: u32, p: f64) -> Result<u32, FaultError> {
        if self.roll(p)? {
            Ok(!seq)
        } else {
            Ok(seq)
        }
    }

    /// `true` with probability `p`: discard this datagram.
    pub fn maybe_drop(&mut self, p: f64) -> Result<bool, FaultError> {
        self.roll(p)
    }

    /// Apply every fault in `config` to a `(seq, checksum)` header.
    ///
    /// Returns `None` when the datagram should be dropped.
    pub fn tamper(
        &mut self,
        config: &FaultConfig,
        seq: u32,
        checksum: Checksum,
    ) -> Result<Option<(u32, Checksum)>, FaultError> {
        if self.maybe_drop(config.drop)? {
            return Ok(None);
        }
        let seq = self.maybe_corrupt_sequence(seq, config.sequence)?;
        let checksum = self.maybe_corrupt_checksum(checksum, config.checksum)?;
        Ok(Some((seq, checksum)))
    }

    fn roll(&mut self, p: f64) -> Result<bool, FaultError> {
        check(p)?;
        if p == 0.0 {
            return Ok(false);
        }
        Ok(self.rng.random_bool(p))
    }
}

fn check(p: f64) -> Result<(), FaultError> {
    // NaN fails both comparisons.
    if (0.0..1.0).contains(&p) {
        Ok(())
    } else {
        Err(FaultError::InvalidProbability(p))
    }
}
