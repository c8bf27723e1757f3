//! Deterministic execution context.
//!
//! A [`Determinism`] value bundles the three ambient inputs of event
//! production: a time source, a random source, and the logical node name.
//! Event producers receive the context explicitly instead of reaching for
//! global clocks or thread-local randomness, so two contexts can never
//! interfere no matter how the surrounding tasks are scheduled.
//!
//! A seeded context fixes the instant at `epoch + seed` seconds and seeds the
//! random generator from the same value, making timestamps and every
//! randomness-derived identifier (UUIDs included) reproducible bit for bit
//! from the seed alone. An unseeded context reads the real clock and an
//! OS-seeded generator.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Node name used when neither an explicit override nor the environment
/// supplies one.
pub const FALLBACK_NODE: &str = "api";

/// Environment variable consulted for the default logical node name.
pub const NODE_ENV_VAR: &str = "CF_NODE";

/// Errors raised when constructing a deterministic context.
#[derive(Debug, thiserror::Error)]
pub enum DeterminismError {
    /// The seed's epoch offset does not map to a representable instant.
    #[error("seed {seed} does not map to a representable instant")]
    SeedOutOfRange {
        /// The offending seed value.
        seed: i64,
    },
}

/// Explicit time, randomness, and identity context for event producers.
///
/// Construct with [`Determinism::wall`] for live operation or
/// [`Determinism::seeded`] for reproducible runs, then thread a reference
/// into everything that stamps time, draws randomness, or names its node.
#[derive(Debug)]
pub struct Determinism {
    /// Fixed instant for seeded contexts; `None` reads the real clock.
    fixed_instant: Option<DateTime<Utc>>,
    rng: Mutex<StdRng>,
    node: String,
}

impl Determinism {
    /// Create a live context: real clock, OS-seeded randomness, node name
    /// resolved from the environment.
    pub fn wall() -> Self {
        Self {
            fixed_instant: None,
            rng: Mutex::new(StdRng::from_os_rng()),
            node: resolve_node(None),
        }
    }

    /// Create a live context with an explicit node name.
    ///
    /// A blank name falls back to the environment/default resolution, same
    /// as [`Determinism::wall`].
    pub fn wall_on(node: &str) -> Self {
        Self {
            fixed_instant: None,
            rng: Mutex::new(StdRng::from_os_rng()),
            node: resolve_node(Some(node)),
        }
    }

    /// Create a reproducible context from a seed.
    ///
    /// The instant is fixed at `epoch + seed` seconds (UTC) and the random
    /// generator is seeded from the same value, so identical seeds yield
    /// identical timestamps and identical random sequences. Negative seeds
    /// are valid and map to instants before the epoch.
    ///
    /// # Errors
    ///
    /// Returns [`DeterminismError::SeedOutOfRange`] if the seed's second
    /// offset cannot be represented as an instant.
    pub fn seeded(node: Option<&str>, seed: i64) -> Result<Self, DeterminismError> {
        let fixed = DateTime::from_timestamp(seed, 0)
            .ok_or(DeterminismError::SeedOutOfRange { seed })?;
        Ok(Self {
            fixed_instant: Some(fixed),
            rng: Mutex::new(StdRng::seed_from_u64(u64::from_le_bytes(
                seed.to_le_bytes(),
            ))),
            node: resolve_node(node),
        })
    }

    /// Current instant: the fixed instant for seeded contexts, otherwise the
    /// real clock.
    ///
    /// Truncated to microsecond precision so a stamped instant survives a
    /// `TIMESTAMPTZ` round-trip unchanged.
    pub fn now(&self) -> DateTime<Utc> {
        let at = self.fixed_instant.unwrap_or_else(Utc::now);
        DateTime::from_timestamp_micros(at.timestamp_micros()).unwrap_or(at)
    }

    /// Effective logical node name for events produced under this context.
    pub fn node(&self) -> &str {
        &self.node
    }

    /// Whether this context was constructed from a seed.
    pub const fn is_deterministic(&self) -> bool {
        self.fixed_instant.is_some()
    }

    /// Draw the next 64-bit value from the context's random source.
    pub fn next_u64(&self) -> u64 {
        self.rng().next_u64()
    }

    /// Generate an RFC 4122 version-4 UUID from the context's random source.
    ///
    /// Under a seeded context the full UUID sequence is reproducible from
    /// the seed.
    pub fn random_uuid(&self) -> Uuid {
        let mut bytes = [0u8; 16];
        self.rng().fill_bytes(&mut bytes);
        uuid::Builder::from_random_bytes(bytes).into_uuid()
    }

    /// Derive a stable 64-bit seed from arbitrary string parts.
    ///
    /// The derivation is a SHA-256 digest of the concatenated parts, taking
    /// the first eight bytes big-endian. Identical parts always derive the
    /// identical seed.
    pub fn seed_from(parts: &[&str]) -> i64 {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part.as_bytes());
        }
        let digest: [u8; 32] = hasher.finalize().into();
        let head = digest.first_chunk::<8>().copied().unwrap_or_default();
        i64::from_be_bytes(head)
    }

    /// Lock the random source, recovering from a poisoned lock.
    fn rng(&self) -> MutexGuard<'_, StdRng> {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Determinism {
    fn default() -> Self {
        Self::wall()
    }
}

/// Resolve the effective node name.
///
/// Precedence: non-blank explicit override, then the `CF_NODE` environment
/// variable, then [`FALLBACK_NODE`].
fn resolve_node(explicit: Option<&str>) -> String {
    if let Some(node) = explicit
        && !node.trim().is_empty()
    {
        return node.to_owned();
    }
    match std::env::var(NODE_ENV_VAR) {
        Ok(env_node) if !env_node.trim().is_empty() => env_node,
        _ => FALLBACK_NODE.to_owned(),
    }
}
