//! Virtual-clock environment with a seeded RNG.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use tandem_core::Environment;

/// Simulation environment with a manually advanced clock and seeded RNG.
///
/// - **Virtual time**: the clock starts at 2024-01-01 09:00 and only moves
///   when [`SimEnv::advance`] is called, so chat timestamps are predictable.
/// - **Seeded RNG**: `random_bytes()` draws from `ChaCha20Rng`, so login codes
///   repeat across runs with the same seed.
///
/// Clones share both the clock and the RNG stream.
#[derive(Clone)]
pub struct SimEnv {
    state: Arc<Mutex<SimState>>,
}

struct SimState {
    rng: ChaCha20Rng,
    now: NaiveDateTime,
}

impl SimEnv {
    /// Create a new `SimEnv` with default seed (0)
    pub fn new() -> Self {
        Self::with_seed(0)
    }

    /// Create a new `SimEnv` with a specific seed
    pub fn with_seed(seed: u64) -> Self {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .and_then(|d| d.and_hms_opt(9, 0, 0))
            .unwrap_or_default();
        Self {
            state: Arc::new(Mutex::new(SimState {
                rng: ChaCha20Rng::seed_from_u64(seed),
                now: start,
            })),
        }
    }

    /// Move the virtual clock forward.
    pub fn advance(&self, by: TimeDelta) {
        let mut state = self.lock();
        state.now += by;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimState> {
        // Only a panicking test can poison it, and that test has failed anyway.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment for SimEnv {
    fn local_time(&self) -> NaiveDateTime {
        self.lock().now
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        self.lock().rng.fill_bytes(buffer);
    }
}
