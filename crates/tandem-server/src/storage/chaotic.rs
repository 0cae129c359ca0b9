//! Fault-injecting transcript store.
//!
//! Wraps another store and fails a seeded fraction of operations. Chat relay
//! must keep working when history persistence does not, and this is how the
//! tests prove it.

use std::sync::{Arc, Mutex, PoisonError};

use tandem_core::PairKey;

use super::{StorageError, TranscriptStore};

/// Transcript store wrapper that randomly injects failures.
///
/// Deterministic for a given seed. Clone shares the RNG and counters, so the
/// failure sequence continues across clones.
#[derive(Clone)]
pub struct ChaoticTranscripts<T> {
    inner: T,
    /// 0.0 never fails, 1.0 always fails
    failure_rate: f64,
    state: Arc<Mutex<ChaosState>>,
}

struct ChaosState {
    rng: Lcg,
    operations: usize,
    injected: usize,
}

/// Linear congruential generator. Reproducible and good enough for coin flips.
struct Lcg {
    state: u64,
}

impl Lcg {
    fn next(&mut self) -> f64 {
        // Numerical Recipes constants
        const A: u64 = 1_664_525;
        const C: u64 = 1_013_904_223;
        const M: u64 = 1u64 << 32;

        self.state = (A.wrapping_mul(self.state).wrapping_add(C)) % M;
        (self.state as f64) / (M as f64)
    }
}

impl<T: TranscriptStore> ChaoticTranscripts<T> {
    /// Wrap `inner` with the default seed.
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn new(inner: T, failure_rate: f64) -> Self {
        Self::with_seed(inner, failure_rate, 0x7A4D_E11A_0000_0001)
    }

    /// Wrap `inner` with an explicit seed.
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn with_seed(inner: T, failure_rate: f64, seed: u64) -> Self {
        assert!(
            (0.0..=1.0).contains(&failure_rate),
            "failure_rate must be between 0.0 and 1.0, got {failure_rate}"
        );

        Self {
            inner,
            failure_rate,
            state: Arc::new(Mutex::new(ChaosState {
                rng: Lcg { state: seed },
                operations: 0,
                injected: 0,
            })),
        }
    }

    /// Underlying store, for checking what actually got written.
    pub fn inner(&self) -> &T {
        &self.inner
    }

    /// Operations attempted through this wrapper.
    pub fn operation_count(&self) -> usize {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).operations
    }

    /// Operations that were failed on purpose.
    pub fn injected_failures(&self) -> usize {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).injected
    }

    fn roll(&self, operation: &str) -> Result<(), StorageError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.operations += 1;
        if state.rng.next() < self.failure_rate {
            state.injected += 1;
            return Err(StorageError::Io(format!("chaotic failure injection ({operation})")));
        }
        Ok(())
    }
}

impl<T: TranscriptStore> TranscriptStore for ChaoticTranscripts<T> {
    fn append(&self, pair: &PairKey, text: &str) -> Result<(), StorageError> {
        self.roll("append")?;
        self.inner.append(pair, text)
    }

    fn load(&self, pair: &PairKey) -> Result<String, StorageError> {
        self.roll("load")?;
        self.inner.load(pair)
    }
}
