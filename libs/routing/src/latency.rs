//! Simulated network/processing latency.
//!
//! Every node sleeps for [`Latency::delay`] after handling an advertisement
//! and before deciding whether to re-advertise. Tests inject [`NoLatency`]
//! or a seeded [`JitteredLatency`] to keep runs fast and reproducible.

use std::fmt::Debug;
use std::sync::Mutex;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of per-message delay.
pub trait Latency: Send + Sync + Debug + 'static {
    /// Delay to apply after processing one message.
    fn delay(&self) -> Duration;
}

/// No delay at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLatency;

impl Latency for NoLatency {
    fn delay(&self) -> Duration {
        Duration::ZERO
    }
}

/// The same delay for every message.
#[derive(Debug, Clone, Copy)]
pub struct FixedLatency(pub Duration);

impl Latency for FixedLatency {
    fn delay(&self) -> Duration {
        self.0
    }
}

/// Uniformly distributed delay in `[0, max)`.
#[derive(Debug)]
pub struct JitteredLatency {
    max: Duration,
    /// Seeded generator; `None` draws from the thread-local RNG.
    rng: Option<Mutex<StdRng>>,
}

impl JitteredLatency {
    /// Jitter from the thread-local RNG.
    pub fn new(max: Duration) -> Self {
        Self { max, rng: None }
    }

    /// Reproducible jitter sequence.
    pub fn seeded(max: Duration, seed: u64) -> Self {
        Self {
            max,
            rng: Some(Mutex::new(StdRng::seed_from_u64(seed))),
        }
    }

    fn sample(&self) -> f64 {
        match &self.rng {
            Some(rng) => match rng.lock() {
                Ok(mut rng) => rng.random::<f64>(),
                Err(poisoned) => poisoned.into_inner().random::<f64>(),
            },
            None => rand::rng().random::<f64>(),
        }
    }
}

impl Latency for JitteredLatency {
    fn delay(&self) -> Duration {
        if self.max.is_zero() {
            return Duration::ZERO;
        }
        self.max.mul_f64(self.sample())
    }
}
