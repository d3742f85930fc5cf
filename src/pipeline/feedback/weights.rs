//! Versioned per-source evidence weights.
//!
//! Each weight is an `f64` stored as bits in an `AtomicU64`. Readers load
//! without locking; writers apply a bounded EMA with a compare-and-swap loop,
//! so concurrent feedback on the same source is never lost. Every successful
//! update bumps the version counter.
//!
//! Writers hold an in-flight count from before the swap until after the
//! version bump. A snapshot is only taken while no write is in flight and
//! the version did not move, so its weights are exactly those at its version.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::models::SourceKind;

pub const MIN_SOURCE_WEIGHT: f64 = 0.25;
pub const MAX_SOURCE_WEIGHT: f64 = 2.0;
pub const DEFAULT_SOURCE_WEIGHT: f64 = 1.0;

/// Point-in-time copy of the weights, used for one request end to end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightSnapshot {
    pub version: u64,
    pub weights: BTreeMap<SourceKind, f64>,
}

impl WeightSnapshot {
    pub fn get(&self, kind: SourceKind) -> f64 {
        self.weights
            .get(&kind)
            .copied()
            .unwrap_or(DEFAULT_SOURCE_WEIGHT)
    }

    /// Every source at the neutral weight, version 0.
    pub fn neutral() -> Self {
        Self {
            version: 0,
            weights: SourceKind::ALL
                .iter()
                .map(|k| (*k, DEFAULT_SOURCE_WEIGHT))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightUpdate {
    pub source: SourceKind,
    pub previous: f64,
    pub current: f64,
    pub version: u64,
    /// Compare-and-swap attempts lost to concurrent writers.
    pub contended_retries: u32,
}

#[derive(Debug)]
pub struct SourceWeightState {
    literature: AtomicU64,
    vector: AtomicU64,
    guideline: AtomicU64,
    version: AtomicU64,
    in_flight: AtomicU64,
}

impl Default for SourceWeightState {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceWeightState {
    pub fn new() -> Self {
        let neutral = DEFAULT_SOURCE_WEIGHT.to_bits();
        Self {
            literature: AtomicU64::new(neutral),
            vector: AtomicU64::new(neutral),
            guideline: AtomicU64::new(neutral),
            version: AtomicU64::new(0),
            in_flight: AtomicU64::new(0),
        }
    }

    /// Seed specific weights, clamped into bounds. Version stays at 0.
    pub fn with_weights(weights: impl IntoIterator<Item = (SourceKind, f64)>) -> Self {
        let state = Self::new();
        for (kind, weight) in weights {
            let weight = clamp_weight(weight);
            state.slot(kind).store(weight.to_bits(), Ordering::Release);
        }
        state
    }

    fn slot(&self, kind: SourceKind) -> &AtomicU64 {
        match kind {
            SourceKind::Literature => &self.literature,
            SourceKind::Vector => &self.vector,
            SourceKind::Guideline => &self.guideline,
        }
    }

    pub fn weight(&self, kind: SourceKind) -> f64 {
        f64::from_bits(self.slot(kind).load(Ordering::Acquire))
    }

    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Consistent copy of every weight and the version they correspond to.
    ///
    /// Retries while a write is in flight or lands mid-read.
    pub fn snapshot(&self) -> WeightSnapshot {
        let mut attempts = 0u32;
        loop {
            let version = self.version.load(Ordering::SeqCst);
            let weights: BTreeMap<SourceKind, f64> = SourceKind::ALL
                .iter()
                .map(|k| (*k, f64::from_bits(self.slot(*k).load(Ordering::SeqCst))))
                .collect();
            let writing = self.in_flight.load(Ordering::SeqCst);
            if writing == 0 && self.version.load(Ordering::SeqCst) == version {
                return WeightSnapshot { version, weights };
            }

            attempts += 1;
            if attempts % 64 == 0 {
                std::thread::yield_now();
            } else {
                std::hint::spin_loop();
            }
        }
    }

    /// Move one source weight toward `target` by `alpha`, clamped to bounds.
    ///
    /// Conflicting writers are retried until this update lands on the
    /// latest value.
    pub fn update_ema(&self, kind: SourceKind, target: f64, alpha: f64) -> WeightUpdate {
        let slot = self.slot(kind);
        let mut contended_retries = 0u32;
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let mut current_bits = slot.load(Ordering::SeqCst);

        loop {
            let previous = f64::from_bits(current_bits);
            let next = ema_step(previous, target, alpha);
            match slot.compare_exchange_weak(
                current_bits,
                next.to_bits(),
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => {
                    let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
                    self.in_flight.fetch_sub(1, Ordering::SeqCst);
                    if contended_retries > 0 {
                        tracing::debug!(
                            source = %kind,
                            retries = contended_retries,
                            "Weight update contended"
                        );
                    }
                    return WeightUpdate {
                        source: kind,
                        previous,
                        current: next,
                        version,
                        contended_retries,
                    };
                }
                Err(actual) => {
                    contended_retries += 1;
                    current_bits = actual;
                }
            }
        }
    }
}

/// One bounded EMA step.
pub fn ema_step(current: f64, target: f64, alpha: f64) -> f64 {
    clamp_weight((1.0 - alpha) * current + alpha * target)
}

fn clamp_weight(weight: f64) -> f64 {
    if weight.is_finite() {
        weight.clamp(MIN_SOURCE_WEIGHT, MAX_SOURCE_WEIGHT)
    } else {
        DEFAULT_SOURCE_WEIGHT
    }
}
