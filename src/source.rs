//! Injected time and randomness.
//!
//! Everything in the core that reads the wall clock or draws a random number goes
//! through these two traits, so rounds and leaderboard windows can be replayed in tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use rand::rngs::{StdRng, ThreadRng};
use rand::Rng;

/// Millisecond epoch clock.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(now_ms: i64) -> Self {
        Self { now: AtomicI64::new(now_ms) }
    }

    pub fn set(&self, now_ms: i64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_ms: i64) {
        self.now.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Uniform draws in `[0, 1)`. One call per probabilistic decision.
pub trait RandomSource {
    fn next_f64(&mut self) -> f64;
}

impl RandomSource for StdRng {
    fn next_f64(&mut self) -> f64 {
        self.gen::<f64>()
    }
}

impl RandomSource for ThreadRng {
    fn next_f64(&mut self) -> f64 {
        self.gen::<f64>()
    }
}

impl<R: RandomSource + ?Sized> RandomSource for Box<R> {
    fn next_f64(&mut self) -> f64 {
        (**self).next_f64()
    }
}

/// Replays a fixed list of draws, then repeats `fallback` forever.
#[derive(Debug, Clone)]
pub struct ScriptedRandom {
    draws: VecDeque<f64>,
    fallback: f64,
    consumed: usize,
}

impl ScriptedRandom {
    pub fn new(draws: impl IntoIterator<Item = f64>, fallback: f64) -> Self {
        Self {
            draws: draws.into_iter().collect(),
            fallback: clamp_unit(fallback),
            consumed: 0,
        }
    }

    /// Every draw returns `value`.
    pub fn constant(value: f64) -> Self {
        Self::new(std::iter::empty(), value)
    }

    pub fn consumed(&self) -> usize {
        self.consumed
    }
}

impl RandomSource for ScriptedRandom {
    fn next_f64(&mut self) -> f64 {
        self.consumed += 1;
        self.draws.pop_front().map(clamp_unit).unwrap_or(self.fallback)
    }
}

fn clamp_unit(v: f64) -> f64 {
    if v.is_nan() || v < 0.0 {
        0.0
    } else if v >= 1.0 {
        1.0 - f64::EPSILON
    } else {
        v
    }
}
