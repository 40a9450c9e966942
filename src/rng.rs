//! # RandomStream
//!
//! `RandomStream` is a long-period uniform generator from the WELL family
//! (WELL19937a, 624 words of state). Every thread of an evolution run owns one
//! stream; the worker streams are seeded from the orchestrator's stream when the
//! pool is spawned, which keeps a run reproducible for a fixed master seed.
//!
//! The stream implements [`rand::RngCore`] and [`rand::SeedableRng`], so all of
//! `rand`'s samplers work on it.
//!
//! ## Example
//!
//! ```rust
//! use genvarsel::rng::RandomStream;
//!
//! let mut a = RandomStream::new(42);
//! let mut b = RandomStream::new(42);
//! assert_eq!(a.next32(), b.next32());
//!
//! let x = a.uniform(-1.0, 2.0);
//! assert!((-1.0..1.0).contains(&x));
//! ```

use rand::{RngCore, SeedableRng};

const R: usize = 624;
const DISCARD: u32 = 31;
const MASKU: u32 = u32::MAX >> (32 - DISCARD);
const MASKL: u32 = !MASKU;
const M1: usize = 70;
const M2: usize = 179;
const M3: usize = 449;

/// 2^32, the scale that maps a 32-bit draw into [0, 1).
const RANDOM_MAX: f64 = 4_294_967_296.0;

/// Which of the state words touched by a step lie across the end of the buffer.
///
/// The index walks the buffer backwards, so the regime only changes at a handful
/// of fixed positions; tracking it avoids a modulo per access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Regime {
    /// index == 0: both "previous" words wrap to the buffer end.
    Start,
    /// index == 1: the second "previous" word wraps.
    Second,
    /// index + M1 >= R: all three look-ahead words wrap.
    WrapM1,
    /// index + M2 >= R: the M2 and M3 look-ahead words wrap.
    WrapM2,
    /// index + M3 >= R: only the M3 look-ahead word wraps.
    WrapM3,
    /// 2 <= index < R - M3: no word wraps.
    Interior,
}

/// A seedable WELL19937a generator producing 32-bit integers and scaled doubles.
#[derive(Clone)]
pub struct RandomStream {
    state: Box<[u32; R]>,
    index: usize,
    regime: Regime,
}

impl RandomStream {
    /// Creates a stream seeded with `seed`.
    pub fn new(seed: u32) -> Self {
        let mut stream = Self {
            state: Box::new([0; R]),
            index: 0,
            regime: Regime::Start,
        };
        stream.seed(seed);
        stream
    }

    /// Reinitializes the stream. Two streams with equal seeds produce identical sequences.
    ///
    /// The 32-bit seed is expanded into the whole state with the Knuth
    /// multiplicative recurrence.
    pub fn seed(&mut self, seed: u32) {
        self.state[0] = seed;
        for i in 1..R {
            let prev = self.state[i - 1];
            self.state[i] = 1_812_433_253u32
                .wrapping_mul(prev ^ (prev >> 30))
                .wrapping_add(i as u32);
        }
        self.index = 0;
        self.regime = Regime::Start;
    }

    /// Advances the stream and returns the next 32 random bits.
    pub fn next32(&mut self) -> u32 {
        let i = self.index;
        let wrap = |offset: usize, wraps: bool| if wraps { i + offset - R } else { i + offset };

        let (m1_wraps, m2_wraps, m3_wraps) = match self.regime {
            Regime::WrapM1 => (true, true, true),
            Regime::WrapM2 => (false, true, true),
            Regime::WrapM3 => (false, false, true),
            Regime::Start | Regime::Second | Regime::Interior => (false, false, false),
        };
        let prev1 = if i == 0 { R - 1 } else { i - 1 };
        let prev2 = if i < 2 { i + R - 2 } else { i - 2 };

        let v0 = self.state[i];
        let vm1 = self.state[wrap(M1, m1_wraps)];
        let vm2 = self.state[wrap(M2, m2_wraps)];
        let vm3 = self.state[wrap(M3, m3_wraps)];

        let z0 = (self.state[prev1] & MASKL) | (self.state[prev2] & MASKU);
        let z1 = (v0 ^ (v0 << 25)) ^ (vm1 ^ (vm1 >> 27));
        let z2 = (vm2 >> 9) ^ (vm3 ^ (vm3 >> 1));
        let new_v1 = z1 ^ z2;
        self.state[i] = new_v1;
        self.state[prev1] =
            z0 ^ (z1 ^ (z1 << 9)) ^ (z2 ^ (z2 << 21)) ^ (new_v1 ^ (new_v1 >> 21));

        self.index = prev1;
        self.regime = match self.regime {
            Regime::Start => Regime::WrapM1,
            Regime::Second => Regime::Start,
            Regime::WrapM1 if prev1 + M1 < R => Regime::WrapM2,
            Regime::WrapM2 if prev1 + M2 < R => Regime::WrapM3,
            Regime::WrapM3 if prev1 + M3 < R => Regime::Interior,
            Regime::Interior if prev1 == 1 => Regime::Second,
            regime => regime,
        };

        self.state[self.index]
    }

    /// Returns `min + (next32() / 2^32) * range`, i.e. a value in `[min, min + range)`.
    pub fn uniform(&mut self, min: f64, range: f64) -> f64 {
        min + (f64::from(self.next32()) / RANDOM_MAX) * range
    }

    /// Returns an index uniformly drawn from `0..upper`. `upper` must be positive.
    pub fn index_below(&mut self, upper: usize) -> usize {
        let idx = self.uniform(0.0, upper as f64) as usize;
        idx.min(upper - 1)
    }
}

impl std::fmt::Debug for RandomStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RandomStream")
            .field("index", &self.index)
            .field("regime", &self.regime)
            .finish_non_exhaustive()
    }
}

impl RngCore for RandomStream {
    fn next_u32(&mut self) -> u32 {
        self.next32()
    }

    /// Glues two 32-bit draws together, high word first.
    fn next_u64(&mut self) -> u64 {
        let high = u64::from(self.next32());
        (high << 32) | u64::from(self.next32())
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let bytes = self.next32().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl SeedableRng for RandomStream {
    type Seed = [u8; 4];

    fn from_seed(seed: Self::Seed) -> Self {
        Self::new(u32::from_le_bytes(seed))
    }
}
