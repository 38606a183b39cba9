/// Randomness for fragment physics
///
/// Production seeds from the clock; tests pass a fixed seed so a whole
/// simulation is reproducible.

use std::time::{SystemTime, UNIX_EPOCH};

/// Source of uniform random numbers in `[0, 1)`
pub trait RandomSource {
    fn next_f32(&mut self) -> f32;
}

/// Deterministic xorshift64 generator.
#[derive(Debug, Clone)]
pub struct XorShiftRng {
    state: u64,
}

impl XorShiftRng {
    /// Seeded generator. A zero seed is remapped, xorshift would stay at 0.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            state: if seed == 0 { 0x9E37_79B9_7F4A_7C15 } else { seed },
        }
    }

    /// Generator seeded from the system clock
    pub fn from_clock() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        Self::with_seed(nanos)
    }

    #[inline]
    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }
}

impl RandomSource for XorShiftRng {
    fn next_f32(&mut self) -> f32 {
        // Top 24 bits give every representable step of an f32 mantissa
        (self.next_u64() >> 40) as f32 / (1u64 << 24) as f32
    }
}
