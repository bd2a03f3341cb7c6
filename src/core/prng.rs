// Minimal PRNG (no external crates).
//
// This is NOT cryptographically secure.
// It drives learning chance, tie-breaking among worst mediators, and
// residual response randomness. Its state is part of the network image so
// a reloaded network replays identically.

#[derive(Debug, Clone)]
pub struct Prng {
    state: u64,
}

impl Prng {
    pub fn new(seed: u64) -> Self {
        // Avoid a zero state.
        let seed = if seed == 0 { 0x9E3779B97F4A7C15 } else { seed };
        Self { state: seed }
    }

    pub(crate) fn from_state(state: u64) -> Self {
        Self::new(state)
    }

    pub(crate) fn state(&self) -> u64 {
        self.state
    }

    #[inline]
    fn next_u64(&mut self) -> u64 {
        // xorshift64*
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }

    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    /// Uniform in [0,1).
    #[inline]
    pub fn next_f64_01(&mut self) -> f64 {
        // 53 mantissa bits.
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// True with the given probability (clamped to [0,1]).
    #[inline]
    pub fn chance(&mut self, probability: f64) -> bool {
        if probability >= 1.0 {
            return true;
        }
        if probability <= 0.0 {
            return false;
        }
        self.next_f64_01() < probability
    }

    #[inline]
    pub fn gen_range_usize(&mut self, low: usize, high: usize) -> usize {
        if high <= low {
            return low;
        }
        let span = (high - low) as u64;
        let v = self.next_u64() % span;
        low + v as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_stream() {
        let mut a = Prng::new(4517);
        let mut b = Prng::new(4517);
        for _ in 0..64 {
            assert_eq!(a.next_u32(), b.next_u32());
        }
    }

    #[test]
    fn state_restores_stream() {
        let mut a = Prng::new(99);
        a.next_u32();
        let mut b = Prng::from_state(a.state());
        assert_eq!(a.next_u32(), b.next_u32());
    }

    #[test]
    fn unit_interval_and_range_bounds() {
        let mut r = Prng::new(7);
        for _ in 0..1000 {
            let x = r.next_f64_01();
            assert!((0.0..1.0).contains(&x));
            let k = r.gen_range_usize(3, 9);
            assert!((3..9).contains(&k));
        }
        assert_eq!(r.gen_range_usize(5, 5), 5);
        assert!(r.chance(1.0));
        assert!(!r.chance(0.0));
    }
}
