//! Legacy-compatible random numbers
//!
//! Reproduces the player's generator bit for bit: a 31-bit maximal-length
//! xorshift sequence fed through an integer hash. Scripts that derive game
//! state from `random()` replay identically given the same seed.

use std::time::{SystemTime, UNIX_EPOCH};

use log::debug;

/// Largest value produced by the hash stage
const RANDOM_PURE_MAX: i32 = 0x7FFF_FFFF;

/// Feedback masks for maximal-length sequences of 2^n - 1 values
const XOR_MASKS: [u32; 31] = [
    0x0000_0003, 0x0000_0006, 0x0000_000C, 0x0000_0014, 0x0000_0030, 0x0000_0060, 0x0000_00B8,
    0x0000_0110, 0x0000_0240, 0x0000_0500, 0x0000_0CA0, 0x0000_1B00, 0x0000_3500, 0x0000_6000,
    0x0000_B400, 0x0001_2000, 0x0002_0400, 0x0007_2000, 0x0009_0000, 0x0014_0000, 0x0030_0000,
    0x0040_0000, 0x00D8_0000, 0x0120_0000, 0x0388_0000, 0x0720_0000, 0x0900_0000, 0x1400_0000,
    0x3280_0000, 0x4800_0000, 0xA300_0000,
];

/// Sequence width in bits
const SEQUENCE_BITS: u32 = 31;

/// Generator state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RandomState {
    value: u32,
    xor_mask: u32,
    sequence_length: u32,
    /// Seed used when the state is (re)initialized
    seed: Option<u32>,
}

impl RandomState {
    /// Create a generator
    ///
    /// Without a seed the first draw seeds from the wall clock.
    pub fn new(seed: Option<u32>) -> Self {
        let mut state = RandomState {
            value: 0,
            xor_mask: 0,
            sequence_length: 0,
            seed,
        };
        if let Some(seed) = seed {
            state.init(seed);
        }
        state
    }

    fn init(&mut self, seed: u32) {
        self.value = seed;
        self.sequence_length = (1u32 << SEQUENCE_BITS) - 1;
        self.xor_mask = XOR_MASKS[SEQUENCE_BITS as usize - 2];
    }

    fn next_value(&mut self) -> i32 {
        if self.value & 1 != 0 {
            self.value = (self.value >> 1) ^ self.xor_mask;
        } else {
            self.value >>= 1;
        }
        self.value as i32
    }

    /// Integer hash applied to every sequence value
    pub fn hash(seed: i32) -> i32 {
        const C1: i32 = 1_376_312_589;
        const C2: i32 = 789_221;
        const C3: i32 = 15_731;

        let seed = ((seed << 13) ^ seed).wrapping_sub(seed >> 21);
        let mut result = seed
            .wrapping_mul(seed.wrapping_mul(seed).wrapping_mul(C3).wrapping_add(C2))
            .wrapping_add(C1)
            & RANDOM_PURE_MAX;
        result = result.wrapping_add(seed);
        ((result << 13) ^ result).wrapping_sub(result >> 21)
    }

    /// Next non-negative 31-bit value
    pub fn generate(&mut self) -> i32 {
        if self.value == 0 {
            let seed = self.seed.filter(|s| *s != 0).unwrap_or_else(clock_seed);
            debug!("seeding random generator with {}", seed);
            self.init(seed);
        }
        let n = self.next_value();
        Self::hash(n.wrapping_mul(71)) & RANDOM_PURE_MAX
    }

    /// `random(range)`: integer in `[0, range)`, 0 for non-positive ranges
    pub fn random(&mut self, range: i32) -> i32 {
        if range <= 0 {
            return 0;
        }
        self.generate() % range
    }
}

fn clock_seed() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(1)
        .max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = RandomState::new(Some(12345));
        let mut b = RandomState::new(Some(12345));
        let xs: Vec<i32> = (0..64).map(|_| a.random(1000)).collect();
        let ys: Vec<i32> = (0..64).map(|_| b.random(1000)).collect();
        assert_eq!(xs, ys);
        assert!(xs.iter().all(|x| (0..1000).contains(x)));
    }

    #[test]
    fn test_different_seeds_diverge() {
        let mut a = RandomState::new(Some(1));
        let mut b = RandomState::new(Some(2));
        let xs: Vec<i32> = (0..16).map(|_| a.generate()).collect();
        let ys: Vec<i32> = (0..16).map(|_| b.generate()).collect();
        assert_ne!(xs, ys);
    }

    #[test]
    fn test_xorshift_step() {
        let mut state = RandomState::new(Some(4));
        // Even values: plain shift
        assert_eq!(state.next_value(), 2);
        assert_eq!(state.next_value(), 1);
        // Odd value: shift then apply the 31-bit mask
        assert_eq!(state.next_value(), 0x4800_0000);
    }

    #[test]
    fn test_hash_known_value() {
        // seed 0: ((0 * (0 + c2)) + c1) & max = c1, then mixed
        let r = 1_376_312_589i32;
        let expected = ((r << 13) ^ r).wrapping_sub(r >> 21);
        assert_eq!(RandomState::hash(0), expected);
    }

    #[test]
    fn test_non_positive_range() {
        let mut state = RandomState::new(Some(7));
        assert_eq!(state.random(0), 0);
        assert_eq!(state.random(-5), 0);
        assert!(state.generate() >= 0);
    }
}
