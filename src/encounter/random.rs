use std::collections::VecDeque;

use rand::{Rng, RngCore, SeedableRng};
use rand_pcg::Lcg64Xsh32;

/// Source of the uniform choices the Enemy Director makes.
pub trait RandomSource: Send {
    /// An index in `0..len`. Callers never pass `len == 0`.
    fn pick(&mut self, len: usize) -> usize;
}

/// PCG-backed source; reproducible when built from a seed.
#[derive(Debug, Clone)]
pub struct PcgRandom {
    rng: Lcg64Xsh32,
}

impl PcgRandom {
    pub fn from_seed(seed: u64) -> Self {
        let mut seed_bytes: [u8; 16] = [0u8; 16];
        // fill with two copies of the u64
        seed_bytes[0..8].copy_from_slice(&seed.to_le_bytes());
        seed_bytes[8..16].copy_from_slice(&seed.to_le_bytes());
        PcgRandom {
            rng: Lcg64Xsh32::from_seed(seed_bytes),
        }
    }

    pub fn from_entropy() -> Self {
        Self::from_seed(rand::thread_rng().next_u64())
    }
}

impl RandomSource for PcgRandom {
    fn pick(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }
}

/// Replays a fixed list of choices, wrapping each into range; `0` once exhausted.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRandom {
    choices: VecDeque<usize>,
}

impl ScriptedRandom {
    pub fn new(choices: impl IntoIterator<Item = usize>) -> Self {
        ScriptedRandom {
            choices: choices.into_iter().collect(),
        }
    }
}

impl RandomSource for ScriptedRandom {
    fn pick(&mut self, len: usize) -> usize {
        self.choices.pop_front().unwrap_or(0) % len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_choices() {
        let mut a = PcgRandom::from_seed(99);
        let mut b = PcgRandom::from_seed(99);
        let left: Vec<usize> = (0..32).map(|_| a.pick(7)).collect();
        let right: Vec<usize> = (0..32).map(|_| b.pick(7)).collect();
        assert_eq!(left, right);
        assert!(left.iter().all(|i| *i < 7));
    }

    #[test]
    fn scripted_choices_wrap_and_default() {
        let mut r = ScriptedRandom::new([1, 5]);
        assert_eq!(r.pick(3), 1);
        assert_eq!(r.pick(3), 2);
        assert_eq!(r.pick(3), 0);
    }
}
