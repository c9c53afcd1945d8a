//! Seed management and dice helpers for zone generation.
//!
//! Every generation system draws from an explicitly injected `ChaCha8Rng`
//! rather than ambient global randomness, so any run can be replayed from
//! its seeds. Sub-seeds are derived from a master seed per system and per
//! zone, allowing individual systems to be varied while others stay fixed.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Derive a named sub-seed from a master seed.
pub fn derive_seed(master: u64, label: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    master.hash(&mut hasher);
    label.hash(&mut hasher);
    hasher.finish()
}

/// Combine a master seed with map/zone coordinates deterministically.
pub fn zone_seed(master: u64, map_id: u32, zone_index: usize) -> u64 {
    let mut h = master;
    h = h.wrapping_mul(0x517cc1b727220a95);
    h ^= map_id as u64;
    h = h.wrapping_mul(0x517cc1b727220a95);
    h ^= zone_index as u64;
    h = h.wrapping_mul(0x517cc1b727220a95);
    h
}

/// Build the rng for one zone's generation run.
pub fn zone_rng(master: u64, map_id: u32, zone_index: usize) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(zone_seed(master, map_id, zone_index))
}

/// Inclusive-range and percent-chance rolls on top of any `Rng`.
///
/// The generators express their probabilities as integer percentages
/// (`randomness`, `remove`, spawn weights), so the helpers speak that
/// language directly.
pub trait Dice: Rng {
    /// Uniform integer in `[min, max]`, both ends inclusive.
    fn roll(&mut self, min: i32, max: i32) -> i32 {
        if min >= max {
            return min;
        }
        self.gen_range(min..=max)
    }

    /// True with probability `percent / 100`.
    fn chance(&mut self, percent: u32) -> bool {
        if percent >= 100 {
            return true;
        }
        self.gen_range(0..100) < percent
    }

    /// Uniform real in `[0, 1)`.
    fn fraction(&mut self) -> f64 {
        self.gen::<f64>()
    }
}

impl<R: Rng + ?Sized> Dice for R {}
