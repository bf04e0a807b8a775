//! Geometry & RNG primitives (spec.md §2, component C1).
//!
//! Mirrors the teacher's habit of keeping small math/RNG helpers in a leaf
//! module with no dependency on the simulation state
//! (`swarm/pheromone.rs`'s `bilinear_coords`, `gradient`).

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Axis-aligned simulation domain, recomputed every step when the domain is
/// "packed" (spec.md §4.5 step 1).
#[derive(Clone, Copy, Debug, Default)]
pub struct Domain {
    pub xmin: f32,
    pub xmax: f32,
    pub ymin: f32,
    pub ymax: f32,
}

impl Domain {
    pub fn square(half_width: f32) -> Self {
        Domain {
            xmin: -half_width,
            xmax: half_width,
            ymin: -half_width,
            ymax: half_width,
        }
    }

    pub fn rect(width: f32, height: f32) -> Self {
        Domain {
            xmin: -width / 2.0,
            xmax: width / 2.0,
            ymin: -height / 2.0,
            ymax: height / 2.0,
        }
    }

    /// Invariant 4: a free cell's position is clamped back inside the domain.
    #[inline]
    pub fn clamp(&self, x: f32, y: f32) -> (f32, f32) {
        (x.clamp(self.xmin, self.xmax), y.clamp(self.ymin, self.ymax))
    }
}

/// Deterministic RNG wrapper. A fixed seed (or a wall-clock-derived one, when
/// the pattern requests `seed == 0`) makes two runs byte-identical —
/// testable property #7.
pub struct SimRng {
    rng: StdRng,
    effective_seed: u64,
}

impl SimRng {
    /// `seed == 0` means "seed from wall clock" (spec.md §6, `use_seed`).
    /// The effective seed is recorded so a caller can log/reproduce it.
    pub fn new(seed: u64) -> Self {
        let effective_seed = if seed == 0 {
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or(0x9E3779B97F4A7C15)
        } else {
            seed
        };
        SimRng {
            rng: StdRng::seed_from_u64(effective_seed),
            effective_seed,
        }
    }

    pub fn effective_seed(&self) -> u64 {
        self.effective_seed
    }

    #[inline]
    pub fn uniform01(&mut self) -> f32 {
        self.rng.gen_range(0.0..1.0)
    }

    #[inline]
    pub fn range(&mut self, lo: f32, hi: f32) -> f32 {
        if lo >= hi {
            return lo;
        }
        self.rng.gen_range(lo..hi)
    }

    /// `deviate(v, d)`: `v` if `d == 0`, else uniform in `[v-d, v+d]`.
    #[inline]
    pub fn deviate(&mut self, value: f32, deviation: f32) -> f32 {
        if deviation == 0.0 {
            value
        } else {
            self.range(value - deviation, value + deviation)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deviate_is_identity_without_deviation() {
        let mut rng = SimRng::new(42);
        assert_eq!(rng.deviate(1.5, 0.0), 1.5);
    }

    #[test]
    fn same_seed_reproduces_sequence() {
        let mut a = SimRng::new(7);
        let mut b = SimRng::new(7);
        let seq_a: Vec<f32> = (0..10).map(|_| a.uniform01()).collect();
        let seq_b: Vec<f32> = (0..10).map(|_| b.uniform01()).collect();
        assert_eq!(seq_a, seq_b);
    }

    #[test]
    fn domain_clamp_keeps_point_inside() {
        let d = Domain::square(5.0);
        assert_eq!(d.clamp(10.0, -10.0), (5.0, -5.0));
        assert_eq!(d.clamp(1.0, 2.0), (1.0, 2.0));
    }
}
