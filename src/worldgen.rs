// src/worldgen.rs
//
// Procedural demo content: an Fbm heightfield turned into colored point
// samples so the viewer has a scene without external data. World y is up;
// columns are sampled on the 2-unit grid the octree bottoms out at.

use noise::{Fbm, MultiFractal, NoiseFn, Perlin};
use rayon::prelude::*;

use crate::scene::pointset::Point;

/// Solid layers emitted below each surface sample, so shallow view angles
/// don't see through the crust.
const SKIRT: i32 = 4;

#[inline]
fn hash_u32(mut v: u32) -> u32 {
    v ^= v >> 16;
    v = v.wrapping_mul(0x7feb_352d);
    v ^= v >> 15;
    v = v.wrapping_mul(0x846c_a68b);
    v ^= v >> 16;
    v
}

#[inline]
fn hash2(seed: u32, x: i32, z: i32) -> u32 {
    let a = (x as u32).wrapping_mul(0x9e37_79b1);
    let b = (z as u32).wrapping_mul(0x85eb_ca6b);
    hash_u32(seed ^ a ^ b)
}

pub struct WorldGen {
    seed: u32,
    height: Fbm<Perlin>,
    moisture: Fbm<Perlin>,
}

impl WorldGen {
    pub fn new(seed: u32) -> Self {
        let height = Fbm::<Perlin>::new(seed).set_octaves(5).set_frequency(0.004);
        let moisture = Fbm::<Perlin>::new(seed ^ 0xa5a5_a5a5)
            .set_octaves(3)
            .set_frequency(0.02);
        Self {
            seed,
            height,
            moisture,
        }
    }

    pub fn ground_height(&self, x: i32, z: i32) -> i32 {
        let h = self.height.get([x as f64, z as f64]);
        (h * 48.0).round() as i32
    }

    fn surface_color(&self, x: i32, z: i32, h: i32) -> u32 {
        let wet = self.moisture.get([x as f64, z as f64]);
        // Small per-column jitter keeps flat regions from looking synthetic.
        let jitter = (hash2(self.seed, x, z) % 13) as i32 - 6;

        let (r, g, b) = if h < -24 {
            (30, 60, 140 + jitter)
        } else if h < -16 {
            (194 + jitter, 178 + jitter, 128)
        } else if h > 34 {
            (235 + jitter / 2, 235 + jitter / 2, 240)
        } else if h > 22 {
            (120 + jitter, 110 + jitter, 100)
        } else if wet > 0.1 {
            (40, 130 + jitter, 50)
        } else {
            (90 + jitter, 150 + jitter, 60)
        };

        0xff00_0000 | ((r.clamp(0, 255) as u32) << 16) | ((g.clamp(0, 255) as u32) << 8)
            | b.clamp(0, 255) as u32
    }

    /// Sample a square terrain patch of the given half-extent into points.
    /// Rows fan out across the thread pool; the renderer itself never runs
    /// in parallel.
    pub fn generate_points(&self, half: i32) -> Vec<Point> {
        (-half..half)
            .step_by(2)
            .collect::<Vec<_>>()
            .into_par_iter()
            .flat_map_iter(|z| {
                let mut row = Vec::with_capacity((half as usize) * (SKIRT as usize + 1));
                for x in (-half..half).step_by(2) {
                    let h = self.ground_height(x, z);
                    let color = self.surface_color(x, z, h);
                    for layer in 0..=SKIRT {
                        row.push(Point {
                            pos: [x, h - 2 * layer, z],
                            color,
                        });
                    }
                }
                row.into_iter()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_is_deterministic() {
        let a = WorldGen::new(7).generate_points(16);
        let b = WorldGen::new(7).generate_points(16);
        assert_eq!(a, b);
        assert!(!a.is_empty());
    }

    #[test]
    fn points_stay_inside_the_patch() {
        let half = 32;
        let pts = WorldGen::new(11).generate_points(half);
        for p in &pts {
            assert!(p.pos[0] >= -half && p.pos[0] < half);
            assert!(p.pos[2] >= -half && p.pos[2] < half);
            assert!(p.pos[1].abs() < 128);
            assert!(p.color >= 0xff00_0000);
        }
    }

    #[test]
    fn columns_have_a_solid_skirt() {
        let gen = WorldGen::new(3);
        let pts = gen.generate_points(8);
        let h = gen.ground_height(0, 0);
        for layer in 0..=SKIRT {
            assert!(pts
                .iter()
                .any(|p| p.pos == [0, h - 2 * layer, 0]));
        }
    }
}
