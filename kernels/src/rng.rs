use spirv_std::glam::{Vec2, Vec3};
#[allow(unused_imports)]
use spirv_std::num_traits::Float;

const FRAME_SEED_SALT: u32 = 719393;

/// PCG-permuted 32-bit stream. One state value lives per invocation so
/// parallel pixels stay bit-stable regardless of scheduling.
pub struct RngState {
    state: u32,
}

impl RngState {
    #[cfg(target_arch = "spirv")]
    pub fn new(pixel_index: u32, frame_number: u32) -> Self {
        Self {
            state: pixel_index + frame_number * FRAME_SEED_SALT,
        }
    }

    #[cfg(not(target_arch = "spirv"))]
    pub fn new(pixel_index: u32, frame_number: u32) -> Self {
        Self {
            state: pixel_index.wrapping_add(frame_number.wrapping_mul(FRAME_SEED_SALT)),
        }
    }

    #[cfg(target_arch = "spirv")]
    fn next_word(&mut self) -> u32 {
        self.state = self.state * 747796405u32 + 2891336453u32;
        let word = ((self.state >> ((self.state >> 28u32) + 4u32)) ^ self.state) * 277803737u32;
        (word >> 22u32) ^ word
    }

    #[cfg(not(target_arch = "spirv"))]
    fn next_word(&mut self) -> u32 {
        self.state = self
            .state
            .wrapping_mul(747796405u32)
            .wrapping_add(2891336453u32);
        let word = ((self.state >> ((self.state >> 28u32) + 4u32)) ^ self.state)
            .wrapping_mul(277803737u32);
        (word >> 22u32) ^ word
    }

    /// Uniform in [0, 1).
    pub fn next_float(&mut self) -> f32 {
        const INV_U32_MAX_FLOAT: f32 = 1.0 / 4294967296.0;
        self.next_word() as f32 * INV_U32_MAX_FLOAT
    }

    pub fn next_vec2(&mut self) -> Vec2 {
        Vec2::new(self.next_float(), self.next_float())
    }
}

/// Deliberately low-quality position-seeded hash used only to jitter mirror
/// reflections in the deterministic pass; the PCG stream reads too uniform
/// there.
pub fn position_hash(p: Vec3) -> Vec3 {
    Vec3::new(
        hash_sin(p.dot(Vec3::new(127.1, 311.7, 74.7))),
        hash_sin(p.dot(Vec3::new(269.5, 183.3, 246.1))),
        hash_sin(p.dot(Vec3::new(113.5, 271.9, 124.6))),
    ) * 2.0
        - Vec3::ONE
}

fn hash_sin(x: f32) -> f32 {
    let s = x.sin() * 43758.5453;
    s - s.floor()
}
