use spirv_std::glam::{Vec2, Vec3, Vec4, Vec4Swizzles};
#[allow(unused_imports)]
use spirv_std::num_traits::Float;

const GAMMA: f32 = 2.2;
const DITHER_STRENGTH: f32 = 1.0 / 255.0;

// Narkowicz's ACES fit.
pub fn aces(color: Vec3) -> Vec3 {
    let a = 2.51;
    let b = 0.03;
    let c = 2.43;
    let d = 0.59;
    let e = 0.14;
    ((color * (a * color + b)) / (color * (c * color + d) + e)).clamp(Vec3::ZERO, Vec3::ONE)
}

// Jimenez gradient noise; one value per screen position.
pub fn gradient_noise(position: Vec2) -> f32 {
    let f = 52.9829189 * fract(position.dot(Vec2::new(0.06711056, 0.00583715)));
    fract(f)
}

fn fract(x: f32) -> f32 {
    x - x.floor()
}

/// Turns the linear accumulator into a display value: divide by the frame
/// count, tonemap, gamma, and a half-LSB ordered dither to hide banding.
pub fn resolve(accumulated: Vec4, frame_number: u32, position: Vec2) -> Vec4 {
    let linear = accumulated.xyz() / frame_number.max(1) as f32;
    let mapped = aces(linear).powf(1.0 / GAMMA);
    let dither = (gradient_noise(position) - 0.5) * DITHER_STRENGTH;
    (mapped + Vec3::splat(dither)).extend(1.0)
}
