use shared_structs::{Material, Parallelogram};
use spirv_std::glam::Vec3;
#[allow(unused_imports)]
use spirv_std::num_traits::Float;

use crate::rng::RngState;
use crate::util;

/// Index of the first emissive quad, or -1 when the scene has none. This is
/// the one light that importance sampling and the deterministic pass target.
pub fn find_first_emissive_quad(parallelograms: &[Parallelogram], count: u32, materials: &[Material]) -> i32 {
    for i in 0..count as usize {
        if materials[parallelograms[i].material_id as usize].is_emissive() {
            return i as i32;
        }
    }
    -1
}

/// Uniform point on the quad surface.
pub fn sample_quad_point(quad: &Parallelogram, rng: &mut RngState) -> Vec3 {
    let r = rng.next_vec2();
    quad.q + r.x * quad.u + r.y * quad.v
}

/// Solid-angle pdf of reaching `quad` from `origin` along `direction`.
/// Back faces have zero probability; parallel or off-quad directions report
/// the smallest positive float so a division stays finite.
pub fn quad_light_pdf(quad: &Parallelogram, origin: Vec3, direction: Vec3) -> f32 {
    let denom = direction.dot(quad.normal);
    if denom >= 0.0 {
        return 0.0;
    }
    if denom.abs() < 1e-8 {
        return util::MIN_FLOAT;
    }

    let t = (quad.d - quad.normal.dot(origin)) / denom;
    if t <= util::TMIN {
        return util::MIN_FLOAT;
    }

    let planar = origin + direction * t - quad.q;
    let alpha = quad.w.dot(planar.cross(quad.v));
    let beta = quad.w.dot(quad.u.cross(planar));
    if alpha < 0.0 || alpha > 1.0 || beta < 0.0 || beta > 1.0 {
        return util::MIN_FLOAT;
    }

    let distance_squared = t * t * direction.length_squared();
    let cosine = denom.abs() / direction.length();
    distance_squared / (cosine * quad.area())
}
