use spirv_std::glam::{Vec2, Vec3};
#[allow(unused_imports)]
use spirv_std::num_traits::Float;

pub const SDF_CLASS_SPHERE: u32 = 1;
pub const SDF_CLASS_ROUND_BOX: u32 = 2;
pub const SDF_CLASS_TORUS: u32 = 3;
pub const SDF_CLASS_PULSING_SPHERE: u32 = 4;

/// Signed distance of the selected analytic field at a local-frame point.
/// Unknown classes report "far away" so the sphere tracer classifies them as
/// a miss instead of crashing.
pub fn sdf_select(class_index: u32, point: Vec3, time: f32) -> f32 {
    match class_index {
        SDF_CLASS_SPHERE => sd_sphere(point, 1.0),
        SDF_CLASS_ROUND_BOX => sd_round_box(point, Vec3::splat(0.75), 0.1),
        SDF_CLASS_TORUS => sd_torus(point, Vec2::new(0.7, 0.25)),
        SDF_CLASS_PULSING_SPHERE => sd_sphere(point, pulse_radius(time)),
        _ => crate::util::MAX_DIST,
    }
}

/// Maps a local hit point back into the rest frame used for texture lookups.
/// Static classes are their own rest frame.
pub fn sdf_apply_animation(class_index: u32, point: Vec3, time: f32) -> Vec3 {
    match class_index {
        SDF_CLASS_PULSING_SPHERE => point / pulse_radius(time),
        _ => point,
    }
}

/// Conservative local-frame half extent, used when bounding an instance.
pub fn sdf_local_half_extent(class_index: u32) -> Vec3 {
    match class_index {
        SDF_CLASS_SPHERE => Vec3::splat(1.0),
        SDF_CLASS_ROUND_BOX => Vec3::splat(0.85),
        SDF_CLASS_TORUS => Vec3::new(0.95, 0.25, 0.95),
        SDF_CLASS_PULSING_SPHERE => Vec3::splat(1.0),
        _ => Vec3::splat(1.0),
    }
}

fn pulse_radius(time: f32) -> f32 {
    0.8 + 0.2 * (time * 2.0).sin()
}

fn sd_sphere(p: Vec3, radius: f32) -> f32 {
    p.length() - radius
}

fn sd_round_box(p: Vec3, half_extent: Vec3, rounding: f32) -> f32 {
    let q = p.abs() - half_extent + Vec3::splat(rounding);
    q.max(Vec3::ZERO).length() + q.max_element().min(0.0) - rounding
}

fn sd_torus(p: Vec3, radii: Vec2) -> f32 {
    let q = Vec2::new(Vec2::new(p.x, p.z).length() - radii.x, p.y);
    q.length() - radii.y
}
