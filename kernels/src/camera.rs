use shared_structs::Uniforms;
use spirv_std::glam::{Mat4, Vec2, Vec3, Vec4Swizzles};
#[allow(unused_imports)]
use spirv_std::num_traits::Float;

use crate::hit::Ray;

/// 1 / tan(30 degrees); fixed vertical field of view.
pub const FOV_FACTOR: f32 = 1.732_050_8;

/// Directions of the rays one pixel over along each screen axis, cast with
/// the same sub-pixel offset as the primary ray.
#[derive(Copy, Clone, Default)]
pub struct RayDifferentials {
    pub dx: Vec3,
    pub dy: Vec3,
}

fn pixel_point(uniforms: &Uniforms, pixel: Vec2) -> Vec3 {
    let s = uniforms.aspect * (2.0 * pixel.x * uniforms.inv_size.x - 1.0);
    let t = -(2.0 * pixel.y * uniforms.inv_size.y - 1.0);
    let eye = uniforms.view.w_axis.xyz();
    eye + transform_direction(&uniforms.view, Vec3::new(s, t, -FOV_FACTOR))
}

fn transform_direction(m: &Mat4, v: Vec3) -> Vec3 {
    (m.x_axis.xyz() * v.x) + (m.y_axis.xyz() * v.y) + (m.z_axis.xyz() * v.z)
}

/// Camera ray through `pixel` (fractional pixel coordinates, origin top
/// left). The ray origin goes through `view_ray_origin`, which collapses to
/// the camera position for perspective and varies per pixel for
/// orthographic; both share this single code path.
pub fn pixel_ray(uniforms: &Uniforms, pixel: Vec2) -> Ray {
    let point = pixel_point(uniforms, pixel);
    let origin = uniforms.view_ray_origin.transform_point3(point);
    Ray::new(origin, point - origin)
}

pub fn pixel_ray_differentials(uniforms: &Uniforms, pixel: Vec2) -> RayDifferentials {
    RayDifferentials {
        dx: pixel_ray(uniforms, pixel + Vec2::X).direction,
        dy: pixel_ray(uniforms, pixel + Vec2::Y).direction,
    }
}

/// Position-space derivatives dp/dx, dp/dy at a surface point, from the
/// plane-tangent approximation: the offset rays are intersected with the
/// plane through the hit. Only exact at the first surface; later bounces
/// reuse the same differentials unchanged.
pub fn surface_derivatives(
    ray: &Ray,
    differentials: &RayDifferentials,
    position: Vec3,
    normal: Vec3,
) -> (Vec3, Vec3) {
    let plane_distance = (position - ray.origin).dot(normal);
    (
        offset_ray_delta(ray, differentials.dx, position, normal, plane_distance),
        offset_ray_delta(ray, differentials.dy, position, normal, plane_distance),
    )
}

fn offset_ray_delta(
    ray: &Ray,
    offset_direction: Vec3,
    position: Vec3,
    normal: Vec3,
    plane_distance: f32,
) -> Vec3 {
    let denom = offset_direction.dot(normal);
    if denom.abs() < 1e-8 {
        return Vec3::ZERO;
    }
    ray.origin + offset_direction * (plane_distance / denom) - position
}
