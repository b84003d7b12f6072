use shared_structs::{Parallelogram, SdfInstance, Triangle};
use spirv_std::glam::{Mat3, Vec3, Vec4Swizzles};
#[allow(unused_imports)]
use spirv_std::num_traits::Float;

use crate::hit::{HitRecord, Ray};
use crate::sdf;

const SPHERE_TRACE_MAX_STEPS: u32 = 120;
const GRADIENT_OFFSET: f32 = 0.5773 * 5e-4;

/// Back-face culled quad test. A hit recovers the planar barycentrics from
/// the precomputed `w` vector; the local frame is centered at the quad middle
/// so quads share the texturing convention of SDF primitives.
pub fn parallelogram_hit(
    quad: &Parallelogram,
    ray: &Ray,
    tmin: f32,
    tmax: f32,
    rec: &mut HitRecord,
) -> bool {
    let denom = ray.direction.dot(quad.normal);
    if denom > -1e-8 {
        return false;
    }

    let t = (quad.d - quad.normal.dot(ray.origin)) / denom;
    if t <= tmin || t >= tmax {
        return false;
    }

    let planar = ray.at(t) - quad.q;
    let alpha = quad.w.dot(planar.cross(quad.v));
    let beta = quad.w.dot(quad.u.cross(planar));
    if alpha < 0.0 || alpha > 1.0 || beta < 0.0 || beta > 1.0 {
        return false;
    }

    let offset = alpha * quad.u + beta * quad.v;
    rec.global.position = quad.q + offset;
    rec.global.normal = quad.normal;
    rec.local.position = offset - 0.5 * (quad.u + quad.v);
    rec.local.normal = quad.normal;
    rec.t = t;
    rec.material_id = quad.material_id;
    rec.object_uid = quad.object_uid;
    rec.front_face = true;
    true
}

/// Moller-Trumbore with the determinant taken against the geometric normal.
/// Barycentrics below `tmin` are rejected, which doubles as the degenerate
/// determinant guard at grazing incidence.
pub fn triangle_hit(
    triangle: &Triangle,
    ray: &Ray,
    tmin: f32,
    tmax: f32,
    rec: &mut HitRecord,
) -> bool {
    let a = triangle.a.xyz();
    let ab = triangle.b.xyz() - a;
    let ac = triangle.c.xyz() - a;
    let n = ab.cross(ac);

    let det = -ray.direction.dot(n);
    if det.abs() < tmin {
        return false;
    }
    let inv_det = 1.0 / det;

    let ao = ray.origin - a;
    let dao = ao.cross(ray.direction);
    let dst = ao.dot(n) * inv_det;
    let u = ac.dot(dao) * inv_det;
    let v = -ab.dot(dao) * inv_det;
    let w = 1.0 - u - v;
    if dst <= tmin || dst >= tmax || u < tmin || v < tmin || w < tmin {
        return false;
    }

    let position = a * w + triangle.b.xyz() * u + triangle.c.xyz() * v;
    let mut normal = (triangle.normal_a.xyz() * w
        + triangle.normal_b.xyz() * u
        + triangle.normal_c.xyz() * v)
        .normalize();
    let front_face = det > 0.0;
    if !front_face {
        normal = -normal;
    }

    rec.global.position = position;
    rec.global.normal = normal;
    rec.local.position = position;
    rec.local.normal = normal;
    rec.t = dst;
    rec.material_id = triangle.material_id;
    rec.object_uid = triangle.object_uid;
    rec.front_face = front_face;
    true
}

/// Slab test. `out_t_enter` carries the entry distance so SDF leaves can
/// start their march at the box boundary instead of the ray origin.
pub fn aabb_hit(
    aabb_min: Vec3,
    aabb_max: Vec3,
    ray: &Ray,
    tmin: f32,
    tmax: f32,
    out_t_enter: &mut f32,
) -> bool {
    let t1 = (aabb_min - ray.origin) / ray.direction;
    let t2 = (aabb_max - ray.origin) / ray.direction;
    let t_enter = tmin.max(t1.min(t2).max_element());
    let t_exit = tmax.min(t1.max(t2).min_element());
    *out_t_enter = t_enter;
    t_exit > t_enter
}

/// Sphere-traces one SDF instance in its local frame. The march epsilon is
/// relative (1e-4 * t) so grazing rays do not falsely converge, and a step
/// budget of 120 classifies stragglers as misses.
pub fn sdf_hit(
    instance: &SdfInstance,
    time: f32,
    ray: &Ray,
    tmin: f32,
    tmax: f32,
    rec: &mut HitRecord,
) -> bool {
    let local_origin = instance.inverse_location.transform_point3(ray.origin);
    let local_direction = instance
        .inverse_location
        .transform_vector3(ray.direction)
        .normalize();

    let local_tmin =
        (instance.inverse_location.transform_point3(ray.at(tmin)) - local_origin).length();
    let local_tmax =
        (instance.inverse_location.transform_point3(ray.at(tmax)) - local_origin).length();

    let front_face = sdf::sdf_select(instance.class_index, local_origin, time) >= 0.0;

    let mut t = local_tmin;
    let mut converged = false;
    let mut step = 0;
    while step < SPHERE_TRACE_MAX_STEPS {
        let distance = sdf::sdf_select(instance.class_index, local_origin + local_direction * t, time);
        let epsilon = 1e-4 * t;
        if distance.abs() < epsilon {
            converged = true;
            break;
        }
        t += (distance.abs() * instance.ray_marching_step_scale).max(epsilon);
        if t >= local_tmax {
            break;
        }
        step += 1;
    }
    if !converged {
        return false;
    }

    let candidate = local_origin + local_direction * t;
    let mut local_normal = sdf_gradient(instance.class_index, candidate, time);
    let mut global_normal = (Mat3::from_mat4(instance.inverse_location).transpose()
        * local_normal)
        .normalize();
    if !front_face {
        local_normal = -local_normal;
        global_normal = -global_normal;
    }

    let global_position = instance.location.transform_point3(candidate);
    let world_t = (global_position - ray.origin).length();
    if world_t <= tmin || world_t >= tmax {
        return false;
    }

    rec.global.position = global_position;
    rec.global.normal = global_normal;
    rec.local.position = sdf::sdf_apply_animation(instance.class_index, candidate, time);
    rec.local.normal = local_normal;
    rec.t = world_t;
    rec.material_id = instance.material_id;
    rec.object_uid = instance.object_uid;
    rec.front_face = front_face;
    true
}

// Tetrahedral central difference.
fn sdf_gradient(class_index: u32, point: Vec3, time: f32) -> Vec3 {
    let k0 = Vec3::new(1.0, -1.0, -1.0);
    let k1 = Vec3::new(-1.0, -1.0, 1.0);
    let k2 = Vec3::new(-1.0, 1.0, -1.0);
    let k3 = Vec3::new(1.0, 1.0, 1.0);
    (k0 * sdf::sdf_select(class_index, point + k0 * GRADIENT_OFFSET, time)
        + k1 * sdf::sdf_select(class_index, point + k1 * GRADIENT_OFFSET, time)
        + k2 * sdf::sdf_select(class_index, point + k2 * GRADIENT_OFFSET, time)
        + k3 * sdf::sdf_select(class_index, point + k3 * GRADIENT_OFFSET, time))
    .normalize()
}
