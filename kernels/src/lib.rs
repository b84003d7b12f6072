#![cfg_attr(target_arch = "spirv", no_std)]

use shared_structs::{
    AtlasMapping, BVHNode, Image, Material, Parallelogram, Sampler, SdfInstance, Triangle,
    Uniforms,
};
#[allow(unused_imports)]
use spirv_std::num_traits::Float;
use spirv_std::{glam, spirv};

use glam::{UVec2, UVec3, Vec2, Vec3, Vec4, Vec4Swizzles};

pub mod camera;
pub mod hit;
pub mod intersect;
pub mod light;
pub mod rng;
pub mod scatter;
pub mod scene;
pub mod sdf;
pub mod texture;
pub mod tonemap;
pub mod trace;
pub mod util;

use hit::HitRecord;
use rng::RngState;
use scene::SceneRefs;

fn pixel_index(uniforms: &Uniforms, pixel: UVec2) -> u32 {
    pixel.y * uniforms.thread_grid.x + pixel.x
}

fn trace_sample(
    scene: &SceneRefs,
    sampler: &Sampler,
    atlas: &Image!(2D, type=f32, sampled),
    pixel: UVec2,
    subpixel: Vec2,
    rng: &mut RngState,
) -> Vec3 {
    let coord = pixel.as_vec2() + subpixel;
    let ray = camera::pixel_ray(scene.uniforms, coord);
    let differentials = camera::pixel_ray_differentials(scene.uniforms, coord);
    trace::ray_color_monte_carlo(scene, sampler, atlas, ray, &differentials, rng)
}

/// One frame's worth of stochastic samples for a pixel. With subdivision 1 a
/// single jittered sample is taken; otherwise an NxN stratified grid is
/// averaged. The caller adds the result into the accumulator.
#[cfg_attr(target_arch = "spirv", inline(always))]
pub fn monte_carlo_pixel(
    pixel: UVec2,
    scene: &SceneRefs,
    sampler: &Sampler,
    atlas: &Image!(2D, type=f32, sampled),
) -> Vec4 {
    let mut rng = RngState::new(pixel_index(scene.uniforms, pixel), scene.uniforms.frame_number);
    let n = scene.uniforms.pixel_side_subdivision.max(1);

    let mut color = Vec3::ZERO;
    if n == 1 {
        let jitter = rng.next_vec2();
        color = trace_sample(scene, sampler, atlas, pixel, jitter, &mut rng);
    } else {
        let mut i = 0;
        while i < n {
            let mut j = 0;
            while j < n {
                let jitter = (Vec2::new(i as f32, j as f32) + rng.next_vec2()) / n as f32;
                color += trace_sample(scene, sampler, atlas, pixel, jitter, &mut rng);
                j += 1;
            }
            i += 1;
        }
        color /= (n * n) as f32;
    }

    color.extend(1.0)
}

/// One analytic frame for a pixel: a centered sample, or an NxN grid of
/// evenly spaced sub-pixel positions starting at the pixel corner. The
/// caller replaces the accumulator with the result.
#[cfg_attr(target_arch = "spirv", inline(always))]
pub fn deterministic_pixel(
    pixel: UVec2,
    scene: &SceneRefs,
    sampler: &Sampler,
    atlas: &Image!(2D, type=f32, sampled),
) -> Vec4 {
    let n = scene.uniforms.pixel_side_subdivision.max(1);

    let mut color = Vec3::ZERO;
    if n == 1 {
        let coord = pixel.as_vec2() + Vec2::splat(0.5);
        let ray = camera::pixel_ray(scene.uniforms, coord);
        let differentials = camera::pixel_ray_differentials(scene.uniforms, coord);
        color = trace::ray_color_deterministic(scene, sampler, atlas, ray, &differentials);
    } else {
        let mut i = 0;
        while i < n {
            let mut j = 0;
            while j < n {
                let coord = pixel.as_vec2() + Vec2::new(i as f32, j as f32) / n as f32;
                let ray = camera::pixel_ray(scene.uniforms, coord);
                let differentials = camera::pixel_ray_differentials(scene.uniforms, coord);
                color +=
                    trace::ray_color_deterministic(scene, sampler, atlas, ray, &differentials);
                j += 1;
            }
            i += 1;
        }
        color /= (n * n) as f32;
    }

    color.extend(1.0)
}

/// First-hit attributes for a pixel: object uid (0 on miss), textured
/// albedo, world normal. Idempotent within a frame.
#[cfg_attr(target_arch = "spirv", inline(always))]
pub fn surface_attributes_pixel(
    pixel: UVec2,
    scene: &SceneRefs,
    sampler: &Sampler,
    atlas: &Image!(2D, type=f32, sampled),
) -> (u32, Vec4, Vec4) {
    let coord = pixel.as_vec2() + Vec2::splat(0.5);
    let ray = camera::pixel_ray(scene.uniforms, coord);
    let differentials = camera::pixel_ray_differentials(scene.uniforms, coord);

    let mut rec = HitRecord::default();
    if !scene.intersect(&ray, util::TMIN, util::MAX_DIST, &mut rec) {
        return (0, Vec4::ZERO, Vec4::ZERO);
    }

    let (dpdx, dpdy) =
        camera::surface_derivatives(&ray, &differentials, rec.global.position, rec.global.normal);
    let material = scene.material(rec.material_id);
    let albedo = texture::sample_albedo(
        &material,
        scene.uniforms,
        scene.atlas_mappings,
        &rec.local,
        dpdx,
        dpdy,
        sampler,
        atlas,
    );

    (
        rec.object_uid,
        albedo.extend(1.0),
        rec.global.normal.extend(0.0),
    )
}

#[spirv(compute(threads(8, 8, 1)))]
#[allow(clippy::too_many_arguments)]
pub fn compute_color_buffer_monte_carlo(
    #[spirv(global_invocation_id)] id: UVec3,
    #[spirv(uniform, descriptor_set = 0, binding = 0)] uniforms: &Uniforms,
    #[spirv(storage_buffer, descriptor_set = 1, binding = 0)] pixel_color_buffer: &mut [Vec4],
    #[spirv(storage_buffer, descriptor_set = 2, binding = 0)] parallelograms: &[Parallelogram],
    #[spirv(storage_buffer, descriptor_set = 2, binding = 1)] triangles: &[Triangle],
    #[spirv(storage_buffer, descriptor_set = 2, binding = 2)] sdf: &[SdfInstance],
    #[spirv(storage_buffer, descriptor_set = 2, binding = 3)] sdf_time: &[f32],
    #[spirv(storage_buffer, descriptor_set = 2, binding = 4)] materials: &[Material],
    #[spirv(storage_buffer, descriptor_set = 2, binding = 5)] bvh: &[BVHNode],
    #[spirv(storage_buffer, descriptor_set = 2, binding = 6)] bvh_inflated: &[BVHNode],
    #[spirv(storage_buffer, descriptor_set = 2, binding = 7)] atlas_mappings: &[AtlasMapping],
    #[spirv(descriptor_set = 3, binding = 0)] sampler: &Sampler,
    #[spirv(descriptor_set = 3, binding = 1)] atlas: &Image!(2D, type=f32, sampled),
) {
    // Handle non-divisible workgroup grids.
    if id.x >= uniforms.width || id.y >= uniforms.height {
        return;
    }

    let scene = SceneRefs {
        uniforms,
        parallelograms,
        triangles,
        sdf,
        sdf_time,
        materials,
        bvh,
        bvh_inflated,
        atlas_mappings,
    };

    let pixel = UVec2::new(id.x, id.y);
    let color = monte_carlo_pixel(pixel, &scene, sampler, atlas);
    pixel_color_buffer[pixel_index(uniforms, pixel) as usize] += color;
}

#[spirv(compute(threads(8, 8, 1)))]
#[allow(clippy::too_many_arguments)]
pub fn compute_color_buffer_deterministic(
    #[spirv(global_invocation_id)] id: UVec3,
    #[spirv(uniform, descriptor_set = 0, binding = 0)] uniforms: &Uniforms,
    #[spirv(storage_buffer, descriptor_set = 1, binding = 0)] pixel_color_buffer: &mut [Vec4],
    #[spirv(storage_buffer, descriptor_set = 2, binding = 0)] parallelograms: &[Parallelogram],
    #[spirv(storage_buffer, descriptor_set = 2, binding = 1)] triangles: &[Triangle],
    #[spirv(storage_buffer, descriptor_set = 2, binding = 2)] sdf: &[SdfInstance],
    #[spirv(storage_buffer, descriptor_set = 2, binding = 3)] sdf_time: &[f32],
    #[spirv(storage_buffer, descriptor_set = 2, binding = 4)] materials: &[Material],
    #[spirv(storage_buffer, descriptor_set = 2, binding = 5)] bvh: &[BVHNode],
    #[spirv(storage_buffer, descriptor_set = 2, binding = 6)] bvh_inflated: &[BVHNode],
    #[spirv(storage_buffer, descriptor_set = 2, binding = 7)] atlas_mappings: &[AtlasMapping],
    #[spirv(descriptor_set = 3, binding = 0)] sampler: &Sampler,
    #[spirv(descriptor_set = 3, binding = 1)] atlas: &Image!(2D, type=f32, sampled),
) {
    if id.x >= uniforms.width || id.y >= uniforms.height {
        return;
    }

    let scene = SceneRefs {
        uniforms,
        parallelograms,
        triangles,
        sdf,
        sdf_time,
        materials,
        bvh,
        bvh_inflated,
        atlas_mappings,
    };

    let pixel = UVec2::new(id.x, id.y);
    let color = deterministic_pixel(pixel, &scene, sampler, atlas);
    pixel_color_buffer[pixel_index(uniforms, pixel) as usize] = color;
}

#[spirv(compute(threads(8, 8, 1)))]
#[allow(clippy::too_many_arguments)]
pub fn compute_surface_attributes_buffer(
    #[spirv(global_invocation_id)] id: UVec3,
    #[spirv(uniform, descriptor_set = 0, binding = 0)] uniforms: &Uniforms,
    #[spirv(storage_buffer, descriptor_set = 1, binding = 0)] object_id_buffer: &mut [u32],
    #[spirv(storage_buffer, descriptor_set = 1, binding = 1)] albedo_buffer: &mut [Vec4],
    #[spirv(storage_buffer, descriptor_set = 1, binding = 2)] normal_buffer: &mut [Vec4],
    #[spirv(storage_buffer, descriptor_set = 2, binding = 0)] parallelograms: &[Parallelogram],
    #[spirv(storage_buffer, descriptor_set = 2, binding = 1)] triangles: &[Triangle],
    #[spirv(storage_buffer, descriptor_set = 2, binding = 2)] sdf: &[SdfInstance],
    #[spirv(storage_buffer, descriptor_set = 2, binding = 3)] sdf_time: &[f32],
    #[spirv(storage_buffer, descriptor_set = 2, binding = 4)] materials: &[Material],
    #[spirv(storage_buffer, descriptor_set = 2, binding = 5)] bvh: &[BVHNode],
    #[spirv(storage_buffer, descriptor_set = 2, binding = 6)] bvh_inflated: &[BVHNode],
    #[spirv(storage_buffer, descriptor_set = 2, binding = 7)] atlas_mappings: &[AtlasMapping],
    #[spirv(descriptor_set = 3, binding = 0)] sampler: &Sampler,
    #[spirv(descriptor_set = 3, binding = 1)] atlas: &Image!(2D, type=f32, sampled),
) {
    if id.x >= uniforms.width || id.y >= uniforms.height {
        return;
    }

    let scene = SceneRefs {
        uniforms,
        parallelograms,
        triangles,
        sdf,
        sdf_time,
        materials,
        bvh,
        bvh_inflated,
        atlas_mappings,
    };

    let pixel = UVec2::new(id.x, id.y);
    let (object_uid, albedo, normal) = surface_attributes_pixel(pixel, &scene, sampler, atlas);
    let index = pixel_index(uniforms, pixel) as usize;
    object_id_buffer[index] = object_uid;
    albedo_buffer[index] = albedo;
    normal_buffer[index] = normal;
}

/// Full-screen triangle for the resolve pass.
#[spirv(vertex)]
pub fn vs(#[spirv(vertex_index)] vert_id: i32, #[spirv(position)] position: &mut Vec4) {
    let uv = Vec2::new(((vert_id << 1) & 2) as f32, (vert_id & 2) as f32);
    *position = (uv * 2.0 - Vec2::ONE).extend(0.0).extend(1.0);
}

/// Resolve: accumulator -> tonemapped, gamma-corrected, dithered display
/// value. The only place that touches the swap target.
#[spirv(fragment)]
pub fn fs(
    #[spirv(frag_coord)] frag_coord: Vec4,
    #[spirv(uniform, descriptor_set = 0, binding = 0)] uniforms: &Uniforms,
    #[spirv(storage_buffer, descriptor_set = 1, binding = 0)] pixel_color_buffer: &[Vec4],
    output: &mut Vec4,
) {
    let x = (frag_coord.x as u32).min(uniforms.width - 1);
    let y = (frag_coord.y as u32).min(uniforms.height - 1);
    let index = pixel_index(uniforms, UVec2::new(x, y)) as usize;
    *output = tonemap::resolve(
        pixel_color_buffer[index],
        uniforms.frame_number,
        frag_coord.xy(),
    );
}
