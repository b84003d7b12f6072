#![no_std]

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, UVec2, Vec2, Vec3, Vec4};

mod image_polyfill;
pub use image_polyfill::polyfill::*;

pub const MATERIAL_CLASS_LAMBERTIAN: u32 = 0;
pub const MATERIAL_CLASS_MIRROR: u32 = 1;
pub const MATERIAL_CLASS_GLASS: u32 = 2;
pub const MATERIAL_CLASS_ISOTROPIC: u32 = 3;

pub const WRAP_MODE_REPEAT: u32 = 0;
pub const WRAP_MODE_CLAMP: u32 = 1;
pub const WRAP_MODE_DISCARD: u32 = 2;

pub const BVH_NODE_INTERNAL: u32 = 0;
pub const BVH_NODE_SDF: u32 = 1;
pub const BVH_NODE_TRIANGLE: u32 = 2;

/// Per-frame render parameters, uploaded once per dispatch.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct Uniforms {
    /// Camera-to-world. Column 3 is the camera origin.
    pub view: Mat4,
    /// Maps a world-space pixel point to the ray origin. A zeroed linear part
    /// with the camera origin in the translation column yields a perspective
    /// camera; a forward-axis projector yields an orthographic one.
    pub view_ray_origin: Mat4,
    pub inv_size: Vec2,
    pub aspect: f32,
    pub global_time_seconds: f32,
    pub atlas_size: Vec2,
    pub width: u32,
    pub height: u32,
    pub pixel_count: u32,
    pub frame_number: u32,
    pub pixel_side_subdivision: u32,
    pub atlas_mip_levels: u32,
    pub parallelogram_count: u32,
    pub triangle_count: u32,
    pub sdf_count: u32,
    pub bvh_node_count: u32,
    pub thread_grid: UVec2,
    pub _padding: [u32; 2],
}

impl Default for Uniforms {
    fn default() -> Self {
        Self {
            view: Mat4::IDENTITY,
            view_ray_origin: Mat4::ZERO,
            inv_size: Vec2::ONE,
            aspect: 1.0,
            global_time_seconds: 0.0,
            atlas_size: Vec2::ONE,
            width: 1,
            height: 1,
            pixel_count: 1,
            frame_number: 1,
            pixel_side_subdivision: 1,
            atlas_mip_levels: 1,
            parallelogram_count: 0,
            triangle_count: 0,
            sdf_count: 0,
            bvh_node_count: 0,
            thread_grid: UVec2::ONE,
            _padding: [0; 2],
        }
    }
}

/// Immutable surface description, one entry per material id.
///
/// `albedo_texture_uid` is signed: negative selects procedural texture
/// `-uid`, positive selects atlas region `uid - 1`, zero means flat albedo.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct Material {
    pub albedo: Vec3,
    pub specular_strength: f32,
    pub specular: Vec3,
    pub roughness: f32,
    pub emission: Vec3,
    pub refraction_index: f32,
    pub albedo_texture_uid: i32,
    pub material_class: u32,
    pub _padding: [u32; 2],
}

impl Default for Material {
    fn default() -> Self {
        Self {
            albedo: Vec3::ONE,
            specular_strength: 0.0,
            specular: Vec3::ONE,
            roughness: 0.0,
            emission: Vec3::ZERO,
            refraction_index: 1.0,
            albedo_texture_uid: 0,
            material_class: MATERIAL_CLASS_LAMBERTIAN,
            _padding: [0; 2],
        }
    }
}

impl Material {
    pub fn is_emissive(&self) -> bool {
        self.emission != Vec3::ZERO
    }
}

/// Planar quad spanned by `u` and `v` from corner `q`. The plane data
/// (`normal`, `d`, `w`) is precomputed on upload so the intersection test
/// only recovers the planar barycentrics.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct Parallelogram {
    pub q: Vec3,
    pub d: f32,
    pub u: Vec3,
    pub material_id: u32,
    pub v: Vec3,
    pub object_uid: u32,
    pub normal: Vec3,
    pub _padding0: u32,
    pub w: Vec3,
    pub _padding1: u32,
}

impl Parallelogram {
    pub fn new(q: Vec3, u: Vec3, v: Vec3, material_id: u32, object_uid: u32) -> Self {
        let n = u.cross(v);
        let normal = n.normalize();
        Self {
            q,
            d: normal.dot(q),
            u,
            material_id,
            v,
            object_uid,
            normal,
            _padding0: 0,
            w: n / n.length_squared(),
            _padding1: 0,
        }
    }

    pub fn center(&self) -> Vec3 {
        self.q + 0.5 * (self.u + self.v)
    }

    pub fn area(&self) -> f32 {
        self.u.cross(self.v).length()
    }
}

/// Triangle with per-vertex normals. The `w` lanes of the vertex vectors are
/// unused padding.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct Triangle {
    pub a: Vec4,
    pub b: Vec4,
    pub c: Vec4,
    pub normal_a: Vec4,
    pub normal_b: Vec4,
    pub normal_c: Vec4,
    pub material_id: u32,
    pub object_uid: u32,
    pub _padding: [u32; 2],
}

impl Triangle {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        a: Vec3,
        b: Vec3,
        c: Vec3,
        normal_a: Vec3,
        normal_b: Vec3,
        normal_c: Vec3,
        material_id: u32,
        object_uid: u32,
    ) -> Self {
        Self {
            a: a.extend(0.0),
            b: b.extend(0.0),
            c: c.extend(0.0),
            normal_a: normal_a.extend(0.0),
            normal_b: normal_b.extend(0.0),
            normal_c: normal_c.extend(0.0),
            material_id,
            object_uid,
            _padding: [0; 2],
        }
    }

    /// Flat-shaded triangle; all three vertex normals get the face normal.
    pub fn flat(a: Vec3, b: Vec3, c: Vec3, material_id: u32, object_uid: u32) -> Self {
        let n = (b - a).cross(c - a).normalize();
        Self::new(a, b, c, n, n, n, material_id, object_uid)
    }
}

/// One instanced signed-distance primitive. The analytic field is selected by
/// `class_index` from the registry; `location` maps object to world and
/// `inverse_location` is its precomputed inverse. Per-instance animation time
/// lives in a parallel `sdf_time` array.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct SdfInstance {
    pub location: Mat4,
    pub inverse_location: Mat4,
    pub ray_marching_step_scale: f32,
    pub class_index: u32,
    pub material_id: u32,
    pub object_uid: u32,
}

impl SdfInstance {
    pub fn new(
        location: Mat4,
        ray_marching_step_scale: f32,
        class_index: u32,
        material_id: u32,
        object_uid: u32,
    ) -> Self {
        Self {
            location,
            inverse_location: location.inverse(),
            ray_marching_step_scale,
            class_index,
            material_id,
            object_uid,
        }
    }
}

/// Flattened BVH node in hit/miss skip-link form. On an AABB hit traversal
/// continues at `index + 1`; on a miss it jumps to `hit_miss_skip_link`; -1
/// terminates. `primitive_index` addresses the triangle or SDF array
/// depending on `primitive_type`.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable, Default)]
pub struct BVHNode {
    pub aabb_min: Vec3,
    pub primitive_index: u32,
    pub aabb_max: Vec3,
    pub primitive_type: u32,
    pub hit_miss_skip_link: i32,
    pub _padding: [u32; 3],
}

impl BVHNode {
    /// Placeholder for scenes with no BVH primitives. Its point AABB matches
    /// nothing useful and both exits terminate traversal.
    pub fn sentinel() -> Self {
        Self {
            aabb_min: Vec3::ZERO,
            primitive_index: 0,
            aabb_max: Vec3::ZERO,
            primitive_type: BVH_NODE_INTERNAL,
            hit_miss_skip_link: -1,
            _padding: [0; 3],
        }
    }

    pub fn contains(&self, point: Vec3) -> bool {
        point.cmpge(self.aabb_min).all() && point.cmple(self.aabb_max).all()
    }
}

/// Maps a region of the shared atlas page. The 2x4 `uv_transform` rows map a
/// homogeneous local position to an unclamped region-space coordinate, which
/// lets the CPU encode planar projections of any orientation.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct AtlasMapping {
    pub uv_transform: [Vec4; 2],
    pub top_left: Vec2,
    pub size: Vec2,
    pub wrap_mode_u: u32,
    pub wrap_mode_v: u32,
}

impl AtlasMapping {
    pub fn map_position(&self, local_position: Vec3) -> Vec2 {
        let p = local_position.extend(1.0);
        Vec2::new(self.uv_transform[0].dot(p), self.uv_transform[1].dot(p))
    }

    pub fn map_direction(&self, local_direction: Vec3) -> Vec2 {
        let v = local_direction.extend(0.0);
        Vec2::new(self.uv_transform[0].dot(v), self.uv_transform[1].dot(v))
    }
}
