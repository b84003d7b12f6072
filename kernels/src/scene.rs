use shared_structs::{
    AtlasMapping, BVHNode, Material, Parallelogram, SdfInstance, Triangle, Uniforms,
    BVH_NODE_SDF, BVH_NODE_TRIANGLE,
};
use spirv_std::glam::Vec3;
#[allow(unused_imports)]
use spirv_std::num_traits::Float;

use crate::hit::{HitRecord, Ray};
use crate::intersect;
use crate::sdf;
use crate::util;

/// Borrowed view of the read-only scene buffers for one invocation.
/// Parallelograms sit outside the BVH and are tested linearly; triangles and
/// SDF instances are reached through the skip-link nodes.
pub struct SceneRefs<'a> {
    pub uniforms: &'a Uniforms,
    pub parallelograms: &'a [Parallelogram],
    pub triangles: &'a [Triangle],
    pub sdf: &'a [SdfInstance],
    pub sdf_time: &'a [f32],
    pub materials: &'a [Material],
    pub bvh: &'a [BVHNode],
    pub bvh_inflated: &'a [BVHNode],
    pub atlas_mappings: &'a [AtlasMapping],
}

impl<'a> SceneRefs<'a> {
    pub fn material(&self, material_id: u32) -> Material {
        self.materials[material_id as usize]
    }

    /// Closest hit over the whole scene. Returns false and leaves `rec`
    /// untouched when nothing lies in (tmin, tmax).
    pub fn intersect(&self, ray: &Ray, tmin: f32, tmax: f32, rec: &mut HitRecord) -> bool {
        let mut closest_so_far = tmax;
        let mut hit_anything = false;

        for i in 0..self.uniforms.parallelogram_count as usize {
            if intersect::parallelogram_hit(&self.parallelograms[i], ray, tmin, closest_so_far, rec)
            {
                hit_anything = true;
                closest_so_far = rec.t;
            }
        }

        hit_anything |= self.traverse_bvh(ray, tmin, closest_so_far, rec);
        hit_anything
    }

    /// Stackless hit/miss traversal: an AABB hit falls through to `index + 1`,
    /// a miss jumps along the skip link, -1 (or any link outside the array)
    /// terminates. Leaves test their primitive against the closest t so far.
    fn traverse_bvh(&self, ray: &Ray, tmin: f32, tmax: f32, rec: &mut HitRecord) -> bool {
        let node_count = self.uniforms.bvh_node_count as i32;
        let mut closest_so_far = tmax;
        let mut hit_anything = false;

        let mut index = 0i32;
        while index >= 0 && index < node_count {
            let node = &self.bvh[index as usize];
            let mut t_enter = 0.0;
            if intersect::aabb_hit(
                node.aabb_min,
                node.aabb_max,
                ray,
                tmin,
                closest_so_far,
                &mut t_enter,
            ) {
                match node.primitive_type {
                    BVH_NODE_TRIANGLE => {
                        let triangle = &self.triangles[node.primitive_index as usize];
                        if intersect::triangle_hit(triangle, ray, tmin, closest_so_far, rec) {
                            hit_anything = true;
                            closest_so_far = rec.t;
                        }
                    }
                    BVH_NODE_SDF => {
                        let instance = &self.sdf[node.primitive_index as usize];
                        let time = self.sdf_time[node.primitive_index as usize];
                        let march_tmin = tmin.max(t_enter);
                        if intersect::sdf_hit(instance, time, ray, march_tmin, closest_so_far, rec)
                        {
                            hit_anything = true;
                            closest_so_far = rec.t;
                        }
                    }
                    _ => {}
                }
                index += 1;
            } else {
                index = node.hit_miss_skip_link;
            }
        }

        hit_anything
    }

    /// Directional signed-distance estimate around `point`, gathered from
    /// every inflated leaf whose box contains the point. Triangle leaves
    /// contribute nothing; the inflation margin is what gives the field
    /// support beyond the exact surfaces.
    pub fn signed_distance(&self, point: Vec3, direction: Vec3) -> f32 {
        let node_count = self.uniforms.bvh_node_count as i32;
        let mut nearest = util::MAX_DIST;

        let mut index = 0i32;
        while index >= 0 && index < node_count {
            let node = &self.bvh_inflated[index as usize];
            if node.contains(point) {
                if node.primitive_type == BVH_NODE_SDF {
                    let instance = &self.sdf[node.primitive_index as usize];
                    let time = self.sdf_time[node.primitive_index as usize];
                    nearest = nearest.min(directional_distance(instance, time, point, direction));
                }
                index += 1;
            } else {
                index = node.hit_miss_skip_link;
            }
        }

        nearest
    }
}

fn directional_distance(instance: &SdfInstance, time: f32, point: Vec3, direction: Vec3) -> f32 {
    let local_point = instance.inverse_location.transform_point3(point);
    let local_direction = instance
        .inverse_location
        .transform_vector3(direction)
        .normalize();
    let local_distance = sdf::sdf_select(instance.class_index, local_point, time);
    let candidate = instance
        .location
        .transform_point3(local_point + local_direction * local_distance);
    let offset = candidate - point;
    let sign = if direction.dot(offset) >= 0.0 { 1.0 } else { -1.0 };
    offset.length() * sign
}
