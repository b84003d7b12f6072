//! Skip-link BVH construction over the mixed triangle/SDF primitive set.
//! Nodes are laid out in depth-first preorder so the hit path is always
//! `index + 1`; the miss path jumps over the subtree.

use glam::{Vec3, Vec4Swizzles};
use shared_structs::{
    BVHNode, SdfInstance, Triangle, BVH_NODE_INTERNAL, BVH_NODE_SDF, BVH_NODE_TRIANGLE,
};

/// World-space margin added to every AABB of the inflated copy. This widens
/// the support of the signed-distance field used by shadows and ambient
/// occlusion and must cover the largest occlusion sample height.
pub const BVH_INFLATION: f32 = 0.25;

pub struct FlatBvh {
    pub nodes: Vec<BVHNode>,
    /// Same topology and primitive indices, enlarged AABBs.
    pub inflated: Vec<BVHNode>,
}

struct BuildPrimitive {
    aabb_min: Vec3,
    aabb_max: Vec3,
    centroid: Vec3,
    primitive_index: u32,
    primitive_type: u32,
}

enum BuildNode {
    Leaf {
        aabb_min: Vec3,
        aabb_max: Vec3,
        primitive_index: u32,
        primitive_type: u32,
    },
    Internal {
        aabb_min: Vec3,
        aabb_max: Vec3,
        left: Box<BuildNode>,
        right: Box<BuildNode>,
    },
}

impl BuildNode {
    fn bounds(&self) -> (Vec3, Vec3) {
        match self {
            BuildNode::Leaf {
                aabb_min, aabb_max, ..
            } => (*aabb_min, *aabb_max),
            BuildNode::Internal {
                aabb_min, aabb_max, ..
            } => (*aabb_min, *aabb_max),
        }
    }
}

pub fn build_bvh(triangles: &[Triangle], sdf: &[SdfInstance]) -> FlatBvh {
    let mut primitives = Vec::with_capacity(triangles.len() + sdf.len());

    for (i, triangle) in triangles.iter().enumerate() {
        let a = triangle.a.xyz();
        let b = triangle.b.xyz();
        let c = triangle.c.xyz();
        primitives.push(BuildPrimitive {
            aabb_min: a.min(b).min(c),
            aabb_max: a.max(b).max(c),
            centroid: (a + b + c) / 3.0,
            primitive_index: i as u32,
            primitive_type: BVH_NODE_TRIANGLE,
        });
    }

    for (i, instance) in sdf.iter().enumerate() {
        let (aabb_min, aabb_max) = sdf_world_aabb(instance);
        primitives.push(BuildPrimitive {
            aabb_min,
            aabb_max,
            centroid: (aabb_min + aabb_max) * 0.5,
            primitive_index: i as u32,
            primitive_type: BVH_NODE_SDF,
        });
    }

    if primitives.is_empty() {
        return FlatBvh {
            nodes: vec![BVHNode::sentinel()],
            inflated: vec![BVHNode::sentinel()],
        };
    }

    let root = build_node(&mut primitives);
    let mut nodes = Vec::with_capacity(2 * (triangles.len() + sdf.len()));
    flatten(&root, &mut nodes);

    // A skip link past the end means "done".
    let len = nodes.len() as i32;
    for node in &mut nodes {
        if node.hit_miss_skip_link >= len {
            node.hit_miss_skip_link = -1;
        }
    }

    let inflated = nodes
        .iter()
        .map(|node| BVHNode {
            aabb_min: node.aabb_min - Vec3::splat(BVH_INFLATION),
            aabb_max: node.aabb_max + Vec3::splat(BVH_INFLATION),
            ..*node
        })
        .collect();

    FlatBvh { nodes, inflated }
}

/// Conservative world AABB of an SDF instance: the class's local bounding
/// box pushed through the instance transform corner by corner.
fn sdf_world_aabb(instance: &SdfInstance) -> (Vec3, Vec3) {
    let half_extent = kernels::sdf::sdf_local_half_extent(instance.class_index);
    let mut aabb_min = Vec3::splat(f32::INFINITY);
    let mut aabb_max = Vec3::splat(f32::NEG_INFINITY);
    for i in 0..8 {
        let corner = Vec3::new(
            if i & 1 == 0 { -1.0 } else { 1.0 },
            if i & 2 == 0 { -1.0 } else { 1.0 },
            if i & 4 == 0 { -1.0 } else { 1.0 },
        ) * half_extent;
        let world = instance.location.transform_point3(corner);
        aabb_min = aabb_min.min(world);
        aabb_max = aabb_max.max(world);
    }
    (aabb_min, aabb_max)
}

fn build_node(primitives: &mut [BuildPrimitive]) -> BuildNode {
    if primitives.len() == 1 {
        let p = &primitives[0];
        return BuildNode::Leaf {
            aabb_min: p.aabb_min,
            aabb_max: p.aabb_max,
            primitive_index: p.primitive_index,
            primitive_type: p.primitive_type,
        };
    }

    let mut centroid_min = Vec3::splat(f32::INFINITY);
    let mut centroid_max = Vec3::splat(f32::NEG_INFINITY);
    for p in primitives.iter() {
        centroid_min = centroid_min.min(p.centroid);
        centroid_max = centroid_max.max(p.centroid);
    }
    let extent = centroid_max - centroid_min;
    let mut axis = 0;
    if extent.y > extent.x {
        axis = 1;
    }
    if extent.z > extent[axis] {
        axis = 2;
    }

    // Midpoint split; fall back to a median split when all centroids land on
    // one side.
    let split = centroid_min[axis] + extent[axis] * 0.5;
    let mut mid = partition(primitives, |p| p.centroid[axis] < split);
    if mid == 0 || mid == primitives.len() {
        primitives.sort_unstable_by(|a, b| {
            a.centroid[axis]
                .partial_cmp(&b.centroid[axis])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        mid = primitives.len() / 2;
    }

    let (left_slice, right_slice) = primitives.split_at_mut(mid);
    let left = Box::new(build_node(left_slice));
    let right = Box::new(build_node(right_slice));

    let (left_min, left_max) = left.bounds();
    let (right_min, right_max) = right.bounds();
    BuildNode::Internal {
        aabb_min: left_min.min(right_min),
        aabb_max: left_max.max(right_max),
        left,
        right,
    }
}

fn partition<F: Fn(&BuildPrimitive) -> bool>(
    primitives: &mut [BuildPrimitive],
    predicate: F,
) -> usize {
    let mut a = 0;
    let mut b = primitives.len();
    while a < b {
        if predicate(&primitives[a]) {
            a += 1;
        } else {
            b -= 1;
            primitives.swap(a, b);
        }
    }
    a
}

fn flatten(node: &BuildNode, nodes: &mut Vec<BVHNode>) {
    let index = nodes.len();
    nodes.push(BVHNode::default());

    match node {
        BuildNode::Leaf {
            aabb_min,
            aabb_max,
            primitive_index,
            primitive_type,
        } => {
            nodes[index].aabb_min = *aabb_min;
            nodes[index].aabb_max = *aabb_max;
            nodes[index].primitive_index = *primitive_index;
            nodes[index].primitive_type = *primitive_type;
        }
        BuildNode::Internal {
            aabb_min,
            aabb_max,
            left,
            right,
        } => {
            nodes[index].aabb_min = *aabb_min;
            nodes[index].aabb_max = *aabb_max;
            nodes[index].primitive_type = BVH_NODE_INTERNAL;
            flatten(left, nodes);
            flatten(right, nodes);
        }
    }

    // Preorder guarantees the subtree occupies [index, len): the node after
    // it is where a miss resumes.
    nodes[index].hit_miss_skip_link = nodes.len() as i32;
}
