use shared_structs::{
    AtlasMapping, Image, Material, Sampler, Uniforms, WRAP_MODE_CLAMP, WRAP_MODE_REPEAT,
};
use spirv_std::glam::{Vec2, Vec3, Vec4Swizzles};
#[allow(unused_imports)]
use spirv_std::num_traits::Float;

use crate::hit::HitPlace;

const GRID_SNAP: f32 = 1e-4;

/// Procedural texture registry. Colors are unit range; `uid` comes from the
/// negated material texture uid.
pub fn procedural_texture_select(
    uid: u32,
    local_position: Vec3,
    local_normal: Vec3,
    global_time: f32,
    dpdx: Vec3,
    dpdy: Vec3,
) -> Vec3 {
    match uid {
        1 => checkerboard(local_position),
        2 => grid_lines(local_position, dpdx, dpdy),
        3 => plasma(local_position, local_normal, global_time),
        _ => Vec3::ONE,
    }
}

fn checkerboard(p: Vec3) -> Vec3 {
    let cell = p.floor();
    let parity = (cell.x + cell.y + cell.z) as i32 & 1;
    if parity == 0 {
        Vec3::splat(0.9)
    } else {
        Vec3::splat(0.25)
    }
}

fn grid_lines(p: Vec3, dpdx: Vec3, dpdy: Vec3) -> Vec3 {
    // Line width follows the screen-space footprint so distant lines fade
    // instead of aliasing.
    let footprint = dpdx.length().max(dpdy.length()).max(1e-3);
    let width = (footprint * 2.0).min(0.45);
    let fx = p.x - p.x.floor();
    let fz = p.z - p.z.floor();
    let dist = fx.min(1.0 - fx).min(fz.min(1.0 - fz));
    if dist < width {
        Vec3::new(0.1, 0.1, 0.12)
    } else {
        Vec3::new(0.85, 0.85, 0.8)
    }
}

fn plasma(p: Vec3, n: Vec3, time: f32) -> Vec3 {
    let phase = (p.x * 3.0 + time).sin() + (p.z * 3.0 - time * 0.7).sin() + n.y;
    Vec3::new(
        0.5 + 0.5 * phase.sin(),
        0.5 + 0.5 * (phase + 2.094).sin(),
        0.5 + 0.5 * (phase + 4.188).sin(),
    )
}

// Discontinuous procedurals flicker when a hit point lands exactly on a cell
// edge; snapping removes the edge case.
fn snap_to_grid(p: Vec3) -> Vec3 {
    (p / GRID_SNAP).round() * GRID_SNAP
}

/// Albedo at a hit: flat color, procedural dispatch, or an atlas fetch with
/// derivative-driven filtering and per-axis wrap modes. An atlas sample that
/// lands outside a Discard region falls through to the flat albedo.
pub fn sample_albedo(
    material: &Material,
    uniforms: &Uniforms,
    atlas_mappings: &[AtlasMapping],
    local: &HitPlace,
    dpdx: Vec3,
    dpdy: Vec3,
    sampler: &Sampler,
    atlas: &Image!(2D, type=f32, sampled),
) -> Vec3 {
    let uid = material.albedo_texture_uid;
    if uid == 0 {
        return material.albedo;
    }
    if uid < 0 {
        return procedural_texture_select(
            (-uid) as u32,
            snap_to_grid(local.position),
            local.normal,
            uniforms.global_time_seconds,
            dpdx,
            dpdy,
        );
    }

    let mapping = &atlas_mappings[(uid - 1) as usize];
    let coord = mapping.map_position(local.position);
    let ddx = mapping.map_direction(dpdx);
    let ddy = mapping.map_direction(dpdy);

    // Gradients in atlas uv space feed both the anisotropic fetch and the
    // mip level that sizes the clamp inset.
    let ddx_atlas = ddx * mapping.size;
    let ddy_atlas = ddy * mapping.size;
    let texel_footprint = (ddx_atlas * uniforms.atlas_size)
        .length()
        .max((ddy_atlas * uniforms.atlas_size).length())
        .max(1.0);
    let level = (0.5 * texel_footprint.log2())
        .floor()
        .clamp(0.0, (uniforms.atlas_mip_levels - 1) as f32);
    let region_texels = mapping.size * uniforms.atlas_size / level.exp2();
    let inset = Vec2::splat(0.5) / region_texels;

    let mut alpha = 1.0;
    let wrapped = Vec2::new(
        wrap_axis(coord.x, mapping.wrap_mode_u, inset.x, &mut alpha),
        wrap_axis(coord.y, mapping.wrap_mode_v, inset.y, &mut alpha),
    );
    if alpha == 0.0 {
        return material.albedo;
    }

    let atlas_uv = mapping.top_left + wrapped * mapping.size;
    let sample = atlas.sample_by_gradient(*sampler, atlas_uv, ddx_atlas, ddy_atlas);
    material.albedo.lerp(sample.xyz(), alpha)
}

fn wrap_axis(coord: f32, mode: u32, inset: f32, alpha: &mut f32) -> f32 {
    match mode {
        WRAP_MODE_REPEAT => coord - coord.floor(),
        WRAP_MODE_CLAMP => coord.clamp(inset, 1.0 - inset),
        _ => {
            if coord < inset || coord > 1.0 - inset {
                *alpha = 0.0;
            }
            coord
        }
    }
}
