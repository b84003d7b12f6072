use glam::{Mat4, Vec2, Vec3, Vec4};
use rand::{Rng, SeedableRng};

use kernels::hit::{HitPlace, HitRecord, Ray};
use kernels::scene::SceneRefs;
use kernels::{intersect, rng, scatter, sdf, texture, util};
use shared_structs::{
    AtlasMapping, CpuImage, Material, Parallelogram, Sampler, SdfInstance, Triangle, Uniforms,
    MATERIAL_CLASS_GLASS, MATERIAL_CLASS_MIRROR, WRAP_MODE_CLAMP, WRAP_MODE_DISCARD,
    WRAP_MODE_REPEAT,
};

fn empty_scene_uniforms(bvh_node_count: u32) -> Uniforms {
    Uniforms {
        bvh_node_count,
        ..Default::default()
    }
}

#[test]
fn pcg_stream_is_bit_stable_and_in_range() {
    let mut a = rng::RngState::new(42, 7);
    let mut b = rng::RngState::new(42, 7);
    for _ in 0..256 {
        let x = a.next_float();
        assert_eq!(x, b.next_float());
        assert!((0.0..1.0).contains(&x));
    }

    let mut c = rng::RngState::new(42, 7);
    let mut d = rng::RngState::new(43, 7);
    assert_ne!(c.next_float(), d.next_float());
}

#[test]
fn reflect_is_an_involution() {
    let direction = Vec3::new(0.3, -0.7, 0.2).normalize();
    let normal = Vec3::new(0.1, 0.9, -0.2).normalize();
    let twice = util::reflect(util::reflect(direction, normal), normal);
    assert!((twice - direction).length() < 1e-5);
}

#[test]
fn parallelogram_center_round_trip() {
    let quad = Parallelogram::new(
        Vec3::new(-1.0, -1.0, -2.0),
        Vec3::new(2.0, 0.0, 0.0),
        Vec3::new(0.0, 2.0, 0.0),
        0,
        1,
    );
    let target = quad.center();
    let ray = Ray::new(Vec3::ZERO, target);

    let mut rec = HitRecord::default();
    assert!(intersect::parallelogram_hit(
        &quad,
        &ray,
        util::TMIN,
        util::MAX_DIST,
        &mut rec
    ));
    assert!((rec.t - target.length()).abs() < 1e-5);
    assert!((rec.global.position - target).length() < 1e-5);
    // alpha = beta = 0.5 lands on the centered local origin
    assert!(rec.local.position.length() < 1e-5);
    assert!((rec.global.normal.length() - 1.0).abs() < 1e-5);
    assert!(rec.front_face);
}

#[test]
fn parallelogram_grazing_and_backface_miss() {
    let quad = Parallelogram::new(
        Vec3::new(-1.0, -1.0, -2.0),
        Vec3::new(2.0, 0.0, 0.0),
        Vec3::new(0.0, 2.0, 0.0),
        0,
        1,
    );

    let grazing = Ray::new(Vec3::ZERO, Vec3::X);
    let mut rec = HitRecord::default();
    assert!(!intersect::parallelogram_hit(
        &quad,
        &grazing,
        util::TMIN,
        util::MAX_DIST,
        &mut rec
    ));

    let from_behind = Ray::new(Vec3::new(0.0, 0.0, -4.0), Vec3::Z);
    assert!(!intersect::parallelogram_hit(
        &quad,
        &from_behind,
        util::TMIN,
        util::MAX_DIST,
        &mut rec
    ));
}

#[test]
fn triangle_hit_reports_interpolated_data() {
    let triangle = Triangle::flat(
        Vec3::new(-1.0, -1.0, -2.0),
        Vec3::new(1.0, -1.0, -2.0),
        Vec3::new(0.0, 1.0, -2.0),
        3,
        9,
    );
    let ray = Ray::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0));

    let mut rec = HitRecord::default();
    assert!(intersect::triangle_hit(
        &triangle,
        &ray,
        util::TMIN,
        util::MAX_DIST,
        &mut rec
    ));
    assert!((rec.t - 2.0).abs() < 1e-5);
    assert!(rec.front_face);
    assert!((rec.global.normal - Vec3::Z).length() < 1e-5);
    assert_eq!(rec.material_id, 3);
    assert_eq!(rec.object_uid, 9);
}

#[test]
fn mirror_reflection_is_exact_at_zero_roughness() {
    let material = Material {
        material_class: MATERIAL_CLASS_MIRROR,
        roughness: 0.0,
        ..Default::default()
    };
    let mut rec = HitRecord::default();
    rec.global.position = Vec3::ZERO;
    rec.global.normal = Vec3::Y;
    rec.front_face = true;

    let incoming = Ray::new(Vec3::new(-1.0, 1.0, 0.0), Vec3::new(1.0, -1.0, 0.0));
    let mut state = rng::RngState::new(5, 1);
    let scatter_rec = scatter::scatter(&material, &incoming, &rec, &mut state, false);

    let expected = Vec3::new(1.0, 1.0, 0.0).normalize();
    assert!(scatter_rec.skip_pdf);
    assert!((scatter_rec.skip_pdf_ray.direction - expected).length() < 1e-4);
}

#[test]
fn glass_refracts_entering_at_seventy_degrees() {
    let material = Material {
        material_class: MATERIAL_CLASS_GLASS,
        refraction_index: 1.5,
        ..Default::default()
    };
    let mut rec = HitRecord::default();
    rec.global.normal = Vec3::Y;
    rec.front_face = true;

    let theta = 70f32.to_radians();
    let incoming = Ray::new(
        Vec3::new(0.0, 1.0, 0.0),
        Vec3::new(theta.sin(), -theta.cos(), 0.0),
    );
    let mut state = rng::RngState::new(0, 0);
    let scatter_rec = scatter::scatter(&material, &incoming, &rec, &mut state, true);

    let direction = scatter_rec.skip_pdf_ray.direction;
    assert!(direction.y < 0.0);
    assert!((direction.x - theta.sin() / 1.5).abs() < 1e-4);
}

#[test]
fn glass_reflects_internally_past_the_critical_angle() {
    let material = Material {
        material_class: MATERIAL_CLASS_GLASS,
        refraction_index: 1.5,
        ..Default::default()
    };
    // Interior hit: the record carries the normal flipped against the ray.
    let mut rec = HitRecord::default();
    rec.global.normal = -Vec3::Y;
    rec.front_face = false;

    let fifty = 50f32.to_radians();
    let incoming = Ray::new(Vec3::ZERO, Vec3::new(fifty.sin(), fifty.cos(), 0.0));
    let mut state = rng::RngState::new(0, 0);
    let reflected = scatter::scatter(&material, &incoming, &rec, &mut state, true);
    assert!(reflected.skip_pdf_ray.direction.y < 0.0);
    assert!((reflected.skip_pdf_ray.direction.x - fifty.sin()).abs() < 1e-4);

    // Just below the critical angle (asin(1/1.5) ~ 41.8 degrees) it exits.
    let forty = 40f32.to_radians();
    let incoming = Ray::new(Vec3::ZERO, Vec3::new(forty.sin(), forty.cos(), 0.0));
    let refracted = scatter::scatter(&material, &incoming, &rec, &mut state, true);
    assert!(refracted.skip_pdf_ray.direction.y > 0.0);
}

#[test]
fn sphere_trace_converges_and_resamples_under_epsilon() {
    let instance = SdfInstance::new(
        Mat4::from_translation(Vec3::new(0.0, 0.0, -3.0)),
        0.9,
        sdf::SDF_CLASS_SPHERE,
        0,
        1,
    );
    let ray = Ray::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0));

    let mut rec = HitRecord::default();
    assert!(intersect::sdf_hit(
        &instance,
        0.0,
        &ray,
        util::TMIN,
        util::MAX_DIST,
        &mut rec
    ));
    assert!((rec.t - 2.0).abs() < 1e-2);
    assert!(rec.front_face);
    assert!((rec.global.normal - Vec3::Z).length() < 1e-2);

    let local = instance.inverse_location.transform_point3(rec.global.position);
    let resampled = sdf::sdf_select(sdf::SDF_CLASS_SPHERE, local, 0.0);
    assert!(resampled.abs() < 1e-4 * rec.t + 1e-6);
}

#[test]
fn directional_distance_field_signs_by_side() {
    let instance = SdfInstance::new(Mat4::IDENTITY, 0.9, sdf::SDF_CLASS_SPHERE, 0, 1);
    let instances = [instance];
    let times = [0.0f32];
    let flat = lucent::bvh::build_bvh(&[], &instances);
    let uniforms = empty_scene_uniforms(flat.nodes.len() as u32);
    let materials = [Material::default()];
    let scene = SceneRefs {
        uniforms: &uniforms,
        parallelograms: &[],
        triangles: &[],
        sdf: &instances,
        sdf_time: &times,
        materials: &materials,
        bvh: &flat.nodes,
        bvh_inflated: &flat.inflated,
        atlas_mappings: &[],
    };

    let outside = scene.signed_distance(Vec3::new(0.0, 0.0, 1.1), Vec3::new(0.0, 0.0, -1.0));
    assert!((outside - 0.1).abs() < 1e-4);

    let inside = scene.signed_distance(Vec3::new(0.0, 0.0, 0.9), Vec3::new(0.0, 0.0, -1.0));
    assert!((inside + 0.1).abs() < 1e-4);

    // Outside the inflated support there is nothing to sample.
    let far = scene.signed_distance(Vec3::new(0.0, 0.0, 3.0), Vec3::new(0.0, 0.0, -1.0));
    assert!(far >= util::MAX_DIST);
}

fn wrap_test_fixture(
    wrap_mode_u: u32,
    wrap_mode_v: u32,
) -> (Uniforms, Vec<AtlasMapping>, Vec<Vec4>) {
    let uniforms = Uniforms {
        atlas_size: Vec2::new(4.0, 4.0),
        atlas_mip_levels: 3,
        ..Default::default()
    };
    let mappings = vec![AtlasMapping {
        uv_transform: [Vec4::new(1.0, 0.0, 0.0, 0.0), Vec4::new(0.0, 1.0, 0.0, 0.0)],
        top_left: Vec2::ZERO,
        size: Vec2::ONE,
        wrap_mode_u,
        wrap_mode_v,
    }];
    let mut texels = Vec::new();
    for y in 0..4 {
        for x in 0..4 {
            texels.push(Vec4::new(x as f32 / 4.0, y as f32 / 4.0, 0.5, 1.0));
        }
    }
    (uniforms, mappings, texels)
}

fn textured_sample(
    uniforms: &Uniforms,
    mappings: &[AtlasMapping],
    texels: &[Vec4],
    material: &Material,
    position: Vec2,
) -> Vec3 {
    let atlas = CpuImage::new(texels, 4, 4);
    let local = HitPlace {
        position: Vec3::new(position.x, position.y, 0.0),
        normal: Vec3::Z,
    };
    texture::sample_albedo(
        material,
        uniforms,
        mappings,
        &local,
        Vec3::ZERO,
        Vec3::ZERO,
        &Sampler,
        &atlas,
    )
}

#[test]
fn atlas_repeat_wrap_is_periodic() {
    let (uniforms, mappings, texels) = wrap_test_fixture(WRAP_MODE_REPEAT, WRAP_MODE_REPEAT);
    let material = Material {
        albedo_texture_uid: 1,
        ..Default::default()
    };
    let base = textured_sample(&uniforms, &mappings, &texels, &material, Vec2::new(0.3, 0.3));
    let shifted = textured_sample(&uniforms, &mappings, &texels, &material, Vec2::new(1.3, 0.3));
    let shifted_both = textured_sample(&uniforms, &mappings, &texels, &material, Vec2::new(2.3, 1.3));
    assert!((base - shifted).length() < 1e-6);
    assert!((base - shifted_both).length() < 1e-6);
}

#[test]
fn atlas_clamp_wrap_plateaus() {
    let (uniforms, mappings, texels) = wrap_test_fixture(WRAP_MODE_CLAMP, WRAP_MODE_CLAMP);
    let material = Material {
        albedo_texture_uid: 1,
        ..Default::default()
    };
    let low_a = textured_sample(&uniforms, &mappings, &texels, &material, Vec2::new(-5.0, 0.5));
    let low_b = textured_sample(&uniforms, &mappings, &texels, &material, Vec2::new(-0.2, 0.5));
    let high_a = textured_sample(&uniforms, &mappings, &texels, &material, Vec2::new(5.0, 0.5));
    let high_b = textured_sample(&uniforms, &mappings, &texels, &material, Vec2::new(1.2, 0.5));
    assert!((low_a - low_b).length() < 1e-6);
    assert!((high_a - high_b).length() < 1e-6);
    assert!((low_a - high_a).length() > 1e-3);
}

#[test]
fn atlas_discard_wrap_falls_through_to_flat_albedo() {
    let (uniforms, mappings, texels) = wrap_test_fixture(WRAP_MODE_DISCARD, WRAP_MODE_DISCARD);
    let material = Material {
        albedo: Vec3::new(1.0, 0.0, 1.0),
        albedo_texture_uid: 1,
        ..Default::default()
    };
    let outside = textured_sample(&uniforms, &mappings, &texels, &material, Vec2::new(2.0, 0.5));
    assert!((outside - material.albedo).length() < 1e-6);

    let inside = textured_sample(&uniforms, &mappings, &texels, &material, Vec2::new(0.5, 0.5));
    assert!((inside - material.albedo).length() > 1e-3);
}

#[test]
fn bvh_matches_brute_force_closest_hit() {
    let mut generator = rand::rngs::StdRng::seed_from_u64(1234);
    let mut random_point = |scale: f32| {
        Vec3::new(
            generator.gen_range(-1.0f32..1.0),
            generator.gen_range(-1.0f32..1.0),
            generator.gen_range(-1.0f32..1.0),
        ) * scale
    };

    let mut triangles = Vec::new();
    for i in 0..200 {
        let a = random_point(2.0);
        let b = a + random_point(0.5);
        let c = a + random_point(0.5);
        triangles.push(Triangle::flat(a, b, c, 0, i + 1));
    }

    let flat = lucent::bvh::build_bvh(&triangles, &[]);

    // Skip links always move forward, so traversal visits each node at most
    // once and follows at most len + 1 links.
    for (i, node) in flat.nodes.iter().enumerate() {
        let link = node.hit_miss_skip_link;
        assert!(link == -1 || (link as usize) > i);
        assert!(link <= flat.nodes.len() as i32);
    }

    let uniforms = empty_scene_uniforms(flat.nodes.len() as u32);
    let materials = [Material::default()];
    let scene = SceneRefs {
        uniforms: &uniforms,
        parallelograms: &[],
        triangles: &triangles,
        sdf: &[],
        sdf_time: &[],
        materials: &materials,
        bvh: &flat.nodes,
        bvh_inflated: &flat.inflated,
        atlas_mappings: &[],
    };

    for _ in 0..100 {
        let ray = Ray::new(random_point(3.0), random_point(1.0) + Vec3::splat(1e-3));

        let mut bvh_rec = HitRecord::default();
        let bvh_hit = scene.intersect(&ray, util::TMIN, util::MAX_DIST, &mut bvh_rec);

        let mut brute_rec = HitRecord::default();
        let mut brute_hit = false;
        let mut closest = util::MAX_DIST;
        for triangle in &triangles {
            if intersect::triangle_hit(triangle, &ray, util::TMIN, closest, &mut brute_rec) {
                brute_hit = true;
                closest = brute_rec.t;
            }
        }

        assert_eq!(bvh_hit, brute_hit);
        if bvh_hit {
            assert!((bvh_rec.t - brute_rec.t).abs() < 1e-6);
            assert_eq!(bvh_rec.object_uid, brute_rec.object_uid);
        }
    }
}

#[test]
fn cosine_samples_stay_in_the_upper_hemisphere() {
    let mut state = rng::RngState::new(11, 3);
    for _ in 0..64 {
        let r = state.next_vec2();
        let sample = util::cosine_sample_hemisphere(r.x, r.y);
        assert!(sample.z >= 0.0);
        assert!((sample.length() - 1.0).abs() < 1e-5);
    }
}

#[test]
fn scene_hits_improve_closest_so_far() {
    // Two quads stacked along -z; the nearer one must win.
    let near = Parallelogram::new(
        Vec3::new(-1.0, -1.0, -2.0),
        Vec3::new(2.0, 0.0, 0.0),
        Vec3::new(0.0, 2.0, 0.0),
        0,
        1,
    );
    let far = Parallelogram::new(
        Vec3::new(-1.0, -1.0, -4.0),
        Vec3::new(2.0, 0.0, 0.0),
        Vec3::new(0.0, 2.0, 0.0),
        0,
        2,
    );
    let quads = [far, near];
    let flat = lucent::bvh::build_bvh(&[], &[]);
    let uniforms = Uniforms {
        parallelogram_count: 2,
        bvh_node_count: flat.nodes.len() as u32,
        ..Default::default()
    };
    let materials = [Material::default()];
    let scene = SceneRefs {
        uniforms: &uniforms,
        parallelograms: &quads,
        triangles: &[],
        sdf: &[],
        sdf_time: &[],
        materials: &materials,
        bvh: &flat.nodes,
        bvh_inflated: &flat.inflated,
        atlas_mappings: &[],
    };

    let ray = Ray::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0));
    let mut rec = HitRecord::default();
    assert!(scene.intersect(&ray, util::TMIN, util::MAX_DIST, &mut rec));
    assert_eq!(rec.object_uid, 1);
    assert!((rec.t - 2.0).abs() < 1e-5);
}
