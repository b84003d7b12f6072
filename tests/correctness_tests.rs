use glam::Vec3;
use shared_structs::Material;

use lucent::render::{CpuRenderer, RenderMode};
use lucent::scene::{Camera, Scene};

fn origin_camera() -> Camera {
    Camera {
        position: Vec3::ZERO,
        look_at: Vec3::new(0.0, 0.0, -1.0),
        up: Vec3::Y,
        orthographic: false,
    }
}

/// One far-away quad the camera never sees.
fn miss_only_scene() -> Scene {
    let mut scene = Scene::empty();
    let material = scene.add_material(Material::default());
    scene.add_parallelogram(
        Vec3::new(10.0, 10.0, 10.0),
        Vec3::new(1.0, 0.0, 0.0),
        Vec3::new(0.0, 1.0, 0.0),
        material,
    );
    scene.camera = origin_camera();
    scene
}

/// Minimal box: white floor, emissive ceiling quad, red back wall.
fn quad_light_scene() -> Scene {
    let mut scene = Scene::empty();
    let white = scene.add_material(Material {
        albedo: Vec3::splat(0.73),
        ..Default::default()
    });
    let red = scene.add_material(Material {
        albedo: Vec3::new(0.8, 0.05, 0.05),
        ..Default::default()
    });
    let light = scene.add_material(Material {
        emission: Vec3::splat(8.0),
        ..Default::default()
    });

    // floor
    scene.add_parallelogram(
        Vec3::new(-1.0, 0.0, -1.0),
        Vec3::new(0.0, 0.0, 2.0),
        Vec3::new(2.0, 0.0, 0.0),
        white,
    );
    // ceiling light
    scene.add_parallelogram(
        Vec3::new(-0.4, 1.99, -0.4),
        Vec3::new(0.8, 0.0, 0.0),
        Vec3::new(0.0, 0.0, 0.8),
        light,
    );
    // red back wall
    scene.add_parallelogram(
        Vec3::new(-1.0, 0.0, -1.0),
        Vec3::new(2.0, 0.0, 0.0),
        Vec3::new(0.0, 2.0, 0.0),
        red,
    );

    scene.camera = Camera {
        position: Vec3::new(0.0, 1.0, 3.0),
        look_at: Vec3::new(0.0, 1.0, 0.0),
        up: Vec3::Y,
        orthographic: false,
    };
    scene
}

#[test]
fn miss_only_frame_writes_background_everywhere() {
    let scene = miss_only_scene();
    let mut renderer = CpuRenderer::new(&scene, 8, 8);
    renderer.render_frame_cpu(RenderMode::MonteCarlo, 1, 0.0, 1);

    for pixel in &renderer.accumulation {
        assert!((pixel.x - 0.1).abs() < 1e-6);
        assert!((pixel.y - 0.1).abs() < 1e-6);
        assert!((pixel.z - 0.1).abs() < 1e-6);
        assert_eq!(pixel.w, 1.0);
    }

    renderer.render_surface_attributes(1, 0.0);
    assert!(renderer.object_id.iter().all(|&uid| uid == 0));
    assert!(renderer.normal.iter().all(|n| n.length() == 0.0));
}

#[test]
fn quad_light_produces_red_radiance_on_the_back_wall() {
    let scene = quad_light_scene();
    let size = 16u32;
    let mut renderer = CpuRenderer::new(&scene, size, size);
    for frame in 1..=4 {
        renderer.render_frame_cpu(RenderMode::MonteCarlo, frame, 0.0, 1);
    }

    // The center of the frame looks straight at the red wall.
    let center = ((size / 2) * size + size / 2) as usize;
    let pixel = renderer.accumulation[center];
    assert!(pixel.x > 0.0);
    // Red dominates what the wall reflects.
    assert!(pixel.x >= pixel.y);
}

#[test]
fn surface_attributes_report_the_first_hit() {
    let mut scene = Scene::empty();
    let red = scene.add_material(Material {
        albedo: Vec3::new(0.9, 0.1, 0.1),
        ..Default::default()
    });
    let uid = scene.add_parallelogram(
        Vec3::new(-1.0, -1.0, -2.0),
        Vec3::new(2.0, 0.0, 0.0),
        Vec3::new(0.0, 2.0, 0.0),
        red,
    );
    scene.camera = origin_camera();

    let size = 9u32;
    let mut renderer = CpuRenderer::new(&scene, size, size);
    renderer.render_surface_attributes(1, 0.0);

    let center = ((size / 2) * size + size / 2) as usize;
    assert_eq!(renderer.object_id[center], uid);
    let albedo = renderer.albedo[center];
    assert!((Vec3::new(albedo.x, albedo.y, albedo.z) - Vec3::new(0.9, 0.1, 0.1)).length() < 1e-5);
    let normal = renderer.normal[center];
    assert!((Vec3::new(normal.x, normal.y, normal.z) - Vec3::Z).length() < 1e-5);

    // The pass is idempotent within a frame.
    let ids = renderer.object_id.clone();
    renderer.render_surface_attributes(1, 0.0);
    assert_eq!(ids, renderer.object_id);
}

#[test]
fn monte_carlo_accumulates_and_deterministic_replaces() {
    let scene = quad_light_scene();
    let mut renderer = CpuRenderer::new(&scene, 8, 8);

    renderer.render_frame_cpu(RenderMode::MonteCarlo, 1, 0.0, 1);
    renderer.render_frame_cpu(RenderMode::MonteCarlo, 2, 0.0, 1);
    // Every stochastic frame adds one unit of sample weight.
    assert!(renderer.accumulation.iter().all(|p| p.w == 2.0));

    renderer.render_frame_cpu(RenderMode::Deterministic, 1, 0.0, 1);
    renderer.render_frame_cpu(RenderMode::Deterministic, 1, 0.0, 1);
    assert!(renderer.accumulation.iter().all(|p| p.w == 1.0));
}

#[test]
fn deterministic_mode_is_bit_stable() {
    let scene = Scene::cornell();
    let mut renderer = CpuRenderer::new(&scene, 16, 16);

    renderer.render_frame_cpu(RenderMode::Deterministic, 1, 0.25, 1);
    let first = renderer.accumulation.clone();
    renderer.render_frame_cpu(RenderMode::Deterministic, 1, 0.25, 1);
    assert_eq!(
        first.iter().map(|v| v.to_array()).collect::<Vec<_>>(),
        renderer
            .accumulation
            .iter()
            .map(|v| v.to_array())
            .collect::<Vec<_>>()
    );
}

#[test]
fn progressive_means_settle_as_frames_double() {
    let scene = quad_light_scene();
    let size = 12u32;
    let mut renderer = CpuRenderer::new(&scene, size, size);

    let mut means = Vec::new();
    let checkpoints = [16u32, 32, 64, 128];
    let mut frame = 0;
    for &checkpoint in &checkpoints {
        while frame < checkpoint {
            frame += 1;
            renderer.render_frame_cpu(RenderMode::MonteCarlo, frame, 0.0, 1);
        }
        means.push(
            renderer
                .accumulation
                .iter()
                .map(|p| Vec3::new(p.x, p.y, p.z) / checkpoint as f32)
                .collect::<Vec<_>>(),
        );
    }

    let average_delta = |a: &[Vec3], b: &[Vec3]| {
        a.iter()
            .zip(b.iter())
            .map(|(x, y)| (*x - *y).length())
            .sum::<f32>()
            / a.len() as f32
    };
    let early = average_delta(&means[0], &means[1]);
    let late = average_delta(&means[2], &means[3]);
    assert!(late < early);
}

#[test]
fn pixel_subdivision_still_covers_the_frame() {
    let scene = quad_light_scene();
    let mut renderer = CpuRenderer::new(&scene, 8, 8);
    renderer.render_frame_cpu(RenderMode::Deterministic, 1, 0.0, 2);
    // Four sub-samples average back to unit weight.
    assert!(renderer.accumulation.iter().all(|p| (p.w - 1.0).abs() < 1e-6));

    renderer.render_frame_cpu(RenderMode::MonteCarlo, 1, 0.0, 2);
    assert!(renderer
        .accumulation
        .iter()
        .all(|p| (p.w - 2.0).abs() < 1e-6));
}

#[test]
fn resolve_is_display_ready() {
    let scene = miss_only_scene();
    let mut renderer = CpuRenderer::new(&scene, 4, 4);
    renderer.render_frame_cpu(RenderMode::MonteCarlo, 1, 0.0, 1);

    let resolved = renderer.resolve(1);
    assert_eq!(resolved.len(), 4 * 4 * 3);
    for value in resolved {
        // Tonemapped, gamma-encoded, dithered output stays displayable.
        assert!((-0.01..=1.01).contains(&value));
    }
}
