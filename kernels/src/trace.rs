use shared_structs::{Image, Sampler, MATERIAL_CLASS_GLASS, MATERIAL_CLASS_LAMBERTIAN, MATERIAL_CLASS_MIRROR};
use spirv_std::glam::Vec3;
#[allow(unused_imports)]
use spirv_std::num_traits::Float;

use crate::camera::{self, RayDifferentials};
use crate::hit::{HitRecord, Ray};
use crate::light;
use crate::rng::RngState;
use crate::scatter;
use crate::scene::SceneRefs;
use crate::texture;
use crate::util;

pub const BACKGROUND: Vec3 = Vec3::new(0.1, 0.1, 0.1);

const MAX_BOUNCES_MONTE_CARLO: u32 = 50;
const MAX_BOUNCES_DETERMINISTIC: u32 = 8;

/// Probability of steering a diffuse bounce toward the emissive quad; the
/// remainder keeps the surface scatter direction.
const LIGHT_SAMPLE_WEIGHT: f32 = 0.2;
const PDF_CUTOFF: f32 = 1e-5;
const RUSSIAN_ROULETTE_START: u32 = 2;

/// Stochastic estimator: importance-sampled Lambert bounces mixed with the
/// scene's emissive quad, delta lobes passed through unweighted, Russian
/// roulette after the first few bounces.
pub fn ray_color_monte_carlo(
    scene: &SceneRefs,
    sampler: &Sampler,
    atlas: &Image!(2D, type=f32, sampled),
    ray: Ray,
    differentials: &RayDifferentials,
    rng: &mut RngState,
) -> Vec3 {
    let light_index =
        light::find_first_emissive_quad(scene.parallelograms, scene.uniforms.parallelogram_count, scene.materials);

    let mut current_ray = ray;
    let mut throughput = Vec3::ONE;
    let mut radiance = Vec3::ZERO;
    let mut dpdx = Vec3::ZERO;
    let mut dpdy = Vec3::ZERO;

    let mut bounce = 0;
    while bounce < MAX_BOUNCES_MONTE_CARLO {
        let mut rec = HitRecord::default();
        if !scene.intersect(&current_ray, util::TMIN, util::MAX_DIST, &mut rec) {
            radiance += BACKGROUND * throughput;
            break;
        }

        let material = scene.material(rec.material_id);
        if bounce == 0 {
            let derivatives = camera::surface_derivatives(
                &current_ray,
                differentials,
                rec.global.position,
                rec.global.normal,
            );
            dpdx = derivatives.0;
            dpdy = derivatives.1;
        }
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
        let emission = if rec.front_face {
            material.emission
        } else {
            Vec3::ZERO
        };

        let scatter_rec = scatter::scatter(&material, &current_ray, &rec, rng, false);
        radiance += emission * throughput;

        if scatter_rec.skip_pdf {
            throughput *= albedo.lerp(material.specular, scatter_rec.do_specular);
            current_ray = scatter_rec.skip_pdf_ray.offset();
        } else {
            // Diffuse bounce: blend the pdf of the area light with the
            // cosine lobe and weight the throughput accordingly.
            let candidate = if light_index >= 0 && rng.next_float() < LIGHT_SAMPLE_WEIGHT {
                let quad = &scene.parallelograms[light_index as usize];
                let on_light = light::sample_quad_point(quad, rng);
                Ray::new(rec.global.position, on_light - rec.global.position)
            } else {
                scatter_rec.skip_pdf_ray
            };

            let lambert_pdf = rec.global.normal.dot(candidate.direction).max(0.0)
                / core::f32::consts::PI;
            let pdf = if light_index >= 0 {
                let quad = &scene.parallelograms[light_index as usize];
                let light_pdf = light::quad_light_pdf(quad, candidate.origin, candidate.direction);
                LIGHT_SAMPLE_WEIGHT * light_pdf + (1.0 - LIGHT_SAMPLE_WEIGHT) * lambert_pdf
            } else {
                lambert_pdf
            };
            if pdf <= PDF_CUTOFF {
                break;
            }

            throughput *=
                lambert_pdf * albedo.lerp(material.specular, scatter_rec.do_specular) / pdf;
            current_ray = candidate.offset();
        }

        if bounce > RUSSIAN_ROULETTE_START {
            let survival = throughput.max_element();
            if rng.next_float() > survival {
                break;
            }
            throughput *= 1.0 / survival;
        }
        bounce += 1;
    }

    radiance
}

/// Analytic estimator: one Lambert/Phong direct-lighting evaluation with a
/// hard shadow and SDF ambient occlusion, mirrors and glass followed
/// deterministically, everything else returning its albedo.
pub fn ray_color_deterministic(
    scene: &SceneRefs,
    sampler: &Sampler,
    atlas: &Image!(2D, type=f32, sampled),
    ray: Ray,
    differentials: &RayDifferentials,
) -> Vec3 {
    let light_index =
        light::find_first_emissive_quad(scene.parallelograms, scene.uniforms.parallelogram_count, scene.materials);

    // The PCG stream is unused on this path; scatter still takes one for its
    // signature, and mirrors substitute the position hash.
    let mut rng = RngState::new(0, 0);

    let mut current_ray = ray;
    let mut throughput = Vec3::ONE;
    let mut color = Vec3::ZERO;
    let mut dpdx = Vec3::ZERO;
    let mut dpdy = Vec3::ZERO;

    let mut bounce = 0;
    while bounce < MAX_BOUNCES_DETERMINISTIC {
        let mut rec = HitRecord::default();
        if !scene.intersect(&current_ray, util::TMIN, util::MAX_DIST, &mut rec) {
            color += BACKGROUND * throughput;
            break;
        }

        let material = scene.material(rec.material_id);
        if bounce == 0 {
            let derivatives = camera::surface_derivatives(
                &current_ray,
                differentials,
                rec.global.position,
                rec.global.normal,
            );
            dpdx = derivatives.0;
            dpdy = derivatives.1;
        }
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

        match material.material_class {
            MATERIAL_CLASS_MIRROR | MATERIAL_CLASS_GLASS => {
                let scatter_rec = scatter::scatter(&material, &current_ray, &rec, &mut rng, true);
                throughput *= material.specular;
                current_ray = scatter_rec.skip_pdf_ray.offset();
            }
            MATERIAL_CLASS_LAMBERTIAN => {
                color += direct_lighting(scene, &current_ray, &rec, &material, albedo, light_index)
                    * throughput;
                break;
            }
            _ => {
                color += albedo * throughput;
                break;
            }
        }
        bounce += 1;
    }

    color
}

fn direct_lighting(
    scene: &SceneRefs,
    ray: &Ray,
    rec: &HitRecord,
    material: &shared_structs::Material,
    albedo: Vec3,
    light_index: i32,
) -> Vec3 {
    let position = rec.global.position;
    let normal = rec.global.normal;
    let occlusion = ambient_occlusion(scene, position, normal);

    if light_index < 0 {
        return BACKGROUND * albedo * occlusion + material.emission;
    }

    let quad = &scene.parallelograms[light_index as usize];
    let light_emission = scene.material(quad.material_id).emission;
    let to_light = quad.center() - position;
    let light_distance = to_light.length();
    let light_direction = to_light / light_distance;

    let diffuse = normal.dot(light_direction).max(0.0);
    let view = -ray.direction;
    let specular = util::reflect(-light_direction, normal)
        .dot(view)
        .max(0.0)
        .powi(4)
        * diffuse;

    // An emissive blocker is the light itself, not a shadow caster.
    let shadow_ray = Ray {
        origin: position + light_direction * util::EPS,
        direction: light_direction,
    };
    let mut shadow_rec = HitRecord::default();
    let mut shadow = 1.0;
    if scene.intersect(
        &shadow_ray,
        util::TMIN,
        light_distance - 2.0 * util::EPS,
        &mut shadow_rec,
    ) && !scene.material(shadow_rec.material_id).is_emissive()
    {
        shadow = 0.0;
    }

    (diffuse * albedo * occlusion).lerp(specular * material.specular, material.specular_strength)
        * light_emission
        * (shadow * 0.4 + 0.6)
        + BACKGROUND * albedo * occlusion
        + material.emission
}

/// Five-tap occlusion estimate along the surface normal, fed by the inflated
/// BVH's directional distance field. Decaying taps saturate early so deep
/// creases stop probing.
fn ambient_occlusion(scene: &SceneRefs, position: Vec3, normal: Vec3) -> f32 {
    let mut accumulated = 0.0;
    let mut decay = 1.0;
    let mut i = 0;
    while i < 5 {
        let height = 0.01 + 0.12 * i as f32 / 4.0;
        let distance = scene.signed_distance(position + normal * height, normal);
        accumulated += (height - distance).max(0.0) * decay;
        decay *= 0.95;
        if accumulated > 0.35 {
            break;
        }
        i += 1;
    }
    (2.5 - 7.0 * accumulated).clamp(0.0, 1.0)
}
