use shared_structs::{
    Material, MATERIAL_CLASS_GLASS, MATERIAL_CLASS_ISOTROPIC, MATERIAL_CLASS_MIRROR,
};
use spirv_std::glam::Vec3;
#[allow(unused_imports)]
use spirv_std::num_traits::Float;

use crate::hit::{HitRecord, Ray, ScatterRecord};
use crate::rng::{self, RngState};
use crate::util::{self, Onb};

/// Picks an outgoing direction for the hit material. `deterministic` selects
/// the analytic variants: glass always refracts (outside total internal
/// reflection) and mirrors jitter with the position-seeded hash instead of
/// the PCG stream.
pub fn scatter(
    material: &Material,
    ray: &Ray,
    rec: &HitRecord,
    rng: &mut RngState,
    deterministic: bool,
) -> ScatterRecord {
    let mut scatter_rec = ScatterRecord::default();
    match material.material_class {
        MATERIAL_CLASS_MIRROR => mirror_scatter(material, ray, rec, rng, deterministic, &mut scatter_rec),
        MATERIAL_CLASS_GLASS => glass_scatter(material, ray, rec, rng, deterministic, &mut scatter_rec),
        MATERIAL_CLASS_ISOTROPIC => isotropic_scatter(material, ray, rec, rng, &mut scatter_rec),
        _ => lambertian_scatter(material, ray, rec, rng, &mut scatter_rec),
    }
    scatter_rec
}

/// Cosine-weighted diffuse lobe with a probabilistic specular lobe on top.
/// The diffuse case leaves `skip_pdf` unset so the integrator can mix the
/// returned ray with light sampling.
fn lambertian_scatter(
    material: &Material,
    ray: &Ray,
    rec: &HitRecord,
    rng: &mut RngState,
    scatter_rec: &mut ScatterRecord,
) {
    let onb = Onb::from_w(rec.global.normal);
    let r = rng.next_vec2();
    let diffuse = onb.local(util::cosine_sample_hemisphere(r.x, r.y));

    let mut direction = diffuse;
    if rng.next_float() < material.specular_strength {
        let reflected = util::reflect(ray.direction, rec.global.normal);
        direction = reflected.lerp(diffuse, material.roughness).normalize();
        scatter_rec.do_specular = 1.0;
        scatter_rec.skip_pdf = true;
    }
    scatter_rec.skip_pdf_ray = Ray {
        origin: rec.global.position,
        direction,
    };
}

fn mirror_scatter(
    material: &Material,
    ray: &Ray,
    rec: &HitRecord,
    rng: &mut RngState,
    deterministic: bool,
    scatter_rec: &mut ScatterRecord,
) {
    let jitter = if deterministic {
        rng::position_hash(rec.global.position)
    } else {
        util::random_in_unit_sphere(rng)
    };
    let direction =
        (util::reflect(ray.direction, rec.global.normal) + jitter * material.roughness).normalize();
    scatter_rec.skip_pdf = true;
    scatter_rec.do_specular = 1.0;
    scatter_rec.skip_pdf_ray = Ray {
        origin: rec.global.position,
        direction,
    };
}

fn glass_scatter(
    material: &Material,
    ray: &Ray,
    rec: &HitRecord,
    rng: &mut RngState,
    deterministic: bool,
    scatter_rec: &mut ScatterRecord,
) {
    let eta_ratio = if rec.front_face {
        1.0 / material.refraction_index
    } else {
        material.refraction_index
    };

    let cos_theta = (-ray.direction).dot(rec.global.normal).min(1.0);
    let sin_theta = (1.0 - cos_theta * cos_theta).sqrt();
    let cannot_refract = eta_ratio * sin_theta > 1.0;
    let reflects = if deterministic {
        cannot_refract
    } else {
        cannot_refract || util::schlick_reflectance(cos_theta, eta_ratio) > rng.next_float()
    };

    let mut direction = if reflects {
        util::reflect(ray.direction, rec.global.normal)
    } else {
        util::refract(ray.direction, rec.global.normal, eta_ratio)
    };
    if util::near_zero(direction) {
        direction = rec.global.normal;
    }

    scatter_rec.skip_pdf = true;
    scatter_rec.do_specular = 1.0;
    scatter_rec.skip_pdf_ray = Ray {
        origin: rec.global.position,
        direction: direction.normalize(),
    };
}

/// Henyey-Greenstein phase function with g taken from the specular strength.
fn isotropic_scatter(
    material: &Material,
    ray: &Ray,
    rec: &HitRecord,
    rng: &mut RngState,
    scatter_rec: &mut ScatterRecord,
) {
    let g = material.specular_strength;
    let r = rng.next_vec2();
    let cos_theta = if g.abs() < 1e-3 {
        1.0 - 2.0 * r.x
    } else {
        let sq = (1.0 - g * g) / (1.0 - g + 2.0 * g * r.x);
        (1.0 + g * g - sq * sq) / (2.0 * g)
    };
    let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
    let phi = 2.0 * core::f32::consts::PI * r.y;

    let onb = Onb::from_w(ray.direction);
    let direction = onb.local(Vec3::new(sin_theta * phi.cos(), sin_theta * phi.sin(), cos_theta));
    scatter_rec.skip_pdf = true;
    scatter_rec.skip_pdf_ray = Ray {
        origin: rec.global.position,
        direction,
    };
}
