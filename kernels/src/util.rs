use spirv_std::glam::Vec3;
#[allow(unused_imports)]
use spirv_std::num_traits::Float;

use crate::rng::RngState;

/// Lower ray parameter bound for every primitive test.
pub const TMIN: f32 = 1e-6;
/// Stand-in for "no hit yet"; also the upper ray parameter bound.
pub const MAX_DIST: f32 = 1e8;
/// Offset applied along the ray direction when spawning secondary rays.
pub const EPS: f32 = 5e-4;
/// Smallest positive normal f32, used as a "technically nonzero" pdf.
pub const MIN_FLOAT: f32 = 1.1754944e-38;

pub fn reflect(incoming: Vec3, normal: Vec3) -> Vec3 {
    incoming - normal * 2.0 * incoming.dot(normal)
}

pub fn refract(incoming: Vec3, normal: Vec3, eta_ratio: f32) -> Vec3 {
    let cos_theta = (-incoming).dot(normal).min(1.0);
    let perpendicular = eta_ratio * (incoming + cos_theta * normal);
    let parallel = -(1.0 - perpendicular.length_squared()).abs().sqrt() * normal;
    perpendicular + parallel
}

pub fn near_zero(v: Vec3) -> bool {
    v.x.abs() < 1e-8 && v.y.abs() < 1e-8 && v.z.abs() < 1e-8
}

pub fn schlick_reflectance(cos_theta: f32, eta_ratio: f32) -> f32 {
    let r0 = ((1.0 - eta_ratio) / (1.0 + eta_ratio)).powi(2);
    r0 + (1.0 - r0) * (1.0 - cos_theta).powi(5)
}

/// Orthonormal basis with `w` along the construction axis.
pub struct Onb {
    pub u: Vec3,
    pub v: Vec3,
    pub w: Vec3,
}

impl Onb {
    pub fn from_w(w: Vec3) -> Self {
        let w = w.normalize();
        let a = if w.x.abs() > 0.9 { Vec3::Y } else { Vec3::X };
        let v = w.cross(a).normalize();
        let u = w.cross(v);
        Self { u, v, w }
    }

    pub fn local(&self, a: Vec3) -> Vec3 {
        a.x * self.u + a.y * self.v + a.z * self.w
    }
}

/// Cosine-weighted hemisphere direction around +z.
pub fn cosine_sample_hemisphere(r1: f32, r2: f32) -> Vec3 {
    let phi = 2.0 * core::f32::consts::PI * r1;
    let r = r2.sqrt();
    Vec3::new(phi.cos() * r, phi.sin() * r, (1.0 - r2).sqrt())
}

pub fn random_in_unit_sphere(rng: &mut RngState) -> Vec3 {
    let cos_phi = 2.0 * rng.next_float() - 1.0;
    let sin_phi = (1.0 - cos_phi * cos_phi).sqrt();
    let theta = 2.0 * core::f32::consts::PI * rng.next_float();
    let radius = rng.next_float().powf(1.0 / 3.0);
    Vec3::new(sin_phi * theta.cos(), cos_phi, sin_phi * theta.sin()) * radius
}
