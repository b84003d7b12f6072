use spirv_std::glam::Vec3;

use crate::util;

#[derive(Copy, Clone)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    /// Direction is normalized once here; nothing downstream mutates it.
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize(),
        }
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Secondary ray nudged off the surface it was spawned from.
    pub fn offset(&self) -> Self {
        Self {
            origin: self.origin + self.direction * util::EPS,
            direction: self.direction,
        }
    }
}

impl Default for Ray {
    fn default() -> Self {
        Self {
            origin: Vec3::ZERO,
            direction: Vec3::Z,
        }
    }
}

/// Position and normal of a surface point, kept in one coordinate frame.
/// Every hit carries two of these: the world frame for shading and secondary
/// rays, and the object-local frame for texturing.
#[derive(Copy, Clone, Default)]
pub struct HitPlace {
    pub position: Vec3,
    pub normal: Vec3,
}

/// Last-written intersection description. Per-ray scratch; a successful
/// primitive test overwrites all fields.
#[derive(Copy, Clone)]
pub struct HitRecord {
    pub global: HitPlace,
    pub local: HitPlace,
    pub t: f32,
    pub material_id: u32,
    pub object_uid: u32,
    pub front_face: bool,
}

impl Default for HitRecord {
    fn default() -> Self {
        Self {
            global: HitPlace::default(),
            local: HitPlace::default(),
            t: util::MAX_DIST,
            material_id: 0,
            object_uid: 0,
            front_face: false,
        }
    }
}

/// Scatter outcome. `skip_pdf` marks delta-like lobes that bypass importance
/// sampling; `do_specular` is the throughput blend between albedo and
/// specular tint.
#[derive(Copy, Clone, Default)]
pub struct ScatterRecord {
    pub skip_pdf: bool,
    pub skip_pdf_ray: Ray,
    pub do_specular: f32,
}
