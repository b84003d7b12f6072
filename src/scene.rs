//! Scene container and camera. Authoring stays on the host; the render core
//! only ever sees the flat buffers produced here.

use glam::{Mat3, Mat4, Quat, Vec2, Vec3, Vec4, UVec2};
use shared_structs::{
    AtlasMapping, Material, Parallelogram, SdfInstance, Triangle, Uniforms,
    MATERIAL_CLASS_GLASS, MATERIAL_CLASS_ISOTROPIC, MATERIAL_CLASS_MIRROR, WRAP_MODE_CLAMP,
};

#[derive(Clone)]
pub struct Camera {
    pub position: Vec3,
    pub look_at: Vec3,
    pub up: Vec3,
    pub orthographic: bool,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 1.0, 3.4),
            look_at: Vec3::new(0.0, 1.0, 0.0),
            up: Vec3::Y,
            orthographic: false,
        }
    }
}

impl Camera {
    fn basis(&self) -> (Vec3, Vec3, Vec3) {
        let forward = (self.look_at - self.position).normalize();
        let right = forward.cross(self.up).normalize();
        let up = right.cross(forward);
        (right, up, forward)
    }

    /// Camera-to-world; column 3 carries the camera origin.
    pub fn view(&self) -> Mat4 {
        let (right, up, forward) = self.basis();
        Mat4::from_cols(
            right.extend(0.0),
            up.extend(0.0),
            (-forward).extend(0.0),
            self.position.extend(1.0),
        )
    }

    /// Pixel-point-to-ray-origin map. Perspective collapses every pixel
    /// point to the camera origin; orthographic projects it back onto the
    /// camera plane so rays stay parallel.
    pub fn view_ray_origin(&self) -> Mat4 {
        if self.orthographic {
            let (_, _, forward) = self.basis();
            let projector = Mat3::IDENTITY - outer(forward, forward);
            Mat4::from_mat3(projector)
                + Mat4::from_cols(
                    Vec4::ZERO,
                    Vec4::ZERO,
                    Vec4::ZERO,
                    (forward * forward.dot(self.position)).extend(0.0),
                )
        } else {
            Mat4::from_cols(
                Vec4::ZERO,
                Vec4::ZERO,
                Vec4::ZERO,
                self.position.extend(1.0),
            )
        }
    }
}

fn outer(a: Vec3, b: Vec3) -> Mat3 {
    Mat3::from_cols(a * b.x, a * b.y, a * b.z)
}

pub struct Scene {
    pub parallelograms: Vec<Parallelogram>,
    pub triangles: Vec<Triangle>,
    pub sdf: Vec<SdfInstance>,
    pub sdf_time: Vec<f32>,
    pub materials: Vec<Material>,
    pub atlas_mappings: Vec<AtlasMapping>,
    pub atlas: image::RgbaImage,
    pub camera: Camera,
}

impl Scene {
    pub fn empty() -> Self {
        Self {
            parallelograms: Vec::new(),
            triangles: Vec::new(),
            sdf: Vec::new(),
            sdf_time: Vec::new(),
            materials: vec![Material::default()],
            atlas_mappings: Vec::new(),
            atlas: image::RgbaImage::from_pixel(1, 1, image::Rgba([255, 255, 255, 255])),
            camera: Camera::default(),
        }
    }

    /// Cornell-style demo: textured walls, an emissive ceiling quad, a
    /// triangle tetrahedron, and one SDF instance per material class.
    pub fn cornell() -> Self {
        let mut scene = Self::empty();

        let white = scene.add_material(Material {
            albedo: Vec3::splat(0.73),
            ..Default::default()
        });
        let checker = scene.add_material(Material {
            albedo: Vec3::splat(0.73),
            albedo_texture_uid: -1,
            ..Default::default()
        });
        let red = scene.add_material(Material {
            albedo: Vec3::new(0.65, 0.05, 0.05),
            ..Default::default()
        });
        let green = scene.add_material(Material {
            albedo: Vec3::new(0.12, 0.45, 0.15),
            ..Default::default()
        });
        let papered = scene.add_material(Material {
            albedo: Vec3::splat(0.73),
            albedo_texture_uid: 1,
            ..Default::default()
        });
        let light = scene.add_material(Material {
            albedo: Vec3::ONE,
            emission: Vec3::splat(8.0),
            ..Default::default()
        });
        let mirror = scene.add_material(Material {
            albedo: Vec3::splat(0.9),
            specular: Vec3::splat(0.95),
            roughness: 0.04,
            material_class: MATERIAL_CLASS_MIRROR,
            ..Default::default()
        });
        let glass = scene.add_material(Material {
            albedo: Vec3::ONE,
            specular: Vec3::ONE,
            refraction_index: 1.5,
            material_class: MATERIAL_CLASS_GLASS,
            ..Default::default()
        });
        let plasma = scene.add_material(Material {
            albedo: Vec3::splat(0.8),
            albedo_texture_uid: -3,
            ..Default::default()
        });
        let fog = scene.add_material(Material {
            albedo: Vec3::new(0.55, 0.65, 0.8),
            specular_strength: 0.4,
            material_class: MATERIAL_CLASS_ISOTROPIC,
            ..Default::default()
        });

        // Walls; spanning vectors wind so the normals face into the box.
        let quads = [
            // floor
            (Vec3::new(-1.0, 0.0, -1.0), Vec3::new(0.0, 0.0, 2.0), Vec3::new(2.0, 0.0, 0.0), checker),
            // ceiling
            (Vec3::new(-1.0, 2.0, -1.0), Vec3::new(2.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 2.0), white),
            // back wall
            (Vec3::new(-1.0, 0.0, -1.0), Vec3::new(2.0, 0.0, 0.0), Vec3::new(0.0, 2.0, 0.0), papered),
            // left wall
            (Vec3::new(-1.0, 0.0, -1.0), Vec3::new(0.0, 2.0, 0.0), Vec3::new(0.0, 0.0, 2.0), red),
            // right wall
            (Vec3::new(1.0, 0.0, -1.0), Vec3::new(0.0, 0.0, 2.0), Vec3::new(0.0, 2.0, 0.0), green),
            // ceiling light
            (Vec3::new(-0.35, 1.99, -0.35), Vec3::new(0.7, 0.0, 0.0), Vec3::new(0.0, 0.0, 0.7), light),
        ];
        for (q, u, v, material) in quads {
            scene.add_parallelogram(q, u, v, material);
        }

        // A small tetrahedron on the floor keeps the triangle path honest.
        let base_a = Vec3::new(0.35, 0.0, 0.55);
        let base_b = Vec3::new(0.75, 0.0, 0.45);
        let base_c = Vec3::new(0.55, 0.0, 0.8);
        let apex = Vec3::new(0.55, 0.5, 0.6);
        scene.add_triangle(base_a, base_b, apex, white);
        scene.add_triangle(base_b, base_c, apex, white);
        scene.add_triangle(base_c, base_a, apex, white);
        scene.add_triangle(base_a, base_c, base_b, white);

        scene.add_sdf(
            kernels::sdf::SDF_CLASS_SPHERE,
            Vec3::new(-0.45, 0.4, -0.3),
            0.4,
            mirror,
            0.0,
        );
        scene.add_sdf(
            kernels::sdf::SDF_CLASS_SPHERE,
            Vec3::new(0.5, 0.35, 0.1),
            0.35,
            glass,
            0.0,
        );
        scene.add_sdf(
            kernels::sdf::SDF_CLASS_TORUS,
            Vec3::new(-0.3, 0.18, 0.55),
            0.22,
            plasma,
            0.0,
        );
        scene.add_sdf(
            kernels::sdf::SDF_CLASS_PULSING_SPHERE,
            Vec3::new(0.0, 1.35, -0.2),
            0.22,
            fog,
            0.0,
        );

        scene.atlas = brick_atlas(64, 64);
        // Back-wall local frame is centered; map [-1, 1]^2 onto the region
        // with the image's y running downward.
        scene.atlas_mappings.push(AtlasMapping {
            uv_transform: [
                Vec4::new(0.5, 0.0, 0.0, 0.5),
                Vec4::new(0.0, -0.5, 0.0, 0.5),
            ],
            top_left: Vec2::ZERO,
            size: Vec2::ONE,
            wrap_mode_u: WRAP_MODE_CLAMP,
            wrap_mode_v: WRAP_MODE_CLAMP,
        });

        scene
    }

    pub fn add_material(&mut self, material: Material) -> u32 {
        self.materials.push(material);
        (self.materials.len() - 1) as u32
    }

    pub fn add_parallelogram(&mut self, q: Vec3, u: Vec3, v: Vec3, material_id: u32) -> u32 {
        let uid = self.next_object_uid();
        self.parallelograms
            .push(Parallelogram::new(q, u, v, material_id, uid));
        uid
    }

    pub fn add_triangle(&mut self, a: Vec3, b: Vec3, c: Vec3, material_id: u32) -> u32 {
        let uid = self.next_object_uid();
        self.triangles.push(Triangle::flat(a, b, c, material_id, uid));
        uid
    }

    pub fn add_sdf(
        &mut self,
        class_index: u32,
        position: Vec3,
        scale: f32,
        material_id: u32,
        time: f32,
    ) -> u32 {
        let uid = self.next_object_uid();
        let location =
            Mat4::from_scale_rotation_translation(Vec3::splat(scale), Quat::IDENTITY, position);
        self.sdf
            .push(SdfInstance::new(location, 0.9, class_index, material_id, uid));
        self.sdf_time.push(time);
        uid
    }

    fn next_object_uid(&self) -> u32 {
        (self.parallelograms.len() + self.triangles.len() + self.sdf.len() + 1) as u32
    }

    pub fn uniforms(
        &self,
        width: u32,
        height: u32,
        frame_number: u32,
        time: f32,
        pixel_side_subdivision: u32,
        bvh_node_count: u32,
    ) -> Uniforms {
        self.uniforms_with_camera(
            &self.camera,
            width,
            height,
            frame_number,
            time,
            pixel_side_subdivision,
            bvh_node_count,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn uniforms_with_camera(
        &self,
        camera: &Camera,
        width: u32,
        height: u32,
        frame_number: u32,
        time: f32,
        pixel_side_subdivision: u32,
        bvh_node_count: u32,
    ) -> Uniforms {
        Uniforms {
            view: camera.view(),
            view_ray_origin: camera.view_ray_origin(),
            inv_size: Vec2::new(1.0 / width as f32, 1.0 / height as f32),
            aspect: width as f32 / height as f32,
            global_time_seconds: time,
            atlas_size: Vec2::new(self.atlas.width() as f32, self.atlas.height() as f32),
            width,
            height,
            pixel_count: width * height,
            frame_number,
            pixel_side_subdivision,
            atlas_mip_levels: mip_level_count(self.atlas.width(), self.atlas.height()),
            parallelogram_count: self.parallelograms.len() as u32,
            triangle_count: self.triangles.len() as u32,
            sdf_count: self.sdf.len() as u32,
            bvh_node_count,
            thread_grid: UVec2::new(width, height),
            _padding: [0; 2],
        }
    }

    /// Atlas page as linear floats for the CPU image polyfill.
    pub fn atlas_linear(&self) -> Vec<Vec4> {
        self.atlas
            .pixels()
            .map(|p| {
                Vec4::new(
                    p.0[0] as f32 / 255.0,
                    p.0[1] as f32 / 255.0,
                    p.0[2] as f32 / 255.0,
                    p.0[3] as f32 / 255.0,
                )
            })
            .collect()
    }
}

pub fn mip_level_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).leading_zeros()
}

fn brick_atlas(width: u32, height: u32) -> image::RgbaImage {
    image::RgbaImage::from_fn(width, height, |x, y| {
        let row = y / 8;
        let shift = if row % 2 == 0 { 0 } else { 8 };
        let in_mortar = y % 8 == 0 || (x + shift) % 16 == 0;
        if in_mortar {
            image::Rgba([190, 185, 180, 255])
        } else {
            image::Rgba([150, 62, 48, 255])
        }
    })
}
