//! Per-frame dispatch: uploads the four resource groups, runs the surface
//! attribute and color kernels, and mirrors the accumulator back to the host
//! for the resolve pass. The CPU path runs the identical kernel code through
//! rayon, one pixel per work item.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Instant;

use glam::{UVec2, Vec2, Vec4};
use parking_lot::RwLock;
use rayon::prelude::*;
use shared_structs::{CpuImage, Sampler, Uniforms};

use kernels::scene::SceneRefs;
use kernels::tonemap;

use crate::bvh::{self, FlatBvh};
use crate::gpu::{
    GpuBuffer, GpuContext, GpuKernelBuilder, GpuMippedImage, GpuSampler, STORAGE_BUFFER_USAGES,
    UNIFORM_BUFFER_USAGES,
};
use crate::scene::{Camera, Scene};

const KERNEL: &[u8] = include_bytes!(env!("kernels.spv"));

lazy_static::lazy_static! {
    pub static ref FW: GpuContext = GpuContext::default();
}

#[derive(Copy, Clone, PartialEq, Eq)]
pub enum RenderMode {
    MonteCarlo,
    Deterministic,
}

/// State shared between the window loop and the render thread.
pub struct TracingState {
    pub width: u32,
    pub height: u32,
    pub framebuffer: RwLock<Vec<Vec4>>,
    pub frame_number: AtomicU32,
    pub running: AtomicBool,
    pub dirty: AtomicBool,
    pub deterministic: AtomicBool,
    pub camera: RwLock<Camera>,
}

impl TracingState {
    pub fn new(width: u32, height: u32, camera: Camera) -> Self {
        Self {
            width,
            height,
            framebuffer: RwLock::new(vec![Vec4::ZERO; (width * height) as usize]),
            frame_number: AtomicU32::new(0),
            running: AtomicBool::new(true),
            dirty: AtomicBool::new(false),
            deterministic: AtomicBool::new(false),
            camera: RwLock::new(camera),
        }
    }

    pub fn mode(&self) -> RenderMode {
        if self.deterministic.load(Ordering::Relaxed) {
            RenderMode::Deterministic
        } else {
            RenderMode::MonteCarlo
        }
    }
}

// wgpu rejects zero-sized bindings; empty arrays upload one zeroed element
// that the counts in the uniforms keep unreachable.
fn padded<T: bytemuck::Pod>(slice: &[T]) -> Vec<T> {
    if slice.is_empty() {
        vec![<T as bytemuck::Zeroable>::zeroed()]
    } else {
        slice.to_vec()
    }
}

/// Dispatch loop on the shared compute device. Runs until `state.running`
/// drops; each iteration is one progressive frame.
pub fn trace_gpu(scene: &Scene, state: std::sync::Arc<TracingState>) {
    let fw: &GpuContext = &FW;
    let flat = bvh::build_bvh(&scene.triangles, &scene.sdf);
    log::info!(
        "Scene upload: {} quads, {} triangles, {} SDF instances, {} BVH nodes",
        scene.parallelograms.len(),
        scene.triangles.len(),
        scene.sdf.len(),
        flat.nodes.len()
    );

    let width = state.width;
    let height = state.height;
    let pixel_count = (width * height) as usize;

    let mut uniforms = scene.uniforms(width, height, 1, 0.0, 1, flat.nodes.len() as u32);
    let uniforms_buffer = GpuBuffer::from_slice(fw, &[uniforms], UNIFORM_BUFFER_USAGES);

    let pixel_color_buffer =
        GpuBuffer::from_slice(fw, &vec![Vec4::ZERO; pixel_count], STORAGE_BUFFER_USAGES);
    let object_id_buffer =
        GpuBuffer::from_slice(fw, &vec![0u32; pixel_count], STORAGE_BUFFER_USAGES);
    let albedo_buffer =
        GpuBuffer::from_slice(fw, &vec![Vec4::ZERO; pixel_count], STORAGE_BUFFER_USAGES);
    let normal_buffer =
        GpuBuffer::from_slice(fw, &vec![Vec4::ZERO; pixel_count], STORAGE_BUFFER_USAGES);

    let parallelograms_buffer =
        GpuBuffer::from_slice(fw, &padded(&scene.parallelograms), STORAGE_BUFFER_USAGES);
    let triangles_buffer =
        GpuBuffer::from_slice(fw, &padded(&scene.triangles), STORAGE_BUFFER_USAGES);
    let sdf_buffer = GpuBuffer::from_slice(fw, &padded(&scene.sdf), STORAGE_BUFFER_USAGES);
    let sdf_time_buffer =
        GpuBuffer::from_slice(fw, &padded(&scene.sdf_time), STORAGE_BUFFER_USAGES);
    let materials_buffer =
        GpuBuffer::from_slice(fw, &padded(&scene.materials), STORAGE_BUFFER_USAGES);
    let bvh_buffer = GpuBuffer::from_slice(fw, &flat.nodes, STORAGE_BUFFER_USAGES);
    let bvh_inflated_buffer = GpuBuffer::from_slice(fw, &flat.inflated, STORAGE_BUFFER_USAGES);
    let atlas_mappings_buffer =
        GpuBuffer::from_slice(fw, &padded(&scene.atlas_mappings), STORAGE_BUFFER_USAGES);

    let sampler = GpuSampler::bilinear(fw);
    let atlas = GpuMippedImage::from_image(fw, &scene.atlas);

    // The geometry and atlas groups are identical across the three kernels.
    macro_rules! with_scene_groups {
        ($builder:expr) => {
            $builder
                .bind_buffer(&parallelograms_buffer, false)
                .bind_buffer(&triangles_buffer, false)
                .bind_buffer(&sdf_buffer, false)
                .bind_buffer(&sdf_time_buffer, false)
                .bind_buffer(&materials_buffer, false)
                .bind_buffer(&bvh_buffer, false)
                .bind_buffer(&bvh_inflated_buffer, false)
                .bind_buffer(&atlas_mappings_buffer, false)
                .next_group()
                .bind_sampler(&sampler)
                .bind_image(&atlas)
                .build()
        };
    }

    let surface_kernel = with_scene_groups!(GpuKernelBuilder::new(
        fw,
        KERNEL,
        "compute_surface_attributes_buffer"
    )
    .bind_uniform_buffer(&uniforms_buffer)
    .next_group()
    .bind_buffer(&object_id_buffer, true)
    .bind_buffer(&albedo_buffer, true)
    .bind_buffer(&normal_buffer, true)
    .next_group());

    let monte_carlo_kernel = with_scene_groups!(GpuKernelBuilder::new(
        fw,
        KERNEL,
        "compute_color_buffer_monte_carlo"
    )
    .bind_uniform_buffer(&uniforms_buffer)
    .next_group()
    .bind_buffer(&pixel_color_buffer, true)
    .next_group());

    let deterministic_kernel = with_scene_groups!(GpuKernelBuilder::new(
        fw,
        KERNEL,
        "compute_color_buffer_deterministic"
    )
    .bind_uniform_buffer(&uniforms_buffer)
    .next_group()
    .bind_buffer(&pixel_color_buffer, true)
    .next_group());

    let groups_x = (width + 7) / 8;
    let groups_y = (height + 7) / 8;
    let started = Instant::now();

    while state.running.load(Ordering::Relaxed) {
        if state.dirty.swap(false, Ordering::Relaxed) {
            pixel_color_buffer.write(&vec![Vec4::ZERO; pixel_count]);
            state.frame_number.store(0, Ordering::Relaxed);
        }

        let mode = state.mode();
        // The deterministic pass replaces the buffer, so its resolve divisor
        // (and seed salt) stays at one.
        let frame_number = match mode {
            RenderMode::MonteCarlo => state.frame_number.load(Ordering::Relaxed) + 1,
            RenderMode::Deterministic => 1,
        };

        {
            let camera = state.camera.read();
            uniforms = scene.uniforms_with_camera(
                &camera,
                width,
                height,
                frame_number,
                started.elapsed().as_secs_f32(),
                1,
                flat.nodes.len() as u32,
            );
        }
        uniforms_buffer.write(&[uniforms]);

        surface_kernel.enqueue(groups_x, groups_y, 1);
        match mode {
            RenderMode::MonteCarlo => monte_carlo_kernel.enqueue(groups_x, groups_y, 1),
            RenderMode::Deterministic => deterministic_kernel.enqueue(groups_x, groups_y, 1),
        }

        let accumulated = pixel_color_buffer.read_vec();
        *state.framebuffer.write() = accumulated;
        state.frame_number.store(frame_number, Ordering::Relaxed);

        if frame_number % 64 == 0 {
            log::debug!("Accumulated {} frames", frame_number);
        }
    }
}

/// CPU twin of the GPU renderer; owns flattened copies of the scene buffers
/// and runs the same per-pixel kernel bodies.
pub struct CpuRenderer {
    pub width: u32,
    pub height: u32,
    pub camera: Camera,
    pub parallelograms: Vec<shared_structs::Parallelogram>,
    pub triangles: Vec<shared_structs::Triangle>,
    pub sdf: Vec<shared_structs::SdfInstance>,
    pub sdf_time: Vec<f32>,
    pub materials: Vec<shared_structs::Material>,
    pub atlas_mappings: Vec<shared_structs::AtlasMapping>,
    pub bvh: FlatBvh,
    pub atlas_data: Vec<Vec4>,
    pub atlas_width: u32,
    pub atlas_height: u32,
    pub atlas_mip_levels: u32,
    pub accumulation: Vec<Vec4>,
    pub object_id: Vec<u32>,
    pub albedo: Vec<Vec4>,
    pub normal: Vec<Vec4>,
}

impl CpuRenderer {
    pub fn new(scene: &Scene, width: u32, height: u32) -> Self {
        let pixel_count = (width * height) as usize;
        Self {
            width,
            height,
            camera: scene.camera.clone(),
            parallelograms: scene.parallelograms.clone(),
            triangles: scene.triangles.clone(),
            sdf: scene.sdf.clone(),
            sdf_time: scene.sdf_time.clone(),
            materials: scene.materials.clone(),
            atlas_mappings: scene.atlas_mappings.clone(),
            bvh: bvh::build_bvh(&scene.triangles, &scene.sdf),
            atlas_data: scene.atlas_linear(),
            atlas_width: scene.atlas.width(),
            atlas_height: scene.atlas.height(),
            atlas_mip_levels: crate::scene::mip_level_count(
                scene.atlas.width(),
                scene.atlas.height(),
            ),
            accumulation: vec![Vec4::ZERO; pixel_count],
            object_id: vec![0; pixel_count],
            albedo: vec![Vec4::ZERO; pixel_count],
            normal: vec![Vec4::ZERO; pixel_count],
        }
    }

    pub fn make_uniforms(
        &self,
        frame_number: u32,
        time: f32,
        pixel_side_subdivision: u32,
    ) -> Uniforms {
        Uniforms {
            view: self.camera.view(),
            view_ray_origin: self.camera.view_ray_origin(),
            inv_size: Vec2::new(1.0 / self.width as f32, 1.0 / self.height as f32),
            aspect: self.width as f32 / self.height as f32,
            global_time_seconds: time,
            atlas_size: Vec2::new(self.atlas_width as f32, self.atlas_height as f32),
            width: self.width,
            height: self.height,
            pixel_count: self.width * self.height,
            frame_number,
            pixel_side_subdivision,
            atlas_mip_levels: self.atlas_mip_levels,
            parallelogram_count: self.parallelograms.len() as u32,
            triangle_count: self.triangles.len() as u32,
            sdf_count: self.sdf.len() as u32,
            bvh_node_count: self.bvh.nodes.len() as u32,
            thread_grid: UVec2::new(self.width, self.height),
            _padding: [0; 2],
        }
    }

    /// One frame of the selected mode over every pixel.
    pub fn render_frame_cpu(
        &mut self,
        mode: RenderMode,
        frame_number: u32,
        time: f32,
        pixel_side_subdivision: u32,
    ) {
        let uniforms = self.make_uniforms(frame_number, time, pixel_side_subdivision);
        let atlas = CpuImage::new(&self.atlas_data, self.atlas_width, self.atlas_height);
        let sampler = Sampler;
        let scene = SceneRefs {
            uniforms: &uniforms,
            parallelograms: &self.parallelograms,
            triangles: &self.triangles,
            sdf: &self.sdf,
            sdf_time: &self.sdf_time,
            materials: &self.materials,
            bvh: &self.bvh.nodes,
            bvh_inflated: &self.bvh.inflated,
            atlas_mappings: &self.atlas_mappings,
        };

        let width = self.width as usize;
        self.accumulation
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, pixel) in row.iter_mut().enumerate() {
                    let coord = UVec2::new(x as u32, y as u32);
                    match mode {
                        RenderMode::MonteCarlo => {
                            *pixel += kernels::monte_carlo_pixel(coord, &scene, &sampler, &atlas);
                        }
                        RenderMode::Deterministic => {
                            *pixel = kernels::deterministic_pixel(coord, &scene, &sampler, &atlas);
                        }
                    }
                }
            });
    }

    /// First-hit pass into the attribute buffers.
    pub fn render_surface_attributes(&mut self, frame_number: u32, time: f32) {
        let uniforms = self.make_uniforms(frame_number, time, 1);
        let atlas = CpuImage::new(&self.atlas_data, self.atlas_width, self.atlas_height);
        let sampler = Sampler;
        let scene = SceneRefs {
            uniforms: &uniforms,
            parallelograms: &self.parallelograms,
            triangles: &self.triangles,
            sdf: &self.sdf,
            sdf_time: &self.sdf_time,
            materials: &self.materials,
            bvh: &self.bvh.nodes,
            bvh_inflated: &self.bvh.inflated,
            atlas_mappings: &self.atlas_mappings,
        };

        let width = self.width as usize;
        let albedo = &mut self.albedo;
        let normal = &mut self.normal;
        self.object_id
            .par_chunks_mut(width)
            .zip(albedo.par_chunks_mut(width))
            .zip(normal.par_chunks_mut(width))
            .enumerate()
            .for_each(|(y, ((id_row, albedo_row), normal_row))| {
                for x in 0..width {
                    let coord = UVec2::new(x as u32, y as u32);
                    let (uid, albedo_value, normal_value) =
                        kernels::surface_attributes_pixel(coord, &scene, &sampler, &atlas);
                    id_row[x] = uid;
                    albedo_row[x] = albedo_value;
                    normal_row[x] = normal_value;
                }
            });
    }

    /// Resolved display image, linear accumulator -> RGB8-ready floats.
    pub fn resolve(&self, frame_number: u32) -> Vec<f32> {
        resolve_to_rgb(&self.accumulation, self.width, self.height, frame_number)
    }
}

/// Resolves a linear accumulator to display-ready RGB floats, one triple per
/// pixel. The frame capture path and the CPU renderer share this with the
/// fragment resolve.
pub fn resolve_to_rgb(
    accumulation: &[Vec4],
    width: u32,
    height: u32,
    frame_number: u32,
) -> Vec<f32> {
    let mut out = Vec::with_capacity(accumulation.len() * 3);
    for y in 0..height {
        for x in 0..width {
            let index = (y * width + x) as usize;
            let resolved = tonemap::resolve(
                accumulation[index],
                frame_number,
                Vec2::new(x as f32 + 0.5, y as f32 + 0.5),
            );
            out.extend([resolved.x, resolved.y, resolved.z]);
        }
    }
    out
}

/// Resolve boundary: the only pipeline that touches the swap chain. The
/// fragment stage divides the accumulator by the frame count and applies
/// tonemap, gamma, and dither.
pub struct ResolvePipeline {
    pipeline: wgpu::RenderPipeline,
    uniforms_bind_group: wgpu::BindGroup,
    color_bind_group: wgpu::BindGroup,
    uniforms_buffer: wgpu::Buffer,
    color_buffer: wgpu::Buffer,
}

impl ResolvePipeline {
    pub fn new(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    ) -> Self {
        use wgpu::util::DeviceExt;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("resolve"),
            source: wgpu::util::make_spirv(KERNEL),
        });

        let uniforms_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: None,
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let color_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: None,
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Storage { read_only: true },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: None,
            bind_group_layouts: &[&uniforms_layout, &color_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("resolve"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs",
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs",
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        let uniforms_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: None,
            contents: bytemuck::bytes_of(&Uniforms::default()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let color_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: None,
            size: (width as u64) * (height as u64) * 16,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let uniforms_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: None,
            layout: &uniforms_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniforms_buffer.as_entire_binding(),
            }],
        });
        let color_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: None,
            layout: &color_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: color_buffer.as_entire_binding(),
            }],
        });

        Self {
            pipeline,
            uniforms_bind_group,
            color_bind_group,
            uniforms_buffer,
            color_buffer,
        }
    }

    pub fn prepare(&self, queue: &wgpu::Queue, framebuffer: &[Vec4], uniforms: &Uniforms) {
        queue.write_buffer(&self.color_buffer, 0, bytemuck::cast_slice(framebuffer));
        queue.write_buffer(&self.uniforms_buffer, 0, bytemuck::bytes_of(uniforms));
    }

    pub fn paint<'rpass>(&'rpass self, rpass: &mut wgpu::RenderPass<'rpass>) {
        rpass.set_pipeline(&self.pipeline);
        rpass.set_bind_group(0, &self.uniforms_bind_group, &[]);
        rpass.set_bind_group(1, &self.color_bind_group, &[]);
        rpass.draw(0..3, 0..1);
    }
}
