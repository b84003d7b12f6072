//! Thin wgpu wrapper: a shared device/queue, typed buffers, and a compute
//! kernel builder that mirrors the shader's bind group layout (one group per
//! resource family).

use std::marker::PhantomData;

use wgpu::util::DeviceExt;

pub const STORAGE_BUFFER_USAGES: wgpu::BufferUsages = wgpu::BufferUsages::from_bits_truncate(
    wgpu::BufferUsages::STORAGE.bits()
        | wgpu::BufferUsages::COPY_SRC.bits()
        | wgpu::BufferUsages::COPY_DST.bits(),
);
pub const UNIFORM_BUFFER_USAGES: wgpu::BufferUsages = wgpu::BufferUsages::from_bits_truncate(
    wgpu::BufferUsages::UNIFORM.bits() | wgpu::BufferUsages::COPY_DST.bits(),
);

pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl Default for GpuContext {
    fn default() -> Self {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::util::backend_bits_from_env().unwrap_or(wgpu::Backends::PRIMARY),
            ..Default::default()
        });
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::util::power_preference_from_env()
                .unwrap_or(wgpu::PowerPreference::HighPerformance),
            ..Default::default()
        }))
        .expect("Failed at adapter creation.");
        pollster::block_on(Self::new(adapter))
    }
}

impl GpuContext {
    pub async fn new(adapter: wgpu::Adapter) -> Self {
        let info = adapter.get_info();
        log::info!("Compute adapter: {} ({:?})", info.name, info.backend);
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: None,
                    required_features: wgpu::Features::empty(),
                    required_limits: adapter.limits(),
                },
                None,
            )
            .await
            .expect("Failed at device creation.");
        Self { device, queue }
    }
}

pub struct GpuBuffer<'fw, T> {
    fw: &'fw GpuContext,
    buffer: wgpu::Buffer,
    len: usize,
    marker: PhantomData<T>,
}

impl<'fw, T: bytemuck::Pod> GpuBuffer<'fw, T> {
    pub fn from_slice(fw: &'fw GpuContext, slice: &[T], usages: wgpu::BufferUsages) -> Self {
        let buffer = fw
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: None,
                contents: bytemuck::cast_slice(slice),
                usage: usages,
            });
        Self {
            fw,
            buffer,
            len: slice.len(),
            marker: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn raw(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    pub fn write(&self, slice: &[T]) {
        self.fw
            .queue
            .write_buffer(&self.buffer, 0, bytemuck::cast_slice(slice));
    }

    /// Blocking readback through a staging buffer.
    pub fn read_vec(&self) -> Vec<T> {
        let size = (self.len * std::mem::size_of::<T>()) as u64;
        let staging = self.fw.device.create_buffer(&wgpu::BufferDescriptor {
            label: None,
            size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .fw
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor::default());
        encoder.copy_buffer_to_buffer(&self.buffer, 0, &staging, 0, size);
        self.fw.queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.fw.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .expect("Readback channel closed.")
            .expect("Failed to map staging buffer.");

        let data = {
            let view = slice.get_mapped_range();
            bytemuck::cast_slice(&view[..]).to_vec()
        };
        staging.unmap();
        data
    }
}

pub struct GpuSampler {
    sampler: wgpu::Sampler,
}

impl GpuSampler {
    /// Bilinear, mip-interpolating sampler; coordinate wrapping is done in
    /// the shader, so the address mode only covers filter taps at region
    /// borders.
    pub fn bilinear(fw: &GpuContext) -> Self {
        let sampler = fw.device.create_sampler(&wgpu::SamplerDescriptor {
            label: None,
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            lod_min_clamp: 0.0,
            lod_max_clamp: 32.0,
            compare: None,
            anisotropy_clamp: 1,
            border_color: None,
        });
        Self { sampler }
    }
}

pub struct GpuMippedImage {
    texture_view: wgpu::TextureView,
    pub mip_level_count: u32,
}

impl GpuMippedImage {
    pub fn from_image(fw: &GpuContext, base: &image::RgbaImage) -> Self {
        let mips = mip_chain(base);
        let texture = fw.device.create_texture(&wgpu::TextureDescriptor {
            label: None,
            size: wgpu::Extent3d {
                width: base.width(),
                height: base.height(),
                depth_or_array_layers: 1,
            },
            mip_level_count: mips.len() as u32,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        for (level, mip) in mips.iter().enumerate() {
            fw.queue.write_texture(
                wgpu::ImageCopyTexture {
                    texture: &texture,
                    mip_level: level as u32,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                mip.as_raw(),
                wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(4 * mip.width()),
                    rows_per_image: Some(mip.height()),
                },
                wgpu::Extent3d {
                    width: mip.width(),
                    height: mip.height(),
                    depth_or_array_layers: 1,
                },
            );
        }

        let texture_view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture_view,
            mip_level_count: mips.len() as u32,
        }
    }
}

/// Full mip pyramid down to 1x1, simple box filter.
pub fn mip_chain(base: &image::RgbaImage) -> Vec<image::RgbaImage> {
    let mut mips = vec![base.clone()];
    loop {
        let last = mips.last().unwrap();
        if last.width() == 1 && last.height() == 1 {
            break;
        }
        let width = (last.width() / 2).max(1);
        let height = (last.height() / 2).max(1);
        let mut next = image::RgbaImage::new(width, height);
        for y in 0..height {
            for x in 0..width {
                let mut sum = [0u32; 4];
                for (dx, dy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
                    let sx = (x * 2 + dx).min(last.width() - 1);
                    let sy = (y * 2 + dy).min(last.height() - 1);
                    let pixel = last.get_pixel(sx, sy);
                    for c in 0..4 {
                        sum[c] += pixel.0[c] as u32;
                    }
                }
                next.put_pixel(
                    x,
                    y,
                    image::Rgba([
                        (sum[0] / 4) as u8,
                        (sum[1] / 4) as u8,
                        (sum[2] / 4) as u8,
                        (sum[3] / 4) as u8,
                    ]),
                );
            }
        }
        mips.push(next);
    }
    mips
}

pub struct GpuKernelBuilder<'fw, 'res> {
    fw: &'fw GpuContext,
    shader: wgpu::ShaderModule,
    entry_point: String,
    layout_groups: Vec<Vec<wgpu::BindGroupLayoutEntry>>,
    bind_groups: Vec<Vec<wgpu::BindGroupEntry<'res>>>,
}

pub struct GpuKernel<'fw> {
    fw: &'fw GpuContext,
    pipeline: wgpu::ComputePipeline,
    bind_groups: Vec<wgpu::BindGroup>,
}

impl<'fw, 'res> GpuKernelBuilder<'fw, 'res> {
    pub fn new(fw: &'fw GpuContext, spirv: &[u8], entry_point: &str) -> Self {
        let source = wgpu::util::make_spirv(spirv);
        let shader = fw.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(entry_point),
            source,
        });
        Self {
            fw,
            shader,
            entry_point: entry_point.into(),
            layout_groups: vec![Vec::new()],
            bind_groups: vec![Vec::new()],
        }
    }

    /// Starts the next descriptor set; bindings added afterwards land in it.
    pub fn next_group(mut self) -> Self {
        self.layout_groups.push(Vec::new());
        self.bind_groups.push(Vec::new());
        self
    }

    fn push(mut self, ty: wgpu::BindingType, resource: wgpu::BindingResource<'res>) -> Self {
        let binding = self.layout_groups.last().unwrap().len() as u32;
        self.layout_groups
            .last_mut()
            .unwrap()
            .push(wgpu::BindGroupLayoutEntry {
                binding,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty,
                count: None,
            });
        self.bind_groups
            .last_mut()
            .unwrap()
            .push(wgpu::BindGroupEntry { binding, resource });
        self
    }

    pub fn bind_uniform_buffer<T: bytemuck::Pod>(
        self,
        uniform_buffer: &'res GpuBuffer<T>,
    ) -> Self {
        let resource = uniform_buffer.buffer.as_entire_binding();
        self.push(
            wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            resource,
        )
    }

    pub fn bind_buffer<T: bytemuck::Pod>(
        self,
        storage_buffer: &'res GpuBuffer<T>,
        writable: bool,
    ) -> Self {
        let resource = storage_buffer.buffer.as_entire_binding();
        self.push(
            wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage {
                    read_only: !writable,
                },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            resource,
        )
    }

    pub fn bind_sampler(self, sampler: &'res GpuSampler) -> Self {
        self.push(
            wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            wgpu::BindingResource::Sampler(&sampler.sampler),
        )
    }

    pub fn bind_image(self, image: &'res GpuMippedImage) -> Self {
        self.push(
            wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                multisampled: false,
                view_dimension: wgpu::TextureViewDimension::D2,
            },
            wgpu::BindingResource::TextureView(&image.texture_view),
        )
    }

    pub fn build(self) -> GpuKernel<'fw> {
        let layouts = self
            .layout_groups
            .iter()
            .map(|entries| {
                self.fw
                    .device
                    .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                        label: None,
                        entries,
                    })
            })
            .collect::<Vec<_>>();

        let bind_groups = self
            .bind_groups
            .iter()
            .zip(layouts.iter())
            .map(|(entries, layout)| {
                self.fw.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: None,
                    layout,
                    entries,
                })
            })
            .collect::<Vec<_>>();

        let layout_refs = layouts.iter().collect::<Vec<_>>();
        let pipeline_layout =
            self.fw
                .device
                .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                    label: None,
                    bind_group_layouts: &layout_refs,
                    push_constant_ranges: &[],
                });

        let pipeline =
            self.fw
                .device
                .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                    label: Some(&self.entry_point),
                    layout: Some(&pipeline_layout),
                    module: &self.shader,
                    entry_point: &self.entry_point,
                });

        GpuKernel {
            fw: self.fw,
            pipeline,
            bind_groups,
        }
    }
}

impl<'fw> GpuKernel<'fw> {
    pub fn enqueue(&self, x: u32, y: u32, z: u32) {
        let mut encoder = self
            .fw
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor::default());
        {
            let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor::default());
            cpass.set_pipeline(&self.pipeline);
            for (i, group) in self.bind_groups.iter().enumerate() {
                cpass.set_bind_group(i as u32, group, &[]);
            }
            cpass.dispatch_workgroups(x, y, z);
        }
        self.fw.queue.submit(Some(encoder.finish()));
    }
}
