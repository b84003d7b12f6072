use std::sync::atomic::Ordering;
use std::sync::Arc;

use winit::dpi::LogicalSize;
use winit::event::{ElementState, Event, KeyEvent, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::WindowBuilder;

use lucent::render::{self, ResolvePipeline, TracingState};
use lucent::scene::Scene;

const WIDTH: u32 = 960;
const HEIGHT: u32 = 540;

fn main() {
    env_logger::init();

    let event_loop = EventLoop::new().expect("Failed to create event loop.");
    let window = Arc::new(
        WindowBuilder::new()
            .with_title("lucent")
            .with_inner_size(LogicalSize::new(WIDTH, HEIGHT))
            .with_resizable(false)
            .build(&event_loop)
            .expect("Failed to create window."),
    );

    // Presentation runs on its own device; the compute device lives in the
    // render thread and hands frames over through the shared accumulator.
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
    let surface = instance
        .create_surface(window.clone())
        .expect("Failed to create surface.");
    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::HighPerformance,
        compatible_surface: Some(&surface),
        force_fallback_adapter: false,
    }))
    .expect("Failed to create presentation adapter.");
    let (device, queue) = pollster::block_on(adapter.request_device(
        &wgpu::DeviceDescriptor {
            label: None,
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
        },
        None,
    ))
    .expect("Failed to create presentation device.");

    let capabilities = surface.get_capabilities(&adapter);
    let format = capabilities.formats[0];
    let size = window.inner_size();
    surface.configure(
        &device,
        &wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width,
            height: size.height,
            present_mode: wgpu::PresentMode::Fifo,
            desired_maximum_frame_latency: 2,
            alpha_mode: capabilities.alpha_modes[0],
            view_formats: vec![],
        },
    );

    let scene = Scene::cornell();
    let state = Arc::new(TracingState::new(
        size.width,
        size.height,
        scene.camera.clone(),
    ));
    let resolve = ResolvePipeline::new(&device, format, size.width, size.height);

    let render_thread = {
        let state = state.clone();
        std::thread::spawn(move || render::trace_gpu(&scene, state))
    };
    let mut render_thread = Some(render_thread);

    event_loop
        .run(move |event, elwt| {
            elwt.set_control_flow(ControlFlow::Poll);
            match event {
                Event::WindowEvent { event, .. } => match event {
                    WindowEvent::CloseRequested => {
                        state.running.store(false, Ordering::Relaxed);
                        if let Some(handle) = render_thread.take() {
                            handle.join().expect("Render thread died.");
                        }
                        elwt.exit();
                    }
                    WindowEvent::KeyboardInput {
                        event:
                            KeyEvent {
                                physical_key: PhysicalKey::Code(code),
                                state: ElementState::Pressed,
                                ..
                            },
                        ..
                    } => handle_key(code, &state),
                    WindowEvent::RedrawRequested => {
                        let frame = match surface.get_current_texture() {
                            Ok(frame) => frame,
                            Err(_) => return,
                        };
                        let view = frame
                            .texture
                            .create_view(&wgpu::TextureViewDescriptor::default());

                        let mut uniforms = shared_structs::Uniforms::default();
                        uniforms.width = state.width;
                        uniforms.height = state.height;
                        uniforms.thread_grid = glam::UVec2::new(state.width, state.height);
                        uniforms.frame_number = state.frame_number.load(Ordering::Relaxed).max(1);

                        let framebuffer = state.framebuffer.read().clone();
                        resolve.prepare(&queue, &framebuffer, &uniforms);

                        let mut encoder = device
                            .create_command_encoder(&wgpu::CommandEncoderDescriptor::default());
                        {
                            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                                label: None,
                                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                                    view: &view,
                                    resolve_target: None,
                                    ops: wgpu::Operations {
                                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                                        store: wgpu::StoreOp::Store,
                                    },
                                })],
                                depth_stencil_attachment: None,
                                timestamp_writes: None,
                                occlusion_query_set: None,
                            });
                            resolve.paint(&mut rpass);
                        }
                        queue.submit(std::iter::once(encoder.finish()));
                        frame.present();
                    }
                    _ => {}
                },
                Event::AboutToWait => window.request_redraw(),
                _ => {}
            }
        })
        .expect("Event loop error.");
}

fn handle_key(code: KeyCode, state: &TracingState) {
    match code {
        KeyCode::KeyM => {
            let deterministic = state.deterministic.load(Ordering::Relaxed);
            state.deterministic.store(!deterministic, Ordering::Relaxed);
            state.dirty.store(true, Ordering::Relaxed);
            log::info!(
                "Render mode: {}",
                if deterministic {
                    "Monte Carlo"
                } else {
                    "deterministic"
                }
            );
            return;
        }
        KeyCode::KeyP => {
            save_render(state);
            return;
        }
        _ => {}
    }

    let step = 0.1;
    let delta = match code {
        KeyCode::KeyW => glam::Vec3::new(0.0, 0.0, -step),
        KeyCode::KeyS => glam::Vec3::new(0.0, 0.0, step),
        KeyCode::KeyA => glam::Vec3::new(-step, 0.0, 0.0),
        KeyCode::KeyD => glam::Vec3::new(step, 0.0, 0.0),
        KeyCode::KeyQ => glam::Vec3::new(0.0, -step, 0.0),
        KeyCode::KeyE => glam::Vec3::new(0.0, step, 0.0),
        _ => return,
    };

    {
        let mut camera = state.camera.write();
        camera.position += delta;
        camera.look_at += delta;
    }
    state.dirty.store(true, Ordering::Relaxed);
}

/// Resolves the current accumulator through the same path as the display and
/// writes it out as a PNG next to the executable.
fn save_render(state: &TracingState) {
    let frame_number = state.frame_number.load(Ordering::Relaxed).max(1);
    let framebuffer = state.framebuffer.read().clone();
    let resolved = render::resolve_to_rgb(&framebuffer, state.width, state.height, frame_number);

    let mut image = image::RgbaImage::new(state.width, state.height);
    for (index, pixel) in image.pixels_mut().enumerate() {
        let r = (resolved[index * 3].clamp(0.0, 1.0) * 255.0) as u8;
        let g = (resolved[index * 3 + 1].clamp(0.0, 1.0) * 255.0) as u8;
        let b = (resolved[index * 3 + 2].clamp(0.0, 1.0) * 255.0) as u8;
        *pixel = image::Rgba([r, g, b, 255]);
    }

    let path = format!("render-{:05}.png", frame_number);
    match image.save(&path) {
        Ok(()) => log::info!("Saved {}", path),
        Err(error) => log::error!("Failed to save {}: {}", path, error),
    }
}
