use std::sync::Arc;

use anyhow::{Context, Result};
use palette::LinSrgba;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, error, info, warn};
use wgpu::util::DeviceExt;
use wgpu::SurfaceError;
use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::carousel::{CarouselUniforms, DrawTarget, Frame, LabelSet, TextureSlot};
use crate::config::{Configuration, NoiseSettings, parse_color};
use crate::events::PreparedImageCpu;

use super::labels::LabelRenderer;

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct Vertex {
    pos: [f32; 2],
    uv: [f32; 2],
}

// Unit quad centred on the origin; the vertex stage scales it to the element box.
const QUAD: [Vertex; 4] = [
    Vertex {
        pos: [-0.5, -0.5],
        uv: [0.0, 1.0],
    }, // bottom-left
    Vertex {
        pos: [0.5, -0.5],
        uv: [1.0, 1.0],
    }, // bottom-right
    Vertex {
        pos: [-0.5, 0.5],
        uv: [0.0, 0.0],
    }, // top-left
    Vertex {
        pos: [0.5, 0.5],
        uv: [1.0, 0.0],
    }, // top-right
];

/// Dissolve mask values in `[0.1, 1.0]`, one byte per cell.
pub fn noise_mask(settings: &NoiseSettings) -> Vec<u8> {
    let mut rng = match settings.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let cells = settings.width as usize * settings.height as usize;
    (0..cells)
        .map(|_| {
            let value = 0.1 + 0.9 * rng.random::<f32>();
            (value * 255.0).round() as u8
        })
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn upload_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &str,
    format: wgpu::TextureFormat,
    width: u32,
    height: u32,
    bytes_per_pixel: u32,
    data: &[u8],
) -> wgpu::TextureView {
    let size = wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        texture.as_image_copy(),
        data,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(bytes_per_pixel * width),
            rows_per_image: Some(height),
        },
        size,
    );
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

fn to_wgpu_color(color: LinSrgba) -> wgpu::Color {
    wgpu::Color {
        r: color.red as f64,
        g: color.green as f64,
        b: color.blue as f64,
        a: color.alpha as f64,
    }
}

/// Everything the window needs to render carousel frames.
pub struct GpuState {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    pipeline: wgpu::RenderPipeline,
    bind_layout: wgpu::BindGroupLayout,
    bind_group: wgpu::BindGroup,
    bound: (TextureSlot, TextureSlot),
    vertex_buf: wgpu::Buffer,
    uniform_buf: wgpu::Buffer,
    image_sampler: wgpu::Sampler,
    noise_sampler: wgpu::Sampler,
    images: Vec<wgpu::TextureView>,
    blank: wgpu::TextureView,
    noise: wgpu::TextureView,
    labels: LabelRenderer,
    scale_factor: f64,
    lost: bool,
    fatal: bool,
}

impl GpuState {
    pub fn new(
        window: Arc<Window>,
        cfg: &Configuration,
        images: &[PreparedImageCpu],
        labels: &LabelSet,
    ) -> Result<Self> {
        let instance = wgpu::Instance::default();
        let surface = instance
            .create_surface(window.clone())
            .context("failed to create surface")?;
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .context("failed to acquire GPU adapter")?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|fmt| fmt.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .context("surface reports no texture formats")?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let limits = adapter.limits();
        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("carousel-device"),
            required_features: wgpu::Features::empty(),
            required_limits: limits,
            memory_hints: wgpu::MemoryHints::default(),
            experimental_features: Default::default(),
            trace: wgpu::Trace::Off,
        }))
        .context("failed to acquire GPU device")?;

        let size = window.inner_size();
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        info!(
            width = config.width,
            height = config.height,
            format = ?config.format,
            "viewer surface configured",
        );

        let image_views: Vec<wgpu::TextureView> = images
            .iter()
            .enumerate()
            .map(|(index, img)| {
                upload_texture(
                    &device,
                    &queue,
                    &format!("carousel-image-{index}"),
                    wgpu::TextureFormat::Rgba8UnormSrgb,
                    img.width,
                    img.height,
                    4,
                    &img.pixels,
                )
            })
            .collect();
        let blank = upload_texture(
            &device,
            &queue,
            "carousel-blank",
            wgpu::TextureFormat::Rgba8UnormSrgb,
            1,
            1,
            4,
            &[0, 0, 0, 0],
        );
        let noise = upload_texture(
            &device,
            &queue,
            "carousel-noise",
            wgpu::TextureFormat::R8Unorm,
            cfg.noise.width,
            cfg.noise.height,
            1,
            &noise_mask(&cfg.noise),
        );

        let image_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("carousel-image-sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let noise_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("carousel-noise-sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let vertex_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("carousel-quad"),
            contents: bytemuck::cast_slice(&QUAD),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let uniform_buf = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("carousel-uniforms"),
            size: std::mem::size_of::<CarouselUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("carousel-shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("carousel.wgsl").into()),
        });

        let texture_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                multisampled: false,
                view_dimension: wgpu::TextureViewDimension::D2,
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
            },
            count: None,
        };
        let sampler_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        };
        let bind_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("carousel-bind-layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                texture_entry(1),
                texture_entry(2),
                texture_entry(3),
                sampler_entry(4),
                sampler_entry(5),
            ],
        });

        let pip_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("carousel-pipeline-layout"),
            bind_group_layouts: &[&bind_layout],
            immediate_size: 0,
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("carousel-pipeline"),
            layout: Some(&pip_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<Vertex>() as u64,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2],
                }],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleStrip,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        let label_color = parse_color(&cfg.label_color)?;
        let mut label_renderer = LabelRenderer::new(
            &device,
            &queue,
            format,
            labels,
            images.len(),
            cfg.font.as_deref(),
            label_color,
        );
        label_renderer.resize(size, labels);

        let bound = (TextureSlot::Blank, TextureSlot::Blank);
        let bind_group = create_bind_group(
            &device,
            &bind_layout,
            &uniform_buf,
            [&blank, &blank, &noise],
            &image_sampler,
            &noise_sampler,
        );

        Ok(Self {
            surface,
            device,
            queue,
            config,
            pipeline,
            bind_layout,
            bind_group,
            bound,
            vertex_buf,
            uniform_buf,
            image_sampler,
            noise_sampler,
            images: image_views,
            blank,
            noise,
            labels: label_renderer,
            scale_factor: window.scale_factor(),
            lost: false,
            fatal: false,
        })
    }

    /// Set after an unrecoverable surface error; the host should exit.
    pub fn is_fatal(&self) -> bool {
        self.fatal
    }

    /// Set when the surface had to be reconfigured and the frame was skipped.
    pub fn take_lost(&mut self) -> bool {
        std::mem::take(&mut self.lost)
    }

    pub fn resize(&mut self, size: PhysicalSize<u32>, scale_factor: f64, labels: &LabelSet) {
        self.config.width = size.width.max(1);
        self.config.height = size.height.max(1);
        self.scale_factor = scale_factor;
        self.surface.configure(&self.device, &self.config);
        self.labels.resize(size, labels);
        debug!(
            width = self.config.width,
            height = self.config.height,
            "viewer surface resized",
        );
    }

    fn view_for(&self, slot: TextureSlot) -> &wgpu::TextureView {
        slot.index()
            .and_then(|index| self.images.get(index))
            .unwrap_or(&self.blank)
    }

    fn sync_bindings(&mut self, slots: (TextureSlot, TextureSlot)) {
        if slots == self.bound {
            return;
        }
        self.bind_group = create_bind_group(
            &self.device,
            &self.bind_layout,
            &self.uniform_buf,
            [self.view_for(slots.0), self.view_for(slots.1), &self.noise],
            &self.image_sampler,
            &self.noise_sampler,
        );
        self.bound = slots;
        debug!(a = ?slots.0, b = ?slots.1, "texture_slots_rebound");
    }

    /// Caption anchor in physical pixels: horizontally centred on the element
    /// box, one line below its bottom edge.
    fn label_anchor(&self, frame: &Frame<'_>) -> (f32, f32) {
        let scale = self.scale_factor as f32;
        let win_w = self.config.width as f32 / scale;
        let win_h = self.config.height as f32 / scale;
        let g = &frame.params.geometry;
        let center_x = g.center[0] + win_w / 2.0;
        let bottom = win_h / 2.0 - g.center[1] + g.height / 2.0;
        let gap = self.labels.line_height() * 0.5;
        (center_x * scale, bottom * scale + gap)
    }
}

impl DrawTarget for GpuState {
    fn draw(&mut self, frame: &Frame<'_>) {
        if self.fatal {
            return;
        }
        let params = frame.params;
        self.sync_bindings((params.texture_a, params.texture_b));
        let uniforms = CarouselUniforms::from(params);
        self.queue
            .write_buffer(&self.uniform_buf, 0, bytemuck::bytes_of(&uniforms));
        let anchor = self.label_anchor(frame);
        self.labels.prepare(frame.labels, anchor);

        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(SurfaceError::Outdated) | Err(SurfaceError::Lost) => {
                info!("viewer surface lost; reconfiguring");
                self.surface.configure(&self.device, &self.config);
                self.lost = true;
                return;
            }
            Err(SurfaceError::OutOfMemory) => {
                error!("viewer surface out of memory; exiting event loop");
                self.fatal = true;
                return;
            }
            Err(SurfaceError::Timeout) => {
                warn!("viewer surface acquisition timed out");
                return;
            }
            Err(SurfaceError::Other) => {
                warn!("viewer surface reported an unknown error; retrying");
                self.surface.configure(&self.device, &self.config);
                self.lost = true;
                return;
            }
        };

        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("carousel-encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("carousel-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(to_wgpu_color(params.background)),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
                multiview_mask: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.bind_group, &[]);
            pass.set_vertex_buffer(0, self.vertex_buf.slice(..));
            pass.draw(0..QUAD.len() as u32, 0..1);
            self.labels.render(&mut pass);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        self.labels.trim();
    }
}

fn create_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    uniforms: &wgpu::Buffer,
    [tex_a, tex_b, noise]: [&wgpu::TextureView; 3],
    image_sampler: &wgpu::Sampler,
    noise_sampler: &wgpu::Sampler,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("carousel-bind-group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: uniforms.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(tex_a),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::TextureView(tex_b),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: wgpu::BindingResource::TextureView(noise),
            },
            wgpu::BindGroupEntry {
                binding: 4,
                resource: wgpu::BindingResource::Sampler(image_sampler),
            },
            wgpu::BindGroupEntry {
                binding: 5,
                resource: wgpu::BindingResource::Sampler(noise_sampler),
            },
        ],
    })
}
