//! wgpu-backed [`Canvas`] for the windowed front end.
//!
//! Canvas calls are tessellated into flat-colored triangles in canvas pixel
//! space as they arrive; [`GpuCanvas::present`] uploads the frame's
//! triangles and draws them with a pixel-space orthographic camera (origin
//! top-left, y down), so a canvas pixel is a surface pixel.
//!
//! Text is drawn with the 5x7 bitmap font in [`glyphs`](super::glyphs), one
//! quad per lit glyph pixel.

use std::f64::consts::TAU;
use std::sync::Arc;

use tracing::warn;
use wgpu::util::DeviceExt;

use super::canvas::{Canvas, CanvasState, Font};
use super::color::Rgba;
use super::glyphs;

/// Segments per circle.
const CIRCLE_SEGMENTS: usize = 32;
/// Upper bound on vertices per frame (sizes the vertex buffer).
const MAX_VERTICES: usize = 196_608;

/// Surface background, zinc-900.
const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.094,
    g: 0.094,
    b: 0.106,
    a: 1.0,
};

// ---------------------------------------------------------------------------
// Vertex
// ---------------------------------------------------------------------------

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck_derive::Pod, bytemuck_derive::Zeroable)]
struct Vertex {
    position: [f32; 2],
    color: [f32; 4],
}

impl Vertex {
    fn layout() -> wgpu::VertexBufferLayout<'static> {
        const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
            wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x4];
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &ATTRIBUTES,
        }
    }
}

/// Column-major projection from canvas pixels to clip space.
fn pixel_projection(width: f32, height: f32) -> [f32; 16] {
    let sx = 2.0 / width;
    let sy = -2.0 / height;
    [
        sx, 0.0, 0.0, 0.0, //
        0.0, sy, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        -1.0, 1.0, 0.0, 1.0, //
    ]
}

// ---------------------------------------------------------------------------
// Tessellation
// ---------------------------------------------------------------------------

/// Triangle builder shared by all fill calls. Kept separate from the GPU
/// state so it works without a device.
#[derive(Debug, Default)]
struct Tessellator {
    state: CanvasState,
    vertices: Vec<Vertex>,
    overflowed: bool,
}

impl Tessellator {
    fn color(&self) -> [f32; 4] {
        Rgba::parse_or_fallback(self.state.fill()).to_array()
    }

    fn push(&mut self, points: [(f64, f64); 3], color: [f32; 4]) {
        if self.vertices.len() + 3 > MAX_VERTICES {
            if !self.overflowed {
                warn!(max = MAX_VERTICES, "frame exceeds vertex budget; dropping geometry");
                self.overflowed = true;
            }
            return;
        }
        for (x, y) in points {
            let (x, y) = self.state.to_device(x, y);
            self.vertices.push(Vertex {
                position: [x as f32, y as f32],
                color,
            });
        }
    }

    /// Local-space axis-aligned quad.
    fn quad(&mut self, x: f64, y: f64, w: f64, h: f64, color: [f32; 4]) {
        let (x1, y1) = (x + w, y + h);
        self.push([(x, y), (x1, y), (x1, y1)], color);
        self.push([(x, y), (x1, y1), (x, y1)], color);
    }

    fn circle(&mut self, cx: f64, cy: f64, r: f64, color: [f32; 4]) {
        let at = |i: usize| {
            let a = TAU * i as f64 / CIRCLE_SEGMENTS as f64;
            (cx + r * a.cos(), cy + r * a.sin())
        };
        for i in 0..CIRCLE_SEGMENTS {
            self.push([(cx, cy), at(i), at(i + 1)], color);
        }
    }

    fn text(&mut self, text: &str, cx: f64, cy: f64, font: &Font, color: [f32; 4]) {
        let cell = font.size_px / glyphs::GLYPH_HEIGHT as f64;
        let count = text.chars().count();
        if count == 0 {
            return;
        }
        let total_w = (count * glyphs::ADVANCE - 1) as f64 * cell;
        let left = cx - total_w / 2.0;
        let top = cy - font.size_px / 2.0;
        for (i, c) in text.chars().enumerate() {
            let x0 = left + (i * glyphs::ADVANCE) as f64 * cell;
            for (col, row) in glyphs::lit_cells(c) {
                self.quad(x0 + col as f64 * cell, top + row as f64 * cell, cell, cell, color);
            }
        }
    }

    fn reset_frame(&mut self) {
        self.vertices.clear();
        self.overflowed = false;
    }
}

// ---------------------------------------------------------------------------
// GpuCanvas
// ---------------------------------------------------------------------------

/// A [`Canvas`] that renders into a winit window through wgpu.
pub struct GpuCanvas {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    render_pipeline: wgpu::RenderPipeline,
    vertex_buffer: wgpu::Buffer,
    camera_buffer: wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,
    window: Arc<winit::window::Window>,
    tess: Tessellator,
}

impl GpuCanvas {
    /// Set up surface, device and pipeline for `window`.
    ///
    /// Call through `pollster::block_on`.
    ///
    /// # Errors
    ///
    /// Returns an error if no suitable GPU adapter or device is available.
    pub async fn new(window: Arc<winit::window::Window>) -> Result<Self, anyhow::Error> {
        let size = window.inner_size();
        let width = size.width.max(1);
        let height = size.height.max(1);

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::LowPower,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| anyhow::anyhow!("no suitable GPU adapter found"))?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("moa_canvas"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|f| !f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| anyhow::anyhow!("surface reports no texture formats"))?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width,
            height,
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("moa_canvas_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders.wgsl").into()),
        });

        let projection = pixel_projection(width as f32, height as f32);
        let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("canvas_projection"),
            contents: bytemuck::cast_slice(&projection),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let camera_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("canvas_projection_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("canvas_projection_group"),
            layout: &camera_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("moa_canvas_pipeline_layout"),
            bind_group_layouts: &[&camera_layout],
            push_constant_ranges: &[],
        });
        let render_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("moa_canvas_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[Vertex::layout()],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: config.format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let vertex_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("canvas_vertices"),
            size: (MAX_VERTICES * std::mem::size_of::<Vertex>()) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Ok(Self {
            surface,
            device,
            queue,
            config,
            render_pipeline,
            vertex_buffer,
            camera_buffer,
            camera_bind_group,
            window,
            tess: Tessellator::default(),
        })
    }

    pub fn window(&self) -> &winit::window::Window {
        &self.window
    }

    /// Reconfigure the surface for a new window size. Zero sizes (minimised
    /// windows) are ignored.
    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);
        let projection = pixel_projection(new_size.width as f32, new_size.height as f32);
        self.queue
            .write_buffer(&self.camera_buffer, 0, bytemuck::cast_slice(&projection));
    }

    /// Draw everything painted since the last `clear` and present it.
    ///
    /// # Errors
    ///
    /// Returns a [`wgpu::SurfaceError`] if the surface cannot provide an
    /// output texture (window minimised, surface lost).
    pub fn present(&mut self) -> Result<(), wgpu::SurfaceError> {
        let vertices = &self.tess.vertices;
        if !vertices.is_empty() {
            self.queue
                .write_buffer(&self.vertex_buffer, 0, bytemuck::cast_slice(vertices));
        }

        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("moa_canvas_encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("moa_canvas_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&self.render_pipeline);
            pass.set_bind_group(0, &self.camera_bind_group, &[]);
            pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
            if !vertices.is_empty() {
                pass.draw(0..vertices.len() as u32, 0..1);
            }
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

impl Canvas for GpuCanvas {
    fn width(&self) -> f64 {
        self.config.width as f64
    }

    fn height(&self) -> f64 {
        self.config.height as f64
    }

    fn clear(&mut self) {
        self.tess.reset_frame();
    }

    fn save(&mut self) {
        self.tess.state.save();
    }

    fn restore(&mut self) {
        self.tess.state.restore();
    }

    fn translate(&mut self, x: f64, y: f64) {
        self.tess.state.translate(x, y);
    }

    fn rotate(&mut self, angle: f64) {
        self.tess.state.rotate(angle);
    }

    fn set_fill_style(&mut self, color: &str) {
        self.tess.state.set_fill(color);
    }

    fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64) {
        let color = self.tess.color();
        self.tess.quad(x, y, width, height, color);
    }

    fn fill_circle(&mut self, cx: f64, cy: f64, radius: f64) {
        let color = self.tess.color();
        self.tess.circle(cx, cy, radius, color);
    }

    fn fill_text(&mut self, text: &str, x: f64, y: f64, font: &Font) {
        let color = self.tess.color();
        self.tess.text(text, x, y, font, color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projection_maps_canvas_corners_to_clip_corners() {
        let m = pixel_projection(800.0, 600.0);
        let clip = |x: f32, y: f32| (m[0] * x + m[12], m[5] * y + m[13]);
        assert_eq!(clip(0.0, 0.0), (-1.0, 1.0));
        assert_eq!(clip(800.0, 600.0), (1.0, -1.0));
    }

    #[test]
    fn rect_is_two_triangles_in_device_space() {
        let mut t = Tessellator::default();
        t.state.translate(10.0, 10.0);
        t.quad(-10.0, -10.0, 20.0, 20.0, [1.0; 4]);
        assert_eq!(t.vertices.len(), 6);
        assert_eq!(t.vertices[0].position, [0.0, 0.0]);
        assert_eq!(t.vertices[2].position, [20.0, 20.0]);
    }

    #[test]
    fn circle_is_a_triangle_fan() {
        let mut t = Tessellator::default();
        t.circle(0.0, 0.0, 5.0, [1.0; 4]);
        assert_eq!(t.vertices.len(), CIRCLE_SEGMENTS * 3);
    }

    #[test]
    fn text_emits_one_quad_per_lit_cell() {
        let mut t = Tessellator::default();
        t.text("-", 0.0, 0.0, &Font::monospace(14.0), [1.0; 4]);
        assert_eq!(t.vertices.len(), 5 * 6);
        t.reset_frame();
        t.text("", 0.0, 0.0, &Font::monospace(14.0), [1.0; 4]);
        assert!(t.vertices.is_empty());
    }
}
