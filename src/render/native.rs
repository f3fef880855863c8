use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use bytemuck::{bytes_of, Pod, Zeroable};
use glam::{Mat3, Mat4};
use log::{debug, info, warn};
use wgpu::util::DeviceExt;
use winit::window::Window;

use super::common::{CameraParams, LightParams};
use super::shared::{HELPER_SHADER, MESH_SHADER};
use super::{RenderBackend, SceneRenderer};
use crate::geometry::{Geometry, GeometryId, VERTEX_STRIDE};
use crate::host::CanvasId;
use crate::scene::{Color, LineSegment, Material, MaterialKind, PerspectiveCamera, SceneGraph};

const MESH_ATTRIBUTES: [wgpu::VertexAttribute; 2] =
    wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];
const WIRE_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x3];
const HELPER_ATTRIBUTES: [wgpu::VertexAttribute; 2] =
    wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];
const VERTEX_BYTES: u64 = (VERTEX_STRIDE * std::mem::size_of::<f32>()) as u64;

/// Vertex and fragment entry point names of one pipeline.
#[derive(Debug, Clone, Copy)]
struct ShaderEntries {
    vertex: &'static str,
    fragment: &'static str,
}

const MESH_ENTRIES: ShaderEntries = ShaderEntries {
    vertex: "vs_main",
    fragment: "fs_main",
};
const WIRE_ENTRIES: ShaderEntries = ShaderEntries {
    vertex: "vs_wire",
    fragment: "fs_wire",
};
const HELPER_ENTRIES: ShaderEntries = ShaderEntries {
    vertex: "vs_helper",
    fragment: "fs_helper",
};

/// Specular weight of Phong materials, roughly three.js' default `0x111111`.
const PHONG_SPECULAR: f32 = 0.07;

/// Adapter, device and queue shared by every renderer created for one window.
pub struct GpuContext {
    instance: wgpu::Instance,
    device: wgpu::Device,
    queue: wgpu::Queue,
    adapter: wgpu::Adapter,
}

/// Creates wgpu renderers that present into a winit window.
pub struct WgpuBackend {
    window: Arc<Window>,
    gpu: Arc<GpuContext>,
    initial_surface: Option<wgpu::Surface<'static>>,
    next_canvas: u64,
}

impl WgpuBackend {
    /// Acquires an adapter and device able to present to `window`.
    pub async fn new(window: Arc<Window>) -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let surface = instance
            .create_surface(Arc::clone(&window))
            .context("failed to create window surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("failed to acquire GPU adapter")?;

        let device_descriptor = wgpu::DeviceDescriptor {
            label: Some("renderer-device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: wgpu::MemoryHints::Performance,
        };
        let (device, queue) = adapter
            .request_device(&device_descriptor, None)
            .await
            .context("failed to create GPU device")?;
        info!("using GPU adapter {}", adapter.get_info().name);

        Ok(Self {
            window,
            gpu: Arc::new(GpuContext {
                instance,
                device,
                queue,
                adapter,
            }),
            initial_surface: Some(surface),
            next_canvas: 0,
        })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }
}

impl RenderBackend for WgpuBackend {
    type Renderer = WgpuRenderer;

    fn create_renderer(&mut self, width: u32, height: u32) -> Result<WgpuRenderer> {
        let surface = match self.initial_surface.take() {
            Some(surface) => surface,
            None => self
                .gpu
                .instance
                .create_surface(Arc::clone(&self.window))
                .context("failed to create window surface")?,
        };
        let state = GpuState::new(Arc::clone(&self.gpu), surface, width, height)?;
        self.next_canvas += 1;
        Ok(WgpuRenderer {
            canvas: CanvasId(self.next_canvas),
            state: Some(state),
        })
    }
}

/// Renderer drawing into the window surface. Dropping the GPU state on
/// [`SceneRenderer::dispose`] releases the surface, pipelines and buffers.
pub struct WgpuRenderer {
    canvas: CanvasId,
    state: Option<GpuState>,
}

impl SceneRenderer for WgpuRenderer {
    fn canvas(&self) -> CanvasId {
        self.canvas
    }

    fn set_size(&mut self, width: u32, height: u32) {
        if let Some(state) = self.state.as_mut() {
            state.resize(width, height);
        }
    }

    fn render(&mut self, scene: &SceneGraph, camera: &PerspectiveCamera) -> Result<()> {
        match self.state.as_mut() {
            Some(state) => state.render(scene, camera),
            None => Ok(()),
        }
    }

    fn dispose(&mut self) {
        if let Some(state) = self.state.take() {
            debug!(
                "releasing renderer {:?} with {} cached mesh(es)",
                self.canvas,
                state.mesh_cache.len()
            );
        }
    }
}

struct GpuState {
    gpu: Arc<GpuContext>,
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    depth: DepthBuffer,
    mesh_pipeline: wgpu::RenderPipeline,
    wire_pipeline: wgpu::RenderPipeline,
    helper_pipeline: wgpu::RenderPipeline,
    global_buffer: wgpu::Buffer,
    global_bind_group: wgpu::BindGroup,
    object_layout: wgpu::BindGroupLayout,
    mesh_cache: HashMap<GeometryId, MeshBuffers>,
}

impl GpuState {
    fn new(
        gpu: Arc<GpuContext>,
        surface: wgpu::Surface<'static>,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        let device = &gpu.device;
        let surface_caps = surface.get_capabilities(&gpu.adapter);
        let Some(&fallback_format) = surface_caps.formats.first() else {
            bail!("surface is not supported by the adapter");
        };
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|format| format.is_srgb())
            .copied()
            .unwrap_or(fallback_format);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            desired_maximum_frame_latency: 2,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
        };
        surface.configure(device, &config);
        let depth = DepthBuffer::create(device, config.width, config.height);

        let mesh_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("mesh-shader"),
            source: wgpu::ShaderSource::Wgsl(MESH_SHADER.into()),
        });
        let helper_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("helper-shader"),
            source: wgpu::ShaderSource::Wgsl(HELPER_SHADER.into()),
        });

        let global_layout = uniform_layout::<GlobalUniform>(device, "global-bind-layout");
        let object_layout = uniform_layout::<ObjectConstants>(device, "object-bind-layout");

        let mesh_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("mesh-pipeline-layout"),
            bind_group_layouts: &[&global_layout, &object_layout],
            push_constant_ranges: &[],
        });
        let helper_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("helper-pipeline-layout"),
            bind_group_layouts: &[&global_layout],
            push_constant_ranges: &[],
        });

        let global_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("global-uniform"),
            size: std::mem::size_of::<GlobalUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let global_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("global-bind-group"),
            layout: &global_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: global_buffer.as_entire_binding(),
            }],
        });

        let mesh_pipeline = PipelineSpec {
            label: "mesh-pipeline",
            layout: &mesh_layout,
            module: &mesh_shader,
            entries: MESH_ENTRIES,
            buffer: wgpu::VertexBufferLayout {
                array_stride: VERTEX_BYTES,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &MESH_ATTRIBUTES,
            },
            topology: wgpu::PrimitiveTopology::TriangleList,
        }
        .build(device, surface_format);
        // Reuses the mesh vertex buffer and reads positions only.
        let wire_pipeline = PipelineSpec {
            label: "wire-pipeline",
            layout: &mesh_layout,
            module: &mesh_shader,
            entries: WIRE_ENTRIES,
            buffer: wgpu::VertexBufferLayout {
                array_stride: VERTEX_BYTES,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &WIRE_ATTRIBUTES,
            },
            topology: wgpu::PrimitiveTopology::LineList,
        }
        .build(device, surface_format);
        let helper_pipeline = PipelineSpec {
            label: "helper-pipeline",
            layout: &helper_layout,
            module: &helper_shader,
            entries: HELPER_ENTRIES,
            buffer: wgpu::VertexBufferLayout {
                array_stride: VERTEX_BYTES,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &HELPER_ATTRIBUTES,
            },
            topology: wgpu::PrimitiveTopology::LineList,
        }
        .build(device, surface_format);

        Ok(Self {
            gpu,
            surface,
            config,
            depth,
            mesh_pipeline,
            wire_pipeline,
            helper_pipeline,
            global_buffer,
            global_bind_group,
            object_layout,
            mesh_cache: HashMap::new(),
        })
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.gpu.device, &self.config);
        self.depth = DepthBuffer::create(&self.gpu.device, width, height);
    }

    fn update_globals(&self, camera: &CameraParams, light: &LightParams) {
        let uniform = GlobalUniform {
            view_proj: camera.view_proj.to_cols_array_2d(),
            camera_position: camera.position.extend(1.0).into(),
            ambient: light.ambient.extend(1.0).into(),
            light_direction: light.direction.extend(0.0).into(),
            light_color: light.directional.extend(1.0).into(),
        };
        self.gpu
            .queue
            .write_buffer(&self.global_buffer, 0, bytes_of(&uniform));
    }

    fn render(&mut self, scene: &SceneGraph, camera: &PerspectiveCamera) -> Result<()> {
        let items = scene.draw_items();
        self.update_globals(
            &CameraParams::from_camera(camera),
            &LightParams::from_scene(scene),
        );

        // Geometry that left the scene has been disposed or replaced.
        self.mesh_cache
            .retain(|id, _| items.iter().any(|item| item.geometry.id() == *id));
        for item in &items {
            let id = item.geometry.id();
            if !self.mesh_cache.contains_key(&id) {
                let buffers = MeshBuffers::from_geometry(&self.gpu.device, item.geometry);
                self.mesh_cache.insert(id, buffers);
            }
        }

        let device = &self.gpu.device;
        let draws: Vec<_> = items
            .iter()
            .map(|item| {
                let constants = ObjectConstants::new(item.world, item.material);
                let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("object-uniform"),
                    contents: bytes_of(&constants),
                    usage: wgpu::BufferUsages::UNIFORM,
                });
                let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("object-bind-group"),
                    layout: &self.object_layout,
                    entries: &[wgpu::BindGroupEntry {
                        binding: 0,
                        resource: buffer.as_entire_binding(),
                    }],
                });
                (item.geometry.id(), item.material.wireframe(), bind_group)
            })
            .collect();

        let helper = helper_vertices(&scene.helper_lines());
        let helper_count = (helper.len() / VERTEX_STRIDE) as u32;
        let helper_buffer = (helper_count > 0).then(|| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("helper-vertices"),
                contents: bytemuck::cast_slice(&helper),
                usage: wgpu::BufferUsages::VERTEX,
            })
        });

        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(device, &self.config);
                return Ok(());
            }
            Err(wgpu::SurfaceError::OutOfMemory) => bail!("GPU ran out of memory"),
            Err(err) => {
                warn!("skipping frame: {err}");
                return Ok(());
            }
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("renderer-encoder"),
        });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("main-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear_color(scene.background)),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            if let Some(buffer) = helper_buffer.as_ref() {
                pass.set_pipeline(&self.helper_pipeline);
                pass.set_bind_group(0, &self.global_bind_group, &[]);
                pass.set_vertex_buffer(0, buffer.slice(..));
                pass.draw(0..helper_count, 0..1);
            }

            for (id, wireframe, bind_group) in &draws {
                let Some(mesh) = self.mesh_cache.get(id) else {
                    continue;
                };
                let (pipeline, index, count) = if *wireframe {
                    (&self.wire_pipeline, &mesh.edges, mesh.edge_count)
                } else {
                    (&self.mesh_pipeline, &mesh.index, mesh.index_count)
                };
                if count == 0 {
                    continue;
                }
                pass.set_pipeline(pipeline);
                pass.set_bind_group(0, &self.global_bind_group, &[]);
                pass.set_bind_group(1, bind_group, &[]);
                pass.set_vertex_buffer(0, mesh.vertex.slice(..));
                pass.set_index_buffer(index.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..count, 0, 0..1);
            }
        }

        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

struct PipelineSpec<'a> {
    label: &'a str,
    layout: &'a wgpu::PipelineLayout,
    module: &'a wgpu::ShaderModule,
    entries: ShaderEntries,
    buffer: wgpu::VertexBufferLayout<'a>,
    topology: wgpu::PrimitiveTopology,
}

impl PipelineSpec<'_> {
    fn build(self, device: &wgpu::Device, format: wgpu::TextureFormat) -> wgpu::RenderPipeline {
        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(self.label),
            layout: Some(self.layout),
            vertex: wgpu::VertexState {
                module: self.module,
                entry_point: self.entries.vertex,
                compilation_options: Default::default(),
                buffers: &[self.buffer],
            },
            primitive: wgpu::PrimitiveState {
                topology: self.topology,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DepthBuffer::FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: Default::default(),
                bias: Default::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: self.module,
                entry_point: self.entries.fragment,
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            multiview: None,
            cache: None,
        })
    }
}

fn uniform_layout<T>(device: &wgpu::Device, label: &str) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: wgpu::BufferSize::new(std::mem::size_of::<T>() as u64),
            },
            count: None,
        }],
    })
}

fn clear_color(background: Option<Color>) -> wgpu::Color {
    let linear = background.map(Color::to_linear).unwrap_or_default();
    wgpu::Color {
        r: linear.x as f64,
        g: linear.y as f64,
        b: linear.z as f64,
        a: 1.0,
    }
}

/// Interleaved position/color vertices, two per segment.
fn helper_vertices(lines: &[LineSegment]) -> Vec<f32> {
    let mut vertices = Vec::with_capacity(lines.len() * 2 * VERTEX_STRIDE);
    for line in lines {
        let color = line.color.to_linear();
        for point in [line.from, line.to] {
            vertices.extend_from_slice(&point.to_array());
            vertices.extend_from_slice(&color.to_array());
        }
    }
    vertices
}

fn mat3_to_3x4(matrix: Mat3) -> [[f32; 4]; 3] {
    let cols = matrix.to_cols_array();
    [
        [cols[0], cols[1], cols[2], 0.0],
        [cols[3], cols[4], cols[5], 0.0],
        [cols[6], cols[7], cols[8], 0.0],
    ]
}

struct MeshBuffers {
    vertex: wgpu::Buffer,
    index: wgpu::Buffer,
    index_count: u32,
    edges: wgpu::Buffer,
    edge_count: u32,
}

impl MeshBuffers {
    fn from_geometry(device: &wgpu::Device, geometry: &Geometry) -> Self {
        let label = format!("{:?}-{:?}", geometry.primitive(), geometry.id());
        let edges: Vec<u32> = geometry.edges().into_iter().flatten().collect();
        let vertex = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}-vertices")),
            contents: bytemuck::cast_slice(geometry.vertices()),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}-indices")),
            contents: bytemuck::cast_slice(geometry.indices()),
            usage: wgpu::BufferUsages::INDEX,
        });
        let edge_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}-edges")),
            contents: bytemuck::cast_slice(&edges),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertex,
            index,
            index_count: geometry.indices().len() as u32,
            edges: edge_buffer,
            edge_count: edges.len() as u32,
        }
    }
}

struct DepthBuffer {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl DepthBuffer {
    const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;

    fn create(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("depth-texture"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct GlobalUniform {
    view_proj: [[f32; 4]; 4],
    camera_position: [f32; 4],
    ambient: [f32; 4],
    light_direction: [f32; 4],
    light_color: [f32; 4],
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct ObjectConstants {
    model: [[f32; 4]; 4],
    normal: [[f32; 4]; 3],
    color: [f32; 4],
    params: [f32; 4],
}

impl ObjectConstants {
    fn new(model: Mat4, material: &Material) -> Self {
        let normal = Mat3::from_mat4(model).inverse().transpose();
        let specular = match material.kind {
            MaterialKind::Phong => PHONG_SPECULAR,
            MaterialKind::Standard => 0.0,
        };
        Self {
            model: model.to_cols_array_2d(),
            normal: mat3_to_3x4(normal),
            color: material.color.to_linear().extend(1.0).into(),
            params: [specular, 0.0, 0.0, 0.0],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn pipeline_entry_points_exist_in_their_shaders() {
        let declared = |source: &str, name: &str| source.contains(&format!("fn {name}("));
        for entries in [MESH_ENTRIES, WIRE_ENTRIES] {
            assert!(declared(MESH_SHADER, entries.vertex), "{}", entries.vertex);
            assert!(declared(MESH_SHADER, entries.fragment), "{}", entries.fragment);
        }
        assert!(declared(HELPER_SHADER, HELPER_ENTRIES.vertex));
        assert!(declared(HELPER_SHADER, HELPER_ENTRIES.fragment));
    }

    #[test]
    fn helper_vertices_interleave_position_and_color() {
        let lines = [LineSegment {
            from: Vec3::ZERO,
            to: Vec3::X * 2.0,
            color: Color::from_hex(0xff0000),
        }];
        let vertices = helper_vertices(&lines);
        assert_eq!(vertices.len(), 2 * VERTEX_STRIDE);
        assert_eq!(&vertices[0..6], &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0]);
        assert_eq!(&vertices[6..9], &[2.0, 0.0, 0.0]);
    }

    #[test]
    fn normal_matrix_of_rotation_is_the_rotation() {
        let model = Mat4::from_rotation_y(0.7);
        let material = Material::new(MaterialKind::Phong, Color::WHITE, false);
        let constants = ObjectConstants::new(model, &material);
        let expected = mat3_to_3x4(Mat3::from_mat4(model));
        for (column, want) in constants.normal.iter().zip(expected.iter()) {
            for (a, b) in column.iter().zip(want.iter()) {
                assert!((a - b).abs() < 1e-5);
            }
        }
        assert_eq!(constants.params[0], PHONG_SPECULAR);
    }

    #[test]
    fn standard_material_has_no_specular() {
        let material = Material::new(MaterialKind::Standard, Color::WHITE, false);
        let constants = ObjectConstants::new(Mat4::IDENTITY, &material);
        assert_eq!(constants.params, [0.0; 4]);
        assert_eq!(constants.color, [1.0; 4]);
    }

    #[test]
    fn uniform_sizes_match_wgsl_layout() {
        assert_eq!(std::mem::size_of::<GlobalUniform>(), 128);
        assert_eq!(std::mem::size_of::<ObjectConstants>(), 144);
    }

    #[test]
    fn background_is_cleared_in_linear_space() {
        let color = clear_color(Some(Color::WHITE));
        assert_eq!((color.r, color.g, color.b), (1.0, 1.0, 1.0));
        assert_eq!(clear_color(None).r, 0.0);
    }
}
