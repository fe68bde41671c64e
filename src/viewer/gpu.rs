//! wgpu implementation of the model render engine.
//!
//! Each [`GpuScene`] renders into its own offscreen color target. Targets are
//! published in a [`SurfaceRegistry`] so the preview pane can register them
//! with egui and paint them under the mount's `Viewport` node.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};
use parking_lot::Mutex;
use wgpu::util::DeviceExt;

use crate::session::{CameraFrame, Engine, LightRig, MaterialParams, Mesh, SceneRenderer, SurfaceId, SurfaceSize};
use crate::util::{Error, Result};

use super::pipelines::{create_pipelines, Pipelines, DEPTH_FORMAT};

/// Published render target of one scene.
#[derive(Clone)]
pub struct SurfaceEntry {
    pub view: wgpu::TextureView,
    /// Bumped whenever the target is recreated.
    pub revision: u64,
}

#[derive(Default)]
pub struct SurfaceRegistry {
    entries: Mutex<HashMap<SurfaceId, SurfaceEntry>>,
    next_id: AtomicU64,
    next_revision: AtomicU64,
}

impl SurfaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&self) -> SurfaceId {
        SurfaceId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    fn publish(&self, id: SurfaceId, view: wgpu::TextureView) {
        let revision = self.next_revision.fetch_add(1, Ordering::Relaxed) + 1;
        self.entries.lock().insert(id, SurfaceEntry { view, revision });
    }

    fn withdraw(&self, id: SurfaceId) {
        self.entries.lock().remove(&id);
    }

    pub fn get(&self, id: SurfaceId) -> Option<SurfaceEntry> {
        self.entries.lock().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Scene uniform block, mirrored by `Scene` in the WGSL source.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct SceneUniform {
    view_proj: Mat4,
    eye: Vec4,
    base_color: Vec4,
    material: Vec4,
    ambient: Vec4,
    key_dir: Vec4,
    key_color: Vec4,
    fill_dir: Vec4,
    fill_color: Vec4,
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct Vertex {
    position: [f32; 3],
    normal: [f32; 3],
}

/// Fail when a buffer of `len` bytes would exceed the device limit.
fn check_buffer_size(len: u64, limits: &wgpu::Limits) -> Result<()> {
    if len > limits.max_buffer_size {
        return Err(Error::geometry(format!(
            "mesh needs {len} bytes of vertex data, device allows {}",
            limits.max_buffer_size
        )));
    }
    Ok(())
}

/// Render target size clamped to the largest 2D texture the device supports.
fn target_extent(size: SurfaceSize, limits: &wgpu::Limits) -> SurfaceSize {
    let max = limits.max_texture_dimension_2d.max(1);
    SurfaceSize::new(size.width.min(max), size.height.min(max)).clamped()
}

struct GpuShared {
    device: wgpu::Device,
    queue: wgpu::Queue,
    format: wgpu::TextureFormat,
    limits: wgpu::Limits,
    pipelines: Pipelines,
    registry: Arc<SurfaceRegistry>,
}

/// Engine backed by the host's wgpu device.
pub struct GpuEngine {
    shared: Arc<GpuShared>,
}

impl GpuEngine {
    /// Compile the pipelines for `format` on the host device.
    pub fn new(
        device: wgpu::Device,
        queue: wgpu::Queue,
        format: wgpu::TextureFormat,
        registry: Arc<SurfaceRegistry>,
    ) -> Self {
        let pipelines = create_pipelines(&device, format);
        let limits = device.limits();
        tracing::info!(?format, wireframe = pipelines.wireframe.is_some(), "gpu engine ready");
        Self {
            shared: Arc::new(GpuShared { device, queue, format, limits, pipelines, registry }),
        }
    }
}

impl Engine for GpuEngine {
    fn create_scene(&self, size: SurfaceSize) -> Result<Box<dyn SceneRenderer>> {
        let shared = Arc::clone(&self.shared);
        let surface = shared.registry.allocate();
        let size = target_extent(size, &shared.limits);
        let mut scene = GpuScene {
            shared,
            surface,
            size,
            target: None,
            geometry: None,
            uniform: None,
            data: SceneUniform::zeroed(),
            wireframe: false,
        };
        scene.create_target();
        scene.create_uniform();
        Ok(Box::new(scene))
    }
}

struct Target {
    color: wgpu::Texture,
    depth: wgpu::Texture,
    color_view: wgpu::TextureView,
    depth_view: wgpu::TextureView,
}

struct Geometry {
    buffer: wgpu::Buffer,
    vertex_count: u32,
}

struct Uniform {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

pub struct GpuScene {
    shared: Arc<GpuShared>,
    surface: SurfaceId,
    size: SurfaceSize,
    target: Option<Target>,
    geometry: Option<Geometry>,
    uniform: Option<Uniform>,
    data: SceneUniform,
    wireframe: bool,
}

impl GpuScene {
    fn create_target(&mut self) {
        let device = &self.shared.device;
        let extent = wgpu::Extent3d {
            width: self.size.width,
            height: self.size.height,
            depth_or_array_layers: 1,
        };
        let color = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("model_color_target"),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: self.shared.format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let depth = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("model_depth_target"),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let color_view = color.create_view(&wgpu::TextureViewDescriptor::default());
        let depth_view = depth.create_view(&wgpu::TextureViewDescriptor::default());

        self.shared.registry.publish(self.surface, color_view.clone());
        if let Some(old) = self.target.replace(Target { color, depth, color_view, depth_view }) {
            old.color.destroy();
            old.depth.destroy();
        }
    }

    fn create_uniform(&mut self) {
        let device = &self.shared.device;
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("scene_uniform"),
            contents: bytemuck::bytes_of(&self.data),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("scene_bind_group"),
            layout: &self.shared.pipelines.layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });
        self.uniform = Some(Uniform { buffer, bind_group });
    }
}

impl SceneRenderer for GpuScene {
    fn surface(&self) -> SurfaceId {
        self.surface
    }

    fn upload_geometry(&mut self, mesh: &Mesh) -> Result<()> {
        if mesh.is_empty() || mesh.normals.len() != mesh.positions.len() {
            return Err(Error::geometry("mesh has no drawable triangles"));
        }
        let bytes = (mesh.positions.len() as u64).saturating_mul(std::mem::size_of::<Vertex>() as u64);
        check_buffer_size(bytes, &self.shared.limits)?;
        let vertices: Vec<Vertex> = mesh
            .positions
            .iter()
            .zip(&mesh.normals)
            .map(|(p, n)| Vertex { position: p.to_array(), normal: n.to_array() })
            .collect();
        let vertex_count = u32::try_from(vertices.len()).map_err(|_| Error::geometry("mesh too large"))?;
        let buffer = self.shared.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("model_vertices"),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        self.release_geometry();
        self.geometry = Some(Geometry { buffer, vertex_count });
        Ok(())
    }

    fn set_material(&mut self, material: &MaterialParams) -> Result<()> {
        if self.uniform.is_none() {
            return Err(Error::engine("material set on a released scene"));
        }
        self.data.base_color = material.color.extend(1.0);
        let gamma_encode = if self.shared.format.is_srgb() { 0.0 } else { 1.0 };
        self.data.material = Vec4::new(
            material.metalness,
            material.roughness,
            if material.wireframe { 1.0 } else { 0.0 },
            gamma_encode,
        );
        self.wireframe = material.wireframe;
        Ok(())
    }

    fn set_lights(&mut self, lights: &LightRig) {
        let dir = |p: Vec3| p.normalize_or(Vec3::Y).extend(0.0);
        self.data.ambient = lights.ambient.color.extend(lights.ambient.intensity);
        self.data.key_dir = dir(lights.key.position);
        self.data.key_color = lights.key.color.extend(lights.key.intensity);
        self.data.fill_dir = dir(lights.fill.position);
        self.data.fill_color = lights.fill.color.extend(lights.fill.intensity);
    }

    fn resize(&mut self, size: SurfaceSize) {
        let size = target_extent(size, &self.shared.limits);
        if size == self.size || self.target.is_none() {
            return;
        }
        self.size = size;
        self.create_target();
    }

    fn render(&mut self, camera: &CameraFrame) -> Result<()> {
        let (Some(target), Some(geometry), Some(uniform)) = (&self.target, &self.geometry, &self.uniform) else {
            return Err(Error::engine("render on a released scene"));
        };
        self.data.view_proj = camera.view_proj();
        self.data.eye = camera.eye.extend(1.0);
        self.shared.queue.write_buffer(&uniform.buffer, 0, bytemuck::bytes_of(&self.data));

        let pipeline = match (&self.shared.pipelines.wireframe, self.wireframe) {
            (Some(wire), true) => wire,
            _ => &self.shared.pipelines.shaded,
        };

        let mut encoder = self.shared.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("model_encoder"),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("model_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &target.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &uniform.bind_group, &[]);
            pass.set_vertex_buffer(0, geometry.buffer.slice(..));
            pass.draw(0..geometry.vertex_count, 0..1);
        }
        self.shared.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    fn release_geometry(&mut self) {
        if let Some(geometry) = self.geometry.take() {
            geometry.buffer.destroy();
        }
    }

    fn release_material(&mut self) {
        if let Some(uniform) = self.uniform.take() {
            uniform.buffer.destroy();
        }
    }

    fn release_surface(&mut self) {
        self.shared.registry.withdraw(self.surface);
        if let Some(target) = self.target.take() {
            target.color.destroy();
            target.depth.destroy();
        }
    }
}

impl Drop for GpuScene {
    fn drop(&mut self) {
        self.release_geometry();
        self.release_material();
        self.release_surface();
    }
}
