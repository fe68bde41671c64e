//! Model preview pipelines (shaded, wireframe).

use super::shaders::SCENE_SHADER;

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub label: Option<&'static str>,
    pub format: wgpu::TextureFormat,
    pub fragment_entry: &'static str,
    pub wireframe: bool,
}

pub struct Pipelines {
    pub layout: wgpu::BindGroupLayout,
    pub shaded: wgpu::RenderPipeline,
    /// Missing when the adapter lacks `POLYGON_MODE_LINE`.
    pub wireframe: Option<wgpu::RenderPipeline>,
}

pub fn create_pipelines(device: &wgpu::Device, format: wgpu::TextureFormat) -> Pipelines {
    let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("scene_bind_group_layout"),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
    });

    let config = PipelineConfig {
        label: Some("shaded_pipeline"),
        format,
        fragment_entry: "fs_main",
        wireframe: false,
    };
    let shaded = create_pipeline(device, &layout, &config);

    let wireframe = if device.features().contains(wgpu::Features::POLYGON_MODE_LINE) {
        let wire_config = PipelineConfig {
            label: Some("wireframe_pipeline"),
            fragment_entry: "fs_wire",
            wireframe: true,
            ..config
        };
        Some(create_pipeline(device, &layout, &wire_config))
    } else {
        tracing::info!("POLYGON_MODE_LINE unavailable, wireframe falls back to shaded");
        None
    };

    Pipelines { layout, shaded, wireframe }
}

fn create_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    config: &PipelineConfig,
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("scene_shader"),
        source: wgpu::ShaderSource::Wgsl(SCENE_SHADER.into()),
    });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: config.label,
        bind_group_layouts: &[layout],
        push_constant_ranges: &[],
    });

    let vertex_layout = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<[f32; 6]>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[
            wgpu::VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: wgpu::VertexFormat::Float32x3,
            },
            wgpu::VertexAttribute {
                offset: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                shader_location: 1,
                format: wgpu::VertexFormat::Float32x3,
            },
        ],
    };

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: config.label,
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers: &[vertex_layout],
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some(config.fragment_entry),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: config.format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            // STL winding is unreliable; both faces are lit.
            cull_mode: None,
            polygon_mode: if config.wireframe { wgpu::PolygonMode::Line } else { wgpu::PolygonMode::Fill },
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}
