use wgpu::{
    BindGroup, BindGroupLayout, Buffer, Device, PipelineCompilationOptions,
    PipelineLayoutDescriptor, PrimitiveState, RenderPass, RenderPipeline,
    RenderPipelineDescriptor, TextureFormat, VertexAttribute, VertexBufferLayout,
};

/// Per-instance render attributes, fixed at startup.
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ParticleInstance {
    pub color: [f32; 3],
    pub radius: f32,
}

impl ParticleInstance {
    pub const fn layout<const LOC_OFFSET: u32>() -> VertexBufferLayout<'static> {
        VertexBufferLayout {
            array_stride: std::mem::size_of::<ParticleInstance>() as u64,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &[
                VertexAttribute {
                    format: wgpu::VertexFormat::Float32x3,
                    offset: 0,
                    shader_location: LOC_OFFSET,
                },
                VertexAttribute {
                    format: wgpu::VertexFormat::Float32,
                    offset: (std::mem::size_of::<f32>() * 3) as u64,
                    shader_location: LOC_OFFSET + 1,
                },
            ],
        }
    }
}

/// Positions are vec3s padded to a 16-byte stride, the same layout the
/// compute kernels use, so the buffer can be shared between the two.
pub const fn position_layout<const LOC_OFFSET: u32>() -> VertexBufferLayout<'static> {
    VertexBufferLayout {
        array_stride: 16,
        step_mode: wgpu::VertexStepMode::Instance,
        attributes: &[VertexAttribute {
            format: wgpu::VertexFormat::Float32x3,
            offset: 0,
            shader_location: LOC_OFFSET,
        }],
    }
}

/// Instanced particle pipeline: one triangle per body, expanded in the
/// vertex shader and scaled by the body radius.
pub(crate) struct ParticlePipeline {
    pipeline: RenderPipeline,
}

impl ParticlePipeline {
    pub fn new(
        device: &Device,
        texture_format: TextureFormat,
        camera_layout: &BindGroupLayout,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("particle shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/particle.wgsl").into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: None,
            bind_group_layouts: &[camera_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("particle pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[position_layout::<0>(), ParticleInstance::layout::<1>()],
                compilation_options: PipelineCompilationOptions::default(),
            },
            cache: None,
            primitive: PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                unclipped_depth: false,
                polygon_mode: wgpu::PolygonMode::Fill,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: texture_format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: PipelineCompilationOptions::default(),
            }),
            multiview: None,
        });

        Self { pipeline }
    }

    pub fn draw(
        &self,
        rpass: &mut RenderPass<'_>,
        camera: &BindGroup,
        position_buffer: &Buffer,
        instance_buffer: &Buffer,
        num_bodies: usize,
    ) {
        rpass.set_pipeline(&self.pipeline);
        rpass.set_vertex_buffer(0, position_buffer.slice(..));
        rpass.set_vertex_buffer(1, instance_buffer.slice(..));
        rpass.set_bind_group(0, camera, &[]);
        rpass.draw(0..3, 0..(num_bodies as u32));
    }
}
