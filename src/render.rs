use anyhow::bail;
use bytemuck::cast_slice;
use wgpu::util::{BufferInitDescriptor, DeviceExt};
use wgpu::{BindGroup, Buffer, BufferUsages, Device, Queue};
use winit::dpi::PhysicalSize;

use crate::bodies::BodySet;
use crate::camera::Camera;
use crate::pipeline::{ParticleInstance, ParticlePipeline};
use crate::surface::{Gpu, SurfaceState};

/// Owns the device, the surface and the per-body GPU buffers, and draws one
/// instanced triangle per body each frame.
pub struct Renderer {
    gpu: Gpu,
    surface: SurfaceState,
    position_buffer: Buffer,
    instance_buffer: Buffer,
    camera_bind_group: BindGroup,
    pipeline: ParticlePipeline,
    num_bodies: usize,
}

impl Renderer {
    /// With `shared` the position buffer doubles as the compute backend's
    /// storage buffer, so the integrated positions are drawn without ever
    /// leaving the device.
    pub fn new(
        gpu: Gpu,
        surface: SurfaceState,
        bodies: &BodySet,
        camera: &Camera,
        shared: bool,
    ) -> Self {
        let mut usage = BufferUsages::VERTEX | BufferUsages::COPY_DST;
        if shared {
            usage |= BufferUsages::STORAGE | BufferUsages::COPY_SRC;
        }
        let position_buffer = gpu.device.create_buffer_init(&BufferInitDescriptor {
            label: Some("position buffer"),
            contents: cast_slice(&bodies.packed_positions()),
            usage,
        });

        let instances: Vec<ParticleInstance> = bodies
            .color
            .iter()
            .zip(&bodies.radius)
            .map(|(c, r)| ParticleInstance {
                color: [c.x, c.y, c.z],
                radius: *r,
            })
            .collect();
        let instance_buffer = gpu.device.create_buffer_init(&BufferInitDescriptor {
            label: Some("instance buffer"),
            contents: cast_slice(&instances),
            usage: BufferUsages::VERTEX,
        });

        let camera_layout = gpu
            .device
            .create_bind_group_layout(&Camera::bind_group_layout());
        let camera_bind_group = camera.create_bind_group(&camera_layout, &gpu.device);

        let pipeline = ParticlePipeline::new(&gpu.device, surface.config.format, &camera_layout);

        Self {
            gpu,
            surface,
            position_buffer,
            instance_buffer,
            camera_bind_group,
            pipeline,
            num_bodies: bodies.len(),
        }
    }

    pub fn device(&self) -> &Device {
        &self.gpu.device
    }

    pub fn queue(&self) -> &Queue {
        &self.gpu.queue
    }

    /// GPU-visible handle for the shared-buffer compute path.
    pub fn position_buffer(&self) -> &Buffer {
        &self.position_buffer
    }

    /// Explicit upload for the copy-based paths (host backend, or GPU
    /// backend without buffer sharing).
    pub fn upload_positions(&self, data: &[[f32; 4]]) {
        self.gpu
            .queue
            .write_buffer(&self.position_buffer, 0, cast_slice(data));
    }

    pub fn resize(&mut self, size: PhysicalSize<u32>) {
        self.surface.resize(&self.gpu.device, size);
    }

    pub fn redraw(&mut self, camera: &mut Camera) -> anyhow::Result<()> {
        let output = match self.surface.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.gpu.device);
                return Ok(());
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                bail!("surface out of memory");
            }
            Err(err) => {
                log::warn!("get_current_texture error: {err:?}");
                return Ok(());
            }
        };

        camera.flush_if_needed(&self.gpu.queue);

        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });

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
                ..Default::default()
            });

            self.pipeline.draw(
                &mut rpass,
                &self.camera_bind_group,
                &self.position_buffer,
                &self.instance_buffer,
                self.num_bodies,
            );
        }

        self.gpu.queue.submit(Some(encoder.finish()));
        output.present();
        Ok(())
    }
}
