use std::mem::size_of;

use cgmath::{Deg, Matrix4, Point3, Vector3};
use wgpu::{
    BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayout, BindGroupLayoutDescriptor,
    BindGroupLayoutEntry, Buffer, BufferDescriptor, BufferUsages, Device, Queue,
};
use winit::dpi::PhysicalSize;

/// Orbiting camera. The eye sweeps around the origin along the path
/// `(2 sin c, 1.1 sin(1.3c) cos(0.33c), 2 cos c)`, advanced by a fixed
/// angle per frame, always looking at the cluster center.
pub struct Camera {
    counter: f32,
    step: f32,
    aspect: f32,
    point_size: f32,
    changed: bool,
    buffer: Buffer,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct CameraUniform {
    view_proj: [[f32; 4]; 4],
    point_size: f32,
    _pad: [f32; 3],
}

/// cgmath produces OpenGL clip space (z in [-1, 1]); wgpu wants [0, 1].
#[rustfmt::skip]
const OPENGL_TO_WGPU: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

impl Camera {
    pub fn new(size: PhysicalSize<u32>, step: f32, point_size: f32, device: &Device) -> Self {
        let buffer = device.create_buffer(&BufferDescriptor {
            label: Some("camera buffer"),
            size: size_of::<CameraUniform>() as u64,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            counter: 0.0,
            step,
            aspect: size.width as f32 / size.height.max(1) as f32,
            point_size,
            changed: true,
            buffer,
        }
    }

    /// Rotate the view by one frame's worth of camera step.
    pub fn advance(&mut self) {
        if self.step != 0.0 {
            self.counter += self.step;
            self.changed = true;
        }
    }

    pub fn resize(&mut self, size: PhysicalSize<u32>) {
        self.aspect = size.width as f32 / size.height.max(1) as f32;
        self.changed = true;
    }

    pub fn flush_if_needed(&mut self, queue: &Queue) {
        if !self.changed {
            return;
        }
        self.changed = false;

        let uniform = CameraUniform {
            view_proj: self.build_view_projection_matrix().into(),
            point_size: self.point_size,
            _pad: [0.0; 3],
        };
        queue.write_buffer(&self.buffer, 0, bytemuck::bytes_of(&uniform));
    }

    fn build_view_projection_matrix(&self) -> Matrix4<f32> {
        let c = self.counter;
        let eye = Point3::new(
            2.0 * c.sin(),
            1.1 * (1.3 * c).sin() * (0.33 * c).cos(),
            2.0 * c.cos(),
        );
        let view = Matrix4::look_at_rh(eye, Point3::new(0.0, 0.0, 0.0), Vector3::unit_y());
        let proj = cgmath::perspective(Deg(80.0), self.aspect, 0.1, 100.0);
        OPENGL_TO_WGPU * proj * view
    }

    pub fn bind_group_layout() -> BindGroupLayoutDescriptor<'static> {
        BindGroupLayoutDescriptor {
            label: Some("camera layout"),
            entries: &[BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        }
    }

    pub fn create_bind_group(&self, layout: &BindGroupLayout, device: &Device) -> BindGroup {
        device.create_bind_group(&BindGroupDescriptor {
            label: Some("camera bind group"),
            layout,
            entries: &[BindGroupEntry {
                binding: 0,
                resource: self.buffer.as_entire_binding(),
            }],
        })
    }
}
