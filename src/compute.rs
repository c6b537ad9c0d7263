use anyhow::{Context, bail};
use bytemuck::cast_slice;
use wgpu::util::{BufferInitDescriptor, DeviceExt};
use wgpu::{BindGroup, Buffer, BufferUsages, ComputePipeline, Device, Queue};

use crate::bodies::BodySet;
use crate::constants::{EPSILON, G, WORKGROUP_SIZE};

const POSITION_STRIDE: u64 = 16;

/// Uniform block consumed by both kernels, must match physics.wgsl.
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct Params {
    dt: f32,
    n: u32,
    epsilon: f32,
    g: f32,
}

const _: () = assert!(std::mem::size_of::<Params>() == 16);

/// Where the integrated positions live relative to the renderer.
enum PositionStore {
    /// The renderer's own vertex buffer, written in place.
    Shared,
    /// A private storage buffer, read back through `staging` every frame
    /// and re-uploaded to the renderer by the caller.
    Private { staging: Buffer },
}

/// GPU-side integrator: the same softened gravity step as the host backend,
/// dispatched as two kernels once per rendered frame.
pub struct GpuIntegrator {
    positions: Buffer,
    store: PositionStore,
    gravity_pipeline: ComputePipeline,
    update_pipeline: ComputePipeline,
    bind_group: BindGroup,
    num_bodies: u32,
    readback: Vec<[f32; 4]>,
}

impl GpuIntegrator {
    /// Build device buffers and kernels. `shared_positions` is the
    /// renderer's position buffer when buffer sharing is in effect; without
    /// it the integrator allocates its own and runs in copy mode.
    pub fn new(
        device: &Device,
        bodies: &BodySet,
        dt: f32,
        shared_positions: Option<&Buffer>,
    ) -> anyhow::Result<Self> {
        let n = bodies.len();
        let buffer_size = n as u64 * POSITION_STRIDE;

        let (positions, store) = match shared_positions {
            Some(buffer) => {
                log::info!("compute: sharing the render position buffer");
                (buffer.clone(), PositionStore::Shared)
            }
            None => {
                log::info!("compute: private position buffer, copy-out per frame");
                let buffer = device.create_buffer_init(&BufferInitDescriptor {
                    label: Some("compute positions"),
                    contents: cast_slice(&bodies.packed_positions()),
                    usage: BufferUsages::STORAGE | BufferUsages::COPY_SRC | BufferUsages::COPY_DST,
                });
                let staging = device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("position staging"),
                    size: buffer_size,
                    usage: BufferUsages::MAP_READ | BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                });
                (buffer, PositionStore::Private { staging })
            }
        };

        let velocities = device.create_buffer_init(&BufferInitDescriptor {
            label: Some("compute velocities"),
            contents: cast_slice(&bodies.packed_velocities()),
            usage: BufferUsages::STORAGE | BufferUsages::COPY_DST,
        });
        let accelerations = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("compute accelerations"),
            size: buffer_size,
            usage: BufferUsages::STORAGE,
            mapped_at_creation: false,
        });
        let masses = device.create_buffer_init(&BufferInitDescriptor {
            label: Some("compute masses"),
            contents: cast_slice(&bodies.mass),
            usage: BufferUsages::STORAGE,
        });
        let params = Params {
            dt,
            n: n as u32,
            epsilon: EPSILON,
            g: G,
        };
        let params_buffer = device.create_buffer_init(&BufferInitDescriptor {
            label: Some("compute params"),
            contents: bytemuck::bytes_of(&params),
            usage: BufferUsages::UNIFORM,
        });

        // Kernel build failures are fatal; capture the validation error so
        // the driver's diagnostic ends up in the report.
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("physics kernels"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/physics.wgsl").into()),
        });

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("physics bind group layout"),
            entries: &[
                storage_entry(0, false),
                storage_entry(1, false),
                storage_entry(2, false),
                storage_entry(3, true),
                wgpu::BindGroupLayoutEntry {
                    binding: 4,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("physics bind group"),
            layout: &layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: positions.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: velocities.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: accelerations.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: masses.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: params_buffer.as_entire_binding(),
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("physics pipeline layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let gravity_pipeline = create_kernel(device, &pipeline_layout, &module, "apply_gravity");
        let update_pipeline = create_kernel(device, &pipeline_layout, &module, "update_positions");

        device.poll(wgpu::Maintain::Wait);
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            bail!("kernel build failed: {err}");
        }

        Ok(Self {
            positions,
            store,
            gravity_pipeline,
            update_pipeline,
            bind_group,
            num_bodies: n as u32,
            readback: vec![[0.0; 4]; n],
        })
    }

    /// Run one integration step and block until the device is done, so the
    /// frame that follows reads fully updated positions. In copy mode the
    /// returned slice holds the new positions for the caller to upload; in
    /// shared mode the renderer's buffer is already up to date.
    pub fn step(&mut self, device: &Device, queue: &Queue) -> anyhow::Result<Option<&[[f32; 4]]>> {
        let mut encoder =
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("gravity step"),
                timestamp_writes: None,
            });
            pass.set_bind_group(0, &self.bind_group, &[]);
            let groups = self.num_bodies.div_ceil(WORKGROUP_SIZE);
            pass.set_pipeline(&self.gravity_pipeline);
            pass.dispatch_workgroups(groups, 1, 1);
            pass.set_pipeline(&self.update_pipeline);
            pass.dispatch_workgroups(groups, 1, 1);
        }

        if let PositionStore::Private { staging } = &self.store {
            encoder.copy_buffer_to_buffer(&self.positions, 0, staging, 0, staging.size());
        }
        queue.submit(Some(encoder.finish()));

        match &self.store {
            PositionStore::Shared => {
                device.poll(wgpu::Maintain::Wait);
                Ok(None)
            }
            PositionStore::Private { staging } => {
                read_buffer(device, staging, cast_slice_mut(&mut self.readback))?;
                Ok(Some(&self.readback))
            }
        }
    }

    /// Copy the current positions back to the host, for the final dump.
    pub fn read_positions(&self, device: &Device, queue: &Queue) -> anyhow::Result<Vec<[f32; 3]>> {
        let size = self.num_bodies as u64 * POSITION_STRIDE;
        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("dump staging"),
            size,
            usage: BufferUsages::MAP_READ | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let mut encoder =
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
        encoder.copy_buffer_to_buffer(&self.positions, 0, &staging, 0, size);
        queue.submit(Some(encoder.finish()));

        let mut rows = vec![[0.0f32; 4]; self.num_bodies as usize];
        read_buffer(device, &staging, cast_slice_mut(&mut rows))?;
        Ok(rows.iter().map(|r| [r[0], r[1], r[2]]).collect())
    }
}

fn cast_slice_mut(rows: &mut [[f32; 4]]) -> &mut [u8] {
    bytemuck::cast_slice_mut(rows)
}

/// Map a staging buffer and copy its contents into `out`, blocking on the
/// device. Map failures are not recoverable within a frame.
fn read_buffer(device: &Device, staging: &Buffer, out: &mut [u8]) -> anyhow::Result<()> {
    let slice = staging.slice(..);
    let (tx, rx) = futures::channel::oneshot::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    device.poll(wgpu::Maintain::Wait);
    pollster::block_on(rx)
        .context("device disconnected during readback")?
        .context("position readback failed")?;

    out.copy_from_slice(&slice.get_mapped_range());
    staging.unmap();
    Ok(())
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn create_kernel(
    device: &Device,
    layout: &wgpu::PipelineLayout,
    module: &wgpu::ShaderModule,
    entry_point: &str,
) -> ComputePipeline {
    device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(entry_point),
        layout: Some(layout),
        module,
        entry_point: Some(entry_point),
        compilation_options: wgpu::PipelineCompilationOptions::default(),
        cache: None,
    })
}
