use std::fs::File;
use std::io::{BufWriter, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::ActiveEventLoop;
use winit::window::{Window, WindowId};

use crate::args::Args;
use crate::bodies::{BodySet, write_positions};
use crate::camera::Camera;
use crate::compute::GpuIntegrator;
use crate::exchange::Exchange;
use crate::render::Renderer;
use crate::sim::host::{self, HostHandle};
use crate::sim::Simulation;
use crate::surface;

const FRAME_BUDGET: Duration = Duration::from_millis(10);
const FPS_LOG_INTERVAL: u32 = 60;

/// Which side of the machine advances the simulation.
enum Backend {
    /// A background thread steps the simulation as fast as it can; the
    /// render thread samples the latest completed step each frame.
    Host {
        handle: Option<HostHandle>,
        exchange: Arc<Exchange>,
        staging: Vec<[f32; 4]>,
    },
    /// The device integrates in lockstep with rendering, one step per frame.
    Gpu { integrator: GpuIntegrator },
}

struct State {
    window: Arc<Window>,
    renderer: Renderer,
    camera: Camera,
    backend: Backend,
    pacer: FramePacer,
    frames: u32,
    fps_mark: Instant,
}

/// Keeps frames from outrunning the display when vsync does not, by
/// sleeping out the remainder of a fixed budget.
struct FramePacer {
    last: Instant,
}

impl FramePacer {
    fn new() -> Self {
        Self {
            last: Instant::now(),
        }
    }

    fn pace(&mut self) {
        let elapsed = self.last.elapsed();
        if elapsed < FRAME_BUDGET {
            std::thread::sleep(FRAME_BUDGET - elapsed);
        }
        self.last = Instant::now();
    }
}

/// The winit application. Startup is deferred to [`resumed`] because a
/// surface needs a live window; any failure there or during a frame is
/// stored and reported once the event loop returns.
pub struct GravityApp {
    args: Args,
    bodies: Option<BodySet>,
    state: Option<State>,
    error: Option<anyhow::Error>,
}

impl GravityApp {
    pub fn new(args: Args, bodies: BodySet) -> Self {
        Self {
            args,
            bodies: Some(bodies),
            state: None,
            error: None,
        }
    }

    fn build(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<State> {
        let bodies = self
            .bodies
            .take()
            .context("application started more than once")?;

        let window = Arc::new(
            event_loop
                .create_window(
                    Window::default_attributes()
                        .with_title("gravity")
                        .with_inner_size(PhysicalSize::new(1600, 900)),
                )
                .context("window creation failed")?,
        );

        let (gpu, surface) = pollster::block_on(surface::init(
            window.clone(),
            self.args.backend_name.as_deref(),
            self.args.device.as_deref(),
        ))?;

        let shared =
            self.args.gpu && !self.args.no_shared && surface::supports_compute(&gpu.adapter);
        if self.args.gpu && !shared {
            log::info!("buffer sharing disabled, positions travel through the host");
        }

        let size = window.inner_size();
        let camera = Camera::new(size, self.args.rot, self.args.point_size, &gpu.device);
        let renderer = Renderer::new(gpu, surface, &bodies, &camera, shared);

        let backend = if self.args.gpu {
            let shared_buffer = shared.then(|| renderer.position_buffer());
            let integrator =
                GpuIntegrator::new(renderer.device(), &bodies, self.args.dt, shared_buffer)?;
            Backend::Gpu { integrator }
        } else {
            let n = bodies.len();
            let exchange = Arc::new(Exchange::new(n));
            let sim = Simulation::new(bodies, self.args.model.into());
            let handle = host::start(sim, self.args.dt, exchange.clone());
            Backend::Host {
                handle: Some(handle),
                exchange,
                staging: vec![[0.0; 4]; n],
            }
        };

        Ok(State {
            window,
            renderer,
            camera,
            backend,
            pacer: FramePacer::new(),
            frames: 0,
            fps_mark: Instant::now(),
        })
    }

    fn frame(state: &mut State) -> anyhow::Result<()> {
        state.pacer.pace();
        state.camera.advance();

        match &mut state.backend {
            Backend::Host {
                exchange, staging, ..
            } => {
                if exchange.take(staging) {
                    state.renderer.upload_positions(staging);
                }
            }
            Backend::Gpu { integrator } => {
                let device = state.renderer.device();
                let queue = state.renderer.queue();
                if let Some(positions) = integrator.step(device, queue)? {
                    state.renderer.upload_positions(positions);
                }
            }
        }

        state.renderer.redraw(&mut state.camera)?;

        state.frames += 1;
        if state.frames >= FPS_LOG_INTERVAL {
            let elapsed = state.fps_mark.elapsed().as_secs_f32();
            log::info!("{:.1} fps", state.frames as f32 / elapsed);
            state.frames = 0;
            state.fps_mark = Instant::now();
        }
        Ok(())
    }

    /// Tear down after the event loop has returned: stop the backend, write
    /// the position dump if one was requested, and surface any error that
    /// ended the run.
    pub fn finish(mut self) -> anyhow::Result<()> {
        let mut result = Ok(());
        if let Some(state) = self.state.take() {
            let State {
                renderer, backend, ..
            } = state;
            match backend {
                Backend::Host { mut handle, .. } => {
                    let sim = handle.take().map(HostHandle::stop);
                    if let (Some(path), Some(sim)) = (&self.args.dump, sim) {
                        result = sim
                            .bodies
                            .save(path)
                            .with_context(|| format!("writing {}", path.display()));
                    }
                }
                Backend::Gpu { integrator } => {
                    if let Some(path) = &self.args.dump {
                        result = dump_gpu_positions(&integrator, &renderer, path);
                    }
                }
            }
        }

        match self.error {
            Some(err) => Err(err),
            None => result,
        }
    }
}

fn dump_gpu_positions(
    integrator: &GpuIntegrator,
    renderer: &Renderer,
    path: &std::path::Path,
) -> anyhow::Result<()> {
    let positions = integrator.read_positions(renderer.device(), renderer.queue())?;
    let mut out = BufWriter::new(
        File::create(path).with_context(|| format!("creating {}", path.display()))?,
    );
    write_positions(&mut out, positions.into_iter())?;
    out.flush()?;
    Ok(())
}

impl ApplicationHandler for GravityApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }
        match self.build(event_loop) {
            Ok(state) => self.state = Some(state),
            Err(err) => {
                self.error = Some(err);
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(state) = self.state.as_mut() else {
            return;
        };
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                state.renderer.resize(size);
                state.camera.resize(size);
            }
            WindowEvent::RedrawRequested => {
                if let Err(err) = Self::frame(state) {
                    self.error = Some(err);
                    event_loop.exit();
                }
            }
            _ => (),
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = &self.state {
            state.window.request_redraw();
        }
    }
}
