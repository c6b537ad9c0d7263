use clap::Parser;
use winit::event_loop::{ControlFlow, EventLoop};

use gravity::args::{Args, ModelArg};
use gravity::bodies::BodySet;
use gravity::event_loop::GravityApp;

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let mut args = Args::parse();

    if args.gpu && args.model == ModelArg::Merging {
        log::warn!("the GPU backend only integrates the softened model, switching to it");
        args.model = ModelArg::Softened;
    }

    log::info!(
        "simulating {} bodies, dt {}, {:?} model, {} backend",
        args.count,
        args.dt,
        args.model,
        if args.gpu { "gpu" } else { "host" },
    );

    let bodies = BodySet::two_clusters(args.count);

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);
    let mut app = GravityApp::new(args, bodies);
    event_loop.run_app(&mut app)?;
    app.finish()
}
