use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::sim::GravityModel;

/// Real-time N-body gravity simulation.
#[derive(Debug, Parser)]
#[command(name = "gravity", version)]
pub struct Args {
    /// Number of bodies.
    #[arg(short = 'n', long = "count", default_value_t = 1 << 12)]
    pub count: usize,

    /// Integration time step, in seconds.
    #[arg(long, default_value_t = 0.00005)]
    pub dt: f32,

    /// Camera rotation per frame, in radians.
    #[arg(long, default_value_t = 0.0)]
    pub rot: f32,

    /// Graphics backend to use (vulkan, metal, dx12, gl).
    #[arg(short = 'p', long = "backend-name")]
    pub backend_name: Option<String>,

    /// Preferred adapter name substring. Falls back to the strongest
    /// adapter when nothing matches.
    #[arg(short = 'd', long = "device")]
    pub device: Option<String>,

    /// Particle scale factor.
    #[arg(long, default_value_t = 1.0)]
    pub point_size: f32,

    /// Force law variant.
    #[arg(long, value_enum, default_value_t = ModelArg::Softened)]
    pub model: ModelArg,

    /// Run the integrator on the GPU instead of host threads.
    #[arg(long)]
    pub gpu: bool,

    /// Force the GPU copy path even when buffer sharing is available.
    #[arg(long)]
    pub no_shared: bool,

    /// Write final body positions to this file on exit, one x,y,z line
    /// per body.
    #[arg(long)]
    pub dump: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModelArg {
    /// Softened all-pairs accumulation.
    Softened,
    /// Pairwise forces with inelastic collision merging.
    Merging,
}

impl From<ModelArg> for GravityModel {
    fn from(value: ModelArg) -> Self {
        match value {
            ModelArg::Softened => GravityModel::Softened,
            ModelArg::Merging => GravityModel::Merging,
        }
    }
}
