//! Real-time N-body gravity simulation.
//!
//! The simulation runs on one of two backends: a pool of host threads
//! stepping as fast as they can behind the render loop, or a pair of
//! compute kernels on the same device that draws, optionally writing
//! straight into the vertex buffer.

pub mod args;
pub mod bodies;
pub mod camera;
pub mod compute;
pub mod constants;
pub mod event_loop;
pub mod exchange;
pub mod pipeline;
pub mod render;
pub mod sim;
pub mod surface;

pub use bodies::BodySet;
pub use sim::{GravityModel, Simulation};
