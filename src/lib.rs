//! Room acoustics simulation by stochastic ray tracing.
//!
//! `sono` bounces random rays off a triangulated room mesh, collects the
//! energy arriving at receiver positions and synthesizes an impulse response
//! usable for convolution reverb. The pipeline runs on a background worker:
//!
//! 1. [tracer] casts rays from every active speaker and records a virtual
//!    secondary source per bounce, with per-octave-band energy and delay.
//! 2. [volume] estimates the enclosed room volume by flood filling a voxel
//!    lattice.
//! 3. [gather] collects line-of-sight energy contributions into a delay
//!    histogram per receiver.
//! 4. [response] turns the histogram into a time-domain impulse response:
//!    sparse excitation, six-band zero-phase filtering, envelope weighting.
//!
//! Hosts drive the pipeline through [Simulation]: launch a run, poll
//! [Simulation::check_status] for progress and the final
//! [SimulationResult], relaunch or [Simulation::kill] to cancel. All
//! stochastic stages draw from one seeded generator, so a fixed
//! [SimulationSettings::seed] reproduces a run bit for bit.

pub mod bands;
pub mod config;
pub mod error;
pub mod filter;
pub mod gather;
pub mod geometry;
pub mod logging;
pub mod macros;
pub mod math;
pub mod response;
pub mod sampling;
pub mod scene;
pub mod simulation;
pub mod tracer;
pub mod volume;

pub use bands::Band6Coefficients;
pub use config::{
    ChannelLayout, ExcitationMode, SessionState, SimulationSettings, VolumeQuality,
};
pub use error::{Result, SonoError};
pub use gather::{EnergyPortion, GatherResult, Histogram};
pub use response::ImpulseResponse;
pub use scene::{MaterialProperties, Object, ObjectKind, Room, Shape};
pub use simulation::{Simulation, SimulationResult, SimulationStatus};
pub use tracer::{SecondarySource, TraceResult};
