//! Simulation core of a situated multi-agent environment.
//!
//! Agents never touch the world. Each tick they perceive through frustums,
//! submit influences, and the environment decides what actually happens.
//!
//! # Modules
//!
//! - [`clock`] -- The shared [`SimulationClock`].
//! - [`config`] -- YAML configuration into strongly-typed structs.
//! - [`pipeline`] -- The Collecting / Solving / Applying / Advancing tick
//!   state machine, influence collection, conflict policies, and solvers.
//! - [`dynamics`] -- The pluggable [`DynamicsEngine`] trait.
//! - [`perception`] -- Top-down and bottom-up perception, sequential or on
//!   a worker pool.
//! - [`place`] -- [`Place`]: one region with its trees, ground, and pipeline.
//! - [`portal`] -- [`Portal`]s linking places.
//! - [`environment`] -- [`Environment`]: lifecycle, lockstep stepping,
//!   portal transfers, and place lookup.
//! - [`listener`] -- The [`SimulationListener`] observer trait.

pub mod clock;
pub mod config;
pub mod dynamics;
pub mod environment;
pub mod listener;
pub mod perception;
pub mod pipeline;
pub mod place;
pub mod portal;

pub use clock::{ClockError, SimulationClock};
pub use config::{ConfigError, SimulationConfig};
pub use dynamics::DynamicsEngine;
pub use environment::{
    Environment, EnvironmentError, EnvironmentState, EnvironmentTickReport, ScenarioMetadata,
    WorldDescription,
};
pub use listener::SimulationListener;
pub use perception::{
    PerceptionAlgorithm, PerceptionError, PerceptionGeneratorType, PerceptionList, PerceptionRequest,
};
pub use pipeline::{
    ConflictPolicy, InfluenceCollector, InfluenceReactionPipeline, InfluenceSolver, TickPhase,
};
pub use place::{Place, PlaceDescription, PlaceError, TickReport, Transfer};
pub use portal::{Portal, PortalEnd, PortalError, PortalLink};
