//! Control-plane facade for work-unit activities.
//!
//! Orchestrates activity registration and job-card synchronisation by
//! resilience/concurrency mode, runs the background aging sweep, and wires
//! the stores, services, and router into one control plane.

pub mod builder;
pub mod config;
pub mod control_plane;
pub mod controller;
pub mod error;
pub mod strategy;
pub mod sweeper;

pub use builder::ControlPlaneBuilder;
pub use config::{SweepConfig, SyncConfig};
pub use control_plane::ControlPlane;
pub use controller::ActivityServicesController;
pub use error::{ControlError, ControlResult};
pub use strategy::{ResilienceStrategy, StandaloneStrategy, UnsupportedModeStrategy};
pub use sweeper::AgingSweeper;
