pub mod baseline;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod grid;
pub mod intervention;
pub mod reference;
pub mod rng;
pub mod rules;
pub mod sensor;
pub mod simulator;
pub mod snapshot;
pub mod web;

pub use config::Config;
pub use engine::{ChangeTotals, InterventionEngine, InterventionOutcome};
pub use grid::{Bounds, Grid};
pub use intervention::{GeographicModification, Intervention};
pub use simulator::{SimulationReport, Simulator};
pub use snapshot::GridSnapshot;
