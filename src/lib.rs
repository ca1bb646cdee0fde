pub mod demand;
pub mod drivers;
pub mod engine;
pub mod modeltime;
pub mod scenario;
pub mod sector;
pub mod snapshot;
pub mod systems;
pub mod telemetry;
pub mod world;

pub use demand::{DemandError, DemandStrategy, ServiceDemand};
pub use engine::{Engine, EngineBuilder, EngineSettings};
pub use scenario::Scenario;
pub use world::{World, WorldSnapshot};
