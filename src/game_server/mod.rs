//! Game Server Module
//!
//! Runs the player-versus-AI race simulation: vehicle physics, track
//! geometry, ray sensors and the autonomous driver. The frontend drives it
//! one tick at a time and reads back snapshots.

pub mod camera;
pub mod config;
pub mod driver;
pub mod geometry;
pub mod policy;
pub mod race;
pub mod racing_line;
pub mod sensors;
pub mod simulation;
pub mod track;
pub mod vehicle;

pub use config::{ChallengeTargets, ConfigError, RaceConfig};
pub use driver::AutonomousDriver;
pub use policy::{DrivingPolicy, PolicyKind};
pub use race::{PlayerIntent, Race, RaceResult, RaceSnapshot, RaceStatus, RacerId};
pub use simulation::{GameServer, GameState, ServerStats};
pub use track::{CheckpointEvent, Track, TrackError, TrackPreset};
pub use vehicle::{ControlIntent, Vehicle, VehicleParams};
