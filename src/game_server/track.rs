//! Track - Course geometry and checkpoints
//!
//! A track is a closed centre line with a constant road half-width. Points
//! farther than the half-width from the centre line (or outside the track
//! rectangle) are off the road. Checkpoints sit on the centre line and must
//! be taken in order; one of them is the finish line.

use std::f32::consts::TAU;

use glam::Vec2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::game_server::geometry::{bearing, distance_to_segment, Pose};
use crate::game_server::vehicle::{Vehicle, VehicleParams};

/// Minimum number of checkpoints on a valid loop
pub const MIN_CHECKPOINTS: usize = 3;

/// Track construction failures
#[derive(Debug, Error, PartialEq)]
pub enum TrackError {
    #[error("track needs at least 3 checkpoints, got {0}")]
    TooFewCheckpoints(usize),
    #[error("centre line needs at least 3 points, got {0}")]
    DegenerateCentreLine(usize),
    #[error("track dimensions must be positive (got {width} x {height})")]
    InvalidDimensions { width: f32, height: f32 },
    #[error("road half-width must be positive (got {0})")]
    InvalidRoadWidth(f32),
    #[error("finish index {index} is out of range for {count} checkpoints")]
    FinishOutOfRange { index: usize, count: usize },
}

/// Result of a checkpoint test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckpointEvent {
    None,
    /// Reached an ordinary checkpoint (its index)
    Checkpoint(usize),
    /// Reached the finish checkpoint, completing a lap
    Finish,
}

/// Raw course description used to build a [`Track`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackLayout {
    pub width: f32,
    pub height: f32,
    /// Closed loop, last point connects back to the first
    pub centre_line: Vec<Vec2>,
    pub road_half_width: f32,
    pub checkpoints: Vec<Vec2>,
    pub finish_index: usize,
    /// Proximity needed to take a checkpoint
    pub checkpoint_radius: f32,
    pub start: Pose,
}

/// Immutable course shared by every car in a session
#[derive(Debug, Clone, Serialize)]
pub struct Track {
    width: f32,
    height: f32,
    centre_line: Vec<Vec2>,
    road_half_width: f32,
    checkpoints: Vec<Vec2>,
    finish_index: usize,
    checkpoint_radius: f32,
    start: Pose,
}

impl Track {
    pub fn new(layout: TrackLayout) -> Result<Self, TrackError> {
        let TrackLayout {
            width,
            height,
            centre_line,
            road_half_width,
            checkpoints,
            finish_index,
            checkpoint_radius,
            start,
        } = layout;

        if !(width > 0.0 && height > 0.0) {
            return Err(TrackError::InvalidDimensions { width, height });
        }
        if centre_line.len() < 3 {
            return Err(TrackError::DegenerateCentreLine(centre_line.len()));
        }
        if !(road_half_width > 0.0) {
            return Err(TrackError::InvalidRoadWidth(road_half_width));
        }
        if checkpoints.len() < MIN_CHECKPOINTS {
            return Err(TrackError::TooFewCheckpoints(checkpoints.len()));
        }
        if finish_index >= checkpoints.len() {
            return Err(TrackError::FinishOutOfRange {
                index: finish_index,
                count: checkpoints.len(),
            });
        }

        log::debug!(
            "Track built: {}x{}, {} centre-line points, {} checkpoints",
            width,
            height,
            centre_line.len(),
            checkpoints.len()
        );

        Ok(Self {
            width,
            height,
            centre_line,
            road_half_width,
            checkpoints,
            finish_index,
            checkpoint_radius: checkpoint_radius.max(1.0),
            start,
        })
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn road_half_width(&self) -> f32 {
        self.road_half_width
    }

    pub fn centre_line(&self) -> &[Vec2] {
        &self.centre_line
    }

    pub fn checkpoints(&self) -> &[Vec2] {
        &self.checkpoints
    }

    pub fn checkpoint_count(&self) -> usize {
        self.checkpoints.len()
    }

    pub fn checkpoint(&self, index: usize) -> Vec2 {
        self.checkpoints[index % self.checkpoints.len()]
    }

    pub fn finish_index(&self) -> usize {
        self.finish_index
    }

    pub fn checkpoint_radius(&self) -> f32 {
        self.checkpoint_radius
    }

    pub fn start_position(&self) -> Vec2 {
        self.start.position
    }

    pub fn start_angle(&self) -> f32 {
        self.start.heading
    }

    /// Checkpoint a freshly spawned car targets first
    pub fn first_target(&self) -> usize {
        (self.finish_index + 1) % self.checkpoints.len()
    }

    /// Whether a world point is off the drivable area
    pub fn is_point_out_of_bounds(&self, point: Vec2) -> bool {
        if !point.is_finite() {
            return true;
        }
        if point.x < 0.0 || point.y < 0.0 || point.x > self.width || point.y > self.height {
            return true;
        }

        let n = self.centre_line.len();
        !(0..n).any(|i| {
            let a = self.centre_line[i];
            let b = self.centre_line[(i + 1) % n];
            distance_to_segment(point, a, b) <= self.road_half_width
        })
    }

    /// Place a car on the start line, shifted sideways by `lateral_offset`
    pub fn spawn_vehicle(&self, params: VehicleParams, lateral_offset: f32) -> Vehicle {
        let forward = self.start.forward();
        let right = Vec2::new(-forward.y, forward.x);
        let pose = Pose::new(self.start.position + right * lateral_offset, self.start.heading);
        let mut vehicle = Vehicle::new(pose, params);
        vehicle.checkpoint_index = self.first_target();
        vehicle
    }

    pub fn distance_to_target(&self, vehicle: &Vehicle) -> f32 {
        vehicle.position.distance(self.checkpoint(vehicle.checkpoint_index))
    }

    /// Test the vehicle against its targeted checkpoint only
    pub fn check_checkpoint(&self, vehicle: &mut Vehicle) -> CheckpointEvent {
        let index = vehicle.checkpoint_index % self.checkpoints.len();
        if vehicle.position.distance(self.checkpoints[index]) > self.checkpoint_radius {
            return CheckpointEvent::None;
        }

        vehicle.checkpoint_index = (index + 1) % self.checkpoints.len();
        if index == self.finish_index {
            CheckpointEvent::Finish
        } else {
            CheckpointEvent::Checkpoint(index)
        }
    }

    /// Progress of a cursor within the lap; higher is further along
    fn progress_rank(&self, checkpoint_index: usize) -> usize {
        let n = self.checkpoints.len();
        (checkpoint_index % n + n - self.first_target()) % n
    }

    /// Approximate race-position comparison between two cars
    pub fn is_ahead(&self, a: &Vehicle, b: &Vehicle) -> bool {
        let rank_a = self.progress_rank(a.checkpoint_index);
        let rank_b = self.progress_rank(b.checkpoint_index);
        if rank_a != rank_b {
            return rank_a > rank_b;
        }
        self.distance_to_target(a) < self.distance_to_target(b)
    }
}

/// Keeps a car on the road and rate-limits impact penalties
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ContactLimiter {
    cooldown: f32,
}

impl ContactLimiter {
    /// Seconds between two penalties for one contact
    pub const COOLDOWN: f32 = 0.5;

    /// Push a car that left the road back to `previous`. Returns true when
    /// an impact penalty was applied this tick.
    pub fn resolve(&mut self, track: &Track, car: &mut Vehicle, previous: Vec2, dt: f32) -> bool {
        self.cooldown = (self.cooldown - dt.max(0.0)).max(0.0);
        if !track.is_point_out_of_bounds(car.position) {
            return false;
        }
        if !track.is_point_out_of_bounds(previous) {
            car.position = previous;
        }
        if self.cooldown > 0.0 {
            return false;
        }
        car.handle_collision();
        self.cooldown = Self::COOLDOWN;
        true
    }
}

/// Built-in course shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackPreset {
    #[default]
    Oval,
    Circuit,
    Speedway,
}

/// Parameters for the closed-loop generator
struct LoopShape {
    width: f32,
    height: f32,
    radius_x: f32,
    radius_y: f32,
    wobble: f32,
    lobes: f32,
    phase: f32,
    road_half_width: f32,
    checkpoints: usize,
}

impl TrackPreset {
    const SAMPLES_PER_CHECKPOINT: usize = 8;

    fn shape(self) -> LoopShape {
        match self {
            TrackPreset::Oval => LoopShape {
                width: 1600.0,
                height: 1200.0,
                radius_x: 600.0,
                radius_y: 400.0,
                wobble: 0.0,
                lobes: 0.0,
                phase: 0.0,
                road_half_width: 70.0,
                checkpoints: 12,
            },
            TrackPreset::Circuit => LoopShape {
                width: 1600.0,
                height: 1200.0,
                radius_x: 620.0,
                radius_y: 440.0,
                wobble: 0.18,
                lobes: 3.0,
                phase: 0.6,
                road_half_width: 60.0,
                checkpoints: 16,
            },
            TrackPreset::Speedway => LoopShape {
                width: 2000.0,
                height: 1000.0,
                radius_x: 850.0,
                radius_y: 350.0,
                wobble: 0.05,
                lobes: 2.0,
                phase: 0.0,
                road_half_width: 80.0,
                checkpoints: 10,
            },
        }
    }

    /// Generate the layout for this preset
    pub fn layout(self) -> TrackLayout {
        let shape = self.shape();
        let samples = shape.checkpoints * Self::SAMPLES_PER_CHECKPOINT;
        let centre = Vec2::new(shape.width / 2.0, shape.height / 2.0);

        let centre_line: Vec<Vec2> = (0..samples)
            .map(|i| {
                let t = i as f32 / samples as f32 * TAU;
                let r = 1.0 + shape.wobble * (shape.lobes * t + shape.phase).sin();
                centre + Vec2::new(shape.radius_x * r * t.sin(), -shape.radius_y * r * t.cos())
            })
            .collect();

        let checkpoints: Vec<Vec2> = centre_line
            .iter()
            .step_by(Self::SAMPLES_PER_CHECKPOINT)
            .copied()
            .collect();

        let start = Pose::new(centre_line[0], bearing(centre_line[0], centre_line[1]));

        TrackLayout {
            width: shape.width,
            height: shape.height,
            centre_line,
            road_half_width: shape.road_half_width,
            checkpoints,
            finish_index: 0,
            checkpoint_radius: shape.road_half_width * 1.2,
            start,
        }
    }

    pub fn build(self) -> Result<Track, TrackError> {
        Track::new(self.layout())
    }
}
