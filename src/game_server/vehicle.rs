//! Vehicle - Kinematic car model
//!
//! A car carries a pose, a scalar forward speed and its control state.
//! Control calls adjust speed and heading; `update` integrates motion.
//! The model knows nothing about the track it drives on.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::game_server::geometry::{heading_vector, normalize_angle, Pose};

/// Tunable vehicle parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VehicleParams {
    /// Top speed without boost (world units per second)
    pub max_speed: f32,
    /// Top speed multiplier while boosting
    pub boost_multiplier: f32,
    /// Lateral slip and extra steering while drifting
    pub drift_factor: f32,
    /// Footprint width
    pub width: f32,
    /// Footprint length
    pub height: f32,
}

impl Default for VehicleParams {
    fn default() -> Self {
        Self {
            max_speed: 300.0,
            boost_multiplier: 1.5,
            drift_factor: 0.35,
            width: 20.0,
            height: 36.0,
        }
    }
}

impl VehicleParams {
    /// Scale speed and drift by session multipliers
    pub fn scaled(self, speed_multiplier: f32, drift_multiplier: f32) -> Self {
        Self {
            max_speed: self.max_speed * speed_multiplier.max(0.0),
            drift_factor: (self.drift_factor * drift_multiplier.max(0.0)).clamp(0.0, 1.0),
            ..self
        }
    }
}

/// Throttle command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Throttle {
    Accelerate,
    #[default]
    Coast,
    Brake,
}

/// Steering command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Steer {
    Left,
    #[default]
    Straight,
    Right,
}

/// One set of control inputs, held until replaced
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlIntent {
    pub throttle: Throttle,
    pub steer: Steer,
    /// Turn-rate multiplier applied to the steering command
    pub steer_gain: f32,
    pub boost: bool,
    pub drift: bool,
}

impl Default for ControlIntent {
    fn default() -> Self {
        Self {
            throttle: Throttle::Coast,
            steer: Steer::Straight,
            steer_gain: 1.0,
            boost: false,
            drift: false,
        }
    }
}

/// Complete state of a single car
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub position: Vec2,
    /// Radians, normalized to (-PI, PI], 0 = up
    pub heading: f32,
    pub speed: f32,
    pub params: VehicleParams,
    pub drifting: bool,
    /// Current lateral slip, grows toward `drift_factor` while drifting
    pub slip: f32,
    /// -1 slides left, +1 slides right
    slip_direction: f32,
    pub boosting: bool,
    /// Index of the checkpoint this car is racing toward
    pub checkpoint_index: usize,
    /// Distance covered while drifting
    pub drift_distance: f32,
}

impl Vehicle {
    const ACCELERATION: f32 = 180.0;
    const BRAKE_DECELERATION: f32 = 420.0;
    const DRAG: f32 = 90.0;
    const TURN_RATE: f32 = 2.6;
    const FULL_STEER_SPEED: f32 = 60.0;
    const MIN_STEER_FACTOR: f32 = 0.1;
    const HIGH_SPEED_STEER_LOSS: f32 = 0.35;
    const SLIP_RATE: f32 = 3.0;
    const COLLISION_SPEED_RETAIN: f32 = 0.4;
    const COLLISION_DEFLECTION: f32 = 0.2;

    /// Create a car at rest
    pub fn new(pose: Pose, params: VehicleParams) -> Self {
        Self {
            position: pose.position,
            heading: normalize_angle(pose.heading),
            speed: 0.0,
            params,
            drifting: false,
            slip: 0.0,
            slip_direction: 0.0,
            boosting: false,
            checkpoint_index: 0,
            drift_distance: 0.0,
        }
    }

    pub fn pose(&self) -> Pose {
        Pose {
            position: self.position,
            heading: self.heading,
        }
    }

    /// Boost multiplier currently in effect
    pub fn current_boost_multiplier(&self) -> f32 {
        if self.boosting {
            self.params.boost_multiplier.max(1.0)
        } else {
            1.0
        }
    }

    /// Highest speed allowed right now
    pub fn top_speed(&self) -> f32 {
        self.params.max_speed.max(0.0) * self.current_boost_multiplier()
    }

    pub fn accelerate(&mut self, dt: f32) {
        let dt = dt.max(0.0);
        self.speed = (self.speed + Self::ACCELERATION * dt).min(self.top_speed());
    }

    pub fn brake(&mut self, dt: f32) {
        let dt = dt.max(0.0);
        self.speed = (self.speed - Self::BRAKE_DECELERATION * dt).max(0.0);
    }

    /// Passive drag when neither accelerating nor braking
    pub fn release_accelerator(&mut self, dt: f32) {
        let dt = dt.max(0.0);
        self.speed = (self.speed - Self::DRAG * dt).max(0.0);
    }

    pub fn turn_left(&mut self, dt: f32) {
        self.heading = normalize_angle(self.heading - self.turn_amount(dt));
        self.slip_direction = 1.0;
    }

    pub fn turn_right(&mut self, dt: f32) {
        self.heading = normalize_angle(self.heading + self.turn_amount(dt));
        self.slip_direction = -1.0;
    }

    /// Steering authority: weak near standstill, slightly reduced near top speed
    fn turn_amount(&self, dt: f32) -> f32 {
        let dt = dt.max(0.0);
        let low = (self.speed / Self::FULL_STEER_SPEED).clamp(Self::MIN_STEER_FACTOR, 1.0);
        let ratio = if self.top_speed() > 0.0 {
            (self.speed / self.top_speed()).min(1.0)
        } else {
            0.0
        };
        let high = 1.0 - Self::HIGH_SPEED_STEER_LOSS * ratio * ratio;
        let drift = if self.drifting {
            1.0 + self.params.drift_factor
        } else {
            1.0
        };
        Self::TURN_RATE * dt * low * high * drift
    }

    pub fn activate_boost(&mut self) {
        self.boosting = true;
    }

    pub fn deactivate_boost(&mut self) {
        self.boosting = false;
    }

    pub fn start_drift(&mut self) {
        self.drifting = true;
    }

    pub fn end_drift(&mut self) {
        self.drifting = false;
    }

    /// Impact penalty; the caller rate-limits repeated contact
    pub fn handle_collision(&mut self) {
        self.speed *= Self::COLLISION_SPEED_RETAIN;
        let spin = if self.slip_direction >= 0.0 { 1.0 } else { -1.0 };
        self.heading = normalize_angle(self.heading + spin * Self::COLLISION_DEFLECTION);
        self.drifting = false;
        self.slip = 0.0;
    }

    /// Apply a held control intent for one tick
    pub fn apply_intent(&mut self, intent: &ControlIntent, dt: f32) {
        if intent.boost {
            self.activate_boost();
        } else {
            self.deactivate_boost();
        }
        if intent.drift {
            self.start_drift();
        } else {
            self.end_drift();
        }

        match intent.throttle {
            Throttle::Accelerate => self.accelerate(dt),
            Throttle::Coast => self.release_accelerator(dt),
            Throttle::Brake => self.brake(dt),
        }

        let steer_dt = dt * intent.steer_gain.max(0.0);
        match intent.steer {
            Steer::Left => self.turn_left(steer_dt),
            Steer::Right => self.turn_right(steer_dt),
            Steer::Straight => {}
        }
    }

    /// Integrate motion for one tick
    pub fn update(&mut self, dt: f32) {
        let dt = dt.max(0.0);

        self.speed = self.speed.clamp(0.0, self.top_speed());

        let target_slip = if self.drifting {
            self.params.drift_factor
        } else {
            0.0
        };
        let step = Self::SLIP_RATE * dt;
        if self.slip < target_slip {
            self.slip = (self.slip + step).min(target_slip);
        } else {
            self.slip = (self.slip - step).max(target_slip);
        }

        let forward = heading_vector(self.heading);
        self.position += forward * self.speed * dt;

        if self.slip > 0.0 {
            let right = Vec2::new(-forward.y, forward.x);
            self.position += right * self.slip_direction * self.slip * self.speed * dt;
        }

        if self.drifting {
            self.drift_distance += self.speed * dt;
        }

        self.heading = normalize_angle(self.heading);
    }
}
