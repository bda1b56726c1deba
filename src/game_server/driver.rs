//! Driver - Autonomous opponent
//!
//! The driver owns its car and re-decides its controls on a reaction timer.
//! Between decision passes the last intent keeps being applied, while the
//! car itself integrates every tick.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use crate::game_server::geometry::{bearing, normalize_angle};
use crate::game_server::policy::{DrivingPolicy, Perception, PolicyKind};
use crate::game_server::racing_line::RacingLine;
use crate::game_server::sensors::cast_at_offsets;
use crate::game_server::track::{CheckpointEvent, ContactLimiter, Track};
use crate::game_server::vehicle::{ControlIntent, Vehicle};

/// Clamp into [0, 1], mapping NaN to 0
pub(crate) fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

pub struct AutonomousDriver {
    car: Vehicle,
    track: Arc<Track>,
    difficulty: f32,
    racing_line: RacingLine,
    policy: Box<dyn DrivingPolicy>,
    rng: Box<dyn RngCore + Send>,
    reaction_interval: f32,
    decision_timer: f32,
    preferred_speed: f32,
    drift_probability: f32,
    base_aggressiveness: f32,
    aggressiveness: f32,
    intent: ControlIntent,
    boost_available: bool,
    contact: ContactLimiter,
    collisions: u32,
    sensors: Vec<f32>,
    decisions: u64,
}

impl AutonomousDriver {
    /// Short-range obstacle rays relative to the heading
    const SENSOR_OFFSETS: [f32; 3] = [-0.4, 0.0, 0.4];
    const SENSOR_RANGE: f32 = 70.0;
    /// Readings below this share of the range are an imminent collision
    const CLEAR_FRACTION: f32 = 0.5;
    /// Waypoints past the steering target used to judge the next bend
    const FAR_LOOK_AHEAD: usize = 8;

    pub fn new(
        track: Arc<Track>,
        car: Vehicle,
        difficulty: f32,
        policy: Box<dyn DrivingPolicy>,
        rng: Box<dyn RngCore + Send>,
    ) -> Self {
        let difficulty = clamp_unit(difficulty);
        let racing_line = RacingLine::new(&track, RacingLine::DEFAULT_SEGMENTS_PER_LEG);
        let base_aggressiveness = difficulty * 0.8;

        log::debug!(
            "AI driver ready: policy={}, difficulty={:.2}, {} waypoints",
            policy.name(),
            difficulty,
            racing_line.len()
        );

        Self {
            preferred_speed: car.params.max_speed * (0.7 + 0.3 * difficulty),
            car,
            track,
            difficulty,
            racing_line,
            policy,
            rng,
            reaction_interval: 0.25 - 0.2 * difficulty,
            decision_timer: 0.0,
            drift_probability: clamp_unit(0.05 + 0.3 * difficulty),
            base_aggressiveness,
            aggressiveness: base_aggressiveness,
            intent: ControlIntent::default(),
            boost_available: true,
            contact: ContactLimiter::default(),
            collisions: 0,
            sensors: Vec::new(),
            decisions: 0,
        }
    }

    /// Driver with a built-in policy and a seeded RNG
    pub fn with_policy(
        track: Arc<Track>,
        car: Vehicle,
        difficulty: f32,
        kind: PolicyKind,
        seed: u64,
    ) -> Self {
        Self::new(
            track,
            car,
            difficulty,
            kind.build(),
            Box::new(StdRng::seed_from_u64(seed)),
        )
    }

    pub fn vehicle(&self) -> &Vehicle {
        &self.car
    }

    pub fn difficulty(&self) -> f32 {
        self.difficulty
    }

    pub fn aggressiveness(&self) -> f32 {
        self.aggressiveness
    }

    pub fn baseline_aggressiveness(&self) -> f32 {
        self.base_aggressiveness
    }

    pub fn reaction_interval(&self) -> f32 {
        self.reaction_interval
    }

    pub fn preferred_speed(&self) -> f32 {
        self.preferred_speed
    }

    pub fn drift_probability(&self) -> f32 {
        self.drift_probability
    }

    pub fn racing_line(&self) -> &RacingLine {
        &self.racing_line
    }

    pub fn intent(&self) -> &ControlIntent {
        &self.intent
    }

    /// Readings from the last decision pass
    pub fn sensor_readings(&self) -> &[f32] {
        &self.sensors
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    pub fn decisions(&self) -> u64 {
        self.decisions
    }

    /// Wall impacts taken so far
    pub fn collisions(&self) -> u32 {
        self.collisions
    }

    /// Boost metering is the caller's; an empty meter vetoes boost
    pub fn set_boost_available(&mut self, available: bool) {
        self.boost_available = available;
    }

    pub fn is_ahead_of(&self, other: &Vehicle) -> bool {
        self.track.is_ahead(&self.car, other)
    }

    /// Advance one tick against the opponent's current state
    pub fn update(&mut self, dt: f32, opponent: &Vehicle) -> CheckpointEvent {
        let dt = dt.max(0.0);
        self.decision_timer += dt;
        if self.decision_timer >= self.reaction_interval {
            self.decision_timer = 0.0;
            self.decide(opponent);
        }

        let mut intent = self.intent;
        intent.boost &= self.boost_available;
        let previous = self.car.position;
        self.car.apply_intent(&intent, dt);
        self.car.update(dt);
        if self
            .contact
            .resolve(&self.track, &mut self.car, previous, dt)
        {
            self.collisions += 1;
        }

        self.track.check_checkpoint(&mut self.car)
    }

    fn decide(&mut self, opponent: &Vehicle) {
        let position = self.car.position;

        let nearest = self.racing_line.closest_index(position);
        let target_index = self.racing_line.look_ahead(nearest, self.policy.look_ahead());
        let target = self.racing_line.point(target_index);
        let far = self
            .racing_line
            .point(self.racing_line.look_ahead(target_index, Self::FAR_LOOK_AHEAD));

        let target_bearing = bearing(position, target);
        let heading_error = normalize_angle(target_bearing - self.car.heading);
        let upcoming_turn = normalize_angle(bearing(target, far) - target_bearing);

        self.sensors = cast_at_offsets(
            self.car.pose(),
            &self.track,
            &Self::SENSOR_OFFSETS,
            Self::SENSOR_RANGE,
        );
        let imminent_collision = self
            .sensors
            .iter()
            .any(|reading| *reading < Self::SENSOR_RANGE * Self::CLEAR_FRACTION);
        let clearance_bias = match (self.sensors.first(), self.sensors.last()) {
            (Some(left), Some(right)) => (right - left) / Self::SENSOR_RANGE,
            _ => 0.0,
        };

        let perception = Perception {
            heading_error,
            speed: self.car.speed,
            preferred_speed: self.preferred_speed,
            aggressiveness: self.aggressiveness,
            drift_probability: self.drift_probability,
            imminent_collision,
            clearance_bias,
            trailing: self.track.is_ahead(opponent, &self.car),
            distance_to_checkpoint: self.track.distance_to_target(&self.car),
            upcoming_turn,
        };
        self.intent = self.policy.decide(&perception, self.rng.as_mut());

        let opponent_distance = position.distance(opponent.position);
        self.aggressiveness = clamp_unit(self.policy.adapt_aggressiveness(
            self.aggressiveness,
            self.base_aggressiveness,
            opponent_distance,
        ));
        self.decisions += 1;

        log::trace!(
            "decision #{}: error={:.2} imminent={} clearance={:.2} intent={:?} aggr={:.2}",
            self.decisions,
            heading_error,
            imminent_collision,
            clearance_bias,
            self.intent,
            self.aggressiveness
        );
    }
}
