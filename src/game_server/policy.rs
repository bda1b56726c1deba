//! Policy - Steering, throttle and aggressiveness decisions
//!
//! A policy turns what the driver perceived during a decision pass into a
//! [`ControlIntent`]. Randomised choices (drift and boost rolls) draw from
//! the RNG handed in by the driver so tests can pin the outcome.

use std::f32::consts::FRAC_PI_2;

use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

use crate::game_server::vehicle::{ControlIntent, Steer, Throttle};

/// Opponent distance that counts as "close"
pub const PROXIMITY_THRESHOLD: f32 = 150.0;

/// Below this speed wall recovery creeps forward instead of braking
pub const CRAWL_SPEED: f32 = 30.0;

/// Heading-error equivalent of a fully one-sided clearance
const AVOIDANCE_STEER: f32 = 0.5;

/// Everything a policy gets to see during a decision pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Perception {
    /// Bearing to the steering target minus heading, in (-PI, PI]
    pub heading_error: f32,
    pub speed: f32,
    pub preferred_speed: f32,
    pub aggressiveness: f32,
    pub drift_probability: f32,
    pub imminent_collision: bool,
    /// Right minus left sensor clearance over the sensor range, in [-1, 1];
    /// positive means more room on the right
    pub clearance_bias: f32,
    /// Opponent is ahead in race position
    pub trailing: bool,
    pub distance_to_checkpoint: f32,
    /// Bend of the racing line beyond the steering target
    pub upcoming_turn: f32,
}

/// Available decision policies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    #[default]
    Standard,
    Advanced,
}

impl PolicyKind {
    pub fn build(self) -> Box<dyn DrivingPolicy> {
        match self {
            PolicyKind::Standard => Box::new(StandardPolicy),
            PolicyKind::Advanced => Box::new(AdvancedPolicy),
        }
    }
}

pub trait DrivingPolicy: Send {
    fn name(&self) -> &'static str;

    /// Racing-line waypoints between the nearest point and the steering target
    fn look_ahead(&self) -> usize {
        3
    }

    fn decide(&mut self, perception: &Perception, rng: &mut dyn RngCore) -> ControlIntent;

    /// Rise toward 1.0 near the opponent, relax toward the baseline otherwise
    fn adapt_aggressiveness(&self, current: f32, baseline: f32, opponent_distance: f32) -> f32 {
        if opponent_distance < PROXIMITY_THRESHOLD {
            (current + 0.1).min(1.0)
        } else {
            current + (baseline - current) * 0.1
        }
    }
}

/// Heading error, pulled toward the open side when a wall is close
fn steering_signal(p: &Perception) -> f32 {
    if p.imminent_collision {
        p.heading_error + AVOIDANCE_STEER * p.clearance_bias.clamp(-1.0, 1.0)
    } else {
        p.heading_error
    }
}

fn steer_for(signal: f32, dead_zone: f32) -> Steer {
    if signal > dead_zone {
        Steer::Right
    } else if signal < -dead_zone {
        Steer::Left
    } else {
        Steer::Straight
    }
}

/// Brake without boost or drift. With `creep`, a car at crawl speed keeps
/// moving so its steering has authority.
fn recover(p: &Perception, steer: Steer, steer_gain: f32, creep: bool) -> ControlIntent {
    let throttle = if creep && p.speed <= CRAWL_SPEED {
        Throttle::Accelerate
    } else {
        Throttle::Brake
    };
    ControlIntent {
        throttle,
        steer,
        steer_gain,
        boost: false,
        drift: false,
    }
}

/// Pure pursuit of the racing line with a dead-zone steering rule
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardPolicy;

impl StandardPolicy {
    const STEER_DEADZONE: f32 = 0.05;
    const AVOIDANCE_GAIN: f32 = 1.8;
    const COMMITTED_ENVELOPE: f32 = 0.8;
    const DRIFT_MIN_ERROR: f32 = 0.2;
    const DRIFT_MAX_ERROR: f32 = 0.6;
    const DRIFT_SPEED_FRACTION: f32 = 0.6;
    const BOOST_BASE_CHANCE: f32 = 0.02;
    const BOOST_AGGRESSION_WEIGHT: f32 = 0.1;
    const BOOST_TRAILING_BONUS: f32 = 0.15;
    const BOOST_STRETCH_BONUS: f32 = 0.1;
    const LONG_STRETCH: f32 = 200.0;
}

impl DrivingPolicy for StandardPolicy {
    fn name(&self) -> &'static str {
        "standard"
    }

    fn decide(&mut self, p: &Perception, rng: &mut dyn RngCore) -> ControlIntent {
        let steer = steer_for(steering_signal(p), Self::STEER_DEADZONE);
        let steer_gain = if p.imminent_collision {
            Self::AVOIDANCE_GAIN
        } else {
            1.0
        };

        let error = p.heading_error.abs();
        let committed = error >= Self::COMMITTED_ENVELOPE;
        if committed || p.imminent_collision {
            return recover(p, steer, steer_gain, !committed);
        }

        let throttle = if p.speed < p.preferred_speed {
            Throttle::Accelerate
        } else {
            Throttle::Coast
        };

        let drift = error > Self::DRIFT_MIN_ERROR
            && error < Self::DRIFT_MAX_ERROR
            && p.speed > p.preferred_speed * Self::DRIFT_SPEED_FRACTION
            && rng.gen::<f32>() < p.drift_probability;

        let mut boost_chance =
            Self::BOOST_BASE_CHANCE + p.aggressiveness * Self::BOOST_AGGRESSION_WEIGHT;
        if p.trailing {
            boost_chance += Self::BOOST_TRAILING_BONUS;
        }
        if p.distance_to_checkpoint > Self::LONG_STRETCH {
            boost_chance += Self::BOOST_STRETCH_BONUS;
        }
        let boost = rng.gen::<f32>() < boost_chance;

        ControlIntent {
            throttle,
            steer,
            steer_gain,
            boost,
            drift,
        }
    }
}

/// Looks further down the line: brakes for sharp bends, steers
/// proportionally and keeps boost for the straights
#[derive(Debug, Default, Clone, Copy)]
pub struct AdvancedPolicy;

impl AdvancedPolicy {
    const STEER_DEADZONE: f32 = 0.03;
    const AVOIDANCE_GAIN: f32 = 1.8;
    const COMMITTED_ENVELOPE: f32 = 0.9;
    const CORNER_SLOWDOWN: f32 = 0.5;
    const OVERSPEED_MARGIN: f32 = 1.1;
    const DRIFT_MIN_TURN: f32 = 0.5;
    const STRAIGHT_TURN: f32 = 0.2;
    const STRAIGHT_ERROR: f32 = 0.15;

    fn corner_speed(p: &Perception) -> f32 {
        let sharpness = (p.upcoming_turn.abs() / FRAC_PI_2).min(1.0);
        p.preferred_speed * (1.0 - Self::CORNER_SLOWDOWN * sharpness)
    }
}

impl DrivingPolicy for AdvancedPolicy {
    fn name(&self) -> &'static str {
        "advanced"
    }

    fn look_ahead(&self) -> usize {
        4
    }

    fn decide(&mut self, p: &Perception, rng: &mut dyn RngCore) -> ControlIntent {
        let error = p.heading_error.abs();
        let steer = steer_for(steering_signal(p), Self::STEER_DEADZONE);
        let mut steer_gain = (error / 0.3).clamp(0.5, 1.5);
        if p.imminent_collision {
            steer_gain *= Self::AVOIDANCE_GAIN;
        }

        let committed = error >= Self::COMMITTED_ENVELOPE;
        if committed || p.imminent_collision {
            return recover(p, steer, steer_gain, !committed);
        }

        let target_speed = Self::corner_speed(p);
        let throttle = if p.speed < target_speed {
            Throttle::Accelerate
        } else if p.speed > target_speed * Self::OVERSPEED_MARGIN {
            Throttle::Brake
        } else {
            Throttle::Coast
        };

        let drift = p.upcoming_turn.abs() > Self::DRIFT_MIN_TURN
            && error > 0.1
            && error < 0.6
            && rng.gen::<f32>() < p.drift_probability;

        let on_straight =
            p.upcoming_turn.abs() < Self::STRAIGHT_TURN && error < Self::STRAIGHT_ERROR;
        let boost_chance = 0.05 + p.aggressiveness * 0.2 + if p.trailing { 0.2 } else { 0.0 };
        let boost = on_straight && rng.gen::<f32>() < boost_chance;

        ControlIntent {
            throttle,
            steer,
            steer_gain,
            boost,
            drift,
        }
    }

    fn adapt_aggressiveness(&self, current: f32, baseline: f32, opponent_distance: f32) -> f32 {
        if opponent_distance < PROXIMITY_THRESHOLD {
            (current + 0.15).min(1.0)
        } else {
            current + (baseline - current) * 0.15
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;
    use std::f32::consts::PI;

    fn perception(heading_error: f32) -> Perception {
        Perception {
            heading_error,
            speed: 200.0,
            preferred_speed: 250.0,
            aggressiveness: 0.5,
            drift_probability: 0.3,
            imminent_collision: false,
            clearance_bias: 0.0,
            trailing: false,
            distance_to_checkpoint: 100.0,
            upcoming_turn: 0.0,
        }
    }

    /// Every roll comes out 0.0, so any probability > 0 succeeds
    fn always() -> StepRng {
        StepRng::new(0, 0)
    }

    /// Every roll comes out just below 1.0
    fn never() -> StepRng {
        StepRng::new(u64::MAX, 0)
    }

    #[test]
    fn target_behind_means_brake_without_drift() {
        for kind in [PolicyKind::Standard, PolicyKind::Advanced] {
            let mut policy = kind.build();
            let intent = policy.decide(&perception(PI - 0.01), &mut always());
            assert_eq!(intent.throttle, Throttle::Brake, "{}", policy.name());
            assert!(!intent.drift);
            assert!(!intent.boost);

            let mut at_rest = perception(PI - 0.01);
            at_rest.speed = 0.0;
            at_rest.imminent_collision = true;
            let intent = policy.decide(&at_rest, &mut always());
            assert_eq!(intent.throttle, Throttle::Brake, "{}", policy.name());
            assert_ne!(intent.steer, Steer::Straight);
        }
    }

    #[test]
    fn steers_toward_the_error() {
        let mut policy = StandardPolicy;
        assert_eq!(policy.decide(&perception(0.3), &mut never()).steer, Steer::Right);
        assert_eq!(policy.decide(&perception(-0.3), &mut never()).steer, Steer::Left);
        assert_eq!(policy.decide(&perception(0.01), &mut never()).steer, Steer::Straight);
    }

    #[test]
    fn imminent_collision_brakes_and_sharpens_steering() {
        let mut policy = StandardPolicy;
        let mut p = perception(0.3);
        p.imminent_collision = true;
        let intent = policy.decide(&p, &mut always());
        assert_eq!(intent.throttle, Throttle::Brake);
        assert!(intent.steer_gain > 1.0);
        assert!(!intent.drift && !intent.boost);
    }

    #[test]
    fn stopped_against_a_wall_creeps_away_from_it() {
        for kind in [PolicyKind::Standard, PolicyKind::Advanced] {
            let mut policy = kind.build();
            let mut p = perception(0.0);
            p.speed = 0.0;
            p.imminent_collision = true;
            // wall close on the right
            p.clearance_bias = -0.75;
            let intent = policy.decide(&p, &mut never());
            assert_eq!(intent.throttle, Throttle::Accelerate, "{}", policy.name());
            assert_eq!(intent.steer, Steer::Left, "{}", policy.name());

            p.clearance_bias = 0.75;
            assert_eq!(policy.decide(&p, &mut never()).steer, Steer::Right);

            p.speed = CRAWL_SPEED + 20.0;
            assert_eq!(policy.decide(&p, &mut never()).throttle, Throttle::Brake);
        }
    }

    #[test]
    fn clearance_only_matters_near_a_wall() {
        let mut policy = AdvancedPolicy;
        let mut p = perception(0.0);
        p.clearance_bias = 1.0;
        assert_eq!(policy.decide(&p, &mut never()).steer, Steer::Straight);
    }

    #[test]
    fn accelerates_below_preferred_speed_and_coasts_above() {
        let mut policy = StandardPolicy;
        let mut p = perception(0.0);
        assert_eq!(policy.decide(&p, &mut never()).throttle, Throttle::Accelerate);
        p.speed = 260.0;
        assert_eq!(policy.decide(&p, &mut never()).throttle, Throttle::Coast);
    }

    #[test]
    fn drift_needs_moderate_error_speed_and_a_good_roll() {
        let mut policy = StandardPolicy;
        assert!(policy.decide(&perception(0.4), &mut always()).drift);
        assert!(!policy.decide(&perception(0.4), &mut never()).drift);
        assert!(!policy.decide(&perception(0.05), &mut always()).drift);

        let mut slow = perception(0.4);
        slow.speed = 50.0;
        assert!(!policy.decide(&slow, &mut always()).drift);
    }

    #[test]
    fn boost_follows_the_roll() {
        let mut policy = StandardPolicy;
        assert!(policy.decide(&perception(0.0), &mut always()).boost);
        assert!(!policy.decide(&perception(0.0), &mut never()).boost);
    }

    #[test]
    fn advanced_slows_for_sharp_bends() {
        let mut policy = AdvancedPolicy;
        let mut p = perception(0.0);
        p.upcoming_turn = 1.4;
        assert_eq!(policy.decide(&p, &mut never()).throttle, Throttle::Brake);

        p.upcoming_turn = 0.0;
        assert_eq!(policy.decide(&p, &mut never()).throttle, Throttle::Accelerate);
    }

    #[test]
    fn advanced_only_boosts_on_straights() {
        let mut policy = AdvancedPolicy;
        let mut p = perception(0.0);
        assert!(policy.decide(&p, &mut always()).boost);
        p.upcoming_turn = 0.6;
        assert!(!policy.decide(&p, &mut always()).boost);
    }

    #[test]
    fn aggressiveness_is_capped_and_relaxes() {
        let policy = StandardPolicy;
        let mut value = 0.4;
        for _ in 0..30 {
            value = policy.adapt_aggressiveness(value, 0.4, 50.0);
            assert!(value <= 1.0);
        }
        assert_eq!(value, 1.0);
        for _ in 0..100 {
            value = policy.adapt_aggressiveness(value, 0.4, 1000.0);
        }
        assert!((value - 0.4).abs() < 1e-3);
    }
}
