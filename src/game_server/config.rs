//! Config - Session configuration
//!
//! A race is configured once at session start; changing any of it means
//! building a fresh race.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::game_server::driver::clamp_unit;
use crate::game_server::policy::PolicyKind;
use crate::game_server::sensors::MIN_READING;
use crate::game_server::track::{TrackError, TrackPreset};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid race config JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("race needs at least one lap")]
    NoLaps,
    #[error("{name} must be positive (got {value})")]
    NonPositive { name: &'static str, value: f32 },
    #[error("sensor_length must be at least {min} (got {value})")]
    SensorTooShort { value: f32, min: f32 },
    #[error(transparent)]
    Track(#[from] TrackError),
}

/// Targets the frontend compares measurements against
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChallengeTargets {
    /// Seconds
    pub lap_time: f32,
    /// World units
    pub drift_distance: f32,
    /// Seconds
    pub boost_duration: f32,
}

impl Default for ChallengeTargets {
    fn default() -> Self {
        Self {
            lap_time: 30.0,
            drift_distance: 1500.0,
            boost_duration: 10.0,
        }
    }
}

/// Race configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RaceConfig {
    pub track: TrackPreset,
    pub laps: u32,
    /// AI skill in [0, 1]
    pub difficulty: f32,
    pub ai_policy: PolicyKind,
    /// Seed for the AI's random rolls
    pub seed: u64,
    /// Countdown before the start (seconds)
    pub countdown: f32,
    /// Longest tick the simulation will integrate
    pub max_dt: f32,
    pub speed_multiplier: f32,
    pub drift_multiplier: f32,
    /// Telemetry rays cast from the player's car
    pub sensor_rays: usize,
    pub sensor_length: f32,
    pub sensor_spread: f32,
    pub challenges: ChallengeTargets,
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            track: TrackPreset::Oval,
            laps: 3,
            difficulty: 0.5,
            ai_policy: PolicyKind::Standard,
            seed: 7,
            countdown: 3.0,
            max_dt: 0.05,
            speed_multiplier: 1.0,
            drift_multiplier: 1.0,
            sensor_rays: 5,
            sensor_length: 150.0,
            sensor_spread: 2.0,
            challenges: ChallengeTargets::default(),
        }
    }
}

impl RaceConfig {
    /// Parse and validate a JSON config; missing fields take defaults
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: RaceConfig = serde_json::from_str(json)?;
        config.validated()
    }

    /// Check structural limits and clamp scalars into range
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        if self.laps == 0 {
            return Err(ConfigError::NoLaps);
        }
        let positive = [
            ("max_dt", self.max_dt),
            ("speed_multiplier", self.speed_multiplier),
            ("drift_multiplier", self.drift_multiplier),
        ];
        for (name, value) in positive {
            if !(value > 0.0) {
                return Err(ConfigError::NonPositive { name, value });
            }
        }
        // ray readings are floored at MIN_READING
        if !(self.sensor_length >= MIN_READING) {
            return Err(ConfigError::SensorTooShort {
                value: self.sensor_length,
                min: MIN_READING,
            });
        }
        self.difficulty = clamp_unit(self.difficulty);
        self.countdown = self.countdown.max(0.0);
        Ok(self)
    }
}
