//! Race - Session state, lap timing and telemetry
//!
//! Owns the player's car and the AI driver for one race, turns finish-line
//! crossings into laps, meters boost and produces a snapshot every tick.

use std::sync::Arc;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::game_server::camera::Camera;
use crate::game_server::config::{ChallengeTargets, ConfigError, RaceConfig};
use crate::game_server::driver::AutonomousDriver;
use crate::game_server::geometry::{bearing, normalize_angle};
use crate::game_server::sensors::cast_rays;
use crate::game_server::track::{CheckpointEvent, ContactLimiter, Track};
use crate::game_server::vehicle::{ControlIntent, Steer, Throttle, Vehicle, VehicleParams};

/// Sideways distance of each car from the start line centre
const GRID_OFFSET: f32 = 25.0;

/// Seconds the camera takes to pan from the overview onto the player
const START_PAN: f32 = 1.0;

/// Raw control flags from the input layer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerIntent {
    pub accelerate: bool,
    pub brake: bool,
    pub left: bool,
    pub right: bool,
    pub boost: bool,
    pub drift: bool,
}

impl PlayerIntent {
    /// Simple chase steering toward a point, used by the headless runner
    pub fn steer_toward(vehicle: &Vehicle, target: Vec2) -> Self {
        let error = normalize_angle(bearing(vehicle.position, target) - vehicle.heading);
        let sharp = error.abs() > 0.6;
        Self {
            accelerate: !sharp,
            brake: sharp && vehicle.speed > 80.0,
            left: error < -0.05,
            right: error > 0.05,
            boost: error.abs() < 0.1,
            drift: false,
        }
    }

    fn to_control(self) -> ControlIntent {
        let throttle = if self.brake {
            Throttle::Brake
        } else if self.accelerate {
            Throttle::Accelerate
        } else {
            Throttle::Coast
        };
        let steer = match (self.left, self.right) {
            (true, false) => Steer::Left,
            (false, true) => Steer::Right,
            _ => Steer::Straight,
        };
        ControlIntent {
            throttle,
            steer,
            steer_gain: 1.0,
            boost: self.boost,
            drift: self.drift,
        }
    }
}

/// Race status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RaceStatus {
    NotStarted,
    Countdown,
    Racing,
    Finished,
}

/// Which car
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RacerId {
    Player,
    Opponent,
}

impl RacerId {
    pub fn name(self) -> &'static str {
        match self {
            RacerId::Player => "Player",
            RacerId::Opponent => "AI",
        }
    }
}

/// Things that happened during the last tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RaceEvent {
    Checkpoint { racer: RacerId, index: usize },
    LapCompleted { racer: RacerId, lap: u32, lap_time: f32 },
    Finished { racer: RacerId, position: u32 },
    Collision { racer: RacerId },
}

/// Race timing and results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaceResult {
    pub racer: RacerId,
    pub racer_name: String,
    pub finish_time: f32,
    pub best_lap: Option<f32>,
    pub position: u32,
}

/// Boost reserve; drains while boosting, refills otherwise
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BoostMeter {
    /// Charge in [0, 1]
    pub level: f32,
    /// Total seconds spent boosting
    pub boost_time: f32,
}

impl BoostMeter {
    const DRAIN_RATE: f32 = 0.35;
    const REFILL_RATE: f32 = 0.1;

    pub fn full() -> Self {
        Self {
            level: 1.0,
            boost_time: 0.0,
        }
    }

    pub fn has_charge(&self) -> bool {
        self.level > 0.0
    }

    pub fn update(&mut self, boosting: bool, dt: f32) {
        let dt = dt.max(0.0);
        if boosting {
            self.level = (self.level - Self::DRAIN_RATE * dt).max(0.0);
            self.boost_time += dt;
        } else {
            self.level = (self.level + Self::REFILL_RATE * dt).min(1.0);
        }
    }
}

/// Per-racer lap bookkeeping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RacerStats {
    pub laps: u32,
    pub lap_start: f32,
    pub last_lap: Option<f32>,
    pub best_lap: Option<f32>,
    pub boost: BoostMeter,
    pub collisions: u32,
    pub finished: bool,
}

impl RacerStats {
    fn new() -> Self {
        Self {
            laps: 0,
            lap_start: 0.0,
            last_lap: None,
            best_lap: None,
            boost: BoostMeter::full(),
            collisions: 0,
            finished: false,
        }
    }

    /// Record a finish-line crossing; returns the lap time
    fn complete_lap(&mut self, now: f32) -> f32 {
        let lap_time = now - self.lap_start;
        self.laps += 1;
        self.lap_start = now;
        self.last_lap = Some(lap_time);
        self.best_lap = Some(self.best_lap.map_or(lap_time, |best| best.min(lap_time)));
        lap_time
    }
}

/// Complete race state
pub struct Race {
    /// Race configuration
    pub config: RaceConfig,
    /// Current race status
    pub status: RaceStatus,
    track: Arc<Track>,
    player: Vehicle,
    player_contact: ContactLimiter,
    opponent: AutonomousDriver,
    player_stats: RacerStats,
    opponent_stats: RacerStats,
    player_sensors: Vec<f32>,
    camera: Camera,
    /// Elapsed race time (seconds)
    pub elapsed_time: f32,
    /// Countdown remaining (seconds)
    pub countdown: f32,
    /// Finish order
    pub finish_order: Vec<RaceResult>,
    events: Vec<RaceEvent>,
}

impl Race {
    /// Build the track and put both cars on the grid
    pub fn new(config: RaceConfig) -> Result<Self, ConfigError> {
        let config = config.validated()?;
        let track = Arc::new(config.track.build()?);
        let params = VehicleParams::default().scaled(config.speed_multiplier, config.drift_multiplier);

        let player = track.spawn_vehicle(params, -GRID_OFFSET);
        let opponent = AutonomousDriver::with_policy(
            Arc::clone(&track),
            track.spawn_vehicle(params, GRID_OFFSET),
            config.difficulty,
            config.ai_policy,
            config.seed,
        );
        // overview until the start
        let camera = Camera::new(
            Vec2::new(1280.0, 720.0),
            Vec2::new(track.width() / 2.0, track.height() / 2.0),
        );

        let mut race = Self {
            status: RaceStatus::NotStarted,
            countdown: config.countdown,
            config,
            track,
            player,
            player_contact: ContactLimiter::default(),
            opponent,
            player_stats: RacerStats::new(),
            opponent_stats: RacerStats::new(),
            player_sensors: Vec::new(),
            camera,
            elapsed_time: 0.0,
            finish_order: Vec::new(),
            events: Vec::new(),
        };
        race.scan_player_sensors();
        Ok(race)
    }

    pub fn track(&self) -> &Track {
        &self.track
    }

    pub fn player(&self) -> &Vehicle {
        &self.player
    }

    pub fn opponent(&self) -> &AutonomousDriver {
        &self.opponent
    }

    pub fn stats(&self, racer: RacerId) -> &RacerStats {
        match racer {
            RacerId::Player => &self.player_stats,
            RacerId::Opponent => &self.opponent_stats,
        }
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Events raised by the last update
    pub fn events(&self) -> &[RaceEvent] {
        &self.events
    }

    /// Start countdown
    pub fn start_countdown(&mut self) {
        self.status = RaceStatus::Countdown;
        self.countdown = self.config.countdown;
    }

    /// Update race state
    pub fn update(&mut self, delta: f32, input: PlayerIntent) {
        let delta = delta.max(0.0);
        self.events.clear();

        match self.status {
            RaceStatus::NotStarted => {}

            RaceStatus::Countdown => {
                self.countdown -= delta;
                if self.countdown <= 0.0 {
                    self.status = RaceStatus::Racing;
                    self.countdown = 0.0;
                    self.camera.start_transition(START_PAN);
                    log::info!("Race started on {:?}", self.config.track);
                }
            }

            RaceStatus::Racing | RaceStatus::Finished => {
                self.elapsed_time += delta;

                let intent = if self.player_stats.finished {
                    PlayerIntent::default()
                } else {
                    input
                };
                self.update_player(delta, intent);
                self.update_opponent(delta);

                if self.status == RaceStatus::Racing
                    && self.player_stats.finished
                    && self.opponent_stats.finished
                {
                    self.status = RaceStatus::Finished;
                    log::info!("Race finished after {:.2}s", self.elapsed_time);
                }
            }
        }

        self.scan_player_sensors();

        if matches!(self.status, RaceStatus::Racing | RaceStatus::Finished) {
            let speed_ratio = self.player.speed / self.player.params.max_speed.max(1.0);
            self.camera
                .follow(self.player.pose(), speed_ratio, &self.track, delta);
        }
    }

    fn update_player(&mut self, delta: f32, input: PlayerIntent) {
        let mut control = input.to_control();
        control.boost &= self.player_stats.boost.has_charge();

        let previous = self.player.position;
        self.player.apply_intent(&control, delta);
        self.player.update(delta);
        self.player_stats.boost.update(self.player.boosting, delta);

        if self
            .player_contact
            .resolve(&self.track, &mut self.player, previous, delta)
        {
            self.player_stats.collisions += 1;
            self.events.push(RaceEvent::Collision {
                racer: RacerId::Player,
            });
        }

        let event = self.track.check_checkpoint(&mut self.player);
        self.handle_checkpoint(RacerId::Player, event);
    }

    /// Telemetry rays from the player's current pose
    fn scan_player_sensors(&mut self) {
        self.player_sensors = cast_rays(
            self.player.pose(),
            &self.track,
            self.config.sensor_rays,
            self.config.sensor_length,
            self.config.sensor_spread,
        );
    }

    fn update_opponent(&mut self, delta: f32) {
        self.opponent
            .set_boost_available(self.opponent_stats.boost.has_charge());
        let collisions_before = self.opponent.collisions();
        let event = self.opponent.update(delta, &self.player);
        self.opponent_stats
            .boost
            .update(self.opponent.vehicle().boosting, delta);

        if self.opponent.collisions() > collisions_before {
            self.opponent_stats.collisions = self.opponent.collisions();
            self.events.push(RaceEvent::Collision {
                racer: RacerId::Opponent,
            });
        }
        self.handle_checkpoint(RacerId::Opponent, event);
    }

    fn handle_checkpoint(&mut self, racer: RacerId, event: CheckpointEvent) {
        match event {
            CheckpointEvent::None => {}
            CheckpointEvent::Checkpoint(index) => {
                log::debug!("{} reached checkpoint {}", racer.name(), index);
                self.events.push(RaceEvent::Checkpoint { racer, index });
            }
            CheckpointEvent::Finish => self.complete_lap(racer),
        }
    }

    fn complete_lap(&mut self, racer: RacerId) {
        let now = self.elapsed_time;
        let laps_to_run = self.config.laps;
        let stats = match racer {
            RacerId::Player => &mut self.player_stats,
            RacerId::Opponent => &mut self.opponent_stats,
        };
        if stats.finished {
            return;
        }

        let lap_time = stats.complete_lap(now);
        let lap = stats.laps;
        log::info!("{} completed lap {} in {:.2}s", racer.name(), lap, lap_time);
        self.events.push(RaceEvent::LapCompleted {
            racer,
            lap,
            lap_time,
        });

        if lap >= laps_to_run {
            stats.finished = true;
            let best_lap = stats.best_lap;
            let position = self.finish_order.len() as u32 + 1;
            self.finish_order.push(RaceResult {
                racer,
                racer_name: racer.name().to_string(),
                finish_time: now,
                best_lap,
                position,
            });
            log::info!("{} finished in position {}", racer.name(), position);
            self.events.push(RaceEvent::Finished { racer, position });
        }
    }

    /// Racer currently in front
    pub fn leader(&self) -> RacerId {
        let player_laps = self.player_stats.laps;
        let opponent_laps = self.opponent_stats.laps;
        if player_laps != opponent_laps {
            return if player_laps > opponent_laps {
                RacerId::Player
            } else {
                RacerId::Opponent
            };
        }
        if self.opponent.is_ahead_of(&self.player) {
            RacerId::Opponent
        } else {
            RacerId::Player
        }
    }

    /// Get compact snapshot for the frontend
    pub fn get_snapshot(&self) -> RaceSnapshot {
        RaceSnapshot {
            status: self.status,
            elapsed_time: self.elapsed_time,
            countdown: self.countdown,
            total_laps: self.config.laps,
            player: CarTelemetry::new(&self.player, &self.player_stats, self.elapsed_time),
            opponent: CarTelemetry::new(
                self.opponent.vehicle(),
                &self.opponent_stats,
                self.elapsed_time,
            ),
            player_sensors: self.player_sensors.clone(),
            opponent_sensors: self.opponent.sensor_readings().to_vec(),
            opponent_aggressiveness: self.opponent.aggressiveness(),
            leader: self.leader(),
            events: self.events.clone(),
            finisher_count: self.finish_order.len() as u32,
            challenges: self.config.challenges,
            track_size: Vec2::new(self.track.width(), self.track.height()),
            camera_centre: self.camera.centre,
            camera_zoom: self.camera.zoom,
        }
    }
}

/// Read-only view of one car
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarTelemetry {
    pub position: Vec2,
    pub heading: f32,
    /// World units per second; display conversion is the frontend's
    pub speed: f32,
    pub lap: u32,
    pub current_lap_time: f32,
    pub last_lap_time: Option<f32>,
    pub best_lap_time: Option<f32>,
    pub next_checkpoint: usize,
    pub boosting: bool,
    pub boost_level: f32,
    pub boost_time: f32,
    pub drifting: bool,
    pub drift_distance: f32,
    pub collisions: u32,
    pub finished: bool,
}

impl CarTelemetry {
    fn new(vehicle: &Vehicle, stats: &RacerStats, now: f32) -> Self {
        Self {
            position: vehicle.position,
            heading: vehicle.heading,
            speed: vehicle.speed,
            lap: stats.laps,
            current_lap_time: now - stats.lap_start,
            last_lap_time: stats.last_lap,
            best_lap_time: stats.best_lap,
            next_checkpoint: vehicle.checkpoint_index,
            boosting: vehicle.boosting,
            boost_level: stats.boost.level,
            boost_time: stats.boost.boost_time,
            drifting: vehicle.drifting,
            drift_distance: vehicle.drift_distance,
            collisions: stats.collisions,
            finished: stats.finished,
        }
    }
}

/// Compact race snapshot for the frontend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaceSnapshot {
    pub status: RaceStatus,
    pub elapsed_time: f32,
    pub countdown: f32,
    pub total_laps: u32,
    pub player: CarTelemetry,
    pub opponent: CarTelemetry,
    pub player_sensors: Vec<f32>,
    pub opponent_sensors: Vec<f32>,
    pub opponent_aggressiveness: f32,
    pub leader: RacerId,
    pub events: Vec<RaceEvent>,
    pub finisher_count: u32,
    pub challenges: ChallengeTargets,
    pub track_size: Vec2,
    pub camera_centre: Vec2,
    pub camera_zoom: f32,
}
