//! Simulation - Main game server and tick entry point
//!
//! Manages the game server state and advances the active race by an
//! explicit elapsed time per tick. The caller owns the frame loop.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::game_server::config::{ConfigError, RaceConfig};
use crate::game_server::race::{PlayerIntent, Race, RaceResult, RaceSnapshot, RaceStatus};

/// Game state for the local AI mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameState {
    Idle,
    Ready,
    Racing,
    Results,
}

/// Server statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerStats {
    pub ticks: u64,
    pub avg_tick_time_ms: f32,
    pub simulated_time: f32,
    pub game_state: GameState,
}

/// Main game server
pub struct GameServer {
    /// Current game state
    state: GameState,
    /// Active race (if any)
    race: Option<Race>,
    /// Recent tick durations for averaging
    tick_times: Vec<f32>,
    ticks: u64,
    /// Whether ticks advance the race
    running: bool,
}

impl GameServer {
    const TICK_WINDOW: usize = 60;

    /// Create a new game server
    pub fn new() -> Self {
        Self {
            state: GameState::Idle,
            race: None,
            tick_times: Vec::with_capacity(Self::TICK_WINDOW),
            ticks: 0,
            running: false,
        }
    }

    /// Initialize a new race with given config
    pub fn init_race(&mut self, config: RaceConfig) -> Result<(), ConfigError> {
        let race = Race::new(config)?;
        log::info!(
            "Race initialized: {:?}, {} laps, AI {} at difficulty {:.2}",
            race.config.track,
            race.config.laps,
            race.opponent().policy_name(),
            race.opponent().difficulty()
        );

        self.race = Some(race);
        self.state = GameState::Ready;
        self.running = false;
        self.ticks = 0;
        self.tick_times.clear();
        Ok(())
    }

    /// Start the race countdown
    pub fn start_race(&mut self) {
        if let Some(race) = &mut self.race {
            race.start_countdown();
            self.state = GameState::Racing;
            self.running = true;
            log::info!("Countdown started");
        }
    }

    /// Advance the simulation by `dt` seconds with the player's input
    pub fn tick(&mut self, dt: f32, input: PlayerIntent) -> Option<RaceSnapshot> {
        if !self.running {
            return self.get_snapshot();
        }

        let tick_start = Instant::now();

        if let Some(race) = &mut self.race {
            // Large steps after a stall would destabilise integration
            let dt = dt.clamp(0.0, race.config.max_dt);
            race.update(dt, input);

            if race.status == RaceStatus::Finished {
                self.state = GameState::Results;
                self.running = false;
            }
        }
        self.ticks += 1;

        let tick_time = tick_start.elapsed().as_secs_f32() * 1000.0;
        self.tick_times.push(tick_time);
        if self.tick_times.len() > Self::TICK_WINDOW {
            self.tick_times.remove(0);
        }

        self.get_snapshot()
    }

    /// Get current race snapshot
    pub fn get_snapshot(&self) -> Option<RaceSnapshot> {
        self.race.as_ref().map(|r| r.get_snapshot())
    }

    /// Get race results
    pub fn get_results(&self) -> Option<Vec<RaceResult>> {
        self.race.as_ref().map(|r| r.finish_order.clone())
    }

    pub fn race(&self) -> Option<&Race> {
        self.race.as_ref()
    }

    /// Get server statistics
    pub fn get_stats(&self) -> ServerStats {
        let avg_tick_time = if self.tick_times.is_empty() {
            0.0
        } else {
            self.tick_times.iter().sum::<f32>() / self.tick_times.len() as f32
        };

        ServerStats {
            ticks: self.ticks,
            avg_tick_time_ms: avg_tick_time,
            simulated_time: self.race.as_ref().map(|r| r.elapsed_time).unwrap_or(0.0),
            game_state: self.state,
        }
    }

    /// Get current game state
    pub fn get_state(&self) -> GameState {
        self.state
    }

    /// Reset to idle state
    pub fn reset(&mut self) {
        self.state = GameState::Idle;
        self.race = None;
        self.running = false;
        self.ticks = 0;
        self.tick_times.clear();
        log::info!("Race reset");
    }

    /// Pause the simulation
    pub fn pause(&mut self) {
        if self.running {
            self.running = false;
            log::info!("Race paused");
        }
    }

    /// Resume the simulation
    pub fn resume(&mut self) {
        if self.state == GameState::Racing && !self.running {
            self.running = true;
            log::info!("Race resumed");
        }
    }

    /// Check if server is running
    pub fn is_running(&self) -> bool {
        self.running
    }
}

impl Default for GameServer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready_server() -> GameServer {
        let mut server = GameServer::new();
        server
            .init_race(RaceConfig {
                countdown: 0.1,
                ..Default::default()
            })
            .expect("race builds");
        server
    }

    #[test]
    fn lifecycle_moves_through_states() {
        let mut server = GameServer::new();
        assert_eq!(server.get_state(), GameState::Idle);
        assert!(server.tick(0.016, PlayerIntent::default()).is_none());

        let mut server = ready_server();
        assert_eq!(server.get_state(), GameState::Ready);
        server.start_race();
        assert_eq!(server.get_state(), GameState::Racing);
        assert!(server.is_running());

        server.reset();
        assert_eq!(server.get_state(), GameState::Idle);
        assert!(server.get_snapshot().is_none());
    }

    #[test]
    fn paused_server_does_not_advance() {
        let mut server = ready_server();
        server.start_race();
        server.tick(0.05, PlayerIntent::default());
        server.tick(0.05, PlayerIntent::default());
        server.pause();
        let before = server.get_snapshot().expect("snapshot").elapsed_time;
        server.tick(0.05, PlayerIntent::default());
        assert_eq!(server.get_snapshot().expect("snapshot").elapsed_time, before);

        server.resume();
        server.tick(0.05, PlayerIntent::default());
        assert!(server.get_snapshot().expect("snapshot").elapsed_time > before);
    }

    #[test]
    fn large_steps_are_clamped() {
        let mut server = GameServer::new();
        server
            .init_race(RaceConfig {
                countdown: 0.0,
                ..Default::default()
            })
            .expect("race builds");
        server.start_race();
        server.tick(0.016, PlayerIntent::default());
        server.tick(10.0, PlayerIntent::default());
        let snapshot = server.get_snapshot().expect("snapshot");
        assert!(snapshot.elapsed_time > 0.0);
        assert!(snapshot.elapsed_time <= RaceConfig::default().max_dt + 1e-6);
        assert_eq!(server.get_stats().ticks, 2);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut server = GameServer::new();
        let result = server.init_race(RaceConfig {
            laps: 0,
            ..Default::default()
        });
        assert!(result.is_err());
        assert_eq!(server.get_state(), GameState::Idle);
    }
}
