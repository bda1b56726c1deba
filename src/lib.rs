//! Track Racer - Simulation core
//!
//! Provides the game server for the player-versus-AI mode. A frontend owns
//! rendering and input, calls `GameServer::tick` once per frame and draws
//! the returned snapshot.

pub mod game_server;

pub use game_server::{
    AutonomousDriver, ConfigError, GameServer, GameState, PlayerIntent, RaceConfig, RaceResult,
    RaceSnapshot, Track, TrackPreset, Vehicle,
};

/// Fixed step used by the headless runner
pub const HEADLESS_DT: f32 = 1.0 / 60.0;

/// Outcome of a headless race
#[derive(Debug, Clone, serde::Serialize)]
pub struct HeadlessOutcome {
    pub results: Vec<RaceResult>,
    pub final_snapshot: Option<RaceSnapshot>,
    pub stats: game_server::ServerStats,
}

/// Run a full race without a frontend. The player's car follows its next
/// checkpoint; the race stops when both cars finish or `time_limit`
/// seconds of simulated time pass.
pub fn run_headless(config: RaceConfig, time_limit: f32) -> Result<HeadlessOutcome, ConfigError> {
    let mut server = GameServer::new();
    server.init_race(config)?;
    server.start_race();
    log::info!("Headless race running (limit {:.0}s)", time_limit);

    let mut simulated = 0.0;
    let mut input = PlayerIntent::default();
    while server.is_running() && simulated < time_limit {
        let snapshot = server.tick(HEADLESS_DT, input);
        simulated += HEADLESS_DT;

        if let Some(race) = server.race() {
            let player = race.player();
            let target = race.track().checkpoint(player.checkpoint_index);
            input = PlayerIntent::steer_toward(player, target);
        }

        if let Some(snapshot) = snapshot {
            for event in &snapshot.events {
                log::debug!("{:.2}s: {:?}", snapshot.elapsed_time, event);
            }
        }
    }

    if server.is_running() {
        log::warn!("Time limit reached before both cars finished");
    }

    Ok(HeadlessOutcome {
        results: server.get_results().unwrap_or_default(),
        final_snapshot: server.get_snapshot(),
        stats: server.get_stats(),
    })
}
