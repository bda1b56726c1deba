//! Integration tests for the race simulation

use std::sync::Arc;

use glam::Vec2;
use track_racer::game_server::geometry::Pose;
use track_racer::game_server::sensors::{cast_rays, MIN_READING};
use track_racer::game_server::track::TrackLayout;
use track_racer::game_server::{
    AutonomousDriver, CheckpointEvent, GameServer, GameState, PlayerIntent, PolicyKind,
    RaceConfig, Track, TrackError, TrackPreset, VehicleParams,
};
use track_racer::run_headless;

const DT: f32 = 1.0 / 60.0;

/// Square loop around a 1000x1000 field
fn square_layout() -> TrackLayout {
    let corners = vec![
        Vec2::new(200.0, 200.0),
        Vec2::new(800.0, 200.0),
        Vec2::new(800.0, 800.0),
        Vec2::new(200.0, 800.0),
    ];
    TrackLayout {
        width: 1000.0,
        height: 1000.0,
        centre_line: corners.clone(),
        road_half_width: 80.0,
        checkpoints: vec![
            Vec2::new(500.0, 200.0),
            Vec2::new(800.0, 500.0),
            Vec2::new(500.0, 800.0),
            Vec2::new(200.0, 500.0),
        ],
        finish_index: 0,
        checkpoint_radius: 90.0,
        start: Pose::new(Vec2::new(500.0, 200.0), std::f32::consts::FRAC_PI_2),
    }
}

#[test]
fn test_custom_track_classifies_points() {
    let track = Track::new(square_layout()).expect("square builds");
    assert!(!track.is_point_out_of_bounds(Vec2::new(500.0, 220.0)));
    assert!(track.is_point_out_of_bounds(Vec2::new(500.0, 500.0)));
    assert!(track.is_point_out_of_bounds(Vec2::new(-10.0, 200.0)));
    assert!(track.is_point_out_of_bounds(Vec2::new(5.0e12, -3.0e12)));
}

#[test]
fn test_degenerate_track_fails_before_any_vehicle_exists() {
    let mut layout = square_layout();
    layout.checkpoints.truncate(1);
    assert_eq!(Track::new(layout).unwrap_err(), TrackError::TooFewCheckpoints(1));
}

#[test]
fn test_sensor_readings_on_straight() {
    let track = Track::new(square_layout()).expect("square builds");
    let origin = Pose::new(Vec2::new(400.0, 200.0), std::f32::consts::FRAC_PI_2);
    let readings = cast_rays(origin, &track, 5, 120.0, 1.6);
    assert_eq!(readings.len(), 5);
    // straight ahead is clear down the top straight
    assert_eq!(readings[2], 120.0);
    // outer and inner edges are within reach of the widest rays
    assert!(readings[0] < 120.0);
    assert!(readings[4] < 120.0);
    assert!(readings.iter().all(|r| (MIN_READING..=120.0).contains(r)));
}

#[test]
fn test_ai_reaches_its_first_checkpoints() {
    let track = Arc::new(TrackPreset::Oval.build().expect("oval builds"));
    let car = track.spawn_vehicle(VehicleParams::default(), 0.0);
    let mut ai = AutonomousDriver::with_policy(Arc::clone(&track), car, 0.8, PolicyKind::Standard, 1);
    let parked = track.spawn_vehicle(VehicleParams::default(), 0.0);

    let mut reached = Vec::new();
    for _ in 0..(30.0 / DT) as usize {
        if let CheckpointEvent::Checkpoint(index) = ai.update(DT, &parked) {
            reached.push(index);
        }
        if reached.len() >= 2 {
            break;
        }
    }
    assert_eq!(reached, vec![1, 2]);
}

#[test]
fn test_same_seed_same_race() {
    let config = RaceConfig {
        countdown: 0.0,
        seed: 99,
        difficulty: 0.9,
        ..Default::default()
    };

    let run = |config: RaceConfig| {
        let mut server = GameServer::new();
        server.init_race(config).expect("race builds");
        server.start_race();
        let input = PlayerIntent {
            accelerate: true,
            ..Default::default()
        };
        for _ in 0..600 {
            server.tick(DT, input);
        }
        server.get_snapshot().expect("snapshot")
    };

    let a = run(config.clone());
    let b = run(config);
    assert_eq!(a.opponent.position, b.opponent.position);
    assert_eq!(a.opponent.heading, b.opponent.heading);
    assert_eq!(a.player.position, b.player.position);
}

#[test]
fn test_snapshot_serializes_for_the_frontend() {
    let mut server = GameServer::new();
    server
        .init_race(RaceConfig {
            countdown: 0.0,
            ..Default::default()
        })
        .expect("race builds");
    server.start_race();
    for _ in 0..10 {
        server.tick(DT, PlayerIntent::default());
    }
    let snapshot = server.get_snapshot().expect("snapshot");
    let json = serde_json::to_value(&snapshot).expect("serializes");
    assert_eq!(json["player_sensors"].as_array().map(Vec::len), Some(5));
    assert!(json["challenges"]["lap_time"].is_number());
    assert_eq!(json["status"], "Racing");
}

#[test]
fn test_headless_race_reports_consistent_results() {
    let config = RaceConfig {
        laps: 1,
        countdown: 0.0,
        difficulty: 1.0,
        ..Default::default()
    };
    let outcome = run_headless(config, 90.0).expect("race builds");

    assert!(outcome.stats.simulated_time > 0.0);
    assert_eq!(outcome.results.len(), 2);
    assert_eq!(outcome.stats.game_state, GameState::Results);
    for (i, result) in outcome.results.iter().enumerate() {
        assert_eq!(result.position, i as u32 + 1);
        assert!(result.finish_time > 0.0 && result.finish_time <= 90.0);
        assert_eq!(result.best_lap, Some(result.finish_time));
    }
}

#[test]
fn test_every_preset_and_policy_finishes() {
    const TIME_LIMIT: f32 = 120.0;
    for track in [TrackPreset::Oval, TrackPreset::Circuit, TrackPreset::Speedway] {
        for ai_policy in [PolicyKind::Standard, PolicyKind::Advanced] {
            let config = RaceConfig {
                track,
                ai_policy,
                laps: 1,
                countdown: 0.0,
                ..Default::default()
            };
            let outcome = run_headless(config, TIME_LIMIT).expect("race builds");

            let finishers: Vec<_> = outcome.results.iter().map(|r| r.racer_name.as_str()).collect();
            assert_eq!(
                outcome.results.len(),
                2,
                "{:?} / {:?}: only {:?} finished",
                track,
                ai_policy,
                finishers
            );
            assert_eq!(outcome.stats.game_state, GameState::Results);
            assert!(outcome.results.iter().all(|r| r.finish_time < TIME_LIMIT));
        }
    }
}
