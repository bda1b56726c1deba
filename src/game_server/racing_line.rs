//! Racing line - Preferred path through the checkpoints
//!
//! Each leg between consecutive checkpoints is split into a fixed number of
//! segments. Interior points bulge sideways along a half sine toward the
//! inside of the next corner, cutting the apex.

use std::f32::consts::PI;

use glam::Vec2;
use serde::Serialize;

use crate::game_server::track::Track;

#[derive(Debug, Clone, Serialize)]
pub struct RacingLine {
    points: Vec<Vec2>,
    segments_per_leg: usize,
}

impl RacingLine {
    pub const DEFAULT_SEGMENTS_PER_LEG: usize = 5;
    /// Apex offset as a fraction of the road half-width
    const APEX_FRACTION: f32 = 0.3;

    /// Build the line for a track
    pub fn new(track: &Track, segments_per_leg: usize) -> Self {
        let segments_per_leg = segments_per_leg.max(1);
        let checkpoints = track.checkpoints();
        let n = checkpoints.len();
        let offset = track.road_half_width() * Self::APEX_FRACTION;

        let mut points = Vec::with_capacity(n * (segments_per_leg + 1));
        for i in 0..n {
            let from = checkpoints[i];
            let to = checkpoints[(i + 1) % n];
            let after = checkpoints[(i + 2) % n];

            let leg = to - from;
            let normal = leg.perp().normalize_or_zero();
            // bulge toward the side the next leg turns to
            let turn = leg.perp_dot(after - to);
            let side = if turn >= 0.0 { 1.0 } else { -1.0 };

            for j in 0..=segments_per_leg {
                let t = j as f32 / segments_per_leg as f32;
                let bulge = (t * PI).sin() * offset * side;
                points.push(from + leg * t + normal * bulge);
            }
        }

        Self {
            points,
            segments_per_leg,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn segments_per_leg(&self) -> usize {
        self.segments_per_leg
    }

    pub fn points(&self) -> &[Vec2] {
        &self.points
    }

    /// Waypoint at a wrapping index
    pub fn point(&self, index: usize) -> Vec2 {
        self.points[index % self.points.len()]
    }

    /// Index of the waypoint nearest to `position`
    pub fn closest_index(&self, position: Vec2) -> usize {
        self.points
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                a.distance_squared(position)
                    .total_cmp(&b.distance_squared(position))
            })
            .map(|(i, _)| i)
            .unwrap_or(0)
    }

    /// Index `offset` waypoints past `index`, wrapping
    pub fn look_ahead(&self, index: usize, offset: usize) -> usize {
        (index + offset) % self.points.len()
    }
}
