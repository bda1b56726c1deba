//! Camera - Numeric follow model for the view transform
//!
//! Tracks a car with exponential smoothing, zooms out with speed and keeps
//! the viewport inside the track rectangle. Projection and drawing belong
//! to the frontend.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::game_server::geometry::Pose;
use crate::game_server::track::Track;

/// Timed pan from one centre to another
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct Transition {
    from: Vec2,
    elapsed: f32,
    duration: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    /// World point at the centre of the view
    pub centre: Vec2,
    pub zoom: f32,
    /// Viewport size in screen pixels
    pub viewport: Vec2,
    /// Follow stiffness (1/s)
    pub stiffness: f32,
    transition: Option<Transition>,
}

impl Camera {
    const MIN_ZOOM: f32 = 0.7;
    const ZOOM_RATE: f32 = 3.0;

    pub fn new(viewport: Vec2, centre: Vec2) -> Self {
        Self {
            centre,
            zoom: 1.0,
            viewport,
            stiffness: 6.0,
            transition: None,
        }
    }

    /// Pan smoothly over `duration` seconds instead of following
    pub fn start_transition(&mut self, duration: f32) {
        self.transition = Some(Transition {
            from: self.centre,
            elapsed: 0.0,
            duration: duration.max(f32::EPSILON),
        });
    }

    pub fn in_transition(&self) -> bool {
        self.transition.is_some()
    }

    /// Move toward `target` for one tick
    pub fn follow(&mut self, target: Pose, speed_ratio: f32, track: &Track, dt: f32) {
        let dt = dt.max(0.0);

        let goal_zoom = 1.0 - (1.0 - Self::MIN_ZOOM) * speed_ratio.clamp(0.0, 1.0);
        self.zoom += (goal_zoom - self.zoom) * (1.0 - (-Self::ZOOM_RATE * dt).exp());

        let desired = self.clamp_to_track(target.position, track);
        self.centre = match self.transition.as_mut() {
            Some(transition) => {
                transition.elapsed += dt;
                let t = (transition.elapsed / transition.duration).min(1.0);
                // smoothstep
                let eased = t * t * (3.0 - 2.0 * t);
                let centre = transition.from.lerp(desired, eased);
                if t >= 1.0 {
                    self.transition = None;
                }
                centre
            }
            None => {
                let blend = 1.0 - (-self.stiffness * dt).exp();
                self.centre.lerp(desired, blend)
            }
        };
        self.centre = self.clamp_to_track(self.centre, track);
    }

    /// Half the visible world extent
    pub fn half_extent(&self) -> Vec2 {
        self.viewport / (2.0 * self.zoom.max(f32::EPSILON))
    }

    fn clamp_to_track(&self, point: Vec2, track: &Track) -> Vec2 {
        let half = self.half_extent();
        let size = Vec2::new(track.width(), track.height());
        let axis = |p: f32, h: f32, len: f32| {
            if 2.0 * h >= len {
                len / 2.0
            } else {
                p.clamp(h, len - h)
            }
        };
        Vec2::new(axis(point.x, half.x, size.x), axis(point.y, half.y, size.y))
    }

    /// World to screen pixels
    pub fn world_to_screen(&self, world: Vec2) -> Vec2 {
        (world - self.centre) * self.zoom + self.viewport / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game_server::track::TrackPreset;

    #[test]
    fn converges_on_target_and_stays_in_bounds() {
        let track = TrackPreset::Oval.build().expect("preset builds");
        let mut camera = Camera::new(Vec2::new(640.0, 360.0), Vec2::new(800.0, 600.0));
        let target = Pose::new(Vec2::new(700.0, 500.0), 0.0);
        for _ in 0..300 {
            camera.follow(target, 0.0, &track, 1.0 / 60.0);
        }
        assert!(camera.centre.distance(target.position) < 1.0);
        assert!((camera.world_to_screen(target.position) - Vec2::new(320.0, 180.0)).length() < 1.0);
    }

    #[test]
    fn view_is_clamped_at_track_edges() {
        let track = TrackPreset::Oval.build().expect("preset builds");
        let mut camera = Camera::new(Vec2::new(640.0, 360.0), Vec2::new(800.0, 600.0));
        let corner = Pose::new(Vec2::new(0.0, 0.0), 0.0);
        for _ in 0..300 {
            camera.follow(corner, 0.0, &track, 1.0 / 60.0);
        }
        let half = camera.half_extent();
        assert!(camera.centre.x >= half.x - 1e-3);
        assert!(camera.centre.y >= half.y - 1e-3);
    }

    #[test]
    fn speed_zooms_out() {
        let track = TrackPreset::Oval.build().expect("preset builds");
        let mut camera = Camera::new(Vec2::new(640.0, 360.0), Vec2::new(800.0, 600.0));
        let target = Pose::new(Vec2::new(800.0, 600.0), 0.0);
        for _ in 0..120 {
            camera.follow(target, 1.0, &track, 1.0 / 60.0);
        }
        assert!(camera.zoom < 0.8);
    }

    #[test]
    fn transition_finishes_on_time() {
        let track = TrackPreset::Oval.build().expect("preset builds");
        let mut camera = Camera::new(Vec2::new(640.0, 360.0), Vec2::new(400.0, 300.0));
        camera.start_transition(0.5);
        let target = Pose::new(Vec2::new(1000.0, 700.0), 0.0);
        for _ in 0..31 {
            camera.follow(target, 0.0, &track, 1.0 / 60.0);
        }
        assert!(!camera.in_transition());
        assert!(camera.centre.distance(target.position) < 1e-2);
    }
}
