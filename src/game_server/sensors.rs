//! Sensors - Ray-cast proximity readings against the track boundary

use glam::Vec2;

use crate::game_server::geometry::{heading_vector, Pose};
use crate::game_server::track::Track;

/// Smallest reading a ray can report
pub const MIN_READING: f32 = 1.0;

/// Samples taken along each ray
const MARCH_STEPS: usize = 12;

/// Cast `ray_count` rays spread evenly over `spread` radians around the
/// origin heading. Each reading is the distance covered before the ray
/// first leaves the road, or `ray_length` if it never does. Lengths below
/// [`MIN_READING`] are raised to it.
pub fn cast_rays(
    origin: Pose,
    track: &Track,
    ray_count: usize,
    ray_length: f32,
    spread: f32,
) -> Vec<f32> {
    let ray_length = ray_length.max(MIN_READING);
    (0..ray_count)
        .map(|i| {
            let offset = if ray_count > 1 {
                -spread / 2.0 + spread * i as f32 / (ray_count - 1) as f32
            } else {
                0.0
            };
            march(origin.position, origin.heading + offset, track, ray_length)
        })
        .collect()
}

/// Cast one ray per heading offset
pub fn cast_at_offsets(origin: Pose, track: &Track, offsets: &[f32], ray_length: f32) -> Vec<f32> {
    let ray_length = ray_length.max(MIN_READING);
    offsets
        .iter()
        .map(|offset| march(origin.position, origin.heading + offset, track, ray_length))
        .collect()
}

fn march(from: Vec2, angle: f32, track: &Track, ray_length: f32) -> f32 {
    let direction = heading_vector(angle);
    let step = ray_length / MARCH_STEPS as f32;
    let mut clear: f32 = 0.0;
    for i in 1..=MARCH_STEPS {
        let distance = step * i as f32;
        if track.is_point_out_of_bounds(from + direction * distance) {
            return clear.max(MIN_READING);
        }
        clear = distance;
    }
    ray_length
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game_server::track::TrackPreset;

    #[test]
    fn returns_one_reading_per_ray_within_range() {
        let track = TrackPreset::Circuit.build().expect("preset builds");
        let origin = Pose::new(track.start_position(), track.start_angle());
        for n in [0, 1, 3, 7, 16] {
            let readings = cast_rays(origin, &track, n, 150.0, 2.0);
            assert_eq!(readings.len(), n);
            for r in readings {
                assert!((MIN_READING..=150.0).contains(&r));
            }
        }
    }

    #[test]
    fn clear_ray_reads_full_length() {
        let track = TrackPreset::Oval.build().expect("preset builds");
        // short ray straight down the start straight
        let origin = Pose::new(track.start_position(), track.start_angle());
        let readings = cast_rays(origin, &track, 1, 40.0, 0.0);
        assert_eq!(readings, vec![40.0]);
    }

    #[test]
    fn ray_into_the_wall_reads_short() {
        let track = TrackPreset::Oval.build().expect("preset builds");
        // pointing straight at the infield from the top of the oval
        let origin = Pose::new(track.start_position(), std::f32::consts::PI);
        let readings = cast_rays(origin, &track, 1, 200.0, 0.0);
        assert!(readings[0] < 200.0);
        assert!(readings[0] >= MIN_READING);
    }

    #[test]
    fn short_rays_are_raised_to_the_minimum_length() {
        let track = TrackPreset::Oval.build().expect("preset builds");
        let origin = Pose::new(track.start_position(), track.start_angle());
        assert_eq!(cast_rays(origin, &track, 3, 0.5, 1.0), vec![MIN_READING; 3]);
    }

    #[test]
    fn origin_off_track_reports_minimum() {
        let track = TrackPreset::Oval.build().expect("preset builds");
        let origin = Pose::new(Vec2::new(-500.0, -500.0), 0.0);
        let readings = cast_rays(origin, &track, 3, 100.0, 1.0);
        assert!(readings.iter().all(|r| *r == MIN_READING));
    }
}
