//! Turntable sweep for the intro sequence.

use super::CameraPose;
use crate::config::IntroConfig;

/// Poses for a constant-elevation orbit around the origin.
///
/// The camera advances by `sweep / frames` degrees before every capture, so
/// frame `i` sits at `(i + 1) * sweep / frames` and the last frame lands on
/// `sweep`.
pub fn orbit_poses(intro: &IntroConfig) -> Vec<CameraPose> {
    if intro.frames == 0 {
        return Vec::new();
    }
    let step = intro.sweep / intro.frames as f64;

    (0..intro.frames)
        .map(|i| CameraPose {
            azimuth: step * (i + 1) as f64,
            elevation: intro.elevation,
            distance: intro.distance,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_orbit_advances_before_capture() {
        let intro = IntroConfig {
            frames: 4,
            elevation: 45.0,
            distance: 1.3,
            sweep: 180.0,
            ..IntroConfig::default()
        };
        let poses = orbit_poses(&intro);

        let azimuths: Vec<f64> = poses.iter().map(|p| p.azimuth).collect();
        assert_eq!(azimuths, vec![45.0, 90.0, 135.0, 180.0]);
        for pose in &poses {
            assert_relative_eq!(pose.elevation, 45.0);
            assert_relative_eq!(pose.distance, 1.3);
        }
    }

    #[test]
    fn test_default_intro_length() {
        let poses = orbit_poses(&IntroConfig::default());
        assert_eq!(poses.len(), 600);
        assert_relative_eq!(poses[599].azimuth, 180.0, epsilon = 1e-9);
    }

    #[test]
    fn test_zero_frames() {
        let intro = IntroConfig {
            frames: 0,
            ..IntroConfig::default()
        };
        assert!(orbit_poses(&intro).is_empty());
    }
}
