//! Direction vector to turntable camera angles.
//!
//! The renderer's turntable puts azimuth 0 on the −y axis, so the standard
//! `atan2(y, x)` angle is re-based by +90°. Raw angles of exactly 180° take
//! the −270° branch, which keeps every azimuth in `[-90, 270)`.

/// `(azimuth, elevation)` in degrees for a view direction.
///
/// A direction with no horizontal component (`x == y == 0`, either sign of
/// zero) uses a raw azimuth of 0, i.e. it maps to azimuth 90.
pub fn azimuth_elevation(v: [f64; 3]) -> (f64, f64) {
    let [x, y, z] = v;
    let raw = if x == 0.0 && y == 0.0 {
        0.0
    } else {
        y.atan2(x).to_degrees()
    };
    // raw >= 180 maps to raw - 270; folding after the shift also catches
    // angles that round onto 270
    let mut azimuth = raw + 90.0;
    if azimuth >= 270.0 {
        azimuth -= 360.0;
    }
    let elevation = z.atan2(x.hypot(y)).to_degrees();
    (azimuth, elevation)
}

/// Pull an elevation toward the horizon by `offset` degrees.
///
/// The magnitude is clamped to `[0, 90]` and the sign is kept, so the camera
/// never crosses the horizon or the pole.
pub fn adjust_elevation(elevation: f64, offset: f64) -> f64 {
    if elevation == 0.0 {
        return 0.0;
    }
    elevation.signum() * (elevation.abs() - offset).clamp(0.0, 90.0)
}

/// Order an azimuth window so the end nearer `last_angle` comes first.
///
/// Distance is the plain absolute difference, not the circular one. Ties keep
/// `(low, high)`.
pub fn order_window(low: f64, high: f64, last_angle: f64) -> (f64, f64) {
    if (high - last_angle).abs() < (low - last_angle).abs() {
        (high, low)
    } else {
        (low, high)
    }
}
