//! Camera fly-through planning
//!
//! Turns a labeled, ordered trajectory into one camera pose per kept record:
//! - segment: consecutive equal-label runs, decimated per label
//! - frame: per-segment view direction, azimuth window and elevation
//! - expand: linear azimuth sweep across each segment, opacity borders
//! - smooth: Gaussian pass over the concatenated signals
//!
//! Smoothing runs across segment boundaries on purpose; that is what turns
//! the per-segment targets into a continuous camera move.

mod angles;
pub mod orbit;
mod segment;
mod smoothing;

pub use angles::{adjust_elevation, azimuth_elevation, order_window};
pub use segment::{segment_runs, ClusterSegment};
pub use smoothing::gaussian_filter1d;

use serde::Serialize;
use thiserror::Error;

use crate::config::{ConfigError, PlannerConfig};
use crate::trajectory::TrajectoryRecord;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlanError {
    #[error("invalid planner configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("record {index}: {reason}")]
    MalformedRecord { index: usize, reason: String },
    #[error("record {index}: order {order} comes after {previous}")]
    OutOfOrder { index: usize, order: i64, previous: i64 },
}

/// Turntable camera placement, angles in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CameraPose {
    pub azimuth: f64,
    pub elevation: f64,
    pub distance: f64,
}

/// Back-reference from a plan row to the record it shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RecordRef {
    /// Position in the ordered trajectory
    pub index: usize,
    pub frame_index: u64,
    pub order: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanRow {
    pub label: String,
    pub azimuth: f64,
    pub elevation: f64,
    pub view_distance: f64,
    pub overlay_opacity: f64,
    pub record: RecordRef,
}

impl PlanRow {
    pub fn pose(&self) -> CameraPose {
        CameraPose {
            azimuth: self.azimuth,
            elevation: self.elevation,
            distance: self.view_distance,
        }
    }
}

/// One row per kept record, in trajectory order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CameraPlan {
    pub rows: Vec<PlanRow>,
}

impl CameraPlan {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PlanRow> {
        self.rows.iter()
    }
}

/// Camera parameters chosen for one segment
#[derive(Debug, Clone)]
pub struct SegmentView<'a> {
    pub segment: ClusterSegment<'a>,
    /// Azimuth at the first record
    pub entry_azimuth: f64,
    /// Azimuth at the last record
    pub exit_azimuth: f64,
    /// Elevation after the horizon offset
    pub elevation: f64,
}

pub struct CameraPlanner {
    config: PlannerConfig,
}

impl CameraPlanner {
    pub fn new(config: PlannerConfig) -> Result<Self, PlanError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Full planning pass. Any malformed record aborts the whole pass.
    pub fn plan(&self, trajectory: &[TrajectoryRecord]) -> Result<CameraPlan, PlanError> {
        let views = self.frame_segments(trajectory)?;
        let rows = self.expand(&views);
        let plan = self.smooth(rows);

        tracing::info!(
            "Planned {} camera rows over {} segments from {} records",
            plan.len(),
            views.len(),
            trajectory.len()
        );
        Ok(plan)
    }

    /// Validate the trajectory, segment it and choose per-segment angles.
    pub fn frame_segments<'a>(
        &self,
        trajectory: &'a [TrajectoryRecord],
    ) -> Result<Vec<SegmentView<'a>>, PlanError> {
        validate_trajectory(trajectory)?;

        let segments = segment_runs(trajectory, &self.config.labels);
        tracing::debug!("{} segments after label filtering", segments.len());

        let mut last_angle = 0.0;
        let views = segments
            .into_iter()
            .map(|segment| {
                let (azimuth, elevation) = azimuth_elevation(segment.view_vector);
                let (entry_azimuth, exit_azimuth) = order_window(
                    azimuth - self.config.azimuth_offset,
                    azimuth + self.config.azimuth_offset,
                    last_angle,
                );
                last_angle = exit_azimuth;

                tracing::debug!(
                    label = segment.label,
                    records = segment.len(),
                    entry_azimuth,
                    exit_azimuth,
                    elevation,
                    "Framed segment"
                );

                SegmentView {
                    segment,
                    entry_azimuth,
                    exit_azimuth,
                    elevation: adjust_elevation(elevation, self.config.elevation_offset),
                }
            })
            .collect();

        Ok(views)
    }

    /// Per-record targets before smoothing.
    pub fn expand(&self, views: &[SegmentView<'_>]) -> Vec<PlanRow> {
        let window = self.config.transition_window;
        let mut rows = Vec::with_capacity(views.iter().map(|v| v.segment.len()).sum());

        for view in views {
            let n = view.segment.len();
            let azimuths = linspace(view.entry_azimuth, view.exit_azimuth, n);

            for (i, ((index, record), azimuth)) in view.segment.records.iter().zip(azimuths).enumerate() {
                let in_border = i < window || i + window >= n;
                rows.push(PlanRow {
                    label: record.label.clone(),
                    azimuth,
                    elevation: view.elevation,
                    view_distance: view.segment.view_distance,
                    overlay_opacity: if in_border { 0.0 } else { 1.0 },
                    record: RecordRef {
                        index: *index,
                        frame_index: record.frame_index,
                        order: record.order,
                    },
                });
            }
        }

        rows
    }

    /// Gaussian pass over the concatenated signals, sigma = transition window.
    pub fn smooth(&self, mut rows: Vec<PlanRow>) -> CameraPlan {
        let sigma = self.config.transition_window as f64;

        let azimuth = gaussian_filter1d(&column(&rows, |r| r.azimuth), sigma);
        let elevation = gaussian_filter1d(&column(&rows, |r| r.elevation), sigma);
        let distance = gaussian_filter1d(&column(&rows, |r| r.view_distance), sigma);
        let opacity = gaussian_filter1d(&column(&rows, |r| r.overlay_opacity), sigma);

        for (i, row) in rows.iter_mut().enumerate() {
            row.azimuth = azimuth[i];
            row.elevation = elevation[i];
            row.view_distance = distance[i];
            row.overlay_opacity = opacity[i].clamp(0.0, 1.0);
        }

        CameraPlan { rows }
    }
}

fn column(rows: &[PlanRow], f: impl Fn(&PlanRow) -> f64) -> Vec<f64> {
    rows.iter().map(f).collect()
}

fn validate_trajectory(trajectory: &[TrajectoryRecord]) -> Result<(), PlanError> {
    for (index, record) in trajectory.iter().enumerate() {
        if record.position.iter().any(|v| !v.is_finite()) {
            return Err(PlanError::MalformedRecord {
                index,
                reason: format!("non-finite position {:?}", record.position),
            });
        }
        if record.label.is_empty() {
            return Err(PlanError::MalformedRecord {
                index,
                reason: "empty label".to_string(),
            });
        }
    }
    for (index, pair) in trajectory.windows(2).enumerate() {
        if pair[1].order < pair[0].order {
            return Err(PlanError::OutOfOrder {
                index: index + 1,
                order: pair[1].order,
                previous: pair[0].order,
            });
        }
    }
    Ok(())
}

/// `n` evenly spaced values from `start` to `end`, both ends exact.
/// A single value is `start`.
fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            let mut values: Vec<f64> = (0..n).map(|i| start + step * i as f64).collect();
            values[n - 1] = end;
            values
        }
    }
}
