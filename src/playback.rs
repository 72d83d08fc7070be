//! Frame-synchronous playback of a camera plan
//!
//! Each shot mutates renderer state in place, so shots run strictly one after
//! another: pose, overlay, data cursor, capture, write.

use anyhow::{Context, Result};
use image::RgbaImage;

use crate::planner::{CameraPose, PlanRow, RecordRef};

/// Scene that can be posed and captured one frame at a time
pub trait Renderer {
    fn apply_pose(&mut self, pose: CameraPose) -> Result<()>;
    fn set_overlay_opacity(&mut self, opacity: f64);
    /// Move the data cursor (highlighted point, video frame) to a record
    fn advance_to(&mut self, record: RecordRef) -> Result<()>;
    fn capture_frame(&mut self) -> Result<RgbaImage>;
}

/// Destination for captured frames
pub trait FrameSink {
    fn write_frame(&mut self, frame: &RgbaImage) -> Result<()>;
    /// Flush and close; no frames may be written afterwards
    fn finish(&mut self) -> Result<()>;
}

/// Everything needed to produce one output frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shot {
    pub pose: CameraPose,
    pub overlay_opacity: f64,
    pub record: Option<RecordRef>,
}

impl From<&PlanRow> for Shot {
    fn from(row: &PlanRow) -> Self {
        Shot {
            pose: row.pose(),
            overlay_opacity: row.overlay_opacity,
            record: Some(row.record),
        }
    }
}

impl From<CameraPose> for Shot {
    fn from(pose: CameraPose) -> Self {
        Shot {
            pose,
            overlay_opacity: 0.0,
            record: None,
        }
    }
}

/// Render every shot in order and finish the sink. Returns frames written.
///
/// `distance_offset` is added to each pose's distance for framing margin.
/// Progress is logged once per second of output at `fps`.
pub fn play<R, S, I>(
    shots: I,
    distance_offset: f64,
    fps: u32,
    renderer: &mut R,
    sink: &mut S,
) -> Result<usize>
where
    R: Renderer + ?Sized,
    S: FrameSink + ?Sized,
    I: IntoIterator<Item = Shot>,
{
    let shots = shots.into_iter();
    let expected = shots.size_hint().1;
    let mut written = 0;

    for (i, shot) in shots.enumerate() {
        let pose = CameraPose {
            distance: shot.pose.distance + distance_offset,
            ..shot.pose
        };
        renderer
            .apply_pose(pose)
            .with_context(|| format!("applying pose for frame {}", i))?;
        renderer.set_overlay_opacity(shot.overlay_opacity);
        if let Some(record) = shot.record {
            renderer
                .advance_to(record)
                .with_context(|| format!("advancing to record {} for frame {}", record.index, i))?;
        }

        let frame = renderer
            .capture_frame()
            .with_context(|| format!("capturing frame {}", i))?;
        sink.write_frame(&frame)
            .with_context(|| format!("writing frame {}", i))?;
        written += 1;

        if logs_progress(written, fps) {
            match expected {
                Some(total) => tracing::info!("Rendered {}/{} frames", written, total),
                None => tracing::info!("Rendered {} frames", written),
            }
        }
    }

    sink.finish().context("finishing frame sink")?;
    tracing::info!("Playback complete: {} frames", written);
    Ok(written)
}

fn logs_progress(written: usize, fps: u32) -> bool {
    written % fps.max(1) as usize == 0
}
