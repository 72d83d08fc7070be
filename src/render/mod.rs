//! Fly-through rendering
//!
//! - `scene`: headless three-d point cloud + current-record marker
//! - `palette`: per-label colours
//! - `overlay`: behavior frame panel and label banner, composed on the CPU

mod overlay;
mod palette;
mod scene;

pub use overlay::{compose, draw_banner};
pub use palette::LabelPalette;
pub use scene::SceneRenderer;

use anyhow::{Context, Result};
use image::RgbaImage;

use crate::config::RenderConfig;
use crate::frames::FrameSource;
use crate::planner::{CameraPose, RecordRef};
use crate::playback::Renderer;
use crate::trajectory::TrajectoryRecord;

/// Playback renderer over the scene, the behavior frames and the overlay
pub struct FlythroughRenderer<'a> {
    scene: SceneRenderer,
    frames: Option<Box<dyn FrameSource + 'a>>,
    records: &'a [TrajectoryRecord],
    palette: LabelPalette,
    config: RenderConfig,
    opacity: f64,
    current: Option<RecordRef>,
    video_frame: Option<RgbaImage>,
}

impl<'a> FlythroughRenderer<'a> {
    pub fn new(
        records: &'a [TrajectoryRecord],
        frames: Option<Box<dyn FrameSource + 'a>>,
        config: &RenderConfig,
    ) -> Result<Self> {
        let palette = LabelPalette::new(
            crate::trajectory::unique_labels(records),
            config.colorize,
        );
        // without a frame source the scene takes the whole canvas
        let scene_height = if frames.is_some() && config.show_video {
            config.scene_height()
        } else {
            config.height
        };
        let scene = SceneRenderer::new(records, &palette, config, scene_height)?;

        Ok(Self {
            scene,
            frames,
            records,
            palette,
            config: config.clone(),
            opacity: 0.0,
            current: None,
            video_frame: None,
        })
    }

    fn current_label(&self) -> Option<&str> {
        let record = self.current?;
        self.records.get(record.index).map(|r| r.label.as_str())
    }
}

impl Renderer for FlythroughRenderer<'_> {
    fn apply_pose(&mut self, pose: CameraPose) -> Result<()> {
        anyhow::ensure!(
            pose.azimuth.is_finite() && pose.elevation.is_finite() && pose.distance.is_finite(),
            "non-finite camera pose {:?}",
            pose
        );
        self.scene.set_pose(pose);
        Ok(())
    }

    fn set_overlay_opacity(&mut self, opacity: f64) {
        self.opacity = opacity.clamp(0.0, 1.0);
    }

    fn advance_to(&mut self, record: RecordRef) -> Result<()> {
        let data = self
            .records
            .get(record.index)
            .with_context(|| format!("record {} not in trajectory", record.index))?;
        let color = self.palette.colors(&data.label).marker;
        self.scene
            .highlight(data.position, color, self.config.marker_radius);

        if self.config.show_video {
            if let Some(frames) = self.frames.as_mut() {
                let changed = self.current.map(|c| c.frame_index) != Some(record.frame_index);
                if changed || self.video_frame.is_none() {
                    self.video_frame = Some(frames.frame(record.frame_index)?);
                }
            }
        }
        self.current = Some(record);
        Ok(())
    }

    fn capture_frame(&mut self) -> Result<RgbaImage> {
        let view = self.scene.render()?;
        let video = if self.config.show_video {
            self.video_frame.as_ref()
        } else {
            None
        };
        let mut canvas = compose(
            &view,
            video,
            self.config.width,
            self.config.height,
            self.config.background,
        );
        if let Some(label) = self.current_label() {
            let color = self.palette.colors(label).marker;
            draw_banner(&mut canvas, color, self.opacity);
        }
        Ok(canvas)
    }
}
