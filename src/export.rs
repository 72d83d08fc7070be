//! Export pipelines: trajectory -> plan -> rendered frames -> video/PNGs
//!
//! Each export writes `<output>.manifest.json` next to its output describing
//! what was rendered.

use anyhow::{Context, Result};
use serde_json::json;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::{Config, RenderConfig, Settings};
use crate::encoder::{find_ffmpeg, find_ffprobe, FfmpegEncoder, PngSequenceSink};
use crate::frames::{open_frames, FrameSource};
use crate::planner::{orbit::orbit_poses, CameraPlan, CameraPlanner};
use crate::playback::{play, FrameSink, Shot};
use crate::render::FlythroughRenderer;
use crate::trajectory::{self, TrajectoryRecord};

/// Where rendered frames go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// H.264 video through ffmpeg
    Video(PathBuf),
    /// Numbered PNG files in a directory
    Frames(PathBuf),
}

impl OutputTarget {
    pub fn path(&self) -> &Path {
        match self {
            OutputTarget::Video(path) | OutputTarget::Frames(path) => path,
        }
    }

    fn open_sink(&self, config: &Config, settings: &Settings) -> Result<Box<dyn FrameSink>> {
        let sink: Box<dyn FrameSink> = match self {
            OutputTarget::Video(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)
                        .with_context(|| format!("creating {}", parent.display()))?;
                }
                let ffmpeg = find_ffmpeg(settings.ffmpeg_bin.as_deref())?;
                Box::new(FfmpegEncoder::spawn(
                    &ffmpeg,
                    path,
                    config.render.width,
                    config.render.height,
                    config.render.fps,
                )?)
            }
            OutputTarget::Frames(dir) => Box::new(PngSequenceSink::create(dir)?),
        };
        Ok(sink)
    }
}

/// Load the trajectory table named by `input` with the configured columns
pub fn load_trajectory(input: &Path, config: &Config) -> Result<Vec<TrajectoryRecord>> {
    let records = trajectory::load(input, &config.columns, &config.select, config.position_sigma)
        .with_context(|| format!("loading trajectory {}", input.display()))?;
    Ok(records)
}

/// Plan the camera path for a trajectory file
pub fn plan_trajectory(input: &Path, config: &Config) -> Result<(Vec<TrajectoryRecord>, CameraPlan)> {
    let records = load_trajectory(input, config)?;
    let planner = CameraPlanner::new(config.planner.clone())?;
    let plan = planner.plan(&records)?;
    Ok((records, plan))
}

/// Render the planned fly-through. Returns the number of frames written.
pub fn export_flythrough(
    input: &Path,
    target: &OutputTarget,
    video: Option<&Path>,
    config: &Config,
    settings: &Settings,
) -> Result<usize> {
    let (records, plan) = plan_trajectory(input, config)?;
    if plan.is_empty() {
        tracing::warn!("No planned rows for {}; nothing to render", input.display());
    }

    let frames = match video {
        Some(path) if config.render.show_video => {
            let source = open_frames(path, || {
                let ffmpeg = find_ffmpeg(settings.ffmpeg_bin.as_deref())?;
                let ffprobe = find_ffprobe(&ffmpeg)?;
                Ok((ffmpeg, ffprobe))
            })?;
            check_frame_coverage(&plan, source.as_ref())?;
            Some(source)
        }
        _ => None,
    };

    let mut renderer = FlythroughRenderer::new(&records, frames, &config.render)?;
    let mut sink = target.open_sink(config, settings)?;
    info!("Rendering {} frames to {}", plan.len(), target.path().display());

    let written = play(
        plan.iter().map(Shot::from),
        config.planner.distance_offset,
        config.render.fps,
        &mut renderer,
        sink.as_mut(),
    )?;

    write_manifest(
        target.path(),
        json!({
            "kind": "flythrough",
            "input": input.display().to_string(),
            "records": records.len(),
            "planner": config.planner,
        }),
        written,
        config,
    )?;
    Ok(written)
}

/// Fail before rendering when the plan points past the last behavior frame
fn check_frame_coverage(plan: &CameraPlan, frames: &dyn FrameSource) -> Result<()> {
    let Some(last) = plan.iter().map(|row| row.record.frame_index).max() else {
        return Ok(());
    };
    anyhow::ensure!(
        last < frames.len() as u64,
        "plan needs behavior frame {} but only {} frames are available",
        last,
        frames.len()
    );
    Ok(())
}

/// Render the turntable intro over the whole point cloud
pub fn export_intro(
    input: &Path,
    target: &OutputTarget,
    config: &Config,
    settings: &Settings,
) -> Result<usize> {
    let records = load_trajectory(input, config)?;
    let poses = orbit_poses(&config.intro);

    let render = intro_render_config(config);
    let mut renderer = FlythroughRenderer::new(&records, None, &render)?;
    let mut sink = target.open_sink(config, settings)?;
    info!("Rendering {}-frame intro to {}", poses.len(), target.path().display());

    let written = play(
        poses.into_iter().map(Shot::from),
        0.0,
        config.render.fps,
        &mut renderer,
        sink.as_mut(),
    )?;

    write_manifest(
        target.path(),
        json!({
            "kind": "intro",
            "input": input.display().to_string(),
            "records": records.len(),
            "intro": config.intro,
        }),
        written,
        config,
    )?;
    Ok(written)
}

/// The intro has no behavior panel and its own colour switch
fn intro_render_config(config: &Config) -> RenderConfig {
    RenderConfig {
        show_video: false,
        colorize: config.intro.colorize,
        ..config.render.clone()
    }
}

/// `<output>.manifest.json`
pub fn manifest_path(output: &Path) -> PathBuf {
    let mut name = OsString::from(output.as_os_str());
    name.push(".manifest.json");
    PathBuf::from(name)
}

fn write_manifest(
    output: &Path,
    mut details: serde_json::Value,
    frames: usize,
    config: &Config,
) -> Result<()> {
    if let Some(fields) = details.as_object_mut() {
        fields.insert("generated".to_string(), json!(chrono::Local::now().to_rfc3339()));
        fields.insert("output".to_string(), json!(output.display().to_string()));
        fields.insert("frames".to_string(), json!(frames));
        fields.insert("width".to_string(), json!(config.render.width));
        fields.insert("height".to_string(), json!(config.render.height));
        fields.insert("fps".to_string(), json!(config.render.fps));
    }

    let path = manifest_path(output);
    let text = serde_json::to_string_pretty(&details)?;
    std::fs::write(&path, text).with_context(|| format!("writing {}", path.display()))?;
    info!("Wrote {}", path.display());
    Ok(())
}
