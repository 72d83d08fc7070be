//! Video output - ffmpeg rawvideo pipe, or a PNG sequence

use anyhow::{Context, Result};
use image::RgbaImage;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use crate::playback::FrameSink;

/// Locate ffmpeg: explicit override first, then PATH
pub fn find_ffmpeg(override_bin: Option<&Path>) -> Result<PathBuf> {
    match override_bin {
        Some(path) => Ok(path.to_path_buf()),
        None => which::which("ffmpeg").context("ffmpeg not found on PATH (set FFMPEG_BIN)"),
    }
}

/// Locate ffprobe: next to the chosen ffmpeg first, then PATH
pub fn find_ffprobe(ffmpeg: &Path) -> Result<PathBuf> {
    let sibling = ffmpeg.with_file_name(ffprobe_file_name(ffmpeg));
    if sibling.is_file() {
        return Ok(sibling);
    }
    which::which("ffprobe").context("ffprobe not found next to ffmpeg or on PATH")
}

fn ffprobe_file_name(ffmpeg: &Path) -> String {
    match ffmpeg.extension().and_then(|ext| ext.to_str()) {
        Some(ext) => format!("ffprobe.{}", ext),
        None => "ffprobe".to_string(),
    }
}

/// Streams RGBA frames into an ffmpeg process encoding H.264
pub struct FfmpegEncoder {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    width: u32,
    height: u32,
    output: PathBuf,
    frames: usize,
}

impl FfmpegEncoder {
    pub fn spawn(ffmpeg: &Path, output: &Path, width: u32, height: u32, fps: u32) -> Result<Self> {
        let args = encoder_args(output, width, height, fps);
        tracing::info!("Starting encoder: {} {}", ffmpeg.display(), args.join(" "));

        let mut child = Command::new(ffmpeg)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("spawning {}", ffmpeg.display()))?;
        let stdin = child.stdin.take().context("ffmpeg stdin not captured")?;

        Ok(Self {
            child: Some(child),
            stdin: Some(stdin),
            width,
            height,
            output: output.to_path_buf(),
            frames: 0,
        })
    }
}

fn encoder_args(output: &Path, width: u32, height: u32, fps: u32) -> Vec<String> {
    let size = format!("{}x{}", width, height);
    let fps = fps.to_string();
    let output = output.to_string_lossy().into_owned();

    let args: Vec<String> = [
        "-hide_banner",
        "-loglevel",
        "error",
        "-f",
        "rawvideo",
        "-pix_fmt",
        "rgba",
        "-s",
        size.as_str(),
        "-r",
        fps.as_str(),
        "-i",
        "pipe:",
        "-vcodec",
        "libx264",
        "-pix_fmt",
        "yuv420p",
        "-r",
        fps.as_str(),
        "-y",
        output.as_str(),
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    args
}

fn check_dimensions(frame: &RgbaImage, width: u32, height: u32) -> Result<()> {
    anyhow::ensure!(
        frame.dimensions() == (width, height),
        "frame is {}x{}, encoder expects {}x{}",
        frame.width(),
        frame.height(),
        width,
        height
    );
    Ok(())
}

impl FrameSink for FfmpegEncoder {
    fn write_frame(&mut self, frame: &RgbaImage) -> Result<()> {
        check_dimensions(frame, self.width, self.height)?;
        let stdin = self.stdin.as_mut().context("encoder already finished")?;
        stdin
            .write_all(frame.as_raw())
            .context("writing frame to ffmpeg (did it exit early?)")?;
        self.frames += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        // closing stdin ends the stream
        drop(self.stdin.take());
        let Some(child) = self.child.take() else {
            return Ok(());
        };
        let output = child.wait_with_output().context("waiting for ffmpeg")?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("ffmpeg exited with {}: {}", output.status, stderr.trim());
        }
        tracing::info!("Encoded {} frames to {}", self.frames, self.output.display());
        Ok(())
    }
}

impl Drop for FfmpegEncoder {
    fn drop(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            tracing::warn!("Encoder dropped before finish; waiting for ffmpeg");
            let _ = child.wait();
        }
    }
}

/// Writes frame_000000.png, frame_000001.png, ... into a directory
pub struct PngSequenceSink {
    dir: PathBuf,
    frames: usize,
}

impl PngSequenceSink {
    pub fn create(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            frames: 0,
        })
    }
}

impl FrameSink for PngSequenceSink {
    fn write_frame(&mut self, frame: &RgbaImage) -> Result<()> {
        let path = self.dir.join(format!("frame_{:06}.png", self.frames));
        frame
            .save(&path)
            .with_context(|| format!("saving {}", path.display()))?;
        self.frames += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        tracing::info!("Wrote {} frames to {}", self.frames, self.dir.display());
        Ok(())
    }
}
