//! Behavior video frames
//!
//! Frames come either straight from a video file (decoded by ffmpeg into raw
//! RGBA on a pipe) or from a directory of already-decoded images, one file
//! per video frame, ordered by file name.

use anyhow::{Context, Result};
use image::RgbaImage;
use serde::Deserialize;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

const FRAME_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

pub trait FrameSource {
    fn frame(&mut self, index: u64) -> Result<RgbaImage>;
    fn len(&self) -> usize;
}

/// Numbered image files standing in for a decoded video
pub struct ImageSequence {
    files: Vec<PathBuf>,
    cached: Option<(u64, RgbaImage)>,
}

impl ImageSequence {
    pub fn open(dir: &Path) -> Result<Self> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
            .with_context(|| format!("listing frames in {}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_frame_file(path))
            .collect();
        files.sort();

        anyhow::ensure!(!files.is_empty(), "no frame images found in {}", dir.display());
        tracing::info!("Frame source: {} images in {}", files.len(), dir.display());

        Ok(Self { files, cached: None })
    }
}

fn is_frame_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| FRAME_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
}

impl FrameSource for ImageSequence {
    fn frame(&mut self, index: u64) -> Result<RgbaImage> {
        if let Some((cached_index, image)) = &self.cached {
            if *cached_index == index {
                return Ok(image.clone());
            }
        }

        let path = usize::try_from(index)
            .ok()
            .and_then(|i| self.files.get(i))
            .with_context(|| format!("frame {} out of range ({} frames)", index, self.files.len()))?;
        let image = image::open(path)
            .with_context(|| format!("decoding frame {}", path.display()))?
            .to_rgba8();

        self.cached = Some((index, image.clone()));
        Ok(image)
    }

    fn len(&self) -> usize {
        self.files.len()
    }
}

/// Size and frame count of a video's first video stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    pub frames: usize,
}

#[derive(Deserialize)]
struct StreamReport {
    #[serde(default)]
    streams: Vec<StreamEntry>,
}

#[derive(Deserialize)]
struct StreamEntry {
    width: u32,
    height: u32,
    nb_read_packets: Option<String>,
    nb_frames: Option<String>,
}

/// Ask ffprobe for the stream size and a packet-counted frame total
pub fn read_video_info(ffprobe: &Path, video: &Path) -> Result<VideoInfo> {
    let output = Command::new(ffprobe)
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-count_packets",
            "-show_entries",
            "stream=width,height,nb_read_packets,nb_frames",
            "-of",
            "json",
        ])
        .arg(video)
        .stdin(Stdio::null())
        .output()
        .with_context(|| format!("running {}", ffprobe.display()))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("ffprobe failed on {}: {}", video.display(), stderr.trim());
    }
    parse_stream_report(&String::from_utf8_lossy(&output.stdout))
        .with_context(|| format!("reading ffprobe output for {}", video.display()))
}

fn parse_stream_report(json: &str) -> Result<VideoInfo> {
    let report: StreamReport = serde_json::from_str(json)?;
    let stream = report.streams.first().context("no video stream")?;
    let frames = stream
        .nb_read_packets
        .as_deref()
        .or(stream.nb_frames.as_deref())
        .and_then(|n| n.parse::<usize>().ok())
        .context("frame count not reported")?;
    anyhow::ensure!(stream.width > 0 && stream.height > 0, "empty video frame size");

    Ok(VideoInfo {
        width: stream.width,
        height: stream.height,
        frames,
    })
}

/// Sequential ffmpeg decode of a video file.
///
/// Frames are read forward off ffmpeg's stdout; asking for an earlier frame
/// restarts the decode from the beginning.
pub struct VideoDecoder {
    ffmpeg: PathBuf,
    video: PathBuf,
    info: VideoInfo,
    child: Option<Child>,
    stdout: Option<BufReader<ChildStdout>>,
    next_index: u64,
    cached: Option<(u64, RgbaImage)>,
}

impl VideoDecoder {
    pub fn open(ffmpeg: &Path, ffprobe: &Path, video: &Path) -> Result<Self> {
        let info = read_video_info(ffprobe, video)?;
        Ok(Self::with_info(ffmpeg, video, info))
    }

    pub fn with_info(ffmpeg: &Path, video: &Path, info: VideoInfo) -> Self {
        tracing::info!(
            "Frame source: {} ({}x{}, {} frames)",
            video.display(),
            info.width,
            info.height,
            info.frames
        );
        Self {
            ffmpeg: ffmpeg.to_path_buf(),
            video: video.to_path_buf(),
            info,
            child: None,
            stdout: None,
            next_index: 0,
            cached: None,
        }
    }

    fn frame_bytes(&self) -> usize {
        self.info.width as usize * self.info.height as usize * 4
    }

    fn start(&mut self) -> Result<()> {
        self.stop();
        let mut child = Command::new(&self.ffmpeg)
            .args(["-hide_banner", "-loglevel", "error", "-i"])
            .arg(&self.video)
            .args(["-f", "rawvideo", "-pix_fmt", "rgba", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("spawning {}", self.ffmpeg.display()))?;
        let stdout = child.stdout.take().context("ffmpeg stdout not captured")?;
        tracing::debug!("Decoding {} from the start", self.video.display());

        self.child = Some(child);
        self.stdout = Some(BufReader::new(stdout));
        self.next_index = 0;
        Ok(())
    }

    fn stop(&mut self) {
        self.stdout = None;
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }

    fn read_next(&mut self, buffer: &mut [u8]) -> Result<()> {
        let index = self.next_index;
        let stdout = self.stdout.as_mut().context("decoder not started")?;
        stdout
            .read_exact(buffer)
            .with_context(|| format!("video ended before frame {}", index))?;
        self.next_index += 1;
        Ok(())
    }
}

impl FrameSource for VideoDecoder {
    fn frame(&mut self, index: u64) -> Result<RgbaImage> {
        if let Some((cached_index, image)) = &self.cached {
            if *cached_index == index {
                return Ok(image.clone());
            }
        }
        anyhow::ensure!(
            index < self.info.frames as u64,
            "frame {} out of range ({} frames)",
            index,
            self.info.frames
        );

        if self.stdout.is_none() || index < self.next_index {
            self.start()?;
        }
        let mut buffer = vec![0u8; self.frame_bytes()];
        while self.next_index <= index {
            self.read_next(&mut buffer)?;
        }

        let image = RgbaImage::from_raw(self.info.width, self.info.height, buffer)
            .context("decoded frame does not match the reported size")?;
        self.cached = Some((index, image.clone()));
        Ok(image)
    }

    fn len(&self) -> usize {
        self.info.frames
    }
}

impl Drop for VideoDecoder {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Video files decode through ffmpeg; directories are image sequences
pub fn open_frames(
    path: &Path,
    ffmpeg: impl FnOnce() -> Result<(PathBuf, PathBuf)>,
) -> Result<Box<dyn FrameSource>> {
    if path.is_dir() {
        return Ok(Box::new(ImageSequence::open(path)?));
    }
    let (ffmpeg, ffprobe) = ffmpeg()?;
    Ok(Box::new(VideoDecoder::open(&ffmpeg, &ffprobe, path)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn write_frames(dir: &Path, count: u8) {
        for i in 0..count {
            let img = RgbaImage::from_pixel(3, 2, Rgba([i * 10, 0, 0, 255]));
            img.save(dir.join(format!("frame_{:04}.png", i))).unwrap();
        }
        std::fs::write(dir.join("notes.txt"), "not a frame").unwrap();
    }

    #[test]
    fn test_frames_indexed_by_sorted_name() {
        let dir = tempfile::tempdir().unwrap();
        write_frames(dir.path(), 12);

        let mut source = ImageSequence::open(dir.path()).unwrap();
        assert_eq!(source.len(), 12);
        assert_eq!(source.frame(0).unwrap().get_pixel(0, 0)[0], 0);
        assert_eq!(source.frame(11).unwrap().get_pixel(0, 0)[0], 110);
        // repeated index served from cache
        assert_eq!(source.frame(11).unwrap().dimensions(), (3, 2));
    }

    #[test]
    fn test_out_of_range_is_error() {
        let dir = tempfile::tempdir().unwrap();
        write_frames(dir.path(), 2);
        let mut source = ImageSequence::open(dir.path()).unwrap();
        let err = source.frame(2).unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn test_empty_directory_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ImageSequence::open(dir.path()).is_err());
    }

    #[test]
    fn test_parse_stream_report_prefers_counted_packets() {
        let json = r#"{"streams": [{"width": 640, "height": 480, "nb_read_packets": "1200", "nb_frames": "1199"}]}"#;
        let info = parse_stream_report(json).unwrap();
        assert_eq!(
            info,
            VideoInfo {
                width: 640,
                height: 480,
                frames: 1200
            }
        );

        let json = r#"{"streams": [{"width": 8, "height": 6, "nb_frames": "42"}]}"#;
        assert_eq!(parse_stream_report(json).unwrap().frames, 42);
    }

    #[test]
    fn test_parse_stream_report_without_stream_fails() {
        assert!(parse_stream_report(r#"{"streams": []}"#).is_err());
        assert!(parse_stream_report(r#"{}"#).is_err());
    }

    /// Shell script standing in for ffmpeg: prints a fixed raw RGBA stream
    #[cfg(unix)]
    fn stub_decoder(dir: &Path, frames: u8) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let raw: Vec<u8> = (0..frames)
            .flat_map(|i| std::iter::repeat([i * 10, 0, 0, 255]).take(3 * 2).flatten())
            .collect();
        let raw_path = dir.join("stream.rgba");
        std::fs::write(&raw_path, raw).unwrap();

        let script = dir.join("ffmpeg");
        std::fs::write(&script, format!("#!/bin/sh\ncat '{}'\n", raw_path.display())).unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        script
    }

    #[cfg(unix)]
    #[test]
    fn test_video_decoder_reads_frames_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let ffmpeg = stub_decoder(dir.path(), 5);
        let info = VideoInfo {
            width: 3,
            height: 2,
            frames: 5,
        };
        let mut decoder = VideoDecoder::with_info(&ffmpeg, &dir.path().join("behavior.avi"), info);

        assert_eq!(decoder.len(), 5);
        assert_eq!(decoder.frame(0).unwrap().get_pixel(0, 0)[0], 0);
        // skips forward over frames 2..3
        assert_eq!(decoder.frame(3).unwrap().get_pixel(2, 1)[0], 30);
        assert_eq!(decoder.frame(3).unwrap().dimensions(), (3, 2));
        // going back restarts the decode
        assert_eq!(decoder.frame(1).unwrap().get_pixel(1, 0)[0], 10);
        assert_eq!(decoder.frame(4).unwrap().get_pixel(0, 1)[0], 40);
    }

    #[cfg(unix)]
    #[test]
    fn test_video_decoder_short_stream_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let ffmpeg = stub_decoder(dir.path(), 2);
        // ffprobe reports more frames than the stream delivers
        let info = VideoInfo {
            width: 3,
            height: 2,
            frames: 4,
        };
        let mut decoder = VideoDecoder::with_info(&ffmpeg, &dir.path().join("behavior.avi"), info);

        assert!(decoder.frame(1).is_ok());
        let err = decoder.frame(3).unwrap_err();
        assert!(err.to_string().contains("video ended before frame 2"));
        assert!(decoder.frame(9).unwrap_err().to_string().contains("out of range"));
    }

    #[test]
    fn test_open_frames_uses_image_sequence_for_directories() {
        let dir = tempfile::tempdir().unwrap();
        write_frames(dir.path(), 3);
        let source = open_frames(dir.path(), || anyhow::bail!("ffmpeg not needed")).unwrap();
        assert_eq!(source.len(), 3);

        let missing = dir.path().join("behavior.avi");
        let err = open_frames(&missing, || anyhow::bail!("ffmpeg not found")).err().unwrap();
        assert!(err.to_string().contains("ffmpeg not found"));
    }
}
