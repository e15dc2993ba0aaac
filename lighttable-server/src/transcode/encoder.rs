//! External encoder seam
//!
//! [`Encoder`] is everything the orchestrator needs from ffmpeg: probing,
//! full transcodes with progress, and single-frame snapshots.
//! [`FfmpegEncoder`] drives the real binaries; tests substitute a fake.

use async_trait::async_trait;
use lighttable_common::config::EncoderSettings;
use lighttable_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, error, info};

/// Receives transcode progress in percent
pub type ProgressSink<'a> = &'a (dyn Fn(f64) + Send + Sync);

/// Probed container and stream information
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaInfo {
    pub format: Option<String>,
    /// Seconds
    pub duration: Option<f64>,
    pub size: Option<u64>,
    pub bitrate: Option<u64>,
    pub video: Option<VideoStream>,
    pub audio: Option<AudioStream>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoStream {
    pub codec: String,
    pub profile: Option<String>,
    pub pixel_format: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fps: Option<f64>,
    pub bitrate: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioStream {
    pub codec: String,
    pub sample_rate: Option<u32>,
    pub channels: Option<u32>,
    pub bitrate: Option<u64>,
}

/// Video processing backend
#[async_trait]
pub trait Encoder: Send + Sync {
    /// Inspect a media file
    async fn probe(&self, input: &Path) -> Result<MediaInfo>;

    /// Transcode `input` into a web-compatible mp4 at `output`
    async fn transcode(&self, input: &Path, output: &Path, progress: ProgressSink<'_>) -> Result<()>;

    /// Single poster frame at `at` (`HH:MM:SS[.mmm]` or seconds)
    async fn snapshot(&self, input: &Path, output: &Path, at: &str) -> Result<()>;

    /// One small frame per timestamp, written as `thumb_1.jpg`, `thumb_2.jpg`, ... in `dir`
    async fn snapshots(&self, input: &Path, dir: &Path, timestamps: &[f64]) -> Result<()>;
}

// ========================================
// ffprobe output
// ========================================

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    #[serde(default)]
    format: ProbeFormat,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    profile: Option<String>,
    pix_fmt: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    bit_rate: Option<String>,
    sample_rate: Option<String>,
    channels: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeFormat {
    format_name: Option<String>,
    duration: Option<String>,
    size: Option<String>,
    bit_rate: Option<String>,
}

/// `"30000/1001"` to frames per second
fn parse_frame_rate(rate: &str) -> Option<f64> {
    let (num, den) = rate.split_once('/')?;
    let num: f64 = num.trim().parse().ok()?;
    let den: f64 = den.trim().parse().ok()?;
    (den != 0.0).then(|| num / den)
}

fn parse_num<T: std::str::FromStr>(value: &Option<String>) -> Option<T> {
    value.as_deref().and_then(|v| v.trim().parse().ok())
}

/// Convert `ffprobe -print_format json -show_format -show_streams` output
pub fn parse_probe_output(json: &str) -> Result<MediaInfo> {
    let probe: ProbeOutput = serde_json::from_str(json)
        .map_err(|e| Error::Encoder(format!("Unreadable ffprobe output: {}", e)))?;

    let stream_of = |kind: &str| {
        probe
            .streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some(kind))
    };

    let video = stream_of("video").map(|s| VideoStream {
        codec: s.codec_name.clone().unwrap_or_default(),
        profile: s.profile.clone(),
        pixel_format: s.pix_fmt.clone(),
        width: s.width,
        height: s.height,
        fps: s.r_frame_rate.as_deref().and_then(parse_frame_rate),
        bitrate: parse_num(&s.bit_rate),
    });
    let audio = stream_of("audio").map(|s| AudioStream {
        codec: s.codec_name.clone().unwrap_or_default(),
        sample_rate: parse_num(&s.sample_rate),
        channels: s.channels,
        bitrate: parse_num(&s.bit_rate),
    });

    Ok(MediaInfo {
        format: probe.format.format_name.clone(),
        duration: parse_num(&probe.format.duration),
        size: parse_num(&probe.format.size),
        bitrate: parse_num(&probe.format.bit_rate),
        video,
        audio,
    })
}

// ========================================
// ffmpeg progress
// ========================================

/// Elapsed output time in seconds from one `-progress` line
///
/// ffmpeg reports `out_time_us` and, despite the name, `out_time_ms` both
/// in microseconds.
pub fn parse_progress_line(line: &str) -> Option<f64> {
    let (key, value) = line.trim().split_once('=')?;
    match key {
        "out_time_us" | "out_time_ms" => value.parse::<i64>().ok().map(|us| us.max(0) as f64 / 1_000_000.0),
        _ => None,
    }
}

/// Percent complete, clamped to 0-100
pub fn progress_percent(elapsed_secs: f64, duration_secs: f64) -> f64 {
    if duration_secs <= 0.0 || !elapsed_secs.is_finite() {
        return 0.0;
    }
    (elapsed_secs / duration_secs * 100.0).clamp(0.0, 100.0)
}

// ========================================
// ffmpeg implementation
// ========================================

/// Fixed web-compatibility output options
///
/// H.264 baseline 3.1 in yuv420p scaled and padded to 1920x1080, AAC stereo
/// at 48 kHz, moov atom up front for progressive playback.
#[rustfmt::skip]
const TRANSCODE_OPTIONS: &[&str] = &[
    "-c:v", "libx264",
    "-profile:v", "baseline",
    "-level", "3.1",
    "-pix_fmt", "yuv420p",
    "-preset", "fast",
    "-crf", "23",
    "-maxrate", "10M",
    "-bufsize", "10M",
    "-vf", "scale=w=1920:h=1080:force_original_aspect_ratio=decrease,pad=1920:1080:(ow-iw)/2:(oh-ih)/2,format=yuv420p",
    "-c:a", "aac",
    "-ar", "48000",
    "-ac", "2",
    "-b:a", "192k",
    "-movflags", "+faststart",
    "-f", "mp4",
];

const POSTER_FILTER: &str =
    "scale=320:320:force_original_aspect_ratio=decrease,pad=320:320:(ow-iw)/2:(oh-ih)/2:black";

const PREVIEW_FRAME_SIZE: &str = "160x90";

/// [`Encoder`] backed by the ffmpeg and ffprobe binaries
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl FfmpegEncoder {
    pub fn new(settings: &EncoderSettings) -> Self {
        Self {
            ffmpeg: settings.ffmpeg.clone(),
            ffprobe: settings.ffprobe.clone(),
        }
    }

    /// Run ffmpeg to completion, logging stderr
    async fn run_ffmpeg(&self, args: Vec<OsString>) -> Result<()> {
        debug!(binary = %self.ffmpeg.display(), ?args, "Running ffmpeg");
        let output = Command::new(&self.ffmpeg)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| Error::Encoder(format!("Failed to start {}: {}", self.ffmpeg.display(), e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!(status = ?output.status.code(), stderr = %tail(&stderr), "ffmpeg failed");
            return Err(Error::Encoder(format!("ffmpeg exited with {}", output.status)));
        }
        Ok(())
    }
}

/// Last few lines of a stderr dump
fn tail(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    lines[lines.len().saturating_sub(10)..].join("\n")
}

#[async_trait]
impl Encoder for FfmpegEncoder {
    async fn probe(&self, input: &Path) -> Result<MediaInfo> {
        let output = Command::new(&self.ffprobe)
            .args(["-v", "error", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(input)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| Error::Encoder(format!("Failed to start {}: {}", self.ffprobe.display(), e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!(input = %input.display(), stderr = %tail(&stderr), "ffprobe failed");
            return Err(Error::Encoder(format!("ffprobe exited with {}", output.status)));
        }
        parse_probe_output(&String::from_utf8_lossy(&output.stdout))
    }

    async fn transcode(&self, input: &Path, output: &Path, progress: ProgressSink<'_>) -> Result<()> {
        let duration = self.probe(input).await?.duration.unwrap_or(0.0);

        info!(input = %input.display(), output = %output.display(), "Starting transcode");
        let mut child = Command::new(&self.ffmpeg)
            .args(["-y", "-nostats", "-progress", "pipe:1", "-i"])
            .arg(input)
            .args(TRANSCODE_OPTIONS)
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::Encoder(format!("Failed to start {}: {}", self.ffmpeg.display(), e)))?;

        // Drain stderr concurrently so ffmpeg never blocks on a full pipe
        let stderr_task = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut text = String::new();
                let _ = stderr.read_to_string(&mut text).await;
                text
            })
        });

        if let Some(stdout) = child.stdout.take() {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(elapsed) = parse_progress_line(&line) {
                    progress(progress_percent(elapsed, duration));
                }
            }
        }

        let status = child.wait().await?;
        let stderr = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        if !status.success() {
            error!(input = %input.display(), stderr = %tail(&stderr), "Transcode failed");
            return Err(Error::Encoder(format!("ffmpeg exited with {}", status)));
        }
        debug!(stderr = %tail(&stderr), "Transcode finished");
        Ok(())
    }

    async fn snapshot(&self, input: &Path, output: &Path, at: &str) -> Result<()> {
        let args: Vec<OsString> = vec![
            "-y".into(),
            "-ss".into(),
            at.into(),
            "-i".into(),
            input.as_os_str().to_owned(),
            "-vframes".into(),
            "1".into(),
            "-vf".into(),
            POSTER_FILTER.into(),
            output.as_os_str().to_owned(),
        ];
        self.run_ffmpeg(args).await
    }

    async fn snapshots(&self, input: &Path, dir: &Path, timestamps: &[f64]) -> Result<()> {
        for (i, at) in timestamps.iter().enumerate() {
            let frame = dir.join(format!("thumb_{}.jpg", i + 1));
            let args: Vec<OsString> = vec![
                "-y".into(),
                "-ss".into(),
                format!("{:.3}", at).into(),
                "-i".into(),
                input.as_os_str().to_owned(),
                "-vframes".into(),
                "1".into(),
                "-s".into(),
                PREVIEW_FRAME_SIZE.into(),
                frame.into_os_string(),
            ];
            self.run_ffmpeg(args).await?;
        }
        Ok(())
    }
}
