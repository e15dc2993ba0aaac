//! Transcode orchestrator
//!
//! Converts source videos into browser-playable `<base>_converted.mp4`
//! copies in the background and tracks one job per source path.
//!
//! # Job lifecycle
//!
//! ```text
//! start ──► starting ──► converting ──► completed   (removed after completed retention)
//!                               └─────► error: ...  (removed after failed retention)
//! ```
//!
//! Jobs live in an in-memory map for this process only. A path with a job
//! recorded (active or not yet pruned) cannot be started again. There is no
//! cancellation, timeout or retry.

pub mod encoder;
pub mod vtt;

use chrono::Utc;
use lighttable_common::config::JobSettings;
use lighttable_common::metadata::{Actor, MetadataStore};
use lighttable_common::{naming, paths, time, Error, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub use encoder::{Encoder, FfmpegEncoder, MediaInfo};

/// Capacity of the progress event channel
const EVENT_CAPACITY: usize = 100;

/// Poster frame position when none is requested
pub const DEFAULT_THUMBNAIL_TIMESTAMP: &str = "00:00:01";

/// Seconds between preview frames when none is requested
pub const DEFAULT_PREVIEW_INTERVAL: f64 = 10.0;

/// Smallest accepted preview interval in seconds
pub const MIN_PREVIEW_INTERVAL: f64 = 1.0;

// ========================================
// Job state
// ========================================

#[derive(Debug, Clone, PartialEq)]
pub enum JobState {
    Starting,
    Converting,
    Completed,
    Failed(String),
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed(_))
    }

    /// Status string reported to clients
    pub fn label(&self) -> String {
        match self {
            JobState::Starting => "starting".to_string(),
            JobState::Converting => "converting".to_string(),
            JobState::Completed => "completed".to_string(),
            JobState::Failed(message) => format!("error: {}", message),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TranscodeJob {
    pub id: Uuid,
    pub state: JobState,
    /// Percent, 0-100
    pub progress: f64,
}

/// Progress notification for SSE subscribers
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobEvent {
    pub job_id: Uuid,
    pub path: String,
    pub status: String,
    pub progress: f64,
    pub timestamp: chrono::DateTime<Utc>,
}

/// Stream properties of the source reported when a job starts
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginalInfo {
    pub codec: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub bitrate: Option<u64>,
    pub duration: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartedJob {
    pub job_id: Uuid,
    pub original_info: OriginalInfo,
}

/// Answer to a status poll
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionStatus {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub converted_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversion_date: Option<String>,
}

/// Generated preview track locations
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewTrack {
    pub vtt_path: String,
    pub thumbnails_path: String,
}

// ========================================
// Orchestrator
// ========================================

type JobMap = Arc<RwLock<HashMap<String, TranscodeJob>>>;

/// Background transcoding and derived-frame generation
#[derive(Clone)]
pub struct Transcoder {
    root: PathBuf,
    store: MetadataStore,
    encoder: Arc<dyn Encoder>,
    jobs: JobMap,
    events: broadcast::Sender<JobEvent>,
    retention: JobSettings,
}

impl Transcoder {
    pub fn new(store: MetadataStore, encoder: Arc<dyn Encoder>, retention: JobSettings) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            root: store.root().to_path_buf(),
            store,
            encoder,
            jobs: Arc::new(RwLock::new(HashMap::new())),
            events,
            retention,
        }
    }

    /// Receive job progress events
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    /// Absolute location of an existing source file
    async fn source(&self, path: &str) -> Result<(String, PathBuf)> {
        let path = paths::normalize(path)?;
        if path.is_empty() {
            return Err(Error::InvalidInput("No video path provided".to_string()));
        }
        let full = paths::resolve(&self.root, &path);
        if !is_file(&full).await {
            return Err(Error::NotFound(path));
        }
        Ok((path, full))
    }

    /// Probe a video
    pub async fn video_info(&self, path: &str) -> Result<MediaInfo> {
        let (_, full) = self.source(path).await?;
        self.encoder.probe(&full).await
    }

    /// Produce (or reuse) the converted copy of `path` and return its path
    ///
    /// An input that already is a converted artifact is returned as is, and
    /// an existing `<base>_converted.mp4` is reused without invoking the
    /// encoder. Progress passed to `on_progress` never decreases and stays
    /// within 0-100.
    pub async fn convert<F>(&self, path: &str, on_progress: F) -> Result<String>
    where
        F: Fn(f64) + Send + Sync,
    {
        let (path, input) = self.source(path).await?;
        if naming::is_converted(&path) {
            debug!(path = %path, "Already a converted file");
            return Ok(path);
        }

        let output_path = naming::converted_path(&path);
        let output = paths::resolve(&self.root, &output_path);
        if is_file(&output).await {
            debug!(path = %path, output = %output_path, "Reusing existing conversion");
            return Ok(output_path);
        }

        // Encode into a hidden partial file so an interrupted run never
        // leaves a truncated `_converted.mp4` behind
        let partial = partial_location(&output);
        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let high_water = Mutex::new(0.0_f64);
        let sink = |percent: f64| {
            let percent = if percent.is_finite() { percent.clamp(0.0, 100.0) } else { 0.0 };
            let mut high = high_water.lock().unwrap_or_else(PoisonError::into_inner);
            if percent > *high {
                *high = percent;
                on_progress(percent);
            }
        };

        if let Err(e) = self.encoder.transcode(&input, &partial, &sink).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e);
        }
        tokio::fs::rename(&partial, &output).await?;

        info!(path = %path, output = %output_path, "Conversion finished");
        Ok(output_path)
    }

    /// Start a background conversion of `path` on behalf of `actor`
    pub async fn start(&self, path: &str, actor: Actor) -> Result<StartedJob> {
        let (path, full) = self.source(path).await?;
        if self.job(&path).is_some() {
            return Err(Error::Conflict(format!("Conversion already in progress: {}", path)));
        }

        let info = self.encoder.probe(&full).await?;
        let video = info
            .video
            .as_ref()
            .ok_or_else(|| Error::InvalidInput("No video stream found".to_string()))?;
        let original_info = OriginalInfo {
            codec: video.codec.clone(),
            width: video.width,
            height: video.height,
            bitrate: video.bitrate,
            duration: info.duration,
        };

        let job_id = Uuid::new_v4();
        {
            let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
            if jobs.contains_key(&path) {
                return Err(Error::Conflict(format!("Conversion already in progress: {}", path)));
            }
            jobs.insert(
                path.clone(),
                TranscodeJob {
                    id: job_id,
                    state: JobState::Starting,
                    progress: 0.0,
                },
            );
        }
        self.emit(&path, job_id, &JobState::Starting, 0.0);
        info!(path = %path, job_id = %job_id, codec = %original_info.codec, "Conversion started");

        let transcoder = self.clone();
        tokio::spawn(async move {
            transcoder.run_job(path, job_id, actor).await;
        });

        Ok(StartedJob { job_id, original_info })
    }

    async fn run_job(self, path: String, job_id: Uuid, actor: Actor) {
        let result = self
            .convert(&path, |percent| {
                self.update(&path, job_id, JobState::Converting, percent);
            })
            .await;

        let outcome = match result {
            Ok(output) => self
                .store
                .record_conversion(&path, &output, &actor)
                .await
                .map(|_| output),
            Err(e) => Err(e),
        };

        let retention = match outcome {
            Ok(output) => {
                info!(path = %path, output = %output, "Conversion completed");
                self.update(&path, job_id, JobState::Completed, 100.0);
                self.retention.completed_retention_secs
            }
            Err(e) => {
                error!(path = %path, error = %e, "Conversion error");
                self.update(&path, job_id, JobState::Failed(e.to_string()), 0.0);
                self.retention.failed_retention_secs
            }
        };
        self.schedule_removal(path, job_id, retention);
    }

    fn update(&self, path: &str, job_id: Uuid, state: JobState, progress: f64) {
        {
            let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
            match jobs.get_mut(path) {
                Some(job) if job.id == job_id => {
                    job.state = state.clone();
                    job.progress = progress;
                }
                _ => {
                    warn!(path = %path, job_id = %job_id, "Update for unknown job");
                    return;
                }
            }
        }
        self.emit(path, job_id, &state, progress);
    }

    fn emit(&self, path: &str, job_id: Uuid, state: &JobState, progress: f64) {
        let event = JobEvent {
            job_id,
            path: path.to_string(),
            status: state.label(),
            progress,
            timestamp: time::now(),
        };
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Forget a terminal job after `secs`, unless it was replaced meanwhile
    fn schedule_removal(&self, path: String, job_id: Uuid, secs: u64) {
        let jobs = Arc::clone(&self.jobs);
        tokio::spawn(async move {
            tokio::time::sleep(time::secs_to_duration(secs)).await;
            let mut jobs = jobs.write().unwrap_or_else(PoisonError::into_inner);
            let same_terminal_job = jobs
                .get(&path)
                .map(|job| job.id == job_id && job.state.is_terminal())
                .unwrap_or(false);
            if same_terminal_job {
                jobs.remove(&path);
                debug!(path = %path, job_id = %job_id, "Job pruned");
            }
        });
    }

    /// Snapshot of the job recorded for `path`
    pub fn job(&self, path: &str) -> Option<TranscodeJob> {
        let path = paths::normalize(path).ok()?;
        self.jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&path)
            .cloned()
    }

    /// Current conversion status of `path`
    pub async fn status(&self, path: &str) -> Result<ConversionStatus> {
        let path = paths::normalize(path)?;
        if let Some(job) = self.job(&path) {
            return Ok(ConversionStatus {
                status: job.state.label(),
                progress: Some(job.progress),
                job_id: Some(job.id),
                converted_path: None,
                conversion_date: None,
            });
        }

        let metadata = self.store.read(&path).await;
        Ok(match metadata.converted_path {
            Some(converted_path) => ConversionStatus {
                status: "completed".to_string(),
                progress: None,
                job_id: None,
                converted_path: Some(converted_path),
                conversion_date: metadata.conversion_date,
            },
            None => ConversionStatus {
                status: "not_started".to_string(),
                progress: None,
                job_id: None,
                converted_path: None,
                conversion_date: None,
            },
        })
    }

    /// Poster frame `<base>_thumb.jpg`, generated once
    pub async fn thumbnail(&self, path: &str, timestamp: Option<&str>) -> Result<String> {
        let (path, input) = self.source(path).await?;
        let at = validate_timestamp(timestamp.unwrap_or(DEFAULT_THUMBNAIL_TIMESTAMP))?;

        let thumb_path = naming::thumbnail_path(&path);
        let output = paths::resolve(&self.root, &thumb_path);
        if is_file(&output).await {
            return Ok(thumb_path);
        }

        if let Err(e) = self.encoder.snapshot(&input, &output, at).await {
            let _ = tokio::fs::remove_file(&output).await;
            return Err(e);
        }
        info!(path = %path, thumbnail = %thumb_path, "Thumbnail generated");
        Ok(thumb_path)
    }

    /// Scrubbing preview: frames every `interval` seconds plus a WebVTT track
    ///
    /// Memoized on the track file, which is written last.
    pub async fn preview_track(&self, path: &str, interval: Option<f64>) -> Result<PreviewTrack> {
        let interval = interval.unwrap_or(DEFAULT_PREVIEW_INTERVAL);
        if !interval.is_finite() || interval < MIN_PREVIEW_INTERVAL {
            return Err(Error::InvalidInput(format!(
                "Interval must be at least {} seconds, got {}",
                MIN_PREVIEW_INTERVAL, interval
            )));
        }
        let (path, input) = self.source(path).await?;

        let track = PreviewTrack {
            vtt_path: naming::preview_track_path(&path),
            thumbnails_path: naming::preview_dir(&path),
        };
        let vtt_location = paths::resolve(&self.root, &track.vtt_path);
        if is_file(&vtt_location).await {
            return Ok(track);
        }

        let duration = self
            .encoder
            .probe(&input)
            .await?
            .duration
            .filter(|d| *d > 0.0)
            .ok_or_else(|| Error::Encoder("Could not determine video duration".to_string()))?;

        let timestamps = vtt::frame_timestamps(duration, interval);
        let frames_dir = paths::resolve(&self.root, &track.thumbnails_path);
        tokio::fs::create_dir_all(&frames_dir).await?;
        self.encoder.snapshots(&input, &frames_dir, &timestamps).await?;

        let content = vtt::build_preview_track(&path, &timestamps, duration);
        tokio::fs::write(&vtt_location, content).await?;
        info!(path = %path, frames = timestamps.len(), "Preview track generated");
        Ok(track)
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

/// `.<name>.partial` beside the final output
fn partial_location(output: &Path) -> PathBuf {
    let name = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    output.with_file_name(format!(".{}.partial", name))
}

/// Accept `HH:MM:SS[.fff]`, `MM:SS` or plain seconds
///
/// Every part is ASCII digits with an optional fractional part; no signs,
/// exponents or named values like `inf`.
fn validate_timestamp(timestamp: &str) -> Result<&str> {
    let timestamp = timestamp.trim();
    let well_formed = !timestamp.is_empty()
        && timestamp.split(':').count() <= 3
        && timestamp.split(':').all(is_decimal);
    if well_formed {
        Ok(timestamp)
    } else {
        Err(Error::InvalidInput(format!("Invalid timestamp: {:?}", timestamp)))
    }
}

/// `digits` or `digits.digits`
fn is_decimal(part: &str) -> bool {
    let (whole, fraction) = match part.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (part, None),
    };
    let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    digits(whole) && fraction.map_or(true, digits)
}
