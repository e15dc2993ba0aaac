//! WebVTT preview tracks
//!
//! A preview track maps time ranges of a video to small frame images so the
//! player can show a thumbnail while scrubbing:
//!
//! ```text
//! WEBVTT
//!
//! 00:00:00.000 --> 00:00:10.000
//! /api/files/clips/clip_thumbnails/thumb_1.jpg
//! ```

use lighttable_common::naming;

/// Most frames a single preview track holds
pub const MAX_PREVIEW_FRAMES: usize = 1000;

/// Frame timestamps every `interval` seconds from 0 up to (excluding) `duration`
///
/// Long videos get a wider interval so the track stays within
/// [`MAX_PREVIEW_FRAMES`].
pub fn frame_timestamps(duration: f64, interval: f64) -> Vec<f64> {
    if !duration.is_finite() || !interval.is_finite() || duration <= 0.0 || interval <= 0.0 {
        return Vec::new();
    }
    let interval = interval.max(duration / MAX_PREVIEW_FRAMES as f64);
    let count = ((duration / interval).ceil() as usize).min(MAX_PREVIEW_FRAMES);
    (0..count).map(|i| i as f64 * interval).collect()
}

/// `HH:MM:SS.mmm`
pub fn format_cue_time(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let secs = (total_ms % 60_000) / 1000;
    let ms = total_ms % 1000;
    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, secs, ms)
}

/// Build the track for `video_path`; each cue runs to the next frame, the
/// last one to the end of the video
pub fn build_preview_track(video_path: &str, timestamps: &[f64], duration: f64) -> String {
    let mut track = String::from("WEBVTT\n\n");
    for (i, start) in timestamps.iter().enumerate() {
        let end = timestamps.get(i + 1).copied().unwrap_or(duration);
        track.push_str(&format!(
            "{} --> {}\n/api/files/{}\n\n",
            format_cue_time(*start),
            format_cue_time(end),
            naming::preview_frame(video_path, i + 1)
        ));
    }
    track
}
