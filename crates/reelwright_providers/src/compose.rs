//! Video composition through the `ffmpeg` binary.

use async_trait::async_trait;
use derive_getters::Getters;
use reelwright_core::{AudioHandle, MediaHandle, Script, VideoHandle};
use reelwright_error::StageError;
use reelwright_stages::VideoComposer;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, instrument};

/// Render settings.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct RenderSettings {
    /// Output width in pixels.
    #[serde(default = "default_width")]
    width: u32,
    /// Output height in pixels.
    #[serde(default = "default_height")]
    height: u32,
    /// Frames per second.
    #[serde(default = "default_fps")]
    fps: u32,
    /// Burn sentence subtitles into the video.
    #[serde(default = "default_subtitles")]
    subtitles: bool,
    /// Wrap subtitle lines at this many characters.
    #[serde(default = "default_max_chars")]
    max_chars_per_line: usize,
}

fn default_width() -> u32 {
    1080
}

fn default_height() -> u32 {
    1920
}

fn default_fps() -> u32 {
    30
}

fn default_subtitles() -> bool {
    true
}

fn default_max_chars() -> usize {
    30
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            fps: default_fps(),
            subtitles: default_subtitles(),
            max_chars_per_line: default_max_chars(),
        }
    }
}

/// Split narration into subtitle sentences.
fn sentences(text: &str) -> Vec<String> {
    text.split(['.', '!', '?', '؟', '،', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Greedy word wrap.
fn wrap(sentence: &str, max_chars: usize) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    for word in sentence.split_whitespace() {
        let needed = current.chars().count() + word.chars().count() + 1;
        if !current.is_empty() && needed > max_chars {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines.join("\n")
}

fn srt_timestamp(secs: f64) -> String {
    let total_ms = (secs.max(0.0) * 1000.0).round() as u64;
    let (h, rem) = (total_ms / 3_600_000, total_ms % 3_600_000);
    let (m, rem) = (rem / 60_000, rem % 60_000);
    let (s, ms) = (rem / 1000, rem % 1000);
    format!("{:02}:{:02}:{:02},{:03}", h, m, s, ms)
}

/// SubRip subtitles spreading sentences evenly over the narration.
///
/// # Examples
///
/// ```
/// use reelwright_providers::subtitle_srt;
///
/// let srt = subtitle_srt("First line. Second line.", 4.0, 30);
/// assert!(srt.starts_with("1\n00:00:00,000 --> 00:00:02,000\nFirst line\n"));
/// assert!(srt.contains("2\n00:00:02,000 --> 00:00:04,000\nSecond line\n"));
/// ```
pub fn subtitle_srt(text: &str, duration_secs: f64, max_chars: usize) -> String {
    let parts = sentences(text);
    if parts.is_empty() {
        return String::new();
    }
    let slot = duration_secs / parts.len() as f64;
    parts
        .iter()
        .enumerate()
        .map(|(i, sentence)| {
            let start = slot * i as f64;
            format!(
                "{}\n{} --> {}\n{}\n",
                i + 1,
                srt_timestamp(start),
                srt_timestamp(start + slot),
                wrap(sentence, max_chars.max(1))
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// ffmpeg arguments for one render.
///
/// Every clip is looped, scaled to cover the frame, center-cropped and
/// given an equal share of the narration; the concatenation is trimmed to
/// the narration length.
pub fn ffmpeg_args(
    settings: &RenderSettings,
    audio: &AudioHandle,
    media: &[MediaHandle],
    subtitles: Option<&Path>,
    output: &Path,
) -> Vec<String> {
    let duration = *audio.duration_secs();
    let share = duration / media.len().max(1) as f64;
    let (w, h) = (settings.width, settings.height);

    let mut args: Vec<String> = vec!["-y".into(), "-hide_banner".into(), "-loglevel".into(), "error".into()];
    for clip in media {
        args.extend([
            "-stream_loop".into(),
            "-1".into(),
            "-i".into(),
            clip.path().display().to_string(),
        ]);
    }
    args.extend(["-i".into(), audio.path().display().to_string()]);

    let mut filter = String::new();
    for i in 0..media.len() {
        filter.push_str(&format!(
            "[{i}:v]scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h},setsar=1,fps={fps},trim=duration={share:.3},setpts=PTS-STARTPTS[v{i}];",
            i = i,
            w = w,
            h = h,
            fps = settings.fps,
            share = share,
        ));
    }
    for i in 0..media.len() {
        filter.push_str(&format!("[v{}]", i));
    }
    filter.push_str(&format!("concat=n={}:v=1:a=0[cat]", media.len()));
    match subtitles {
        Some(srt) => filter.push_str(&format!(
            ";[cat]subtitles='{}':force_style='Alignment=2,FontSize=14,Outline=2'[out]",
            srt.display().to_string().replace('\'', r"\'")
        )),
        None => filter.push_str(";[cat]null[out]"),
    }

    args.extend([
        "-filter_complex".into(),
        filter,
        "-map".into(),
        "[out]".into(),
        "-map".into(),
        format!("{}:a", media.len()),
        "-t".into(),
        format!("{:.3}", duration),
        "-c:v".into(),
        "libx264".into(),
        "-preset".into(),
        "medium".into(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-c:a".into(),
        "aac".into(),
        "-movflags".into(),
        "+faststart".into(),
        output.display().to_string(),
    ]);
    args
}

/// Composer spawning `ffmpeg`.
#[derive(Debug, Clone)]
pub struct FfmpegComposer {
    name: String,
    binary: String,
    settings: RenderSettings,
}

impl FfmpegComposer {
    /// Composer using the given binary (usually `ffmpeg` on `PATH`).
    pub fn new(name: impl Into<String>, binary: impl Into<String>, settings: RenderSettings) -> Self {
        Self {
            name: name.into(),
            binary: binary.into(),
            settings,
        }
    }
}

#[async_trait]
impl VideoComposer for FfmpegComposer {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip_all, fields(provider = %self.name, clips = media.len(), output = %output.display()))]
    async fn compose(
        &self,
        audio: &AudioHandle,
        media: &[MediaHandle],
        script: &Script,
        output: &Path,
    ) -> Result<VideoHandle, StageError> {
        if media.is_empty() {
            return Err(StageError::terminal("no footage to compose"));
        }

        let srt_path = output.with_extension("srt");
        let subtitles = if self.settings.subtitles {
            let srt = subtitle_srt(script.text(), *audio.duration_secs(), self.settings.max_chars_per_line);
            tokio::fs::write(&srt_path, srt)
                .await
                .map_err(|e| StageError::terminal(format!("{}: {}", srt_path.display(), e)))?;
            Some(srt_path.as_path())
        } else {
            None
        };

        let args = ffmpeg_args(&self.settings, audio, media, subtitles, output);
        debug!(args = ?args, "Running ffmpeg");
        let result = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| StageError::terminal(format!("could not run {}: {}", self.binary, e)))?;

        if subtitles.is_some() {
            let _ = tokio::fs::remove_file(&srt_path).await;
        }
        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let tail: String = stderr
                .lines()
                .rev()
                .take(5)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect::<Vec<_>>()
                .join("\n");
            return Err(StageError::terminal(format!("{} exited with {}: {}", self.binary, result.status, tail)));
        }

        info!(duration = *audio.duration_secs(), "Video rendered");
        Ok(VideoHandle::new(output, *audio.duration_secs()))
    }
}
