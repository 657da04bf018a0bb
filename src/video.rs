//! Video keyframe extraction via an external ffmpeg install.
//!
//! Video assets get their thumbnail from a single decoded frame. The work is
//! done by `ffmpeg`/`ffprobe` child processes; this module only finds the
//! toolkit, builds argument lists, and reads back results.
//!
//! Nothing here fails loudly. A missing toolkit, a probe that exits non-zero
//! or prints garbage, or an extraction that produces no file all surface as
//! `None` / `false` plus a log line, so a video upload still succeeds and the
//! caller shows a placeholder.
//!
//! All process spawning goes through [`CommandRunner`]; tests swap in a fake
//! and never touch a real binary.

use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Exit status and captured output of a finished child process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the process was killed by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Runs a program to completion and captures its output.
///
/// Blocks for as long as the child runs; callers that need a timeout must
/// impose it around the whole call.
pub trait CommandRunner: Sync {
    fn run(&self, program: &Path, args: &[String]) -> io::Result<CommandOutput>;
}

/// Spawns real processes with [`std::process::Command`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &Path, args: &[String]) -> io::Result<CommandOutput> {
        let output = Command::new(program).args(args).output()?;
        Ok(CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Probe results for a video file. Each field is independently unknown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct VideoProbe {
    pub duration_seconds: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Resolved executables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolkit {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

/// Conventional install locations, checked in order after any configured path.
#[cfg(not(windows))]
const FFMPEG_CANDIDATES: &[&str] = &[
    "/usr/bin/ffmpeg",
    "/usr/local/bin/ffmpeg",
    "/opt/homebrew/bin/ffmpeg",
    "/opt/local/bin/ffmpeg",
    "/snap/bin/ffmpeg",
    "ffmpeg",
];

#[cfg(windows)]
const FFMPEG_CANDIDATES: &[&str] = &[
    "C:\\ffmpeg\\bin\\ffmpeg.exe",
    "C:\\Program Files\\ffmpeg\\bin\\ffmpeg.exe",
    "ffmpeg.exe",
    "ffmpeg",
];

/// `ffprobe` living next to `ffmpeg`, or the bare name for a bare command.
pub fn ffprobe_for(ffmpeg: &Path) -> PathBuf {
    let probe_name = match ffmpeg.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("ffprobe.{ext}"),
        None => "ffprobe".to_string(),
    };
    ffmpeg.with_file_name(probe_name)
}

/// Where to grab the frame: requests at or past the end use the midpoint;
/// negative or non-finite requests use the first frame.
pub fn resolve_timestamp(requested: f64, duration: Option<f64>) -> f64 {
    let requested = if requested.is_finite() && requested > 0.0 {
        requested
    } else {
        0.0
    };
    match duration {
        Some(d) if requested >= d => d / 2.0,
        _ => requested,
    }
}

/// ffmpeg `-vf` chain: cover-and-crop to `width x height`, or scale to
/// `width` keeping aspect when no height is given.
pub fn scale_filter(width: u32, height: Option<u32>) -> String {
    match height {
        Some(h) => format!("scale={width}:{h}:force_original_aspect_ratio=increase,crop={width}:{h}"),
        None => format!("scale={width}:-1"),
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Finds ffmpeg once, then probes videos and extracts keyframes.
pub struct KeyframeExtractor<R: CommandRunner = SystemRunner> {
    runner: R,
    configured: Option<PathBuf>,
    toolkit: OnceLock<Option<Toolkit>>,
}

impl KeyframeExtractor<SystemRunner> {
    /// Extractor backed by real processes. `ffmpeg_path` is tried before the
    /// standard locations.
    pub fn system(ffmpeg_path: Option<PathBuf>) -> Self {
        Self::new(SystemRunner, ffmpeg_path)
    }
}

impl<R: CommandRunner> KeyframeExtractor<R> {
    pub fn new(runner: R, ffmpeg_path: Option<PathBuf>) -> Self {
        Self {
            runner,
            configured: ffmpeg_path,
            toolkit: OnceLock::new(),
        }
    }

    /// The detected toolkit, probing on first use.
    pub fn toolkit(&self) -> Option<&Toolkit> {
        self.toolkit.get_or_init(|| self.detect()).as_ref()
    }

    pub fn is_available(&self) -> bool {
        self.toolkit().is_some()
    }

    fn detect(&self) -> Option<Toolkit> {
        let candidates = self
            .configured
            .iter()
            .cloned()
            .chain(FFMPEG_CANDIDATES.iter().map(PathBuf::from));

        for candidate in candidates {
            match self.runner.run(&candidate, &["-version".to_string()]) {
                Ok(out) if out.success() => {
                    let toolkit = Toolkit {
                        ffprobe: ffprobe_for(&candidate),
                        ffmpeg: candidate,
                    };
                    debug!(ffmpeg = %toolkit.ffmpeg.display(), "video toolkit found");
                    return Some(toolkit);
                }
                Ok(out) => {
                    debug!(candidate = %candidate.display(), status = ?out.status, "ffmpeg candidate rejected");
                }
                Err(e) => {
                    debug!(candidate = %candidate.display(), error = %e, "ffmpeg candidate unavailable");
                }
            }
        }
        debug!("no video toolkit found");
        None
    }

    /// Run ffprobe and return trimmed stdout on success.
    fn ffprobe(&self, video: &Path, args: &[&str]) -> Option<String> {
        let toolkit = self.toolkit()?;
        if !video.is_file() {
            debug!(video = %video.display(), "probe skipped: file missing");
            return None;
        }
        let mut full: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        full.push(path_arg(video));

        match self.runner.run(&toolkit.ffprobe, &full) {
            Ok(out) if out.success() => Some(out.stdout.trim().to_string()),
            Ok(out) => {
                debug!(video = %video.display(), status = ?out.status, stderr = %out.stderr.trim(), "ffprobe failed");
                None
            }
            Err(e) => {
                debug!(video = %video.display(), error = %e, "ffprobe could not run");
                None
            }
        }
    }

    /// Duration in seconds, if known.
    pub fn probe_duration(&self, video: &Path) -> Option<f64> {
        let out = self.ffprobe(
            video,
            &[
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ],
        )?;
        match out.lines().next().map(str::trim).map(str::parse::<f64>) {
            Some(Ok(d)) if d.is_finite() && d >= 0.0 => Some(d),
            _ => {
                debug!(video = %video.display(), output = %out, "unparsable duration");
                None
            }
        }
    }

    /// `(width, height)` of the first video stream, if known.
    pub fn probe_dimensions(&self, video: &Path) -> Option<(u32, u32)> {
        let out = self.ffprobe(
            video,
            &[
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-show_entries",
                "stream=width,height",
                "-of",
                "csv=s=x:p=0",
            ],
        )?;
        let parsed = out.lines().next().and_then(|line| {
            let mut parts = line.trim().split('x');
            let w = parts.next()?.trim().parse::<u32>().ok()?;
            let h = parts.next()?.trim().parse::<u32>().ok()?;
            (w > 0 && h > 0).then_some((w, h))
        });
        if parsed.is_none() {
            debug!(video = %video.display(), output = %out, "unparsable dimensions");
        }
        parsed
    }

    pub fn probe(&self, video: &Path) -> VideoProbe {
        let dims = self.probe_dimensions(video);
        VideoProbe {
            duration_seconds: self.probe_duration(video),
            width: dims.map(|d| d.0),
            height: dims.map(|d| d.1),
        }
    }

    /// Write one frame of `video` to `thumb`.
    ///
    /// Returns `false` when the toolkit is missing, the video does not exist,
    /// ffmpeg fails, or no output file appears.
    pub fn extract_thumbnail(
        &self,
        video: &Path,
        thumb: &Path,
        timestamp: f64,
        width: u32,
        height: Option<u32>,
    ) -> bool {
        let Some(toolkit) = self.toolkit() else {
            debug!(video = %video.display(), "keyframe skipped: no video toolkit");
            return false;
        };
        if !video.is_file() {
            debug!(video = %video.display(), "keyframe skipped: file missing");
            return false;
        }

        let duration = self.probe_duration(video);
        let at = resolve_timestamp(timestamp, duration);
        if at != timestamp {
            debug!(requested = timestamp, used = at, ?duration, "keyframe timestamp clamped");
        }

        if let Some(dir) = thumb.parent()
            && let Err(e) = std::fs::create_dir_all(dir)
        {
            warn!(dir = %dir.display(), error = %e, "cannot create thumbnail directory");
            return false;
        }

        let args = vec![
            "-y".to_string(),
            "-ss".to_string(),
            format!("{at:.3}"),
            "-i".to_string(),
            path_arg(video),
            "-vframes".to_string(),
            "1".to_string(),
            "-vf".to_string(),
            scale_filter(width, height),
            path_arg(thumb),
        ];

        match self.runner.run(&toolkit.ffmpeg, &args) {
            Ok(out) if out.success() => {
                if thumb.is_file() {
                    true
                } else {
                    warn!(thumb = %thumb.display(), "ffmpeg reported success but wrote no keyframe");
                    false
                }
            }
            Ok(out) => {
                warn!(
                    video = %video.display(),
                    status = ?out.status,
                    stdout = %out.stdout,
                    stderr = %out.stderr,
                    "keyframe extraction failed"
                );
                false
            }
            Err(e) => {
                warn!(video = %video.display(), error = %e, "keyframe extraction could not run");
                false
            }
        }
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    type Responder = Box<dyn Fn(&Path, &[String]) -> io::Result<CommandOutput> + Send + Sync>;

    /// Runner that records every call and answers with a closure.
    pub struct FakeRunner {
        pub calls: Mutex<Vec<(PathBuf, Vec<String>)>>,
        respond: Responder,
    }

    impl FakeRunner {
        pub fn new(
            respond: impl Fn(&Path, &[String]) -> io::Result<CommandOutput> + Send + Sync + 'static,
        ) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                respond: Box::new(respond),
            }
        }

        /// Nothing installed anywhere.
        pub fn missing() -> Self {
            Self::new(|_, _| Err(io::Error::new(io::ErrorKind::NotFound, "not found")))
        }

        /// A working toolkit at `/usr/bin` whose ffprobe reports `duration`
        /// and `dims`, and whose ffmpeg writes a small file to its last
        /// argument.
        pub fn working(duration: &str, dims: &str) -> Self {
            let duration = duration.to_string();
            let dims = dims.to_string();
            Self::new(move |program, args| {
                let stdout = if program == Path::new("/usr/bin/ffprobe") {
                    if args.iter().any(|a| a == "format=duration") {
                        duration.clone()
                    } else {
                        dims.clone()
                    }
                } else if program == Path::new("/usr/bin/ffmpeg") {
                    if args.first().map(String::as_str) != Some("-version")
                        && let Some(out) = args.last()
                    {
                        std::fs::write(out, b"\xff\xd8frame")?;
                    }
                    String::new()
                } else {
                    return Err(io::Error::new(io::ErrorKind::NotFound, "not found"));
                };
                Ok(ok(&stdout))
            })
        }

        pub fn calls(&self) -> Vec<(PathBuf, Vec<String>)> {
            self.calls.lock().unwrap().clone()
        }

        pub fn ffmpeg_extractions(&self) -> Vec<Vec<String>> {
            self.calls()
                .into_iter()
                .filter(|(p, a)| p.ends_with("ffmpeg") && a.first().map(String::as_str) == Some("-y"))
                .map(|(_, a)| a)
                .collect()
        }
    }

    impl CommandRunner for FakeRunner {
        fn run(&self, program: &Path, args: &[String]) -> io::Result<CommandOutput> {
            self.calls
                .lock()
                .unwrap()
                .push((program.to_path_buf(), args.to_vec()));
            (self.respond)(program, args)
        }
    }

    pub fn ok(stdout: &str) -> CommandOutput {
        CommandOutput {
            status: Some(0),
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    fn failed(stderr: &str) -> CommandOutput {
        CommandOutput {
            status: Some(1),
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }

    fn video_file(tmp: &TempDir) -> PathBuf {
        let path = tmp.path().join("clip.mp4");
        std::fs::write(&path, b"not really a video").unwrap();
        path
    }

    // =========================================================================
    // Pure helpers
    // =========================================================================

    #[test]
    fn ffprobe_sits_next_to_ffmpeg() {
        assert_eq!(ffprobe_for(Path::new("/usr/bin/ffmpeg")), Path::new("/usr/bin/ffprobe"));
        assert_eq!(ffprobe_for(Path::new("ffmpeg")), Path::new("ffprobe"));
        assert_eq!(
            ffprobe_for(Path::new("C:/ffmpeg/bin/ffmpeg.exe")),
            Path::new("C:/ffmpeg/bin/ffprobe.exe")
        );
    }

    #[test]
    fn timestamp_past_end_uses_midpoint() {
        assert_eq!(resolve_timestamp(9999.0, Some(10.0)), 5.0);
        assert_eq!(resolve_timestamp(10.0, Some(10.0)), 5.0);
    }

    #[test]
    fn timestamp_within_video_is_kept() {
        assert_eq!(resolve_timestamp(1.5, Some(10.0)), 1.5);
        assert_eq!(resolve_timestamp(1.5, None), 1.5);
    }

    #[test]
    fn invalid_timestamp_uses_start() {
        assert_eq!(resolve_timestamp(-3.0, Some(10.0)), 0.0);
        assert_eq!(resolve_timestamp(f64::NAN, None), 0.0);
    }

    #[test]
    fn scale_filter_variants() {
        assert_eq!(
            scale_filter(320, Some(180)),
            "scale=320:180:force_original_aspect_ratio=increase,crop=320:180"
        );
        assert_eq!(scale_filter(320, None), "scale=320:-1");
    }

    // =========================================================================
    // Detection
    // =========================================================================

    #[test]
    fn unavailable_when_nothing_runs() {
        let extractor = KeyframeExtractor::new(FakeRunner::missing(), None);
        assert!(!extractor.is_available());
    }

    #[test]
    fn configured_path_is_tried_first() {
        let runner = FakeRunner::new(|program, _| {
            if program == Path::new("/custom/ffmpeg") {
                Ok(ok("ffmpeg version 6"))
            } else {
                Ok(failed("nope"))
            }
        });
        let extractor = KeyframeExtractor::new(runner, Some(PathBuf::from("/custom/ffmpeg")));

        let toolkit = extractor.toolkit().unwrap();
        assert_eq!(toolkit.ffmpeg, Path::new("/custom/ffmpeg"));
        assert_eq!(toolkit.ffprobe, Path::new("/custom/ffprobe"));
    }

    #[test]
    fn detection_runs_once() {
        let extractor = KeyframeExtractor::new(FakeRunner::missing(), None);
        extractor.is_available();
        let first = extractor.runner.calls().len();
        extractor.is_available();
        assert_eq!(extractor.runner.calls().len(), first);
        assert_eq!(first, FFMPEG_CANDIDATES.len());
    }

    // =========================================================================
    // Probing
    // =========================================================================

    #[test]
    fn probe_reads_duration_and_dimensions() {
        let tmp = TempDir::new().unwrap();
        let video = video_file(&tmp);
        let extractor = KeyframeExtractor::new(FakeRunner::working("12.480000\n", "1920x1080\n"), None);

        let probe = extractor.probe(&video);
        assert_eq!(
            probe,
            VideoProbe {
                duration_seconds: Some(12.48),
                width: Some(1920),
                height: Some(1080),
            }
        );
    }

    #[test]
    fn probe_garbage_is_unknown() {
        let tmp = TempDir::new().unwrap();
        let video = video_file(&tmp);
        let extractor = KeyframeExtractor::new(FakeRunner::working("N/A", "x"), None);

        assert_eq!(extractor.probe(&video), VideoProbe::default());
    }

    #[test]
    fn probe_without_toolkit_is_unknown() {
        let tmp = TempDir::new().unwrap();
        let video = video_file(&tmp);
        let extractor = KeyframeExtractor::new(FakeRunner::missing(), None);

        assert_eq!(extractor.probe_duration(&video), None);
        assert_eq!(extractor.probe_dimensions(&video), None);
    }

    #[test]
    fn probe_nonzero_exit_is_unknown() {
        let tmp = TempDir::new().unwrap();
        let video = video_file(&tmp);
        let runner = FakeRunner::new(|program, _| {
            if program.ends_with("ffprobe") {
                Ok(failed("Invalid data found when processing input"))
            } else {
                Ok(ok(""))
            }
        });
        let extractor = KeyframeExtractor::new(runner, None);
        assert_eq!(extractor.probe_duration(&video), None);
    }

    // =========================================================================
    // Extraction
    // =========================================================================

    #[test]
    fn extract_clamps_timestamp_to_midpoint() {
        let tmp = TempDir::new().unwrap();
        let video = video_file(&tmp);
        let thumb = tmp.path().join("thumbs/clip.jpg");
        let extractor = KeyframeExtractor::new(FakeRunner::working("10.0", "640x360"), None);

        assert!(extractor.extract_thumbnail(&video, &thumb, 9999.0, 320, None));

        let runs = extractor.runner.ffmpeg_extractions();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0][1], "-ss");
        assert_eq!(runs[0][2], "5.000");
        assert!(thumb.is_file());
    }

    #[test]
    fn extract_passes_cover_filter_when_height_given() {
        let tmp = TempDir::new().unwrap();
        let video = video_file(&tmp);
        let thumb = tmp.path().join("clip.jpg");
        let extractor = KeyframeExtractor::new(FakeRunner::working("30", "640x360"), None);

        assert!(extractor.extract_thumbnail(&video, &thumb, 1.0, 320, Some(180)));

        let args = &extractor.runner.ffmpeg_extractions()[0];
        assert_eq!(args[2], "1.000");
        let vf = args.iter().position(|a| a == "-vf").unwrap();
        assert_eq!(
            args[vf + 1],
            "scale=320:180:force_original_aspect_ratio=increase,crop=320:180"
        );
        assert_eq!(args.last().unwrap(), &thumb.to_string_lossy());
    }

    #[test]
    fn extract_without_toolkit_is_false() {
        let tmp = TempDir::new().unwrap();
        let video = video_file(&tmp);
        let extractor = KeyframeExtractor::new(FakeRunner::missing(), None);
        assert!(!extractor.extract_thumbnail(&video, &tmp.path().join("t.jpg"), 1.0, 320, None));
    }

    #[test]
    fn extract_missing_source_is_false() {
        let tmp = TempDir::new().unwrap();
        let extractor = KeyframeExtractor::new(FakeRunner::working("10", "1x1"), None);
        assert!(!extractor.extract_thumbnail(
            &tmp.path().join("gone.mp4"),
            &tmp.path().join("t.jpg"),
            1.0,
            320,
            None
        ));
        assert!(extractor.runner.ffmpeg_extractions().is_empty());
    }

    #[test]
    fn extract_nonzero_exit_is_false() {
        let tmp = TempDir::new().unwrap();
        let video = video_file(&tmp);
        let runner = FakeRunner::new(|_, args| {
            if args.first().map(String::as_str) == Some("-y") {
                Ok(failed("Output file is empty, nothing was encoded"))
            } else {
                Ok(ok("10"))
            }
        });
        let extractor = KeyframeExtractor::new(runner, None);
        assert!(!extractor.extract_thumbnail(&video, &tmp.path().join("t.jpg"), 1.0, 320, None));
    }

    #[test]
    fn extract_without_output_file_is_false() {
        let tmp = TempDir::new().unwrap();
        let video = video_file(&tmp);
        // Every command "succeeds" but nothing is written.
        let extractor = KeyframeExtractor::new(FakeRunner::new(|_, _| Ok(ok("10"))), None);
        assert!(!extractor.extract_thumbnail(&video, &tmp.path().join("t.jpg"), 1.0, 320, None));
    }
}
