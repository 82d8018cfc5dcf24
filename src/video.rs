//! Post-processing of recorded test videos
//!
//! Each spec run leaves a JUnit report and a video. Videos of passing specs are
//! deleted; for failing specs one clip per failed test is cut out (its offset
//! is the summed duration of the test cases before it) and the full video is
//! deleted afterwards.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::de::IgnoredAny;
use serde::Deserialize;
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::{Error, Result};

#[derive(Debug, Deserialize)]
struct JunitSuites {
    #[serde(rename = "testsuite", default)]
    suites: Vec<JunitSuite>,
}

#[derive(Debug, Deserialize)]
struct JunitSuite {
    #[serde(rename = "@file", default)]
    file: Option<String>,
    #[serde(rename = "testcase", default)]
    cases: Vec<JunitCase>,
}

#[derive(Debug, Deserialize)]
struct JunitCase {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@time", default)]
    time: Option<String>,
    #[serde(default)]
    failure: Vec<IgnoredAny>,
}

/// Outcome of one test case
#[derive(Debug, Clone, PartialEq)]
pub struct CaseResult {
    pub name: String,
    /// Offset of the test inside the spec video
    pub start: Duration,
    pub duration: Duration,
    pub failed: bool,
}

/// Parsed JUnit report of one spec file
#[derive(Debug, Clone, PartialEq)]
pub struct SpecReport {
    /// Spec file as reported by the runner, e.g. `cypress/integration/a/login.feature`
    pub spec: Option<String>,
    pub cases: Vec<CaseResult>,
}

impl SpecReport {
    pub fn has_failures(&self) -> bool {
        self.cases.iter().any(|c| c.failed)
    }
}

/// Parse a JUnit report, assigning each test case its offset in run order
pub fn parse_report(xml: &str) -> std::result::Result<SpecReport, String> {
    let parsed: JunitSuites = quick_xml::de::from_str(xml).map_err(|e| e.to_string())?;

    let mut spec = None;
    let mut cases = Vec::new();
    let mut offset = Duration::ZERO;

    for suite in parsed.suites {
        if spec.is_none() {
            spec = suite.file.filter(|f| !f.is_empty());
        }
        for case in suite.cases {
            let seconds = match case.time.as_deref() {
                Some(t) => t
                    .trim()
                    .parse::<f64>()
                    .map_err(|e| format!("invalid time '{}' of {}: {}", t, case.name, e))?,
                None => 0.0,
            };
            let duration = Duration::from_secs_f64(seconds.max(0.0));
            cases.push(CaseResult {
                name: case.name,
                start: offset,
                duration,
                failed: !case.failure.is_empty(),
            });
            offset += duration;
        }
    }

    Ok(SpecReport { spec, cases })
}

/// Video recorded for `spec`: its path below the integration folder, plus `.mp4`
pub fn video_for(spec: &str, videos_dir: &Path) -> PathBuf {
    let spec = Path::new(spec);
    let components: Vec<Component<'_>> = spec.components().collect();
    let relative: PathBuf = match components
        .iter()
        .position(|c| c.as_os_str() == "integration")
    {
        Some(index) => components[index + 1..].iter().collect(),
        None => spec.file_name().map(PathBuf::from).unwrap_or_default(),
    };

    let mut file = relative.into_os_string();
    file.push(".mp4");
    videos_dir.join(file)
}

/// Output file for the clip of one test, next to the full video
pub fn clip_path(video: &Path, test_name: &str) -> PathBuf {
    let slug: String = test_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    let stem = video
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    video.with_file_name(format!("{}-{}.mp4", stem, slug))
}

/// Trait for cutting a section out of a video
#[cfg_attr(test, automock)]
#[async_trait]
pub trait VideoCutter: Send + Sync {
    async fn cut(&self, video: &Path, start: Duration, duration: Duration, output: &Path)
        -> Result<()>;
}

/// [`VideoCutter`] backed by the `ffmpeg` executable
pub struct Ffmpeg;

#[async_trait]
impl VideoCutter for Ffmpeg {
    async fn cut(
        &self,
        video: &Path,
        start: Duration,
        duration: Duration,
        output: &Path,
    ) -> Result<()> {
        let output_result = Command::new("ffmpeg")
            .args(["-y", "-loglevel", "error", "-ss"])
            .arg(format!("{:.3}", start.as_secs_f64()))
            .arg("-i")
            .arg(video)
            .arg("-t")
            .arg(format!("{:.3}", duration.as_secs_f64()))
            .args(["-c", "copy"])
            .arg(output)
            .output()
            .await
            .map_err(|e| Error::command_failed(format!("failed to start ffmpeg: {}", e)))?;

        if !output_result.status.success() {
            return Err(Error::command_failed(format!(
                "ffmpeg failed for {}: {}",
                video.display(),
                String::from_utf8_lossy(&output_result.stderr)
            )));
        }
        Ok(())
    }
}

/// What post-processing did
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct VideoSummary {
    pub deleted: usize,
    pub clips: Vec<PathBuf>,
}

/// Process every `*.xml` report in `reports_dir` against `videos_dir`
pub async fn process_videos(
    reports_dir: &Path,
    videos_dir: &Path,
    cutter: &dyn VideoCutter,
) -> Result<VideoSummary> {
    let mut summary = VideoSummary::default();
    if !fs::try_exists(reports_dir).await? {
        debug!(path = %reports_dir.display(), "No reports, skipping video processing");
        return Ok(summary);
    }

    let mut reports = Vec::new();
    let mut entries = fs::read_dir(reports_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().is_some_and(|e| e == "xml") {
            reports.push(path);
        }
    }
    reports.sort();

    for path in reports {
        let xml = fs::read_to_string(&path).await?;
        let report = parse_report(&xml).map_err(|message| Error::Report {
            path: path.clone(),
            message,
        })?;

        let Some(spec) = report.spec.as_deref() else {
            debug!(report = %path.display(), "Report names no spec file");
            continue;
        };
        let video = video_for(spec, videos_dir);
        if !fs::try_exists(&video).await? {
            debug!(video = %video.display(), "No video recorded");
            continue;
        }

        if report.has_failures() {
            for case in report.cases.iter().filter(|c| c.failed) {
                let clip = clip_path(&video, &case.name);
                debug!(test = %case.name, clip = %clip.display(), "Cutting clip");
                cutter.cut(&video, case.start, case.duration, &clip).await?;
                summary.clips.push(clip);
            }
        }
        fs::remove_file(&video).await?;
        summary.deleted += 1;
    }

    if summary.clips.is_empty() {
        info!(deleted = summary.deleted, "Removed videos of passing specs");
    } else {
        warn!(clips = summary.clips.len(), "Kept clips of failed tests");
    }
    Ok(summary)
}
