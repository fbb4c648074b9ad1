use std::path::Path;

use serde::Deserialize;

use crate::foundation::core::{DisplayTransform, MediaTime, VideoDescriptor};
use crate::foundation::error::{FramefxError, FramefxResult, SetupError};

#[derive(Deserialize)]
struct ProbeOut {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
    duration: Option<String>,
    #[serde(default)]
    tags: ProbeTags,
    #[serde(default)]
    side_data_list: Vec<ProbeSideData>,
}

#[derive(Deserialize, Default)]
struct ProbeTags {
    rotate: Option<String>,
}

#[derive(Deserialize)]
struct ProbeSideData {
    side_data_type: Option<String>,
    displaymatrix: Option<String>,
    rotation: Option<f64>,
}

#[derive(Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Probe the first video track of `path` through `ffprobe`.
#[tracing::instrument]
pub fn probe_video(path: &Path) -> FramefxResult<VideoDescriptor> {
    let out = std::process::Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(path)
        .output()
        .map_err(|e| SetupError::FailedToOpenReader(format!("failed to run ffprobe: {e}")))?;
    if !out.status.success() {
        return Err(SetupError::FailedToOpenReader(format!(
            "ffprobe failed for '{}': {}",
            path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        ))
        .into());
    }
    descriptor_from_probe_json(&out.stdout)
}

/// Build a [`VideoDescriptor`] from `ffprobe -print_format json -show_streams -show_format`.
pub fn descriptor_from_probe_json(json: &[u8]) -> FramefxResult<VideoDescriptor> {
    let parsed: ProbeOut = serde_json::from_slice(json).map_err(|e| {
        SetupError::FailedToOpenReader(format!("ffprobe json parse failed: {e}"))
    })?;
    let video = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or(SetupError::MissingVideoTrack)?;

    let width = video
        .width
        .ok_or_else(|| SetupError::FailedToOpenReader("missing video width".to_owned()))?;
    let height = video
        .height
        .ok_or_else(|| SetupError::FailedToOpenReader("missing video height".to_owned()))?;

    // r_frame_rate is the lowest rate that represents every timestamp, which is a field or
    // timebase rate for interlaced and some VFR streams; it is only a fallback.
    let frame_duration = [video.avg_frame_rate.as_deref(), video.r_frame_rate.as_deref()]
        .into_iter()
        .flatten()
        .find_map(|r| parse_rational(r).ok())
        .and_then(|(num, den)| MediaTime::from_frame_rate(num, den).ok())
        .ok_or_else(|| SetupError::FailedToOpenReader("missing video frame rate".to_owned()))?;

    let nb_frames = video
        .nb_frames
        .as_deref()
        .and_then(|n| n.parse::<u64>().ok())
        .filter(|&n| n > 0);
    let duration = match nb_frames {
        Some(n) => frame_duration.saturating_mul(n),
        None => {
            let secs = video
                .duration
                .as_deref()
                .or(parsed.format.as_ref().and_then(|f| f.duration.as_deref()))
                .and_then(|d| d.parse::<f64>().ok())
                .ok_or_else(|| {
                    SetupError::FailedToOpenReader("missing video duration".to_owned())
                })?;
            MediaTime::from_secs_f64(secs, frame_duration.timescale)?
        }
    };

    let desc = VideoDescriptor {
        width,
        height,
        duration,
        frame_duration,
        transform: display_transform(video)?,
    };
    desc.validate()?;
    Ok(desc)
}

fn display_transform(stream: &ProbeStream) -> FramefxResult<DisplayTransform> {
    let side_data = stream
        .side_data_list
        .iter()
        .find(|s| s.side_data_type.as_deref() == Some("Display Matrix"));
    if let Some(sd) = side_data {
        if let Some(m) = sd.displaymatrix.as_deref().and_then(parse_display_matrix) {
            let (rotation, flip) = matrix_rotation_and_flip(m);
            return DisplayTransform::new(snap_to_quarter_turn(rotation), flip);
        }
        if let Some(r) = sd.rotation {
            return DisplayTransform::new(snap_to_quarter_turn(r), false);
        }
    }
    // Legacy `rotate` tags are clockwise.
    let rotation = stream
        .tags
        .rotate
        .as_deref()
        .and_then(|r| r.parse::<f64>().ok())
        .map(|r| snap_to_quarter_turn(-r))
        .unwrap_or(0);
    DisplayTransform::new(rotation, false)
}

/// Parse ffprobe's hex-dump rendering of a 3x3 display matrix (`"00000000: a b c"` rows).
fn parse_display_matrix(s: &str) -> Option<[f64; 9]> {
    let mut m = [0.0; 9];
    let mut n = 0;
    for line in s.lines().filter(|l| !l.trim().is_empty()) {
        let (_, values) = line.split_once(':')?;
        for v in values.split_whitespace() {
            *m.get_mut(n)? = v.parse::<i64>().ok()? as f64;
            n += 1;
        }
    }
    (n == 9).then_some(m)
}

/// Counter-clockwise rotation and horizontal mirroring encoded by a display matrix.
///
/// A mirrored matrix has a negative determinant; the mirror negates the first column, so the
/// rotation is read after undoing it.
fn matrix_rotation_and_flip(mut m: [f64; 9]) -> (f64, bool) {
    let flip = m[0] * m[4] - m[1] * m[3] < 0.0;
    if flip {
        m[0] = -m[0];
        m[3] = -m[3];
    }
    let sx = m[0].hypot(m[3]);
    let sy = m[1].hypot(m[4]);
    if sx == 0.0 || sy == 0.0 {
        return (0.0, flip);
    }
    (-(m[1] / sy).atan2(m[0] / sx).to_degrees(), flip)
}

fn snap_to_quarter_turn(deg: f64) -> i32 {
    ((deg / 90.0).round() as i32) * 90
}

/// Parse an ffprobe rational such as `30000/1001` into `(num, den)`.
pub(crate) fn parse_rational(s: &str) -> FramefxResult<(u32, u32)> {
    let (num, den) = s
        .split_once('/')
        .ok_or_else(|| FramefxError::validation(format!("invalid rational \"{s}\"")))?;
    let num: u32 = num
        .trim()
        .parse()
        .map_err(|_| FramefxError::validation(format!("invalid rational \"{s}\"")))?;
    let den: u32 = den
        .trim()
        .parse()
        .map_err(|_| FramefxError::validation(format!("invalid rational \"{s}\"")))?;
    if num == 0 || den == 0 {
        return Err(FramefxError::validation(format!(
            "rational \"{s}\" must be non-zero"
        )));
    }
    Ok((num, den))
}

#[cfg(test)]
#[path = "../../tests/unit/media/probe.rs"]
mod tests;
