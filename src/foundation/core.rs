use std::cmp::Ordering;
use std::str::FromStr;

use crate::foundation::error::{FramefxError, FramefxResult};

/// Rational media timestamp: `value / timescale` seconds.
///
/// Equality and ordering compare the represented instant, so `1/30` equals `2/60`.
#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct MediaTime {
    /// Tick count.
    pub value: i64,
    /// Ticks per second, must be non-zero.
    pub timescale: u32,
}

impl MediaTime {
    /// The zero instant.
    pub const ZERO: MediaTime = MediaTime {
        value: 0,
        timescale: 1,
    };

    /// Create a validated timestamp.
    pub fn new(value: i64, timescale: u32) -> FramefxResult<Self> {
        if timescale == 0 {
            return Err(FramefxError::validation("MediaTime timescale must be > 0"));
        }
        Ok(Self { value, timescale })
    }

    /// Duration of one frame at `num/den` frames per second.
    pub fn from_frame_rate(num: u32, den: u32) -> FramefxResult<Self> {
        if num == 0 || den == 0 {
            return Err(FramefxError::validation(
                "frame rate numerator and denominator must be > 0",
            ));
        }
        Ok(Self {
            value: i64::from(den),
            timescale: num,
        })
    }

    /// Round `secs` to the nearest tick of `timescale`.
    pub fn from_secs_f64(secs: f64, timescale: u32) -> FramefxResult<Self> {
        if !secs.is_finite() {
            return Err(FramefxError::validation("MediaTime seconds must be finite"));
        }
        Self::new((secs * f64::from(timescale)).round() as i64, timescale)
    }

    /// Convert to floating-point seconds.
    pub fn as_secs_f64(self) -> f64 {
        self.value as f64 / f64::from(self.timescale)
    }

    /// Return `true` when the instant is strictly after zero.
    pub fn is_positive(self) -> bool {
        self.value > 0
    }

    /// Multiply by a frame count, keeping the timescale.
    pub fn saturating_mul(self, n: u64) -> Self {
        let n = i64::try_from(n).unwrap_or(i64::MAX);
        Self {
            value: self.value.saturating_mul(n),
            timescale: self.timescale,
        }
    }

    /// Add two timestamps, expressing the result in a common timescale.
    ///
    /// Returns `None` when the common timescale or the sum does not fit.
    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        if self.timescale == rhs.timescale {
            return Some(Self {
                value: self.value.checked_add(rhs.value)?,
                timescale: self.timescale,
            });
        }
        let g = gcd(u64::from(self.timescale), u64::from(rhs.timescale));
        let lcm = u64::from(self.timescale) / g * u64::from(rhs.timescale);
        let timescale = u32::try_from(lcm).ok()?;
        let a = self
            .value
            .checked_mul(i64::from(timescale / self.timescale))?;
        let b = rhs.value.checked_mul(i64::from(timescale / rhs.timescale))?;
        Some(Self {
            value: a.checked_add(b)?,
            timescale,
        })
    }

    /// Fraction `self / total`, clamped into `[0, 1]`. Returns `1.0` for a non-positive total.
    pub fn fraction_of(self, total: Self) -> f64 {
        if !total.is_positive() {
            return 1.0;
        }
        let num = i128::from(self.value) * i128::from(total.timescale);
        let den = i128::from(total.value) * i128::from(self.timescale);
        if num >= den {
            return 1.0;
        }
        (num as f64 / den as f64).clamp(0.0, 1.0)
    }

    fn cross(self, other: Self) -> (i128, i128) {
        (
            i128::from(self.value) * i128::from(other.timescale),
            i128::from(other.value) * i128::from(self.timescale),
        )
    }
}

impl PartialEq for MediaTime {
    fn eq(&self, other: &Self) -> bool {
        let (a, b) = self.cross(*other);
        a == b
    }
}

impl Eq for MediaTime {}

impl PartialOrd for MediaTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MediaTime {
    fn cmp(&self, other: &Self) -> Ordering {
        let (a, b) = self.cross(*other);
        a.cmp(&b)
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a.max(1)
}

/// Display orientation metadata carried from the input track to the output track.
///
/// Frames are processed in their stored (natural) orientation; the transform is only tagged.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DisplayTransform {
    /// Counter-clockwise display rotation in degrees: 0, 90, 180 or 270.
    pub rotation_degrees: i32,
    /// Mirror horizontally before rotating.
    pub flip_horizontal: bool,
}

impl DisplayTransform {
    /// Create a transform, normalizing any multiple of 90 into `[0, 360)`.
    pub fn new(rotation_degrees: i32, flip_horizontal: bool) -> FramefxResult<Self> {
        if rotation_degrees % 90 != 0 {
            return Err(FramefxError::validation(format!(
                "display rotation must be a multiple of 90 degrees, got {rotation_degrees}"
            )));
        }
        Ok(Self {
            rotation_degrees: rotation_degrees.rem_euclid(360),
            flip_horizontal,
        })
    }

    /// Return `true` when the transform leaves frames untouched.
    pub fn is_identity(self) -> bool {
        self.rotation_degrees == 0 && !self.flip_horizontal
    }
}

/// Immutable description of the input video track.
///
/// Derived once when a pipeline is built and used to size every downstream buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct VideoDescriptor {
    /// Natural (stored) width in pixels.
    pub width: u32,
    /// Natural (stored) height in pixels.
    pub height: u32,
    /// Total track duration.
    pub duration: MediaTime,
    /// Constant per-frame duration.
    pub frame_duration: MediaTime,
    /// Display orientation.
    pub transform: DisplayTransform,
}

impl VideoDescriptor {
    /// Check dimensions and durations.
    ///
    /// Dimensions must be even because frames travel as 4:2:0 planes.
    pub fn validate(&self) -> FramefxResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(FramefxError::validation(
                "video width/height must be non-zero",
            ));
        }
        if !self.width.is_multiple_of(2) || !self.height.is_multiple_of(2) {
            return Err(FramefxError::validation(
                "video width/height must be even (4:2:0 chroma subsampling)",
            ));
        }
        if !self.frame_duration.is_positive() {
            return Err(FramefxError::validation("frame duration must be positive"));
        }
        if !self.duration.is_positive() {
            return Err(FramefxError::validation("video duration must be positive"));
        }
        Ok(())
    }

    /// Number of RGB8 bytes in one composite frame.
    pub fn rgb_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }

    /// Expected frame count, assuming a constant frame duration.
    pub fn frame_count_hint(&self) -> u64 {
        if !self.frame_duration.is_positive() {
            return 0;
        }
        (self.duration.as_secs_f64() / self.frame_duration.as_secs_f64()).round() as u64
    }

    /// Output frame rate as `(num, den)`, the inverse of the frame duration.
    pub fn frame_rate(&self) -> (u32, u32) {
        let den = u32::try_from(self.frame_duration.value).unwrap_or(u32::MAX);
        (self.frame_duration.timescale, den.max(1))
    }
}

/// Opaque 8-bit RGB color in the output (sRGB) space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct Rgb8 {
    /// Red.
    pub r: u8,
    /// Green.
    pub g: u8,
    /// Blue.
    pub b: u8,
}

impl Rgb8 {
    /// Build a color from channels.
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Channels as an array.
    pub fn to_array(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

impl FromStr for Rgb8 {
    type Err = FramefxError;

    /// Parse `#RRGGBB` (leading `#` optional, case-insensitive).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let s = s.strip_prefix('#').unwrap_or(s);
        if s.len() != 6 || !s.is_ascii() {
            return Err(FramefxError::validation(
                "hex color must be #RRGGBB (case-insensitive)",
            ));
        }

        fn hex_byte(pair: &str) -> FramefxResult<u8> {
            u8::from_str_radix(pair, 16)
                .map_err(|_| FramefxError::validation(format!("invalid hex byte \"{pair}\"")))
        }

        Ok(Self {
            r: hex_byte(&s[0..2])?,
            g: hex_byte(&s[2..4])?,
            b: hex_byte(&s[4..6])?,
        })
    }
}

impl<'de> serde::Deserialize<'de> for Rgb8 {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(serde::Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Hex(String),
            Arr([u8; 3]),
            Obj { r: u8, g: u8, b: u8 },
        }

        match Repr::deserialize(deserializer)? {
            Repr::Hex(s) => s.parse().map_err(serde::de::Error::custom),
            Repr::Arr([r, g, b]) | Repr::Obj { r, g, b } => Ok(Self { r, g, b }),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
