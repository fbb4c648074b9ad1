//! Video-range BT.709 YCbCr to RGB conversion used by the compositor.
//!
//! The transfer step is the BT.709 inverse OETF (linear below 0.081, power `1 / 0.45` above),
//! not the sRGB curve. The constants below are part of the output contract; changing any of
//! them changes every rendered pixel.

/// Luma expansion from the 16..=235 video range.
pub const Y_SCALE: f32 = 255.0 / (235.0 - 16.0);
/// Chroma expansion from the 16..=240 video range.
pub const UV_SCALE: f32 = 255.0 / (240.0 - 16.0);
/// Normalized luma offset.
pub const Y_OFFSET: f32 = 16.0 / 255.0;

/// How linear results are stored into the 8-bit render target.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TargetEncoding {
    /// sRGB-encoded target: linear values pass through the sRGB OETF on store.
    #[default]
    Srgb,
    /// Linear target: values are stored as-is.
    Linear,
}

/// BT.709 non-linear to linear for one normalized channel.
#[inline]
pub fn bt709_nonlinear_to_linear(v: f32) -> f32 {
    if v < 0.081 {
        v * (1.0 / 4.5)
    } else {
        let a = 0.099f32;
        let gamma = 1.0f32 / 0.45;
        ((v + a) * (1.0 / (1.0 + a))).powf(gamma)
    }
}

/// Convert normalized video-range `(luma, cb, cr)` in `[0, 1]` to linear RGB in `[0, 1]`.
#[inline]
pub fn ycbcr_to_linear_rgb(luma: f32, cb: f32, cr: f32) -> [f32; 3] {
    let y = luma - Y_OFFSET;
    let u = cb - 0.5;
    let v = cr - 0.5;

    let r = y * Y_SCALE + v * UV_SCALE * 1.5748;
    let g = y * Y_SCALE - u * UV_SCALE * 1.8556 * 0.101 - v * UV_SCALE * 1.5748 * 0.2973;
    let b = y * Y_SCALE + u * UV_SCALE * 1.8556;

    [
        bt709_nonlinear_to_linear(r.clamp(0.0, 1.0)),
        bt709_nonlinear_to_linear(g.clamp(0.0, 1.0)),
        bt709_nonlinear_to_linear(b.clamp(0.0, 1.0)),
    ]
}

/// sRGB OETF for one linear channel in `[0, 1]`.
#[inline]
pub fn linear_to_srgb(v: f32) -> f32 {
    if v <= 0.003_130_8 {
        v * 12.92
    } else {
        1.055 * v.powf(1.0 / 2.4) - 0.055
    }
}

#[inline]
fn quantize(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Normalize an 8-bit chroma sample so that the neutral code 128 lands exactly on 0.5.
#[inline]
pub fn chroma8_to_unit(c: u8) -> f32 {
    0.5 + (f32::from(c) - 128.0) / 255.0
}

/// Convert one 8-bit NV12 sample triple into an 8-bit RGB pixel.
#[inline]
pub fn ycbcr8_to_rgb8(y: u8, cb: u8, cr: u8, encoding: TargetEncoding) -> [u8; 3] {
    let lin = ycbcr_to_linear_rgb(f32::from(y) / 255.0, chroma8_to_unit(cb), chroma8_to_unit(cr));
    match encoding {
        TargetEncoding::Srgb => lin.map(|c| quantize(linear_to_srgb(c))),
        TargetEncoding::Linear => lin.map(quantize),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/color.rs"]
mod tests;
