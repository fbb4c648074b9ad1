pub(crate) fn mul_div255_u16(x: u16, y: u16) -> u16 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u16
}

/// Straight-alpha "over" for one 8-bit channel: `src * a + dst * (1 - a)`.
pub(crate) fn blend_over_u8(dst: u8, src: u8, alpha: u8) -> u8 {
    let a = u16::from(alpha);
    let inv = 255 - a;
    (mul_div255_u16(u16::from(src), a) + mul_div255_u16(u16::from(dst), inv)).min(255) as u8
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/math.rs"]
mod tests;
