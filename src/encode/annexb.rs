//! H.264 Annex-B access-unit framing.

/// NAL unit type of an access unit delimiter.
pub const NAL_AUD: u8 = 9;
/// NAL unit type of an IDR slice.
pub const NAL_IDR: u8 = 5;

/// One complete access unit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessUnit {
    /// Annex-B bytes, start codes included.
    pub data: Vec<u8>,
    /// Return `true` when the unit carries an IDR slice.
    pub is_keyframe: bool,
}

impl AccessUnit {
    fn new(data: Vec<u8>) -> Self {
        let is_keyframe = nal_types(&data).any(|t| t == NAL_IDR);
        Self { data, is_keyframe }
    }
}

/// Splits a streamed Annex-B elementary stream into access units.
///
/// Units are delimited by AUD NAL units, so the stream must carry one in front of every access
/// unit (`h264_metadata=aud=insert`). Input may arrive in arbitrary chunks.
#[derive(Debug, Default)]
pub struct AccessUnitSplitter {
    buf: Vec<u8>,
    scan: usize,
}

impl AccessUnitSplitter {
    /// Empty splitter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes; completed units are appended to `out`.
    pub fn push(&mut self, data: &[u8], out: &mut Vec<AccessUnit>) {
        self.buf.extend_from_slice(data);
        let mut i = self.scan;
        while i + 3 < self.buf.len() {
            if self.buf[i] != 0 || self.buf[i + 1] != 0 || self.buf[i + 2] != 1 {
                i += 1;
                continue;
            }
            let start = if i > 0 && self.buf[i - 1] == 0 { i - 1 } else { i };
            if self.buf[i + 3] & 0x1f == NAL_AUD && start > 0 {
                let rest = self.buf.split_off(start);
                let unit = std::mem::replace(&mut self.buf, rest);
                out.push(AccessUnit::new(unit));
                i = 3;
                continue;
            }
            i += 3;
        }
        self.scan = i;
    }

    /// Flush the trailing unit at end of stream.
    pub fn finish(&mut self) -> Option<AccessUnit> {
        self.scan = 0;
        let data = std::mem::take(&mut self.buf);
        if nal_types(&data).next().is_none() {
            return None;
        }
        Some(AccessUnit::new(data))
    }
}

/// NAL unit types in order of appearance.
pub fn nal_types(data: &[u8]) -> impl Iterator<Item = u8> + '_ {
    data.windows(4)
        .filter(|w| w[0] == 0 && w[1] == 0 && w[2] == 1)
        .map(|w| w[3] & 0x1f)
}

#[cfg(test)]
#[path = "../../tests/unit/encode/annexb.rs"]
mod tests;
