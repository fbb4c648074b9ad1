use crate::foundation::error::{FramefxError, FramefxResult};

/// What the driver does when a frame cannot be encoded or written.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncoderFailurePolicy {
    /// End the run with the failure.
    #[default]
    Fail,
    /// Report a `SampleDropped` event and keep going without that sample.
    DropSample,
}

/// Progress preview settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PreviewOpts {
    /// Attach a downscaled copy of each composite to its progress event.
    pub enabled: bool,
    /// Longest preview edge in pixels.
    pub max_dim: u32,
}

impl Default for PreviewOpts {
    fn default() -> Self {
        Self {
            enabled: true,
            max_dim: 256,
        }
    }
}

/// Options controlling a pipeline run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PipelineOpts {
    /// Composite buffers that may be held by the encoder at once. The driver waits for a release
    /// before compositing when all are out.
    pub max_in_flight: usize,
    /// Progress previews.
    pub preview: PreviewOpts,
    /// Encoder and writer failure handling.
    pub encoder_failure: EncoderFailurePolicy,
    /// Capacity of the bounded event channel.
    pub event_capacity: usize,
}

impl Default for PipelineOpts {
    fn default() -> Self {
        Self {
            max_in_flight: 4,
            preview: PreviewOpts::default(),
            encoder_failure: EncoderFailurePolicy::default(),
            event_capacity: 64,
        }
    }
}

impl PipelineOpts {
    /// Check option ranges.
    pub fn validate(&self) -> FramefxResult<()> {
        if self.max_in_flight == 0 {
            return Err(FramefxError::validation("max_in_flight must be >= 1"));
        }
        if self.event_capacity == 0 {
            return Err(FramefxError::validation("event_capacity must be >= 1"));
        }
        if self.preview.enabled && self.preview.max_dim == 0 {
            return Err(FramefxError::validation(
                "preview max_dim must be >= 1 when previews are enabled",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/pipeline/opts.rs"]
mod tests;
