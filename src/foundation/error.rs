/// Convenience result type used across framefx.
pub type FramefxResult<T> = Result<T, FramefxError>;

/// Top-level error taxonomy used by library APIs.
#[derive(thiserror::Error, Debug)]
pub enum FramefxError {
    /// Invalid user-provided configuration or data.
    #[error("validation error: {0}")]
    Validation(String),

    /// Fatal errors raised while building a pipeline, before any frame is read.
    #[error("setup error: {0}")]
    Setup(#[from] SetupError),

    /// Errors while transforming a single frame.
    #[error("frame error: {0}")]
    Frame(String),

    /// Errors reported by an encoder collaborator.
    #[error("encode error: {0}")]
    Encode(String),

    /// Errors reported by a sample sink (container writer).
    #[error("sink error: {0}")]
    Sink(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FramefxError {
    /// Build a [`FramefxError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`FramefxError::Frame`] value.
    pub fn frame(msg: impl Into<String>) -> Self {
        Self::Frame(msg.into())
    }

    /// Build a [`FramefxError::Encode`] value.
    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    /// Build a [`FramefxError::Sink`] value.
    pub fn sink(msg: impl Into<String>) -> Self {
        Self::Sink(msg.into())
    }
}

/// Setup failures. All of them are fatal and surface before the first frame is read.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SetupError {
    /// The input file has no video track.
    #[error("input has no video track")]
    MissingVideoTrack,
    /// The input could not be opened for reading.
    #[error("failed to open reader: {0}")]
    FailedToOpenReader(String),
    /// The output could not be opened for writing.
    #[error("failed to open writer: {0}")]
    FailedToOpenWriter(String),
    /// Render targets, pools or encoder sessions could not be allocated.
    #[error("failed to allocate pipeline resources: {0}")]
    ResourceAllocation(String),
    /// The overlay or background asset is missing or unreadable.
    #[error("overlay asset unavailable: {0}")]
    OverlayAsset(String),
}

/// Typed reason carried by the terminal failure event of a pipeline run.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The source refused to start reading.
    #[error("failed to start reading")]
    FailedToStartReading,
    /// The sink refused to start writing.
    #[error("failed to start writing")]
    FailedToStartWriting,
    /// The source stopped with an error.
    #[error("failed to read: {0}")]
    FailedToRead(String),
    /// Reading was cancelled, either by the source or through `cancel()`.
    #[error("reading cancelled")]
    ReadingCancelled,
    /// The source ran dry without reaching a terminal status.
    #[error("inconsistent source state at end of stream")]
    InconsistentState,
    /// A decoded frame carried no pixel data.
    #[error("missing frame image buffer")]
    MissingFrameImageBuffer,
    /// The segmentation engine produced no mask for a decoded frame.
    #[error("missing segmentation result")]
    MissingSegmentationResult,
    /// Converting the composite into the encoder's input failed.
    #[error("color conversion failed: {0}")]
    ColorConversion(String),
    /// The analysis engine failed for a frame.
    #[error("analysis failed: {0}")]
    Analysis(String),
    /// The encoder reported a failure status for a frame.
    #[error("encoder failed with status {status}: {detail}")]
    EncoderFailed {
        /// Encoder-specific status code.
        status: i32,
        /// Human readable detail.
        detail: String,
    },
    /// The sink rejected a sample or failed to finalize.
    #[error("failed to write: {0}")]
    FailedToWrite(String),
    /// Unexpected internal condition (closed channels, panicked workers).
    #[error("internal pipeline error: {0}")]
    Internal(String),
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
