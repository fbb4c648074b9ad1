//! Per-frame analysis: the result data model and the two variant adapters.

/// Variant-agnostic analyzer contract.
pub mod analyzer;
/// Detection adapter (regions + confidence).
pub mod detection;
/// Engines replaying offline analysis (mask images, region tracks).
pub mod replay;
/// Analysis result data model.
pub mod result;
/// Segmentation adapter (foreground masks) and the chroma-key engine.
pub mod segmentation;
