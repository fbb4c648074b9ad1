//! Compositing: color conversion, the composite backends, and the output frame pool.

/// Video-range BT.709 YCbCr to RGB conversion.
pub mod color;
/// Composite backend contract and the CPU compositor.
pub mod compositor;
/// Pooled composite frames.
pub mod frame_pool;
