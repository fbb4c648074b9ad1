//! The frame pipeline engine: driver, state machine, events and ordering.

/// Pipeline driver, run handle and cancellation.
pub mod driver;
/// Events and run reports.
pub mod events;
/// Pipeline options.
pub mod opts;
/// Submission-order reorder window.
pub mod reorder;
/// Pipeline lifecycle states.
pub mod state;
