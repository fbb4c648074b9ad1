use crate::foundation::error::FailureReason;

/// Lifecycle of one pipeline run.
///
/// `Idle -> Reading -> Finishing -> Completed`, with `Failed` and `Cancelled` reachable from any
/// non-terminal state. Only the driver thread changes it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// Constructed, not started.
    Idle,
    /// Pumping frames.
    Reading,
    /// Source exhausted; draining the encoder and finalizing the sink.
    Finishing,
    /// Output finalized.
    Completed,
    /// Ended with a failure.
    Failed,
    /// Ended by cancellation.
    Cancelled,
}

impl PipelineState {
    /// Return `true` for `Completed`, `Failed` and `Cancelled`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Return `true` when `self -> next` is a legal transition.
    pub fn can_transition_to(self, next: Self) -> bool {
        use PipelineState::*;
        match (self, next) {
            (Idle, Reading) | (Reading, Finishing) | (Finishing, Completed) => true,
            (from, Failed | Cancelled) => !from.is_terminal(),
            _ => false,
        }
    }

    /// Move to `next`, rejecting illegal transitions.
    pub fn transition(&mut self, next: Self) -> Result<(), FailureReason> {
        if !self.can_transition_to(next) {
            return Err(FailureReason::Internal(format!(
                "illegal pipeline transition {self:?} -> {next:?}"
            )));
        }
        tracing::debug!(from = ?*self, to = ?next, "pipeline state");
        *self = next;
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/pipeline/state.rs"]
mod tests;
