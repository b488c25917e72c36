//! Finite State Machine for a single rolling update run

use serde::{Deserialize, Serialize};

/// Run state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Initial state
    Start,

    /// Evaluating the deploy condition
    GateCheck,

    /// Condition not met, nothing to do
    Skipped,

    /// Control plane handle obtained
    CredentialsResolved,

    /// Kubeconfig written
    ConfigWritten,

    /// kubectl accepted the new image
    UpdateApplied,

    /// Run finished successfully
    Done,

    /// Run aborted
    Failed,
}

/// Run event
#[derive(Debug, Clone)]
pub enum RunEvent {
    /// Start evaluating the deploy condition
    CheckGate,

    /// Deploy condition not met
    GateClosed,

    /// Deploy condition met and credentials resolved
    CredentialsResolved,

    /// Kubeconfig written
    ConfigWritten,

    /// Update command succeeded
    UpdateApplied,

    /// Run completed
    Finish,

    /// A stage failed
    Fail(String),
}

/// Run FSM
#[derive(Debug, Clone)]
pub struct RunFsm {
    state: RunState,
    error: Option<String>,
}

impl RunFsm {
    /// Create a new FSM in start state
    pub fn new() -> Self {
        Self {
            state: RunState::Start,
            error: None,
        }
    }

    /// Get current state
    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Get error message if any
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Check if the run reached a final state
    pub fn is_terminal(&self) -> bool {
        matches!(self.state, RunState::Done | RunState::Failed)
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: RunEvent) -> Result<(), String> {
        let new_state = match (&self.state, &event) {
            (RunState::Start, RunEvent::CheckGate) => RunState::GateCheck,

            // From GateCheck
            (RunState::GateCheck, RunEvent::GateClosed) => RunState::Skipped,
            (RunState::GateCheck, RunEvent::CredentialsResolved) => RunState::CredentialsResolved,

            (RunState::CredentialsResolved, RunEvent::ConfigWritten) => RunState::ConfigWritten,
            (RunState::ConfigWritten, RunEvent::UpdateApplied) => RunState::UpdateApplied,

            (RunState::Skipped, RunEvent::Finish) | (RunState::UpdateApplied, RunEvent::Finish) => {
                RunState::Done
            }

            // Any stage in flight may fail
            (
                RunState::GateCheck | RunState::CredentialsResolved | RunState::ConfigWritten,
                RunEvent::Fail(err),
            ) => {
                self.error = Some(err.clone());
                RunState::Failed
            }

            // Invalid transitions
            (state, event) => {
                return Err(format!("Invalid transition: {:?} -> {:?}", state, event));
            }
        };

        self.state = new_state;
        Ok(())
    }
}

impl Default for RunFsm {
    fn default() -> Self {
        Self::new()
    }
}
