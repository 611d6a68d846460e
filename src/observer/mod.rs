// Module: Observer
// Lifecycle callbacks the host supplies at orchestra construction.

use crate::command::{Command, CommandMetadata};
use crate::errors::OrchestraError;

/// What the flow driver should do after a command fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorResolution {
    /// Proceed with the next command.
    Continue,
    /// Terminate the flow (sub-flows re-raise to their caller).
    Fail,
}

/// Observer of flow execution, typically a UI reporter.
///
/// Per command the stream is: `on_command_start`, zero or more
/// `on_command_metadata_update`s, then exactly one of `on_command_complete`
/// / `on_command_skipped` / `on_command_failed`. All hooks default to
/// no-ops; failures default to terminating the flow.
pub trait FlowObserver: Send + Sync {
    fn on_flow_start(&self, _commands: &[Command]) {}

    fn on_command_start(&self, _index: usize, _command: &Command) {}

    fn on_command_complete(&self, _index: usize, _command: &Command) {}

    fn on_command_failed(
        &self,
        _index: usize,
        _command: &Command,
        _error: &OrchestraError,
    ) -> ErrorResolution {
        ErrorResolution::Fail
    }

    fn on_command_skipped(&self, _index: usize, _command: &Command) {}

    /// Fired for each nested command before a repeat iteration re-runs it.
    fn on_command_reset(&self, _command: &Command) {}

    fn on_command_metadata_update(&self, _command: &Command, _metadata: &CommandMetadata) {}
}

/// Observer that ignores everything (and thus fails flows on first error).
pub struct NoopObserver;

impl FlowObserver for NoopObserver {}
