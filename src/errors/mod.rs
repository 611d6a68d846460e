// Module: Errors
// Failure classification for flow execution.

use thiserror::Error;

use crate::hierarchy::ViewHierarchy;

/// Errors raised while executing a flow.
///
/// Lookup and assertion failures carry the selector/condition description and
/// the view-hierarchy snapshot taken at the moment of failure, so hosts can
/// render what the screen looked like. `CommandSkipped` is an internal control
/// signal, never reported to the host as a failure.
#[derive(Debug, Error)]
pub enum OrchestraError {
    /// No element satisfied the selector before the lookup deadline.
    #[error("Element not found: {description}")]
    ElementNotFound {
        description: String,
        hierarchy: ViewHierarchy,
    },

    /// A non-optional assertion condition evaluated to false.
    #[error("Assertion failed: {description}")]
    AssertionFailure {
        description: String,
        hierarchy: ViewHierarchy,
    },

    /// The driver-side outgoing-request assertion did not match.
    #[error("Outgoing request assertion failed: {description}")]
    OutgoingRequestAssertionFailure { description: String },

    /// A driver error occurred while preparing app state
    /// (clearing state, keychain, or permissions).
    #[error("Unable to clear state for app '{app_id}'")]
    UnableToClearState { app_id: String },

    /// The driver failed to launch the app.
    #[error("Unable to launch app '{app_id}': {cause}")]
    UnableToLaunchApp { app_id: String, cause: String },

    /// The matched element exposes no text to copy.
    #[error("Unable to copy text from element: {description}")]
    UnableToCopyTextFrom { description: String },

    /// The driver cannot type non-ASCII text.
    #[error("Unicode input is not supported by this device: '{text}'")]
    UnicodeNotSupported { text: String },

    /// Malformed command arguments (tap point string, swipe shape, ...).
    #[error("Invalid command: {message}")]
    InvalidCommand { message: String },

    /// Internal signal: the command decided not to run.
    /// Routed to `on_command_skipped`, never to `on_command_failed`.
    #[error("Command skipped")]
    CommandSkipped,

    /// Unhandled driver or script-engine error, propagated as-is.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, OrchestraError>;
