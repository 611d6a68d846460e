// Module: Script
// Port over the embedded scripting engine that evaluates user expressions.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use anyhow::Result;

/// Severity of a message emitted by user scripts (console.log and friends).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptLogLevel {
    Info,
    Warn,
    Error,
}

impl fmt::Display for ScriptLogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warn => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// Receiver for script log messages. Invoked from within evaluations.
pub type LogSink = Arc<dyn Fn(ScriptLogLevel, &str) + Send + Sync>;

/// Contract the orchestra requires from an embedded script runtime.
///
/// Any implementation suffices: the orchestra treats evaluation as a black
/// box that turns a source string into the string value of its last
/// expression. Scopes form a stack; the flow driver pushes one per sub-flow
/// and pops it on every exit path.
pub trait ScriptEngine: Send + Sync {
    /// Resets all global state. Called once at the start of each flow run.
    fn init(&self) -> Result<()>;

    /// Evaluates `script` and returns its last expression as a string.
    ///
    /// `env` is a set of extra bindings visible to this evaluation,
    /// `source_name` labels the script in engine diagnostics, and
    /// `run_in_sub_scope` isolates the evaluation in a throwaway scope.
    fn evaluate(
        &self,
        script: &str,
        env: &HashMap<String, String>,
        source_name: &str,
        run_in_sub_scope: bool,
    ) -> Result<String>;

    fn enter_scope(&self);

    fn leave_scope(&self);

    /// Registers (or clears) the receiver for script log messages.
    /// The latest registration wins.
    fn set_log_sink(&self, sink: Option<LogSink>);
}

/// Escapes a user string for embedding in a generated single-quoted script
/// literal. Backslashes first, then quotes.
pub fn sanitize(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}
