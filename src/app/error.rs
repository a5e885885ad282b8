use std::time::Duration;
use thiserror::Error;

/// Failures a caller can get back from rendering one block of policy text.
///
/// None of these are fatal to the host process; each carries enough context
/// to be shown to whoever edited the policy.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Failed to launch {program}: {reason}")]
    Launch { program: String, reason: String },

    #[error("`{command_line}` did not finish within {}ms and was killed", timeout.as_millis())]
    Timeout {
        command_line: String,
        timeout: Duration,
    },

    #[error("`{command_line}` exited with {status}")]
    NonZeroExit {
        command_line: String,
        status: String,
        stderr: String,
    },
}
