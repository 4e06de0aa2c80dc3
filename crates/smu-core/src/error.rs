//! Error types for instrument sessions and drivers.
//!
//! `SmuError` is the single error type returned by sessions, drivers and the
//! sweep procedure. Using the `thiserror` crate, it separates the four ways an
//! instrument interaction can fail:
//!
//! - **`Communication`**: the link itself failed (port closed, write refused,
//!   connection reset).
//! - **`Timeout`**: the instrument did not answer a query within the session's
//!   response window.
//! - **`Parse`**: the instrument answered, but the text is not a number.
//! - **`Configuration`**: nothing to talk to (no address found, malformed
//!   address, invalid config values).
//!
//! None of these are retried or recovered inside the library; they surface
//! directly to the caller.

use std::time::Duration;
use thiserror::Error;

/// Convenience alias for results using the instrument error type.
pub type SmuResult<T> = std::result::Result<T, SmuError>;

/// Primary error type for instrument control.
#[derive(Error, Debug)]
pub enum SmuError {
    /// Link or transport failure.
    ///
    /// Occurs when a write cannot be delivered, a read fails, or the remote end
    /// closes the connection mid-transaction.
    ///
    /// **Error Type**: May be transient (cable glitch) or permanent (device
    /// unplugged). The instrument may be left partially configured.
    #[error("Communication error: {0}")]
    Communication(String),

    /// No response within the expected window.
    ///
    /// The command was written, but no terminated response line arrived before
    /// the session timeout expired.
    #[error("Timeout after {timeout:?} waiting for response to '{command}'")]
    Timeout {
        /// Query that went unanswered
        command: String,
        /// Response window that elapsed
        timeout: Duration,
    },

    /// Response text not convertible to a number.
    #[error("Failed to parse response '{response}': {reason}")]
    Parse {
        /// Raw response text as received (trimmed)
        response: String,
        /// Why conversion failed
        reason: String,
    },

    /// Configuration problem detected before or during connection.
    ///
    /// Covers "no instrument address found", unsupported address syntax and
    /// invalid driver or application configuration values.
    ///
    /// **Error Type**: Permanent - requires fixing the configuration or
    /// connecting an instrument.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl SmuError {
    /// Build a [`SmuError::Parse`] from the raw response and a reason.
    pub fn parse(response: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parse {
            response: response.into(),
            reason: reason.into(),
        }
    }

    /// Short category label used in structured log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            SmuError::Communication(_) => "communication",
            SmuError::Timeout { .. } => "timeout",
            SmuError::Parse { .. } => "parse",
            SmuError::Configuration(_) => "configuration",
        }
    }
}

impl From<std::io::Error> for SmuError {
    fn from(err: std::io::Error) -> Self {
        SmuError::Communication(err.to_string())
    }
}
