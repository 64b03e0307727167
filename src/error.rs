//! Error types for the gateway core.
//!
//! Only configuration problems, programming mistakes and collaborator (source/sink)
//! failures surface as [`GatewayError`]. Data-quality problems on the wire (checksum
//! mismatches, malformed markers, buffer overflow) never do: the assembler drops the
//! frame, counts it and keeps ingesting.
//!
//! ## Error Categories
//!
//! - **Configuration**: bad descriptor tables, unknown wire codes, invalid protocol
//!   settings, frames that do not match the configured table
//! - **Programming**: invalid arguments supplied by the embedding application
//! - **Transport**: byte source, result sink, file and channel failures
//!
//! ```rust
//! use serialgate::{ErrorCategory, GatewayError};
//!
//! let error = GatewayError::config("protocol", "length field size must be 1 or 2");
//! assert_eq!(error.category(), ErrorCategory::Configuration);
//! assert!(!error.is_retryable());
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for gateway operations.
pub type Result<T, E = GatewayError> = std::result::Result<T, E>;

/// Broad classification of a [`GatewayError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// The configuration does not fit the data, or cannot be decoded.
    Configuration,
    /// The caller broke an API contract.
    Programming,
    /// A collaborator (byte source, sink, filesystem, channel) failed.
    Transport,
}

/// Main error type for gateway operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum GatewayError {
    #[error("Invalid {context} configuration: {details}")]
    Config { context: String, details: String },

    #[error("Unknown {what} code {code:#04x}")]
    UnknownCode { what: &'static str, code: u8 },

    #[error("Field table has {count} fields (maximum {max})")]
    TooManyFields { count: usize, max: usize },

    #[error("Field table has no fields")]
    EmptyFieldTable,

    #[error("Data offset {data_offset} is beyond frame of {frame_len} bytes")]
    DataOffsetBeyondFrame { data_offset: usize, frame_len: usize },

    #[error("Invalid argument: {details}")]
    InvalidArgument { details: String },

    #[error("Byte source failed: {reason}")]
    Source {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Result sink failed: {reason}")]
    Sink {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Configuration file error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error in {context}: {details}")]
    Parse { context: String, details: String },

    #[error("Channel '{channel}' closed")]
    ChannelClosed { channel: &'static str },
}

impl GatewayError {
    /// Classify the error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            GatewayError::Config { .. }
            | GatewayError::UnknownCode { .. }
            | GatewayError::TooManyFields { .. }
            | GatewayError::EmptyFieldTable
            | GatewayError::DataOffsetBeyondFrame { .. }
            | GatewayError::Parse { .. } => ErrorCategory::Configuration,
            GatewayError::InvalidArgument { .. } => ErrorCategory::Programming,
            GatewayError::Source { .. }
            | GatewayError::Sink { .. }
            | GatewayError::File { .. }
            | GatewayError::ChannelClosed { .. } => ErrorCategory::Transport,
        }
    }

    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::Source { .. } => true,
            GatewayError::Sink { .. } => true,
            GatewayError::Config { .. } => false,
            GatewayError::UnknownCode { .. } => false,
            GatewayError::TooManyFields { .. } => false,
            GatewayError::EmptyFieldTable => false,
            GatewayError::DataOffsetBeyondFrame { .. } => false,
            GatewayError::InvalidArgument { .. } => false,
            GatewayError::File { .. } => false,
            GatewayError::Parse { .. } => false,
            GatewayError::ChannelClosed { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            GatewayError::Config { .. } | GatewayError::UnknownCode { .. } => vec![
                "Check the protocol settings against the attached equipment",
                "Verify the configuration was produced by a compatible tool",
            ],
            GatewayError::TooManyFields { .. } => {
                vec!["Split the field map or drop unused fields", "Check the field count byte"]
            }
            GatewayError::EmptyFieldTable => vec!["Deliver a field table before extracting"],
            GatewayError::DataOffsetBeyondFrame { .. } => vec![
                "Check the data offset against the frame layout",
                "Verify the protocol framing produces complete frames",
            ],
            GatewayError::InvalidArgument { .. } => vec!["Fix the calling code"],
            GatewayError::Source { .. } => vec![
                "Check the serial port is still attached",
                "Verify line settings (baud rate, parity, stop bits)",
            ],
            GatewayError::Sink { .. } => vec![
                "Check the downstream consumer is still running",
                "Increase the sink buffer size",
            ],
            GatewayError::File { .. } => {
                vec!["Check the file exists and is readable", "Check file permissions"]
            }
            GatewayError::Parse { .. } => {
                vec!["Check the configuration syntax", "Compare against a known-good file"]
            }
            GatewayError::ChannelClosed { .. } => vec!["Restart the gateway"],
        }
    }

    /// Helper constructor for configuration errors.
    pub fn config(context: impl Into<String>, details: impl Into<String>) -> Self {
        GatewayError::Config { context: context.into(), details: details.into() }
    }

    /// Helper constructor for invalid arguments.
    pub fn invalid_argument(details: impl Into<String>) -> Self {
        GatewayError::InvalidArgument { details: details.into() }
    }

    /// Helper constructor for byte source failures.
    pub fn source_failed(reason: impl Into<String>) -> Self {
        GatewayError::Source { reason: reason.into(), source: None }
    }

    /// Helper constructor for sink failures.
    pub fn sink_failed(reason: impl Into<String>) -> Self {
        GatewayError::Sink { reason: reason.into(), source: None }
    }

    /// Helper constructor for file errors with path context.
    pub fn file_error(path: PathBuf, source: std::io::Error) -> Self {
        GatewayError::File { path, source }
    }
}

impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> Self {
        GatewayError::Source { reason: err.to_string(), source: Some(Box::new(err)) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
          #[test]
          fn error_messages_carry_their_context(
            context in "[a-z]{1,12}",
            details in ".*",
            code in any::<u8>(),
            data_offset in 0usize..256,
            frame_len in 0usize..256
          ) {
            let config_msg = GatewayError::config(context.clone(), details.clone()).to_string();
            prop_assert!(config_msg.contains(&context));
            prop_assert!(config_msg.contains(&details));

            let code_msg = GatewayError::UnknownCode { what: "checksum kind", code }.to_string();
            let code_hex = format!("{:#04x}", code);
            prop_assert!(code_msg.contains(&code_hex));

            let offset_msg =
                GatewayError::DataOffsetBeyondFrame { data_offset, frame_len }.to_string();
            prop_assert!(offset_msg.contains(&data_offset.to_string()));
            prop_assert!(offset_msg.contains(&frame_len.to_string()));
          }

          #[test]
          fn io_errors_convert_to_retryable_source_errors(reason in ".*") {
            let io_err = std::io::Error::other(reason.clone());
            let converted: GatewayError = io_err.into();
            prop_assert!(converted.is_retryable());
            prop_assert_eq!(converted.category(), ErrorCategory::Transport);
            let source = std::error::Error::source(&converted);
            prop_assert!(source.is_some());
            prop_assert!(source.map(|s| s.to_string().contains(&reason)).unwrap_or(false));
          }
        }
    }

    #[test]
    fn categories_follow_error_taxonomy() {
        assert_eq!(GatewayError::EmptyFieldTable.category(), ErrorCategory::Configuration);
        assert_eq!(
            GatewayError::TooManyFields { count: 65, max: 64 }.category(),
            ErrorCategory::Configuration
        );
        assert_eq!(GatewayError::invalid_argument("x").category(), ErrorCategory::Programming);
        assert_eq!(GatewayError::sink_failed("x").category(), ErrorCategory::Transport);
        assert_eq!(
            GatewayError::ChannelClosed { channel: "frames" }.category(),
            ErrorCategory::Transport
        );
    }

    #[test]
    fn error_traits_validation() {
        fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<GatewayError>();

        let error = GatewayError::source_failed("port vanished");
        let _: &dyn std::error::Error = &error;
    }

    #[test]
    fn recovery_suggestions_are_provided() {
        let errors = [
            GatewayError::config("nmea", "too many filters"),
            GatewayError::EmptyFieldTable,
            GatewayError::source_failed("eof"),
            GatewayError::ChannelClosed { channel: "frames" },
        ];
        for error in &errors {
            let suggestions = error.recovery_suggestions();
            assert!(!suggestions.is_empty());
            assert!(suggestions.iter().all(|s| s.len() > 5));
        }
    }
}
