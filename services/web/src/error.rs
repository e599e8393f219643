//! services/web/src/error.rs
//!
//! Defines the primary error type for the entire web service.

use crate::config::ConfigError;
use marketplace_core::otp::OtpError;
use marketplace_core::ports::PortError;

/// The primary error type for the `web` service.
#[derive(Debug, thiserror::Error)]
pub enum WebError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// The one-time passcode flow was driven out of order.
    #[error("OTP Error: {0}")]
    Otp(#[from] OtpError),

    /// Represents an error from the HTTP client library.
    #[error("HTTP Client Error: {0}")]
    Http(#[from] reqwest::Error),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
