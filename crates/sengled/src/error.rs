//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` variants into user-facing errors with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use sengled_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const UNSUPPORTED: i32 = 5;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the Sengled broker: {reason}")]
    #[diagnostic(
        code(sengled::connection_failed),
        help(
            "Check your network, raise connect_timeout in the config file,\n\
             or retry with --target http to bypass the broker."
        )
    )]
    ConnectionFailed { reason: String },

    #[error("Timed out after {seconds}s")]
    #[diagnostic(
        code(sengled::timeout),
        help("Increase the HTTP timeout with --timeout or `timeout` in the config file.")
    )]
    Timeout { seconds: u64 },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(sengled::auth_failed),
        help(
            "Verify the account email and password.\n\
             Run: sengled config set-password"
        )
    )]
    AuthFailed { message: String },

    #[error("No {field} configured")]
    #[diagnostic(
        code(sengled::no_credentials),
        help(
            "Pass --email/--password, set SENGLED_EMAIL/SENGLED_PASSWORD,\n\
             or add them to the config file (see: sengled config path)."
        )
    )]
    NoCredentials { field: &'static str },

    #[error("Keyring unavailable: {reason}")]
    #[diagnostic(code(sengled::keyring))]
    Keyring { reason: String },

    // ── Devices ──────────────────────────────────────────────────────
    #[error("Device '{identifier}' not found")]
    #[diagnostic(
        code(sengled::not_found),
        help("Run: sengled devices list to see available bulbs")
    )]
    NotFound { identifier: String },

    #[error("{message}")]
    #[diagnostic(
        code(sengled::unsupported),
        help("Run: sengled devices get <device> to see what this bulb supports")
    )]
    Unsupported { message: String },

    // ── API ──────────────────────────────────────────────────────────
    #[error("Sengled cloud error: {message}")]
    #[diagnostic(code(sengled::api_error))]
    ApiError { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(sengled::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(code(sengled::config))]
    Config(Box<figment::Error>),

    #[error("Session store error: {message}")]
    #[diagnostic(code(sengled::session_store))]
    Store { message: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Could not render config: {0}")]
    #[diagnostic(code(sengled::toml))]
    Toml(#[from] toml::ser::Error),
}

impl From<figment::Error> for CliError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Unsupported { .. } => exit_code::UNSUPPORTED,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Authentication { message } => Self::AuthFailed { message },
            CoreError::Connection { reason } => Self::ConnectionFailed { reason },
            CoreError::AlreadyConnected => Self::ConnectionFailed {
                reason: err.to_string(),
            },
            CoreError::Timeout { timeout_secs } => Self::Timeout {
                seconds: timeout_secs,
            },
            CoreError::DeviceNotFound { device_id } => Self::NotFound {
                identifier: device_id,
            },
            CoreError::UnsupportedAttribute { .. } => Self::Unsupported {
                message: err.to_string(),
            },
            CoreError::InvalidTarget { value } => Self::Validation {
                field: "target".into(),
                reason: format!("'{value}' (expected mqtt or http)"),
            },
            CoreError::Api { message, status } => Self::ApiError {
                message: match status {
                    Some(code) => format!("{message} (HTTP {code})"),
                    None => message,
                },
            },
            CoreError::Store { message } => Self::Store { message },
            CoreError::Config { message } => Self::Validation {
                field: "config".into(),
                reason: message,
            },
        }
    }
}
