//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors with
//! actionable help text and process exit codes.

use miette::Diagnostic;
use thiserror::Error;

use fwpair_config::ConfigError;
use fwpair_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
    /// The run halted or finished with failures.
    pub const INCOMPLETE: i32 = 9;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to controller at {url}")]
    #[diagnostic(
        code(fwpair::connection_failed),
        help(
            "Check that the controller is reachable: {reason}\n\
             Self-signed certificate? Try --insecure or set ca_cert in the profile."
        )
    )]
    ConnectionFailed { url: String, reason: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(fwpair::auth_failed),
        help(
            "Verify the username and password.\n\
             Run: fwpair config set-secret password --profile {profile}"
        )
    )]
    AuthFailed { profile: String, message: String },

    #[error("No {secret} configured for profile '{profile}'")]
    #[diagnostic(
        code(fwpair::no_credentials),
        help(
            "Store it with: fwpair config set-secret --profile {profile}\n\
             or export the matching FWPAIR_* environment variable."
        )
    )]
    NoCredentials { profile: String, secret: String },

    // ── Run ──────────────────────────────────────────────────────────
    #[error("Timed out waiting for {operation} after {seconds}s")]
    #[diagnostic(
        code(fwpair::timeout),
        help("Raise the poll max_wait for this stage in the profile's [poll] section.")
    )]
    Timeout { operation: String, seconds: u64 },

    #[error("API error: {message}")]
    #[diagnostic(code(fwpair::api_error))]
    Api { message: String, status: Option<u16> },

    #[error("{message}")]
    #[diagnostic(
        code(fwpair::template),
        help("Pass missing values with --param KEY=VALUE or the profile's [parameters] table.")
    )]
    Template { message: String },

    #[error("{message}")]
    #[diagnostic(code(fwpair::plan), help("Fix the references in objects.json."))]
    Plan { message: String },

    #[error("Precondition not met: {message}")]
    #[diagnostic(code(fwpair::precondition))]
    Precondition { message: String },

    #[error("Run stopped at stage '{stage}': {reason}")]
    #[diagnostic(
        code(fwpair::run_halted),
        help("Fix the cause and re-run; completed work is detected and kept.")
    )]
    RunHalted { stage: String, reason: String },

    #[error("Run finished with failures: {summary}")]
    #[diagnostic(code(fwpair::run_partial))]
    RunPartial { summary: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(fwpair::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(fwpair::profile_not_found),
        help("Available profiles: {available}")
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No controller configured")]
    #[diagnostic(
        code(fwpair::no_config),
        help(
            "Add a profile to {path}\n\
             or pass --controller and --username."
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(fwpair::config))]
    Config(Box<figment::Error>),

    #[error("Keyring error: {reason}")]
    #[diagnostic(code(fwpair::keyring))]
    Keyring { reason: String },

    // ── Email ────────────────────────────────────────────────────────
    #[error("Could not send report email: {reason}")]
    #[diagnostic(
        code(fwpair::email),
        help("Check the [profiles.<name>.email] section and the SMTP password.")
    )]
    Email { reason: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid run result: {0}")]
    #[diagnostic(
        code(fwpair::json),
        help("Expected a file written by `fwpair run --save`.")
    )]
    Json(#[from] serde_json::Error),
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
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Precondition { .. } => exit_code::CONFLICT,
            Self::RunHalted { .. } | Self::RunPartial { .. } => exit_code::INCOMPLETE,
            Self::Template { .. }
            | Self::Plan { .. }
            | Self::Validation { .. }
            | Self::ProfileNotFound { .. }
            | Self::NoConfig { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => Self::ConnectionFailed { url, reason },
            CoreError::Authentication { message } => Self::AuthFailed {
                profile: "current".into(),
                message,
            },
            CoreError::Api { message, status } => Self::Api { message, status },
            CoreError::Timeout { operation, waited } => Self::Timeout {
                operation,
                seconds: waited.as_secs(),
            },
            CoreError::Template { message } => Self::Template { message },
            CoreError::Plan { message } => Self::Plan { message },
            CoreError::Precondition { message } => Self::Precondition { message },
            CoreError::Internal(message) => Self::Api {
                message,
                status: None,
            },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::NoCredentials { profile, secret } => {
                Self::NoCredentials { profile, secret }
            }
            ConfigError::ProfileNotFound { name, available } => {
                Self::ProfileNotFound { name, available }
            }
            ConfigError::Keyring(reason) => Self::Keyring { reason },
            ConfigError::Figment(e) => Self::Config(e),
            ConfigError::Serialization(e) => Self::Validation {
                field: "config".into(),
                reason: e.to_string(),
            },
            ConfigError::Io(e) => Self::Io(e),
        }
    }
}
