//! Error types for Flock

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FlockError>;

#[derive(Error, Debug)]
pub enum FlockError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Output error: {0}")]
    Output(String),
}

impl FlockError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            FlockError::InvalidInput(_) => 3,
            FlockError::Config(ConfigError::MissingToken) => 2,
            FlockError::Upstream(UpstreamError::ActionRejected { status, .. })
            | FlockError::Upstream(UpstreamError::NonSuccessStatus { status, .. })
                if *status == 401 || *status == 403 =>
            {
                2
            }
            FlockError::Upstream(_) => 1,
            FlockError::Config(_) => 1,
            FlockError::Output(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("No API token found (set FLOCK_GITHUB_TOKEN or GITHUB_TOKEN, or github.token_file)")]
    MissingToken,
}

#[derive(Error, Debug, Clone)]
pub enum UpstreamError {
    /// The remote API could not be reached or answered at the transport level.
    #[error("Upstream unavailable: {0}")]
    Unavailable(String),

    /// The server answered with a non-success status. Fatal when returned by
    /// a source; the paginator only logs it for statuses a source lets through.
    #[error("Non-success status {status} while {context}")]
    NonSuccessStatus { status: u16, context: String },

    #[error("Action on '{account}' rejected with status {status}")]
    ActionRejected { account: String, status: u16 },

    #[error("Failed to decode response: {0}")]
    Decode(String),
}
