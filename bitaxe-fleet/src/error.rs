use thiserror::Error;

/// Fleet engine error types
#[derive(Error, Debug)]
pub enum FleetError {
    #[error("Invalid subnet: {0}")]
    InvalidSubnet(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("HTTP error: status {0}")]
    Http(u16),

    #[error("Malformed telemetry: {0}")]
    MalformedTelemetry(String),

    #[error("Setup failed: {0}")]
    Setup(String),
}

impl From<serde_json::Error> for FleetError {
    fn from(err: serde_json::Error) -> Self {
        FleetError::MalformedTelemetry(err.to_string())
    }
}

impl From<reqwest::Error> for FleetError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FleetError::Timeout
        } else if let Some(status) = err.status() {
            FleetError::Http(status.as_u16())
        } else {
            FleetError::Connection(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, FleetError>;
