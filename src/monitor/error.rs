use thiserror::Error;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Monitor is already running")]
    AlreadyRunning,

    #[error("Measurement error: {0}")]
    Measurement(String),

    #[error("History error: {0}")]
    History(String),
}

pub type Result<T> = std::result::Result<T, MonitorError>;
