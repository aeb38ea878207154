use thiserror::Error;

/// Why `start_dispensing` declined a request.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    #[error("target must be a finite, positive mass within the configured maximum")]
    InvalidTarget,
    #[error("a dispense is already in progress")]
    Busy,
}

#[derive(Debug, Error, Clone)]
pub enum DispenseError {
    #[error("sensor unavailable: {0}")]
    SensorUnavailable(String),
    #[error("event transport failed: {0}")]
    Transport(String),
    #[error("gate actuator error: {0}")]
    Actuator(String),
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("timeout waiting for sensor")]
    SensorTimeout,
    #[error("dispense timed out after delivering {delivered_g:.1} g")]
    Timeout { delivered_g: f32 },
    #[error("dispense aborted after delivering {delivered_g:.1} g")]
    Aborted { delivered_g: f32 },
    #[error("dispense request rejected: {0}")]
    Rejected(RejectReason),
    #[error("configuration error: {0}")]
    Config(String),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing gate")]
    MissingGate,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
