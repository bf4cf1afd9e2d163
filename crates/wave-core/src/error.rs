use std::fmt;

#[derive(Debug)]
pub enum WaveError {
    InvalidCapacity(String),
    InvalidRate(f64),
    InvalidParameter(String),
    DimensionMismatch { expected: usize, got: usize },
    Serialization(serde_json::Error),
}

impl fmt::Display for WaveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaveError::InvalidCapacity(msg) => write!(f, "invalid capacity: {msg}"),
            WaveError::InvalidRate(rate) => {
                write!(f, "invalid false-positive rate: {rate} (must be in (0, 1))")
            }
            WaveError::InvalidParameter(msg) => write!(f, "invalid parameter: {msg}"),
            WaveError::DimensionMismatch { expected, got } => {
                write!(f, "dimension mismatch: expected {expected}, got {got}")
            }
            WaveError::Serialization(e) => write!(f, "serialization error: {e}"),
        }
    }
}

impl std::error::Error for WaveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WaveError::Serialization(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for WaveError {
    fn from(e: serde_json::Error) -> Self {
        WaveError::Serialization(e)
    }
}

pub type Result<T> = std::result::Result<T, WaveError>;
