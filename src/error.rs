//! Crate-wide error type.
//!
//! `HexError` consolidates every failure mode the control stack can produce,
//! following the same `thiserror`-derived enum pattern used throughout the
//! rest of this codebase: one variant per failure class, `#[from]` where a
//! clean conversion exists, and a `HexResult<T>` alias for ergonomics.

use thiserror::Error;

/// Convenience alias for results using the crate's error type.
pub type HexResult<T> = std::result::Result<T, HexError>;

#[derive(Error, Debug)]
pub enum HexError {
    #[error("actuator bus error: {0}")]
    Port(String),

    #[error("camera error: {0}")]
    Camera(String),

    #[error("frame decode error: {0}")]
    Decode(String),

    #[error("client disconnected")]
    ClientDisconnect,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("configuration load error: {0}")]
    ConfigLoad(#[from] figment::Error),

    #[error("server error: {0}")]
    Server(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = HexError::Camera("subprocess exited".to_string());
        assert_eq!(err.to_string(), "camera error: subprocess exited");
    }

    #[test]
    fn test_config_error_display() {
        let err = HexError::Config("min_area must be non-zero".to_string());
        assert_eq!(
            err.to_string(),
            "configuration error: min_area must be non-zero"
        );
    }
}
