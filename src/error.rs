//! Error types shared by every enhancement stage
//!
//! All checks are made up front, before any voxel is touched, so a failed run
//! never returns a partially filled image.

use thiserror::Error;

/// Errors raised by the enhancement pipeline
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EnhanceError {
    /// A required collaborator is missing or the configuration cannot be used
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A scalar argument is outside its valid range
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A mask region is not contained in the image domain
    #[error("domain error: {0}")]
    Domain(String),

    /// Dimensionality or buffer size disagreement
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },
}

pub type EnhanceResult<T> = Result<T, EnhanceError>;

impl From<serde_json::Error> for EnhanceError {
    fn from(err: serde_json::Error) -> Self {
        EnhanceError::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = EnhanceError::DimensionMismatch { expected: 3, found: 2 };
        assert_eq!(err.to_string(), "dimension mismatch: expected 3, found 2");

        let err = EnhanceError::InvalidParameter("sigma must be positive".to_string());
        assert_eq!(err.to_string(), "invalid parameter: sigma must be positive");
    }

    #[test]
    fn test_json_error_is_configuration() {
        let parse: Result<serde_json::Value, _> = serde_json::from_str("{not json");
        let err: EnhanceError = parse.unwrap_err().into();
        assert!(matches!(err, EnhanceError::Configuration(_)));
    }
}
