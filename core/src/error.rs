//! Error types for configuration and oracle evaluation

use thiserror::Error;

/// A sweep configuration that cannot be run. Always names the offending field.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("{field} must not be empty")]
    Empty { field: &'static str },
}

impl ConfigError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }

    pub fn field(&self) -> &'static str {
        match self {
            Self::Invalid { field, .. } | Self::Empty { field } => field,
        }
    }
}

/// Errors raised by the finite-difference oracle
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum OracleError {
    #[error("perturbation magnitude must be a positive finite number, got {0}")]
    InvalidPerturbation(f64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_names_field() {
        let err = ConfigError::invalid("spring_constant", "must be positive, got -1");
        assert_eq!(err.field(), "spring_constant");
        let msg = err.to_string();
        assert!(msg.contains("spring_constant"));
        assert!(msg.contains("-1"));

        let empty = ConfigError::Empty {
            field: "precision_levels",
        };
        assert_eq!(empty.to_string(), "precision_levels must not be empty");
    }
}
