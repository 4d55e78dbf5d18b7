//! Domain-specific error types following panic-free policy.

use thiserror::Error;

/// Errors that can occur in domain operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid field value
    #[error("Invalid {field}: {value} (expected {expected})")]
    InvalidFieldValue {
        field: String,
        value: String,
        expected: String,
    },

    /// Parse error for incoming data
    #[error("Failed to parse {field}: {reason}")]
    ParseError { field: String, reason: String },
}

impl DomainError {
    /// Shorthand for a field that failed to parse.
    pub fn parse(field: &str, reason: impl Into<String>) -> Self {
        Self::ParseError {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DomainError::InvalidFieldValue {
            field: "emi".to_string(),
            value: "xyz".to_string(),
            expected: "12 hex characters".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid emi: xyz (expected 12 hex characters)");

        let err = DomainError::parse("vd", "not an integer");
        assert_eq!(err.to_string(), "Failed to parse vd: not an integer");
    }
}
