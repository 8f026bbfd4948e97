//! Error taxonomy shared across the engine
//!
//! Validation failures never crash the processing loop: they surface as
//! failed-queue entries carrying the error text below.

use thiserror::Error;

/// Rejection of an inbound order payload at the validation boundary
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("price must be a positive decimal, got {0}")]
    InvalidPrice(String),

    #[error("amount must be a positive decimal, got {0}")]
    InvalidAmount(String),

    #[error("unknown order type: {0}")]
    UnknownOrderType(String),

    #[error("unknown trading pair: {0}")]
    UnknownSymbol(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_text() {
        let err = ValidationError::InvalidPrice("-5".to_string());
        assert_eq!(err.to_string(), "price must be a positive decimal, got -5");
    }

    #[test]
    fn test_missing_field_text() {
        let err = ValidationError::MissingField("trading_pair");
        assert_eq!(err.to_string(), "missing required field: trading_pair");
    }
}
