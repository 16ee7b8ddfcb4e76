use thiserror::Error;

/// Configuration errors: fatal for the enclosing operation, never retried.
/// An unknown strategy or indicator type, an invalid parameter schema, or an
/// invalid resolution string all land here.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown strategy: {0}")]
    UnknownStrategy(String),

    #[error("unknown indicator type: {0}")]
    UnknownIndicator(String),

    #[error("incorrect indicator configuration for {name}: {reason}")]
    InvalidIndicatorParameters { name: String, reason: String },

    #[error("not a valid candle resolution: {0}")]
    InvalidResolution(String),
}

/// Exchange I/O errors: the fetcher retries next tick; the trader surfaces
/// these as an ALGO_ERROR for the advice being processed.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("failed to fetch trades: {0}")]
    FetchFailed(String),

    #[error("orderbook for {selling}/{buying} has no bids")]
    EmptyOrderbook { selling: String, buying: String },

    #[error("offer submission failed: {0}")]
    OfferSubmissionFailed(String),

    #[error("transaction {0} not found")]
    TransactionNotFound(String),
}

/// Persistence errors: writes are retried up to three times by the caller;
/// this variant is returned once the retry budget is exhausted.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("database operation failed after {attempts} attempts: {reason}")]
    WriteFailed { attempts: u32, reason: String },

    #[error("query failed: {0}")]
    QueryFailed(String),

    #[error("record not found: {0}")]
    NotFound(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_formatting_names_the_offending_value() {
        let err = ConfigError::UnknownStrategy("not-a-strategy".to_string());
        assert!(err.to_string().contains("not-a-strategy"));
    }

    #[test]
    fn exchange_error_empty_orderbook_names_both_sides() {
        let err = ExchangeError::EmptyOrderbook {
            selling: "XLM_native".to_string(),
            buying: "USD_IssuerA".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("XLM_native"));
        assert!(msg.contains("USD_IssuerA"));
    }

    #[test]
    fn persistence_error_reports_attempt_count() {
        let err = PersistenceError::WriteFailed {
            attempts: 3,
            reason: "locked".to_string(),
        };
        assert!(err.to_string().contains('3'));
    }
}
