//! Error types for the bundle pipeline

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the bundle pipeline
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    // Validation errors
    #[error("Invalid bundle options: {0}")]
    Validation(String),

    #[error("Recipe is empty")]
    EmptyRecipe,

    #[error("Recipe has {got} steps, maximum is {max}")]
    RecipeTooLong { got: usize, max: usize },

    // Signing errors
    #[error("No signer registered for wallet: {0}")]
    SignerMissing(String),

    #[error("Signing failed: {0}")]
    SigningFailed(String),

    #[error("Transaction decode failed: {0}")]
    TransactionDecode(String),

    // Safety rail errors
    #[error("Safety check rejected: {}", reasons.join("; "))]
    SafetyRejected { reasons: Vec<String> },

    #[error("Wallet cap not initialized: {0}")]
    WalletCapMissing(String),

    #[error("Spending reservation failed for wallet {wallet}: {amount} SOL")]
    ReservationFailed { wallet: String, amount: f64 },

    // Relay errors
    #[error("Bundle preparation failed: {0}")]
    PrepareFailed(String),

    #[error("Bundle relay failed: {0}")]
    RelayFailed(String),

    #[error("Bundle rejected by relay: {0}")]
    RelayRejected(String),

    #[error("Bundle simulation failed: {0}")]
    SimulationFailed(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Check if this error is retryable (transient)
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::RelayFailed(_) | Error::PrepareFailed(_))
    }

    /// Check if this error is a safety violation
    pub fn is_safety_violation(&self) -> bool {
        matches!(
            self,
            Error::SafetyRejected { .. }
                | Error::WalletCapMissing(_)
                | Error::ReservationFailed { .. }
        )
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

// Conversion from I/O errors
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(Error::RelayFailed("timeout".into()).is_retryable());
        assert!(!Error::RelayRejected("bad tip".into()).is_retryable());
        assert!(!Error::SignerMissing("w1".into()).is_retryable());
    }

    #[test]
    fn test_safety_violation_classification() {
        let err = Error::SafetyRejected {
            reasons: vec!["over cap".into()],
        };
        assert!(err.is_safety_violation());
        assert!(!Error::RelayFailed("timeout".into()).is_safety_violation());
    }

    #[test]
    fn test_safety_rejected_joins_reasons() {
        let err = Error::SafetyRejected {
            reasons: vec!["a".into(), "b".into()],
        };
        assert_eq!(err.to_string(), "Safety check rejected: a; b");
    }
}
