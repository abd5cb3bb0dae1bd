//! Error types for the economy engine.
//!
//! Expected business conditions are typed variants, never panics: callers
//! match on them to render user-facing messages. [`EconomyError::code`]
//! gives the HTTP layer a stable string for each variant. A daily cap
//! being reached is *not* an error -- it surfaces as
//! `GrantReceipt { limited: true }`.

use petal_db::DbError;
use petal_types::UserId;

/// Errors returned by the grant, debit, and wallet-info operations.
#[derive(Debug, thiserror::Error)]
pub enum EconomyError {
    /// The requested amount is zero or negative. Rejected before any
    /// side effect.
    #[error("amount must be positive, got {amount}")]
    InvalidAmount {
        /// The rejected amount.
        amount: i64,
    },

    /// The request carried no source tag.
    #[error("a non-empty source tag is required")]
    MissingSource,

    /// The operation targeted an identity with no wallet. Only the debit
    /// path can hit this; grants and balance queries create lazily.
    #[error("no wallet exists for user {user_id}")]
    UserNotFound {
        /// The unknown user.
        user_id: UserId,
    },

    /// A debit exceeded the current balance. No mutation occurred.
    #[error("insufficient petals: balance {balance}, requested {requested}")]
    InsufficientFunds {
        /// Balance at the time of the attempt.
        balance: i64,
        /// The requested spend.
        requested: i64,
    },

    /// A duplicate submission arrived while the first is still in
    /// flight and no stored response is visible yet. Retrying with the
    /// same idempotency key replays the original result once it commits.
    #[error("duplicate request {key} is still being processed")]
    DuplicateInFlight {
        /// The contested idempotency key.
        key: String,
    },

    /// An infrastructure failure in the storage layer.
    #[error("storage error: {0}")]
    Storage(#[from] DbError),
}

impl EconomyError {
    /// Stable error code for the HTTP layer.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidAmount { .. } | Self::MissingSource => "VALIDATION_ERROR",
            Self::UserNotFound { .. } => "USER_NOT_FOUND",
            Self::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            Self::DuplicateInFlight { .. } => "DUPLICATE_REQUEST",
            Self::Storage(_) => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(
            EconomyError::InvalidAmount { amount: -5 }.code(),
            "VALIDATION_ERROR"
        );
        assert_eq!(EconomyError::MissingSource.code(), "VALIDATION_ERROR");
        assert_eq!(
            EconomyError::UserNotFound {
                user_id: UserId::new()
            }
            .code(),
            "USER_NOT_FOUND"
        );
        assert_eq!(
            EconomyError::InsufficientFunds {
                balance: 70,
                requested: 1000
            }
            .code(),
            "INSUFFICIENT_FUNDS"
        );
        assert_eq!(
            EconomyError::DuplicateInFlight {
                key: "k1".to_owned()
            }
            .code(),
            "DUPLICATE_REQUEST"
        );
    }

    #[test]
    fn insufficient_funds_message_names_both_amounts() {
        let err = EconomyError::InsufficientFunds {
            balance: 70,
            requested: 1000,
        };
        let message = err.to_string();
        assert!(message.contains("70"));
        assert!(message.contains("1000"));
    }
}
