//! Core data structs for the petal economy engine.
//!
//! Covers the wallet row, the immutable ledger entry, and the receipt
//! types returned by the grant/debit/wallet-info operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::{LedgerEntryId, UserId};

// ---------------------------------------------------------------------------
// Wallet
// ---------------------------------------------------------------------------

/// Per-user wallet row: current balance plus cumulative stats.
///
/// A wallet is created lazily on first grant or balance query and never
/// deleted. `balance` is a materialized view of the ledger: it may only
/// change alongside a ledger insertion in the same transaction, so
/// `sum(ledger.amount)` for the user always equals `balance`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Wallet {
    /// Owning user.
    pub user_id: UserId,
    /// Current spendable petals. Never negative.
    pub balance: i64,
    /// Sum of all credits ever granted. Monotonically non-decreasing.
    pub lifetime_earned: i64,
    /// Consecutive days with a daily-bonus collection. Zero until the
    /// first collection.
    pub current_streak: i32,
    /// Timestamp of the most recent credit, if any.
    pub last_collected_at: Option<DateTime<Utc>>,
    /// Row creation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Ledger entry
// ---------------------------------------------------------------------------

/// One immutable record of a balance-changing event.
///
/// Positive `amount` is an earn, negative a spend. Entries are never
/// updated or deleted; corrections are new offsetting entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct LedgerEntry {
    /// Entry identifier (UUID v7, time-ordered).
    pub id: LedgerEntryId,
    /// User whose balance changed.
    pub user_id: UserId,
    /// Signed petal delta. Positive = earn, negative = spend.
    pub amount: i64,
    /// Semantic tag identifying the producing feature, e.g. `mini_game`,
    /// `soapstone_praise`, `achievement:first_win`, `purchase:sku-123`.
    pub source: String,
    /// Optional human-readable description.
    pub description: Option<String>,
    /// Free-form metadata supplied by the caller.
    pub metadata: serde_json::Value,
    /// When the event was recorded.
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Whether this entry credits the wallet.
    pub const fn is_earn(&self) -> bool {
        self.amount > 0
    }
}

// ---------------------------------------------------------------------------
// Operation receipts
// ---------------------------------------------------------------------------

/// Result of a grant (credit) operation.
///
/// This struct is also the payload persisted as the idempotency response:
/// a duplicate submission replays it verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct GrantReceipt {
    /// Petals actually credited, after daily-cap clamping. May be less
    /// than the requested amount, or zero when the cap was already hit.
    pub granted: i64,
    /// Wallet balance after the operation.
    pub new_balance: i64,
    /// Lifetime earned total after the operation.
    pub lifetime_earned: i64,
    /// True when the daily cap reduced or zeroed the credit.
    pub limited: bool,
}

/// Result of a debit (spend) operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct DebitReceipt {
    /// Wallet balance after the spend.
    pub new_balance: i64,
}

/// Snapshot of a wallet for display surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct WalletInfo {
    /// Current spendable petals.
    pub balance: i64,
    /// Sum of all credits ever granted.
    pub lifetime_earned: i64,
    /// Consecutive days with a daily-bonus collection.
    pub current_streak: i32,
    /// Timestamp of the most recent credit, if any.
    pub last_collected_at: Option<DateTime<Utc>>,
}

impl From<&Wallet> for WalletInfo {
    fn from(wallet: &Wallet) -> Self {
        Self {
            balance: wallet.balance,
            lifetime_earned: wallet.lifetime_earned,
            current_streak: wallet.current_streak,
            last_collected_at: wallet.last_collected_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(amount: i64) -> LedgerEntry {
        LedgerEntry {
            id: LedgerEntryId::new(),
            user_id: UserId::new(),
            amount,
            source: "mini_game".to_owned(),
            description: None,
            metadata: serde_json::json!({}),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn earn_and_spend_are_distinguished_by_sign() {
        assert!(entry(25).is_earn());
        assert!(!entry(-25).is_earn());
    }

    #[test]
    fn grant_receipt_roundtrips_through_json() {
        // The receipt must survive a JSONB round-trip unchanged: it is the
        // stored idempotency response replayed to duplicate submissions.
        let receipt = GrantReceipt {
            granted: 120,
            new_balance: 450,
            lifetime_earned: 900,
            limited: true,
        };
        let json = serde_json::to_value(receipt).ok();
        assert!(json.is_some());
        let restored: Result<GrantReceipt, _> =
            serde_json::from_value(json.unwrap_or_default());
        assert_eq!(restored.ok(), Some(receipt));
    }

    #[test]
    fn wallet_info_mirrors_wallet_fields() {
        let now = Utc::now();
        let wallet = Wallet {
            user_id: UserId::new(),
            balance: 70,
            lifetime_earned: 100,
            current_streak: 3,
            last_collected_at: Some(now),
            created_at: now,
            updated_at: now,
        };
        let info = WalletInfo::from(&wallet);
        assert_eq!(info.balance, 70);
        assert_eq!(info.lifetime_earned, 100);
        assert_eq!(info.current_streak, 3);
        assert_eq!(info.last_collected_at, Some(now));
    }
}
