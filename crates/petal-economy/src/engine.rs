//! The economy service: grant (credit) and debit (spend) protocols.
//!
//! [`PetalEconomy`] is the only entry point feature modules have into
//! wallet state. Every operation composes the wallet, ledger, and
//! idempotency stores inside a single transaction, so the
//! ledger-balance invariant (`sum(ledger.amount) == wallet.balance`)
//! holds after any sequence of calls, under any interleaving.
//!
//! Cross-request coordination comes entirely from the storage layer:
//! the wallet row lock serializes per-user work, the guarded balance
//! update makes deltas atomic, and the idempotency key's uniqueness
//! constraint turns racing duplicate submissions into one winner and
//! one replay. There are no in-process locks.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use petal_db::{DbError, IdempotencyStore, LedgerStore, SourceEarned, WalletStore};
use petal_types::{
    sources, CapCategory, DebitReceipt, GrantReceipt, LedgerEntry, LedgerEntryId, UserId, Wallet,
    WalletInfo,
};

use crate::caps;
use crate::config::EconomyConfig;
use crate::error::EconomyError;
use crate::streak;

/// Purpose tag recorded on idempotency reservations made by the grant
/// path.
const GRANT_PURPOSE: &str = "petal_grant";

/// How many times a duplicate submission polls for the winner's stored
/// response before giving up with `DUPLICATE_REQUEST`.
const REPLAY_FETCH_ATTEMPTS: u32 = 3;

/// Delay between replay polls, in milliseconds.
const REPLAY_FETCH_DELAY_MS: u64 = 50;

// ---------------------------------------------------------------------------
// Request parameters
// ---------------------------------------------------------------------------

/// Parameters for a grant (credit) operation.
#[derive(Debug, Clone)]
pub struct GrantRequest {
    /// The user to credit.
    pub user_id: UserId,
    /// Requested petals, before daily-cap clamping. Must be positive.
    pub amount: i64,
    /// Semantic tag of the producing feature, e.g. `mini_game`.
    pub source: String,
    /// Free-form metadata recorded on the ledger entry.
    pub metadata: serde_json::Value,
    /// Optional human-readable description.
    pub description: Option<String>,
    /// Caller-supplied token making retries safe. Two submissions with
    /// the same key execute at most once; the second replays the first
    /// result.
    pub idempotency_key: Option<String>,
}

impl GrantRequest {
    /// A minimal request with empty metadata, no description, and no
    /// idempotency key.
    pub fn new(user_id: UserId, amount: i64, source: &str) -> Self {
        Self {
            user_id,
            amount,
            source: source.to_owned(),
            metadata: serde_json::Value::Null,
            description: None,
            idempotency_key: None,
        }
    }
}

/// Parameters for a debit (spend) operation.
///
/// Deliberately no idempotency key: a spend's side effect (the item
/// grant, the unlock) lives outside the ledger, so at-most-once purchase
/// semantics belong to the calling operation's own key at a higher layer.
#[derive(Debug, Clone)]
pub struct DebitRequest {
    /// The user to charge.
    pub user_id: UserId,
    /// Petals to spend. Must be positive.
    pub amount: i64,
    /// Semantic tag, e.g. `purchase:sku-123`.
    pub source: String,
    /// Optional human-readable description.
    pub description: Option<String>,
}

impl DebitRequest {
    /// A minimal request with no description.
    pub fn new(user_id: UserId, amount: i64, source: &str) -> Self {
        Self {
            user_id,
            amount,
            source: source.to_owned(),
            description: None,
        }
    }
}

// ---------------------------------------------------------------------------
// The service
// ---------------------------------------------------------------------------

/// The petal economy service.
///
/// Cheap to clone; instances share the connection pool. Feature modules
/// call [`grant`], [`debit`], and [`wallet_info`] and never touch the
/// `wallets` or `ledger` tables directly.
///
/// [`grant`]: PetalEconomy::grant
/// [`debit`]: PetalEconomy::debit
/// [`wallet_info`]: PetalEconomy::wallet_info
#[derive(Clone)]
pub struct PetalEconomy {
    pool: PgPool,
    config: EconomyConfig,
}

impl PetalEconomy {
    /// Create the service over a connection pool and configuration.
    pub const fn new(pool: PgPool, config: EconomyConfig) -> Self {
        Self { pool, config }
    }

    /// Return the active configuration.
    pub const fn config(&self) -> &EconomyConfig {
        &self.config
    }

    /// Credit petals to a user, subject to the daily cap of the source's
    /// category.
    ///
    /// With an idempotency key, the reservation happens before anything
    /// else: a duplicate submission replays the stored receipt and never
    /// reprocesses, even when it lost the race by microseconds. A capped
    /// grant (`granted: 0, limited: true`) is recorded the same way, so
    /// retrying a capped request replays "capped" instead of re-running.
    ///
    /// A `daily_bonus`-class source also advances the consecutive-day
    /// streak and folds the streak bonus in as a second ledger entry
    /// under [`sources::STREAK_BONUS`], capped under that tag's own
    /// category.
    ///
    /// # Errors
    ///
    /// [`EconomyError::InvalidAmount`] / [`EconomyError::MissingSource`]
    /// before any side effect; [`EconomyError::DuplicateInFlight`] when a
    /// racing duplicate finds no stored response yet;
    /// [`EconomyError::Storage`] on infrastructure failure.
    pub async fn grant(&self, mut request: GrantRequest) -> Result<GrantReceipt, EconomyError> {
        validate(request.amount, &request.source)?;

        let idempotency_key = request.idempotency_key.take();
        if let Some(key) = idempotency_key.as_deref() {
            let registry = IdempotencyStore::new(&self.pool);
            let expires_at = Utc::now()
                .checked_add_signed(self.config.idempotency.ttl())
                .unwrap_or(DateTime::<Utc>::MAX_UTC);
            if !registry.reserve(key, GRANT_PURPOSE, expires_at).await? {
                return self.replay_grant(key).await;
            }
        }

        let receipt = self.execute_grant(request).await?;

        if let Some(key) = idempotency_key.as_deref() {
            IdempotencyStore::new(&self.pool)
                .store_response(key, &receipt)
                .await?;
        }

        Ok(receipt)
    }

    /// Spend petals from a user's balance.
    ///
    /// # Errors
    ///
    /// [`EconomyError::UserNotFound`] when no wallet exists;
    /// [`EconomyError::InsufficientFunds`] when the balance is short, with
    /// no mutation; [`EconomyError::Storage`] on infrastructure failure.
    pub async fn debit(&self, request: DebitRequest) -> Result<DebitReceipt, EconomyError> {
        validate(request.amount, &request.source)?;

        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        let wallet = WalletStore::get_locked(&mut tx, request.user_id)
            .await?
            .ok_or(EconomyError::UserNotFound {
                user_id: request.user_id,
            })?;

        if wallet.balance < request.amount {
            // Dropping the transaction rolls back; nothing was written.
            return Err(EconomyError::InsufficientFunds {
                balance: wallet.balance,
                requested: request.amount,
            });
        }

        let wallet = Self::record_and_apply(
            &mut tx,
            BalanceChange {
                user_id: request.user_id,
                amount: request.amount.saturating_neg(),
                source: &request.source,
                description: request.description,
                metadata: serde_json::Value::Null,
                created_at: Utc::now(),
            },
        )
        .await?
        .ok_or(EconomyError::InsufficientFunds {
            balance: wallet.balance,
            requested: request.amount,
        })?;

        tx.commit().await.map_err(DbError::from)?;

        tracing::info!(
            user_id = %request.user_id,
            source = %request.source,
            amount = request.amount,
            new_balance = wallet.balance,
            "Petals spent"
        );

        Ok(DebitReceipt {
            new_balance: wallet.balance,
        })
    }

    /// Current wallet snapshot, creating the wallet on first access.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::Storage`] on infrastructure failure.
    pub async fn wallet_info(&self, user_id: UserId) -> Result<WalletInfo, EconomyError> {
        let wallet = WalletStore::new(&self.pool).get_or_create(user_id).await?;
        Ok(WalletInfo::from(&wallet))
    }

    /// Petals the user can still earn today in `category`.
    ///
    /// Derived from the ledger on every call; there is no counter to
    /// drift.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::Storage`] on infrastructure failure.
    pub async fn remaining_today(
        &self,
        user_id: UserId,
        category: CapCategory,
    ) -> Result<i64, EconomyError> {
        let (day_start, day_end) =
            caps::local_day_window(Utc::now(), self.config.time.utc_offset_minutes);

        let mut conn = self.pool.acquire().await.map_err(DbError::from)?;
        let sums =
            LedgerStore::earned_by_source(&mut conn, user_id, day_start, day_end).await?;

        let earned = caps::earned_in_category(&sums, category);
        Ok(caps::remaining(self.config.caps.ceiling(category), earned))
    }

    /// The user's most recent ledger entries, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::Storage`] on infrastructure failure.
    pub async fn recent_activity(
        &self,
        user_id: UserId,
        limit: i64,
    ) -> Result<Vec<LedgerEntry>, EconomyError> {
        let entries = LedgerStore::new(&self.pool)
            .recent_for_user(user_id, limit)
            .await?;
        Ok(entries)
    }

    /// Difference between the wallet balance and the ledger's sum for a
    /// user. Zero when the ledger-balance invariant holds (always, absent
    /// manual tampering); audit tooling alerts on anything else.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::Storage`] on infrastructure failure.
    pub async fn balance_drift(&self, user_id: UserId) -> Result<i64, EconomyError> {
        let wallet = WalletStore::new(&self.pool).get_or_create(user_id).await?;
        let recorded = LedgerStore::new(&self.pool)
            .balance_of_record(user_id)
            .await?;
        Ok(wallet.balance.saturating_sub(recorded))
    }

    /// Delete expired idempotency records. Exposed for the maintenance
    /// binary and opportunistic callers.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::Storage`] on infrastructure failure.
    pub async fn purge_expired_idempotency(&self) -> Result<u64, EconomyError> {
        let purged = IdempotencyStore::new(&self.pool).purge_expired().await?;
        Ok(purged)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Replay the stored receipt for a duplicate submission.
    ///
    /// The winner stores its response after committing, so a loser that
    /// arrives within that gap polls briefly before giving up.
    async fn replay_grant(&self, key: &str) -> Result<GrantReceipt, EconomyError> {
        let registry = IdempotencyStore::new(&self.pool);
        for attempt in 1..=REPLAY_FETCH_ATTEMPTS {
            if let Some(receipt) = registry.fetch_response::<GrantReceipt>(key).await? {
                tracing::debug!(key, attempt, "Duplicate grant replayed from stored result");
                return Ok(receipt);
            }
            if attempt < REPLAY_FETCH_ATTEMPTS {
                tokio::time::sleep(std::time::Duration::from_millis(REPLAY_FETCH_DELAY_MS))
                    .await;
            }
        }
        Err(EconomyError::DuplicateInFlight {
            key: key.to_owned(),
        })
    }

    /// The grant's unit of work: one transaction covering the row lock,
    /// cap computation, streak advance, and ledger + wallet mutations.
    async fn execute_grant(&self, request: GrantRequest) -> Result<GrantReceipt, EconomyError> {
        let now = Utc::now();
        let offset_minutes = self.config.time.utc_offset_minutes;
        let (day_start, day_end) = caps::local_day_window(now, offset_minutes);

        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        // The row lock serializes all wallet work for this user until
        // commit; headroom computed below cannot be invalidated by a
        // concurrent grant.
        let wallet = WalletStore::get_or_create_locked(&mut tx, request.user_id).await?;

        let streak_advance = if caps::is_streak_source(&request.source) {
            let (yesterday_start, yesterday_end) =
                caps::previous_day_window(now, offset_minutes);
            let collected_yesterday = LedgerStore::has_earn_in_window(
                &mut tx,
                request.user_id,
                &[sources::DAILY_BONUS],
                yesterday_start,
                yesterday_end,
            )
            .await?;
            let next = streak::next_streak(collected_yesterday, wallet.current_streak);
            let bonus = streak::bonus_for(next, &self.config.streak);
            Some((next, bonus))
        } else {
            None
        };

        let sums =
            LedgerStore::earned_by_source(&mut tx, request.user_id, day_start, day_end).await?;

        let category = caps::category_for_source(&request.source);
        let earned = caps::earned_in_category(&sums, category);
        let headroom = caps::remaining(self.config.caps.ceiling(category), earned);
        let (granted, mut limited) = caps::clamp_to_remaining(request.amount, headroom);

        let mut wallet_after = wallet;
        let mut total_granted = 0_i64;

        if granted > 0 {
            wallet_after = Self::record_and_apply(
                &mut tx,
                BalanceChange {
                    user_id: request.user_id,
                    amount: granted,
                    source: &request.source,
                    description: request.description,
                    metadata: request.metadata,
                    created_at: now,
                },
            )
            .await?
            .ok_or(EconomyError::UserNotFound {
                user_id: request.user_id,
            })?;
            total_granted = granted;
        }

        if let Some((next_streak, bonus)) = streak_advance {
            WalletStore::set_streak(&mut tx, request.user_id, next_streak).await?;
            wallet_after.current_streak = next_streak;

            if bonus > 0 {
                let leg = StreakBonusLeg {
                    user_id: request.user_id,
                    streak: next_streak,
                    bonus,
                    now,
                };
                let (bonus_granted, bonus_limited, bonus_wallet) =
                    self.grant_streak_bonus(&mut tx, &sums, leg).await?;
                if let Some(updated) = bonus_wallet {
                    wallet_after = updated;
                }
                total_granted = total_granted.saturating_add(bonus_granted);
                limited = limited || bonus_limited;
            }
        }

        tx.commit().await.map_err(DbError::from)?;

        tracing::info!(
            user_id = %request.user_id,
            source = %request.source,
            requested = request.amount,
            granted = total_granted,
            limited,
            new_balance = wallet_after.balance,
            "Petals granted"
        );

        Ok(GrantReceipt {
            granted: total_granted,
            new_balance: wallet_after.balance,
            lifetime_earned: wallet_after.lifetime_earned,
            limited,
        })
    }

    /// Clamp the streak bonus against its own category's headroom and
    /// record it as a second ledger entry under
    /// [`sources::STREAK_BONUS`].
    ///
    /// The base leg and the bonus leg are capped under different
    /// categories, so the caller's pre-insert window snapshot stays
    /// accurate here. Returns `(granted, limited, wallet)`; the wallet is
    /// `None` when the bonus was fully capped away and nothing was
    /// recorded.
    async fn grant_streak_bonus(
        &self,
        conn: &mut PgConnection,
        sums: &[SourceEarned],
        leg: StreakBonusLeg,
    ) -> Result<(i64, bool, Option<Wallet>), EconomyError> {
        let category = caps::category_for_source(sources::STREAK_BONUS);
        let earned = caps::earned_in_category(sums, category);
        let headroom = caps::remaining(self.config.caps.ceiling(category), earned);
        let (granted, limited) = caps::clamp_to_remaining(leg.bonus, headroom);

        if granted == 0 {
            return Ok((0, limited, None));
        }

        let wallet = Self::record_and_apply(
            conn,
            BalanceChange {
                user_id: leg.user_id,
                amount: granted,
                source: sources::STREAK_BONUS,
                description: Some(format!("{}-day streak bonus", leg.streak)),
                metadata: serde_json::Value::Null,
                created_at: leg.now,
            },
        )
        .await?
        .ok_or(EconomyError::UserNotFound {
            user_id: leg.user_id,
        })?;

        Ok((granted, limited, Some(wallet)))
    }

    /// Append one ledger entry and apply the matching wallet delta -- the
    /// single internal path through which every balance change flows, for
    /// grants and debits alike.
    ///
    /// Returns `None` when the guarded delta refused the change (missing
    /// wallet, or a spend that would overdraw); callers map that to their
    /// own error.
    async fn record_and_apply(
        conn: &mut PgConnection,
        change: BalanceChange<'_>,
    ) -> Result<Option<Wallet>, EconomyError> {
        let entry = LedgerEntry {
            id: LedgerEntryId::new(),
            user_id: change.user_id,
            amount: change.amount,
            source: change.source.to_owned(),
            description: change.description,
            metadata: change.metadata,
            created_at: change.created_at,
        };
        LedgerStore::insert(&mut *conn, &entry).await?;

        let wallet =
            WalletStore::apply_delta(&mut *conn, change.user_id, change.amount, entry.is_earn())
                .await?;
        Ok(wallet)
    }
}

/// Inputs for recording the streak-bonus leg of a daily collection.
struct StreakBonusLeg {
    /// User collecting the bonus.
    user_id: UserId,
    /// The streak length after today's advance.
    streak: i32,
    /// Uncapped bonus amount from the streak arithmetic.
    bonus: i64,
    /// Timestamp shared with the base leg's ledger entry.
    now: DateTime<Utc>,
}

/// One balance change: the ledger entry fields plus the signed delta.
///
/// Packs the arguments of the shared mutation path into a single struct
/// to satisfy clippy's argument count limit and keep call sites readable.
struct BalanceChange<'a> {
    /// User whose balance changes.
    user_id: UserId,
    /// Signed petal delta. Positive = earn, negative = spend.
    amount: i64,
    /// Ledger source tag.
    source: &'a str,
    /// Optional human-readable description.
    description: Option<String>,
    /// Free-form metadata for the ledger entry.
    metadata: serde_json::Value,
    /// Timestamp recorded on the entry.
    created_at: DateTime<Utc>,
}

/// Reject non-positive amounts and empty sources before any side effect.
fn validate(amount: i64, source: &str) -> Result<(), EconomyError> {
    if amount <= 0 {
        return Err(EconomyError::InvalidAmount { amount });
    }
    if source.trim().is_empty() {
        return Err(EconomyError::MissingSource);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_and_negative_amounts_are_rejected() {
        assert!(matches!(
            validate(0, "mini_game"),
            Err(EconomyError::InvalidAmount { amount: 0 })
        ));
        assert!(matches!(
            validate(-10, "mini_game"),
            Err(EconomyError::InvalidAmount { amount: -10 })
        ));
    }

    #[test]
    fn blank_sources_are_rejected() {
        assert!(matches!(validate(10, ""), Err(EconomyError::MissingSource)));
        assert!(matches!(
            validate(10, "   "),
            Err(EconomyError::MissingSource)
        ));
    }

    #[test]
    fn positive_amount_with_source_passes() {
        assert!(validate(1, "mini_game").is_ok());
    }

    #[test]
    fn request_constructors_fill_optional_fields() {
        let user_id = UserId::new();
        let grant = GrantRequest::new(user_id, 10, "mini_game");
        assert_eq!(grant.amount, 10);
        assert!(grant.idempotency_key.is_none());
        assert!(grant.description.is_none());

        let debit = DebitRequest::new(user_id, 5, "purchase:sku1");
        assert_eq!(debit.amount, 5);
        assert!(debit.description.is_none());
    }
}
