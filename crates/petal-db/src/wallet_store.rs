//! Wallet persistence: one row per user, mutated only through atomic
//! increments.
//!
//! The wallet row is a materialized view of the ledger. Nothing in this
//! module (or anywhere else) writes `balance` with a read-then-write pair:
//! [`WalletStore::apply_delta`] is a single guarded `UPDATE .. SET balance
//! = balance + delta`, so concurrent grants and debits for the same user
//! can never lose updates.
//!
//! Pool-scoped reads take `&PgPool`; mutation helpers take a
//! `&mut PgConnection` so the grant/debit services compose them with the
//! matching ledger insert inside one transaction.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use petal_types::{UserId, Wallet};

use crate::error::DbError;

/// A row from the `wallets` table.
#[derive(Debug, Clone, sqlx::FromRow)]
struct WalletRow {
    user_id: Uuid,
    balance: i64,
    lifetime_earned: i64,
    current_streak: i32,
    last_collected_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<WalletRow> for Wallet {
    fn from(row: WalletRow) -> Self {
        Self {
            user_id: UserId::from(row.user_id),
            balance: row.balance,
            lifetime_earned: row.lifetime_earned,
            current_streak: row.current_streak,
            last_collected_at: row.last_collected_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Operations on the `wallets` table.
pub struct WalletStore<'a> {
    pool: &'a PgPool,
}

impl<'a> WalletStore<'a> {
    /// Create a new wallet store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Return the user's wallet, creating an empty one on first access.
    ///
    /// Wallets are created lazily and never deleted. The insert is
    /// `ON CONFLICT DO NOTHING`, so two racing first accesses both end up
    /// reading the single row that won.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the insert or read fails.
    pub async fn get_or_create(&self, user_id: UserId) -> Result<Wallet, DbError> {
        sqlx::query(
            r"INSERT INTO wallets (user_id) VALUES ($1)
              ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(user_id.into_inner())
        .execute(self.pool)
        .await?;

        let row = sqlx::query_as::<_, WalletRow>(
            r"SELECT user_id, balance, lifetime_earned, current_streak,
                     last_collected_at, created_at, updated_at
              FROM wallets
              WHERE user_id = $1",
        )
        .bind(user_id.into_inner())
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }

    /// Return the user's wallet without creating one.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn get(&self, user_id: UserId) -> Result<Option<Wallet>, DbError> {
        let row = sqlx::query_as::<_, WalletRow>(
            r"SELECT user_id, balance, lifetime_earned, current_streak,
                     last_collected_at, created_at, updated_at
              FROM wallets
              WHERE user_id = $1",
        )
        .bind(user_id.into_inner())
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Wallet::from))
    }
}

impl WalletStore<'_> {
    /// Get-or-create the wallet inside the caller's transaction and lock
    /// its row until commit.
    ///
    /// The row lock serializes all wallet work for one user at the storage
    /// layer: cap headroom computed after this call cannot be invalidated
    /// by a concurrent grant for the same user.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the insert or locked read fails.
    pub async fn get_or_create_locked(
        conn: &mut PgConnection,
        user_id: UserId,
    ) -> Result<Wallet, DbError> {
        sqlx::query(
            r"INSERT INTO wallets (user_id) VALUES ($1)
              ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(user_id.into_inner())
        .execute(&mut *conn)
        .await?;

        let row = sqlx::query_as::<_, WalletRow>(
            r"SELECT user_id, balance, lifetime_earned, current_streak,
                     last_collected_at, created_at, updated_at
              FROM wallets
              WHERE user_id = $1
              FOR UPDATE",
        )
        .bind(user_id.into_inner())
        .fetch_one(&mut *conn)
        .await?;

        Ok(row.into())
    }

    /// Lock and return the wallet inside the caller's transaction, without
    /// creating one. The debit path uses this: spending against an
    /// identity with no wallet is an error, not a lazy creation.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the locked read fails.
    pub async fn get_locked(
        conn: &mut PgConnection,
        user_id: UserId,
    ) -> Result<Option<Wallet>, DbError> {
        let row = sqlx::query_as::<_, WalletRow>(
            r"SELECT user_id, balance, lifetime_earned, current_streak,
                     last_collected_at, created_at, updated_at
              FROM wallets
              WHERE user_id = $1
              FOR UPDATE",
        )
        .bind(user_id.into_inner())
        .fetch_optional(&mut *conn)
        .await?;

        Ok(row.map(Wallet::from))
    }

    /// Atomically adjust the balance by `amount` (positive or negative)
    /// inside the caller's transaction.
    ///
    /// On an earn (`is_earn`), `lifetime_earned` grows by the same amount
    /// and `last_collected_at` is stamped. The statement is guarded with
    /// `balance + amount >= 0`, so a delta that would take the balance
    /// negative updates nothing and returns `None`. `None` is also
    /// returned when no wallet row exists.
    ///
    /// Must run in the same transaction as the matching ledger insert --
    /// the two together are the only legal way to change a balance.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the update fails.
    pub async fn apply_delta(
        conn: &mut PgConnection,
        user_id: UserId,
        amount: i64,
        is_earn: bool,
    ) -> Result<Option<Wallet>, DbError> {
        let row = sqlx::query_as::<_, WalletRow>(
            r"UPDATE wallets
              SET balance = balance + $2,
                  lifetime_earned = lifetime_earned
                      + CASE WHEN $3 THEN $2 ELSE 0 END,
                  last_collected_at = CASE WHEN $3 THEN now()
                                           ELSE last_collected_at END,
                  updated_at = now()
              WHERE user_id = $1 AND balance + $2 >= 0
              RETURNING user_id, balance, lifetime_earned, current_streak,
                        last_collected_at, created_at, updated_at",
        )
        .bind(user_id.into_inner())
        .bind(amount)
        .bind(is_earn)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(row.map(Wallet::from))
    }

    /// Persist a new streak counter inside the caller's transaction.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the update fails.
    pub async fn set_streak(
        conn: &mut PgConnection,
        user_id: UserId,
        streak: i32,
    ) -> Result<(), DbError> {
        sqlx::query(
            r"UPDATE wallets
              SET current_streak = $2, updated_at = now()
              WHERE user_id = $1",
        )
        .bind(user_id.into_inner())
        .bind(streak)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }
}
