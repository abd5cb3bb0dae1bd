//! Ledger persistence: the append-only log of balance-changing events.
//!
//! Every grant and debit inserts exactly one row here, in the same
//! transaction as the wallet delta. Rows are never updated or deleted;
//! corrections are new offsetting entries. Daily-cap headroom is derived
//! by aggregating this table, so a manual correction automatically adjusts
//! the remaining headroom.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use petal_types::{LedgerEntry, LedgerEntryId, UserId};

use crate::error::DbError;

/// A row from the `ledger` table.
#[derive(Debug, Clone, sqlx::FromRow)]
struct LedgerRow {
    id: Uuid,
    user_id: Uuid,
    amount: i64,
    source: String,
    description: Option<String>,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl From<LedgerRow> for LedgerEntry {
    fn from(row: LedgerRow) -> Self {
        Self {
            id: LedgerEntryId::from(row.id),
            user_id: UserId::from(row.user_id),
            amount: row.amount,
            source: row.source,
            description: row.description,
            metadata: row.metadata,
            created_at: row.created_at,
        }
    }
}

/// Per-source earn totals inside a time window, as returned by
/// [`LedgerStore::earned_by_source`]. The engine folds these through the
/// source-to-category mapping; the database never sees category rules.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SourceEarned {
    /// The ledger source tag.
    pub source: String,
    /// Sum of positive amounts recorded under the tag in the window.
    pub earned: i64,
}

/// Operations on the `ledger` table.
pub struct LedgerStore<'a> {
    pool: &'a PgPool,
}

impl<'a> LedgerStore<'a> {
    /// Create a new ledger store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Query the most recent entries for a user, newest first.
    ///
    /// Backs transaction-history surfaces; not used by the grant/debit
    /// protocols themselves.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn recent_for_user(
        &self,
        user_id: UserId,
        limit: i64,
    ) -> Result<Vec<LedgerEntry>, DbError> {
        let rows = sqlx::query_as::<_, LedgerRow>(
            r"SELECT id, user_id, amount, source, description, metadata, created_at
              FROM ledger
              WHERE user_id = $1
              ORDER BY created_at DESC, id DESC
              LIMIT $2",
        )
        .bind(user_id.into_inner())
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(LedgerEntry::from).collect())
    }

    /// Sum every entry for a user: the balance of record.
    ///
    /// By the ledger-balance invariant this always equals
    /// `wallets.balance`; the audit tooling compares the two.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn balance_of_record(&self, user_id: UserId) -> Result<i64, DbError> {
        let row: (i64,) = sqlx::query_as(
            r"SELECT COALESCE(SUM(amount), 0)::BIGINT
              FROM ledger
              WHERE user_id = $1",
        )
        .bind(user_id.into_inner())
        .fetch_one(self.pool)
        .await?;

        Ok(row.0)
    }
}

impl LedgerStore<'_> {
    /// Append one entry inside the caller's transaction.
    ///
    /// The id and `created_at` are generated app-side by the caller, so
    /// the entry handed in is exactly the entry persisted.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the insert fails.
    pub async fn insert(conn: &mut PgConnection, entry: &LedgerEntry) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO ledger (id, user_id, amount, source, description, metadata, created_at)
              VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(entry.id.into_inner())
        .bind(entry.user_id.into_inner())
        .bind(entry.amount)
        .bind(&entry.source)
        .bind(entry.description.as_deref())
        .bind(&entry.metadata)
        .bind(entry.created_at)
        .execute(&mut *conn)
        .await?;

        tracing::debug!(
            entry_id = %entry.id,
            user_id = %entry.user_id,
            amount = entry.amount,
            source = %entry.source,
            "Ledger entry appended"
        );
        Ok(())
    }

    /// Per-source sums of earn entries (positive amounts) for a user
    /// inside `[from, to)`, computed within the caller's transaction.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn earned_by_source(
        conn: &mut PgConnection,
        user_id: UserId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<SourceEarned>, DbError> {
        let rows = sqlx::query_as::<_, SourceEarned>(
            r"SELECT source, COALESCE(SUM(amount), 0)::BIGINT AS earned
              FROM ledger
              WHERE user_id = $1
                AND amount > 0
                AND created_at >= $2
                AND created_at < $3
              GROUP BY source",
        )
        .bind(user_id.into_inner())
        .bind(from)
        .bind(to)
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows)
    }

    /// Whether the user has an earn entry under any of `sources` inside
    /// `[from, to)`. The streak tracker probes yesterday's window with
    /// the daily-bonus source class.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn has_earn_in_window(
        conn: &mut PgConnection,
        user_id: UserId,
        sources: &[&str],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<bool, DbError> {
        let tags: Vec<String> = sources.iter().map(|s| (*s).to_owned()).collect();
        let row: (bool,) = sqlx::query_as(
            r"SELECT EXISTS (
                  SELECT 1 FROM ledger
                  WHERE user_id = $1
                    AND amount > 0
                    AND source = ANY($2)
                    AND created_at >= $3
                    AND created_at < $4
              )",
        )
        .bind(user_id.into_inner())
        .bind(&tags)
        .bind(from)
        .bind(to)
        .fetch_one(&mut *conn)
        .await?;

        Ok(row.0)
    }
}
