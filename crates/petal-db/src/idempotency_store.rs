//! Idempotency registry: keyed, expiring records of processed requests.
//!
//! The primary-key constraint on `key` is the concurrency primitive. Two
//! racing submissions of the same logical request both call
//! [`IdempotencyStore::reserve`]; the constraint makes exactly one of them
//! the first writer, and the loser falls back to reading the winner's
//! stored response. No application-level locking is involved -- correctness
//! rests on the constraint check being atomic at the storage layer.
//!
//! Records expire after a TTL. An expired key is reclaimed atomically by
//! the next `reserve` (a retried request after expiry must not be blocked
//! forever by a dead key), and [`IdempotencyStore::purge_expired`] deletes
//! leftovers opportunistically.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::PgPool;

use crate::error::DbError;

/// Operations on the `idempotency_keys` table.
pub struct IdempotencyStore<'a> {
    pool: &'a PgPool,
}

impl<'a> IdempotencyStore<'a> {
    /// Create a new idempotency store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Attempt to claim `key`. Returns `true` when the caller is the
    /// first writer and must proceed with the operation; `false` when a
    /// live record already holds the key and the caller must fetch and
    /// return the stored response instead.
    ///
    /// The claim is one atomic statement: a fresh insert, or a takeover
    /// of an expired record (`ON CONFLICT .. DO UPDATE .. WHERE expired`).
    /// A conflicting live record updates zero rows.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the statement fails.
    pub async fn reserve(
        &self,
        key: &str,
        purpose: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, DbError> {
        let result = sqlx::query(
            r"INSERT INTO idempotency_keys (key, purpose, response, expires_at, created_at)
              VALUES ($1, $2, NULL, $3, now())
              ON CONFLICT (key) DO UPDATE
                  SET purpose = EXCLUDED.purpose,
                      response = NULL,
                      expires_at = EXCLUDED.expires_at,
                      created_at = now()
                  WHERE idempotency_keys.expires_at <= now()",
        )
        .bind(key)
        .bind(purpose)
        .bind(expires_at)
        .execute(self.pool)
        .await?;

        let claimed = result.rows_affected() == 1;
        if !claimed {
            tracing::debug!(key, purpose, "Duplicate request, replaying stored response");
        }
        Ok(claimed)
    }

    /// Persist the operation's result under `key` so duplicate
    /// submissions can replay it.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Serialization`] if the response cannot be
    /// serialized, or [`DbError::Postgres`] if the update fails.
    pub async fn store_response<T: Serialize>(
        &self,
        key: &str,
        response: &T,
    ) -> Result<(), DbError> {
        let payload = serde_json::to_value(response)?;
        sqlx::query(
            r"UPDATE idempotency_keys
              SET response = $2
              WHERE key = $1",
        )
        .bind(key)
        .bind(payload)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Read the stored response for `key`, if the record is still live
    /// and the winner has already written it. Returns `None` both for an
    /// unknown/expired key and for a reservation whose operation is still
    /// in flight.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Serialization`] if the stored payload does not
    /// match `T`, or [`DbError::Postgres`] if the query fails.
    pub async fn fetch_response<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<T>, DbError> {
        let row: Option<(Option<serde_json::Value>,)> = sqlx::query_as(
            r"SELECT response
              FROM idempotency_keys
              WHERE key = $1 AND expires_at > now()",
        )
        .bind(key)
        .fetch_optional(self.pool)
        .await?;

        match row.and_then(|(response,)| response) {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Delete expired records. Returns the number of rows removed.
    ///
    /// Safe to run at any time from any instance; the maintenance binary
    /// runs it on a schedule.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the delete fails.
    pub async fn purge_expired(&self) -> Result<u64, DbError> {
        let result = sqlx::query(
            r"DELETE FROM idempotency_keys
              WHERE expires_at <= now()",
        )
        .execute(self.pool)
        .await?;

        let purged = result.rows_affected();
        if purged > 0 {
            tracing::debug!(purged, "Expired idempotency records purged");
        }
        Ok(purged)
    }
}
