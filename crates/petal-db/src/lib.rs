//! `PostgreSQL` data layer for the petal economy engine.
//!
//! `PostgreSQL` is the single durable store: wallet rows, the append-only
//! ledger, and the idempotency registry. The engine relies on exactly two
//! of its guarantees for cross-request correctness -- atomic multi-statement
//! transactions and unique-constraint enforcement -- and on nothing
//! in-process.
//!
//! # Architecture
//!
//! ```text
//! Grant / Debit service (petal-economy)
//!     |
//!     +-- one transaction per operation
//!         |-- WalletStore       (get-or-create, guarded atomic deltas)
//!         |-- LedgerStore       (append-only event rows, window sums)
//!         +-- IdempotencyStore  (keyed expiring request records)
//! ```
//!
//! # Modules
//!
//! - [`postgres`] -- connection pool, configuration, migrations
//! - [`wallet_store`] -- `wallets` table operations
//! - [`ledger_store`] -- `ledger` table operations
//! - [`idempotency_store`] -- `idempotency_keys` table operations
//! - [`error`] -- shared error types

pub mod error;
pub mod idempotency_store;
pub mod ledger_store;
pub mod postgres;
pub mod wallet_store;

// Re-export primary types for convenience.
pub use error::DbError;
pub use idempotency_store::IdempotencyStore;
pub use ledger_store::{LedgerStore, SourceEarned};
pub use postgres::{PostgresConfig, PostgresPool};
pub use wallet_store::WalletStore;
