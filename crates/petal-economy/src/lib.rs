//! Ledger-backed virtual-currency engine for the petal platform.
//!
//! Every feature that moves petals -- game wins, praise, purchases, the
//! daily collection -- goes through this crate's [`PetalEconomy`] service.
//! The service credits and debits wallet balances, enforces idempotency
//! and per-category daily earning caps, and tracks consecutive-day streak
//! bonuses.
//!
//! # Architecture
//!
//! - [`engine`] -- the [`PetalEconomy`] service: grant/debit protocols,
//!   wallet info, headroom queries.
//! - [`caps`] -- source-to-category mapping and calendar-day windows.
//! - [`streak`] -- consecutive-day streak arithmetic.
//! - [`config`] -- typed YAML configuration with env overrides.
//! - [`error`] -- the operation error taxonomy.
//!
//! # Invariants
//!
//! 1. A balance changes only alongside a ledger insertion in the same
//!    transaction: `sum(ledger.amount) == wallet.balance` for every user,
//!    always.
//! 2. `lifetime_earned` only grows, and only on credits.
//! 3. A balance never goes negative; an overdraw fails with no mutation.
//! 4. Two submissions sharing an idempotency key mutate state at most
//!    once; the duplicate replays the stored receipt.
//!
//! # Usage
//!
//! ```no_run
//! use petal_economy::{EconomyConfig, GrantRequest, PetalEconomy};
//! use petal_db::PostgresPool;
//! use petal_types::UserId;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = PostgresPool::connect_url("postgresql://localhost/petals").await?;
//! let economy = PetalEconomy::new(pool.pool().clone(), EconomyConfig::default());
//!
//! let user = UserId::new();
//! let receipt = economy
//!     .grant(GrantRequest::new(user, 100, "mini_game"))
//!     .await?;
//! assert_eq!(receipt.granted, 100);
//! # Ok(())
//! # }
//! ```

pub mod caps;
pub mod config;
pub mod engine;
pub mod error;
pub mod streak;

// Re-export primary types at crate root.
pub use config::{ConfigError, DailyCapConfig, EconomyConfig, StreakConfig};
pub use engine::{DebitRequest, GrantRequest, PetalEconomy};
pub use error::EconomyError;
