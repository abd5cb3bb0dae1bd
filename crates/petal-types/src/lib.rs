//! Shared type definitions for the petal economy engine.
//!
//! This crate holds the types every other crate (and the platform's
//! TypeScript frontend, via `ts-rs` bindings) agrees on:
//!
//! - [`ids`] -- strongly-typed UUID wrappers ([`UserId`], [`LedgerEntryId`])
//! - [`enums`] -- the daily-cap category ([`CapCategory`])
//! - [`structs`] -- wallet, ledger entry, and operation receipts
//! - [`sources`] -- well-known ledger source-tag constants
//!
//! No behavior lives here; validation and persistence belong to the
//! `petal-economy` and `petal-db` crates.

pub mod enums;
pub mod ids;
pub mod sources;
pub mod structs;

// Re-export primary types at crate root.
pub use enums::CapCategory;
pub use ids::{LedgerEntryId, UserId};
pub use structs::{DebitReceipt, GrantReceipt, LedgerEntry, Wallet, WalletInfo};
