//! # Repository Module
//!
//! Repository implementations for the offline store.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  Sync engine                                                           │
//! │       │                                                                 │
//! │       │  db.pending_operations().list()                                │
//! │       ▼                                                                 │
//! │  PendingOperationRepository                                            │
//! │  ├── append(&self, type, payload)                                      │
//! │  ├── list(&self)                                                       │
//! │  ├── set_retry_count(&self, id, n)                                     │
//! │  └── remove(&self, id)                                                 │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`reference::ReferenceRepository`] - Cached product/category/customer snapshots
//! - [`pending::PendingOperationRepository`] - Durable FIFO of unconfirmed mutations
//! - [`dropped::DroppedOperationRepository`] - Dead-letter ledger
//! - [`settings::SettingsRepository`] - Key/value settings

pub mod dropped;
pub mod pending;
pub mod reference;
pub mod settings;
