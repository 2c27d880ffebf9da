//! # norko-db: Local Store for Norko POS
//!
//! The offline store the sync engine reads from and writes to. SQLite via
//! sqlx, one file per register.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Norko POS Data Flow                              │
//! │                                                                         │
//! │  norko-sync (engine)                                                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     norko-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────────┐  ┌──────────────┐ │   │
//! │  │   │   Database    │    │   Repositories    │  │  Migrations  │ │   │
//! │  │   │   (pool.rs)   │    │                   │  │  (embedded)  │ │   │
//! │  │   │               │    │ ReferenceRepo     │  │              │ │   │
//! │  │   │ SqlitePool    │◄───│ PendingOpRepo     │  │ 001_offline_ │ │   │
//! │  │   │               │    │ DroppedOpRepo     │  │   store.sql  │ │   │
//! │  │   │               │    │ SettingsRepo      │  │              │ │   │
//! │  │   └───────────────┘    └───────────────────┘  └──────────────┘ │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  │   <data dir>/norko.db                                          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use norko_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/norko.db")).await?;
//! let queued = db.pending_operations().list().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::dropped::DroppedOperationRepository;
pub use repository::pending::PendingOperationRepository;
pub use repository::reference::ReferenceRepository;
pub use repository::settings::SettingsRepository;
