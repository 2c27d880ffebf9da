//! # norko-core: Pure Types and Rules for Norko POS
//!
//! Everything the local store, the sync engine and the UI layer agree on,
//! with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Norko POS Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 UI collaborator (status bar, toasts)            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ SyncStatus / Notification              │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    norko-sync (engine)                          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ norko-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐                  │   │
//! │  │   │   types   │  │   sale    │  │ validation│                  │   │
//! │  │   │ Pending-  │  │ SaleDraft │  │   rules   │                  │   │
//! │  │   │ Operation │  │ SaleItem  │  │  checks   │                  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘                  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Sync domain types (PendingOperation, SyncStatus, ...)
//! - [`sale`] - Sale drafts recorded at the register
//! - [`error`] - Domain error types
//! - [`validation`] - Sale draft validation
//!
//! ## Example Usage
//!
//! ```rust
//! use norko_core::{OperationType, ReferenceCollection};
//!
//! assert_eq!(ReferenceCollection::Products.endpoint(), "/api/products");
//! assert_eq!(OperationType::from_tag("create_sale"), OperationType::CreateSale);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod sale;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use sale::{PaymentType, SaleDraft, SaleItemDraft};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Failed submissions tolerated before a pending operation is dropped.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Settings key holding the last successful sync time (ISO-8601).
pub const LAST_SYNC_SETTING_KEY: &str = "lastSyncTime";

/// Periodic sync interval.
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 5 * 60;

/// Pause after connectivity returns before a sync is attempted.
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 1_000;

/// Maximum length of free-text sale notes.
pub const MAX_SALE_NOTES_LEN: usize = 500;
