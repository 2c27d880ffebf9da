//! # Domain Types
//!
//! Sync domain types used throughout Norko POS.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────────┐   ┌─────────────────────┐                      │
//! │  │  PendingOperation   │   │  ReferenceCollection│                      │
//! │  │  ─────────────────  │   │  ─────────────────  │                      │
//! │  │  id (monotonic)     │   │  Products           │                      │
//! │  │  operation_type     │   │  Categories         │                      │
//! │  │  payload (JSON)     │   │  Customers          │                      │
//! │  │  retry_count        │   └─────────────────────┘                      │
//! │  └─────────────────────┘                                                │
//! │                                                                         │
//! │  ┌─────────────────────┐   ┌─────────────────────┐                      │
//! │  │  SyncStatus (DTO)   │   │  Notification       │                      │
//! │  │  ─────────────────  │   │  ─────────────────  │                      │
//! │  │  isOnline           │   │  message            │                      │
//! │  │  syncInProgress     │   │  level              │                      │
//! │  │  lastSyncTime       │   │  (info/success/     │                      │
//! │  │  pendingOperation-  │   │   warning/error)    │                      │
//! │  │  Count              │   └─────────────────────┘                      │
//! │  └─────────────────────┘                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;

// =============================================================================
// Reference Collections
// =============================================================================

/// A reference entity set mirrored from the server.
///
/// Each collection is pulled as a full snapshot and replaces the local copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceCollection {
    Products,
    Categories,
    Customers,
}

impl ReferenceCollection {
    /// Every collection, in pull order.
    pub const ALL: [ReferenceCollection; 3] = [
        ReferenceCollection::Products,
        ReferenceCollection::Categories,
        ReferenceCollection::Customers,
    ];

    /// Storage name of the collection.
    pub fn name(&self) -> &'static str {
        match self {
            ReferenceCollection::Products => "products",
            ReferenceCollection::Categories => "categories",
            ReferenceCollection::Customers => "customers",
        }
    }

    /// Server path the snapshot is read from.
    pub fn endpoint(&self) -> &'static str {
        match self {
            ReferenceCollection::Products => "/api/products",
            ReferenceCollection::Categories => "/api/categories",
            ReferenceCollection::Customers => "/api/customers",
        }
    }
}

impl std::fmt::Display for ReferenceCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for ReferenceCollection {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "products" => Ok(ReferenceCollection::Products),
            "categories" => Ok(ReferenceCollection::Categories),
            "customers" => Ok(ReferenceCollection::Customers),
            other => Err(ValidationError::Inconsistent {
                field: "collection".to_string(),
                reason: format!("unknown collection '{}'", other),
            }),
        }
    }
}

// =============================================================================
// Connectivity
// =============================================================================

/// Whether the server is currently reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum ConnectivityState {
    Online,
    Offline,
}

impl ConnectivityState {
    pub fn from_online(online: bool) -> Self {
        if online {
            ConnectivityState::Online
        } else {
            ConnectivityState::Offline
        }
    }

    #[inline]
    pub fn is_online(&self) -> bool {
        matches!(self, ConnectivityState::Online)
    }
}

impl std::fmt::Display for ConnectivityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectivityState::Online => write!(f, "online"),
            ConnectivityState::Offline => write!(f, "offline"),
        }
    }
}

// =============================================================================
// Pending Operations
// =============================================================================

/// Tag of a queued mutation.
///
/// Dispatch over this enum is exhaustive: tags the client does not know how
/// to replay land in `Unsupported` and are dropped instead of silently ignored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OperationType {
    /// POST the payload to `/api/sales`.
    CreateSale,
    /// Any tag without a replay handler.
    Unsupported(String),
}

impl OperationType {
    pub const CREATE_SALE_TAG: &'static str = "create_sale";

    pub fn from_tag(tag: &str) -> Self {
        match tag {
            Self::CREATE_SALE_TAG => OperationType::CreateSale,
            other => OperationType::Unsupported(other.to_string()),
        }
    }

    pub fn as_tag(&self) -> &str {
        match self {
            OperationType::CreateSale => Self::CREATE_SALE_TAG,
            OperationType::Unsupported(tag) => tag,
        }
    }
}

impl From<String> for OperationType {
    fn from(tag: String) -> Self {
        OperationType::from_tag(&tag)
    }
}

impl From<OperationType> for String {
    fn from(op: OperationType) -> Self {
        op.as_tag().to_string()
    }
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_tag())
    }
}

/// A locally committed mutation awaiting confirmation by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PendingOperation {
    /// Store-generated, strictly increasing identifier.
    pub id: i64,

    #[ts(as = "String")]
    pub operation_type: OperationType,

    /// Opaque request body replayed against the server.
    pub payload: serde_json::Value,

    /// Failed submissions so far.
    pub retry_count: u32,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Why an operation left the queue without reaching the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Submission failed `max_retries` times.
    RetriesExhausted,
    /// No replay handler exists for the operation's tag.
    UnsupportedType,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::RetriesExhausted => "retries_exhausted",
            DropReason::UnsupportedType => "unsupported_type",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "retries_exhausted" => Some(DropReason::RetriesExhausted),
            "unsupported_type" => Some(DropReason::UnsupportedType),
            _ => None,
        }
    }
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A mutation permanently removed from the queue, kept for operator review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DroppedOperation {
    pub operation: PendingOperation,
    pub reason: DropReason,
    pub last_error: Option<String>,
    #[ts(as = "String")]
    pub dropped_at: DateTime<Utc>,
}

// =============================================================================
// Notifications
// =============================================================================

/// Severity of a user-facing notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A toast-level message for the UI collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Notification {
    pub message: String,
    pub level: NotificationLevel,
}

impl Notification {
    pub fn new(level: NotificationLevel, message: impl Into<String>) -> Self {
        Notification {
            message: message.into(),
            level,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Info, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Success, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Error, message)
    }
}

// =============================================================================
// Sync Status
// =============================================================================

/// Read-only snapshot of the sync engine, recomputed on every request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub is_online: bool,
    pub sync_in_progress: bool,
    #[ts(as = "Option<String>")]
    pub last_sync_time: Option<DateTime<Utc>>,
    pub pending_operation_count: usize,
    /// False when the local store is unavailable and sales go straight to the server.
    pub offline_capable: bool,
}

impl SyncStatus {
    /// How long ago the last successful sync happened, bucketed for display.
    pub fn last_sync_age(&self, now: DateTime<Utc>) -> SyncAge {
        SyncAge::between(self.last_sync_time, now)
    }
}

/// Coarse age of the last sync ("just now", "12 minutes ago", ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAge {
    Never,
    JustNow,
    Minutes(i64),
    Hours(i64),
}

impl SyncAge {
    pub fn between(last: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Self {
        let Some(last) = last else {
            return SyncAge::Never;
        };

        // Clock skew can put `last` slightly in the future.
        let minutes = (now - last).num_minutes().max(0);
        match minutes {
            0 => SyncAge::JustNow,
            m if m < 60 => SyncAge::Minutes(m),
            m => SyncAge::Hours(m / 60),
        }
    }
}

impl std::fmt::Display for SyncAge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncAge::Never => write!(f, "never"),
            SyncAge::JustNow => write!(f, "just now"),
            SyncAge::Minutes(1) => write!(f, "1 minute ago"),
            SyncAge::Minutes(m) => write!(f, "{} minutes ago", m),
            SyncAge::Hours(1) => write!(f, "1 hour ago"),
            SyncAge::Hours(h) => write!(f, "{} hours ago", h),
        }
    }
}
