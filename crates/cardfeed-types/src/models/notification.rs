//! Raw change notifications and the semantic events derived from them.

use serde::{Deserialize, Serialize};

use super::GlobalId;

/// A change notification exactly as a source emitted it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawNotification {
    /// Resource reference of the change (collection or item)
    pub uri: String,
    /// Set when the change was caused by our own write; such notifications are dropped
    #[serde(default)]
    pub self_originated: bool,
}

impl RawNotification {
    pub fn new(uri: impl Into<String>, self_originated: bool) -> Self {
        Self { uri: uri.into(), self_originated }
    }

    /// Notification caused by a writer other than us.
    pub fn external(uri: impl Into<String>) -> Self {
        Self::new(uri, false)
    }
}

/// Semantic event delivered to listeners after a cache mutation commits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CardEvent {
    InsertOrUpdate { global_id: GlobalId },
    Delete { global_id: GlobalId },
}

impl CardEvent {
    pub fn global_id(&self) -> &GlobalId {
        match self {
            Self::InsertOrUpdate { global_id } | Self::Delete { global_id } => global_id,
        }
    }
}
