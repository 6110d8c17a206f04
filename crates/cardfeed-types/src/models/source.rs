//! Registered source descriptor.

use serde::{Deserialize, Serialize};

use super::{Collection, ResourceUri};
use crate::error::SourceError;

/// Capability descriptor for one discovered source: its id and the two
/// collection endpoints it publishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub source_id: String,
    pub cards_uri: ResourceUri,
    pub images_uri: ResourceUri,
}

impl SourceDescriptor {
    pub fn new(source_id: impl Into<String>) -> Result<Self, SourceError> {
        let source_id = source_id.into();
        let cards_uri = ResourceUri::collection(&source_id, Collection::Cards)?;
        let images_uri = ResourceUri::collection(&source_id, Collection::Images)?;
        Ok(Self { source_id, cards_uri, images_uri })
    }
}
