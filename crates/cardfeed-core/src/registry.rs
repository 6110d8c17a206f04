//! Source registry: discovery by capability and the set of registered sources.

use cardfeed_types::models::CapabilityConfig;
use cardfeed_types::SourceDescriptor;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::source::{DataSource, SourceCandidate, SourceProvider};

/// A discovered, eligible source and the client used to reach it.
#[derive(Clone)]
pub struct RegisteredSource {
    pub descriptor: SourceDescriptor,
    pub client: Arc<dyn DataSource>,
}

impl RegisteredSource {
    pub fn source_id(&self) -> &str {
        &self.descriptor.source_id
    }
}

impl std::fmt::Debug for RegisteredSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredSource").field("descriptor", &self.descriptor).finish()
    }
}

/// Registered sources keyed by source id.
///
/// The set is swapped as a whole on (re)initialization; it is never patched
/// entry by entry. Readers get a consistent snapshot.
pub struct SourceRegistry {
    capabilities: CapabilityConfig,
    sources: RwLock<Arc<BTreeMap<String, RegisteredSource>>>,
}

impl SourceRegistry {
    pub fn new(capabilities: CapabilityConfig) -> Self {
        Self { capabilities, sources: RwLock::new(Arc::new(BTreeMap::new())) }
    }

    /// A candidate qualifies only if it advertises both the read and the write tag.
    pub fn is_eligible(&self, candidate: &SourceCandidate) -> bool {
        candidate.read_capability.as_deref() == Some(self.capabilities.read.as_str())
            && candidate.write_capability.as_deref() == Some(self.capabilities.write.as_str())
    }

    /// Enumerate `provider` and keep the eligible candidates.
    ///
    /// Fails soft: broken candidates are logged and skipped. Does not touch the
    /// registered set, so calling it twice against the same environment gives
    /// the same result.
    pub async fn discover_sources(
        &self,
        provider: &dyn SourceProvider,
    ) -> BTreeMap<String, RegisteredSource> {
        let mut discovered = BTreeMap::new();

        for candidate in provider.enumerate().await {
            let candidate = match candidate {
                Ok(candidate) => candidate,
                Err(e) => {
                    tracing::warn!("Skipping source candidate: {}", e);
                    continue;
                },
            };

            if !self.is_eligible(&candidate) {
                tracing::debug!(
                    "Ignoring {}: missing feed capabilities (read={:?}, write={:?})",
                    candidate.source_id,
                    candidate.read_capability,
                    candidate.write_capability
                );
                continue;
            }

            let descriptor = match SourceDescriptor::new(candidate.source_id.clone()) {
                Ok(descriptor) => descriptor,
                Err(e) => {
                    tracing::warn!("Skipping source {}: {}", candidate.source_id, e);
                    continue;
                },
            };

            if discovered.contains_key(&descriptor.source_id) {
                tracing::warn!("Duplicate source id {}, keeping the first", descriptor.source_id);
                continue;
            }

            discovered.insert(
                descriptor.source_id.clone(),
                RegisteredSource { descriptor, client: candidate.client },
            );
        }

        discovered
    }

    /// Replace the registered set.
    pub fn replace_all(&self, sources: BTreeMap<String, RegisteredSource>) {
        tracing::info!("Registered {} card source(s)", sources.len());
        *self.sources.write() = Arc::new(sources);
    }

    pub fn clear(&self) {
        *self.sources.write() = Arc::new(BTreeMap::new());
    }

    pub fn get(&self, source_id: &str) -> Option<RegisteredSource> {
        self.sources.read().get(source_id).cloned()
    }

    pub fn contains(&self, source_id: &str) -> bool {
        self.sources.read().contains_key(source_id)
    }

    pub fn snapshot(&self) -> Arc<BTreeMap<String, RegisteredSource>> {
        Arc::clone(&self.sources.read())
    }

    pub fn descriptors(&self) -> Vec<SourceDescriptor> {
        self.snapshot().values().map(|s| s.descriptor.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.sources.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{MemorySource, StaticSourceProvider};
    use cardfeed_types::contract::{FEED_READ_PERM, FEED_WRITE_PERM};
    use cardfeed_types::SourceError;

    fn candidate(id: &str, read: Option<&str>, write: Option<&str>) -> SourceCandidate {
        SourceCandidate {
            source_id: id.to_string(),
            read_capability: read.map(String::from),
            write_capability: write.map(String::from),
            client: MemorySource::new(id),
        }
    }

    fn provider() -> StaticSourceProvider {
        StaticSourceProvider::new()
            .with(candidate("com.example.both", Some(FEED_READ_PERM), Some(FEED_WRITE_PERM)))
            .with(candidate("com.example.read", Some(FEED_READ_PERM), None))
            .with(candidate("com.example.write", None, Some(FEED_WRITE_PERM)))
            .with(candidate("com.example.swapped", Some(FEED_WRITE_PERM), Some(FEED_READ_PERM)))
            .with_failure(SourceError::Discovery {
                candidate: "com.example.broken".to_string(),
                message: "package vanished".to_string(),
            })
    }

    #[tokio::test]
    async fn test_requires_both_capabilities() {
        let registry = SourceRegistry::new(CapabilityConfig::default());
        let found = registry.discover_sources(&provider()).await;

        assert_eq!(found.keys().cloned().collect::<Vec<_>>(), vec!["com.example.both"]);
    }

    #[tokio::test]
    async fn test_discovery_is_idempotent_and_pure() {
        let registry = SourceRegistry::new(CapabilityConfig::default());
        let provider = provider();

        let first = registry.discover_sources(&provider).await;
        let second = registry.discover_sources(&provider).await;
        assert_eq!(
            first.keys().collect::<Vec<_>>(),
            second.keys().collect::<Vec<_>>()
        );
        assert!(registry.is_empty());

        registry.replace_all(first);
        assert!(registry.contains("com.example.both"));
        assert_eq!(registry.len(), 1);

        registry.clear();
        assert!(registry.get("com.example.both").is_none());
    }

    #[tokio::test]
    async fn test_invalid_source_id_is_skipped() {
        let registry = SourceRegistry::new(CapabilityConfig::default());
        let provider = StaticSourceProvider::new()
            .with(candidate("bad host id", Some(FEED_READ_PERM), Some(FEED_WRITE_PERM)))
            .with(candidate("com.example.ok", Some(FEED_READ_PERM), Some(FEED_WRITE_PERM)));

        let found = registry.discover_sources(&provider).await;
        assert_eq!(found.len(), 1);
        assert!(found.contains_key("com.example.ok"));
    }
}
