//! Notification URI classification.

use cardfeed_types::contract::DELETE_SEGMENT;
use cardfeed_types::{Collection, ResourceUri};

use crate::registry::SourceRegistry;

/// The six notification shapes a source can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    CardsCollection,
    CardItem(u64),
    CardDelete(u64),
    ImagesCollection,
    ImageItem(u64),
    ImageDelete(u64),
}

impl Route {
    pub fn collection(&self) -> Collection {
        match self {
            Self::CardsCollection | Self::CardItem(_) | Self::CardDelete(_) => Collection::Cards,
            Self::ImagesCollection | Self::ImageItem(_) | Self::ImageDelete(_) => {
                Collection::Images
            },
        }
    }
}

/// Match the path of `uri` against the per-source route table:
///
/// ```text
/// <collection>                 -> collection changed
/// <collection>/<id>            -> item inserted or updated
/// <collection>/delete/<id>     -> item deleted
/// ```
///
/// The authority is not checked here; callers verify it names a registered source.
pub fn match_route(uri: &ResourceUri) -> Option<Route> {
    let segments = uri.segments();
    let (first, rest) = segments.split_first()?;
    let collection = Collection::from_path(first)?;

    match (collection, rest) {
        (Collection::Cards, []) => Some(Route::CardsCollection),
        (Collection::Images, []) => Some(Route::ImagesCollection),
        (Collection::Cards, [id]) => parse_id(id).map(Route::CardItem),
        (Collection::Images, [id]) => parse_id(id).map(Route::ImageItem),
        (Collection::Cards, [marker, id]) if *marker == DELETE_SEGMENT => {
            parse_id(id).map(Route::CardDelete)
        },
        (Collection::Images, [marker, id]) if *marker == DELETE_SEGMENT => {
            parse_id(id).map(Route::ImageDelete)
        },
        _ => None,
    }
}

/// Classify a notification URI. `None` unless the authority names a
/// registered source and the path is one of the six shapes.
pub fn classify(uri: &ResourceUri, registry: &SourceRegistry) -> Option<Route> {
    if !registry.contains(uri.authority()) {
        return None;
    }
    match_route(uri)
}

fn parse_id(segment: &str) -> Option<u64> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn route(raw: &str) -> Option<Route> {
        match_route(&ResourceUri::parse(raw).unwrap())
    }

    #[test]
    fn test_all_six_shapes() {
        assert_eq!(route("content://s/datacard"), Some(Route::CardsCollection));
        assert_eq!(route("content://s/datacard/4"), Some(Route::CardItem(4)));
        assert_eq!(route("content://s/datacard/delete/4"), Some(Route::CardDelete(4)));
        assert_eq!(route("content://s/datacardimage"), Some(Route::ImagesCollection));
        assert_eq!(route("content://s/datacardimage/9"), Some(Route::ImageItem(9)));
        assert_eq!(route("content://s/datacardimage/delete/9"), Some(Route::ImageDelete(9)));
    }

    #[test]
    fn test_unmatched_shapes() {
        assert_eq!(route("content://s/"), None);
        assert_eq!(route("content://s/other"), None);
        assert_eq!(route("content://s/datacard/abc"), None);
        assert_eq!(route("content://s/datacard/remove/4"), None);
        assert_eq!(route("content://s/datacard/4/extra"), None);
        assert_eq!(route("content://s/datacard/delete"), None);
    }

    #[test]
    fn test_classify_requires_registered_authority() {
        use crate::registry::RegisteredSource;
        use crate::source::MemorySource;
        use cardfeed_types::models::CapabilityConfig;
        use cardfeed_types::SourceDescriptor;

        let registry = SourceRegistry::new(CapabilityConfig::default());
        registry.replace_all(std::collections::BTreeMap::from([(
            "s".to_string(),
            RegisteredSource {
                descriptor: SourceDescriptor::new("s").unwrap(),
                client: MemorySource::new("s"),
            },
        )]));

        let known = ResourceUri::parse("content://s/datacard/1").unwrap();
        let unknown = ResourceUri::parse("content://t/datacard/1").unwrap();
        assert_eq!(classify(&known, &registry), Some(Route::CardItem(1)));
        assert_eq!(classify(&unknown, &registry), None);
    }

    #[test]
    fn test_route_collection() {
        assert_eq!(Route::CardDelete(1).collection(), Collection::Cards);
        assert_eq!(Route::ImagesCollection.collection(), Collection::Images);
    }
}
