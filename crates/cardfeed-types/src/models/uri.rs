//! `content://<source>/<path>` resource references.

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

use crate::contract::{data_card, data_card_image, DELETE_SEGMENT, SCHEME};
use crate::error::SourceError;

/// The two collections every source publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Cards,
    Images,
}

impl Collection {
    pub const ALL: [Collection; 2] = [Collection::Cards, Collection::Images];

    pub fn path(&self) -> &'static str {
        match self {
            Self::Cards => data_card::PATH,
            Self::Images => data_card_image::PATH,
        }
    }

    pub fn from_path(segment: &str) -> Option<Self> {
        match segment {
            data_card::PATH => Some(Self::Cards),
            data_card_image::PATH => Some(Self::Images),
            _ => None,
        }
    }
}

/// A parsed resource reference. The authority is the source id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceUri(Url);

impl ResourceUri {
    /// Parse a raw reference. Only `content://` URIs with an authority are accepted.
    pub fn parse(raw: &str) -> Option<Self> {
        let url = Url::parse(raw).ok()?;
        if url.scheme() != SCHEME || url.host_str().map_or(true, str::is_empty) {
            return None;
        }
        Some(Self(url))
    }

    /// `content://<source>/<collection>`
    pub fn collection(source_id: &str, collection: Collection) -> Result<Self, SourceError> {
        let raw = format!("{SCHEME}://{source_id}/{}", collection.path());
        Self::parse(&raw).ok_or(SourceError::Unsupported { uri: raw })
    }

    /// `<collection uri>/<id>`
    pub fn item(&self, id: u64) -> Self {
        self.appended(&[&id.to_string()])
    }

    /// `<collection uri>/delete/<id>`
    pub fn delete_item(&self, id: u64) -> Self {
        self.appended(&[DELETE_SEGMENT, &id.to_string()])
    }

    fn appended(&self, extra: &[&str]) -> Self {
        let mut url = self.0.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(extra);
        }
        Self(url)
    }

    pub fn authority(&self) -> &str {
        self.0.host_str().unwrap_or_default()
    }

    /// Non-empty path segments.
    pub fn segments(&self) -> Vec<&str> {
        self.0
            .path_segments()
            .map(|segments| segments.filter(|s| !s.is_empty()).collect())
            .unwrap_or_default()
    }

    /// Trailing segment parsed as a local id.
    pub fn last_id(&self) -> Option<u64> {
        let last = *self.segments().last()?;
        if last.is_empty() || !last.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        last.parse().ok()
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for ResourceUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_and_item_uris() {
        let cards = ResourceUri::collection("com.example.feed", Collection::Cards).unwrap();
        assert_eq!(cards.as_str(), "content://com.example.feed/datacard");
        assert_eq!(cards.authority(), "com.example.feed");

        let item = cards.item(12);
        assert_eq!(item.as_str(), "content://com.example.feed/datacard/12");
        assert_eq!(item.last_id(), Some(12));

        let delete = cards.delete_item(12);
        assert_eq!(delete.as_str(), "content://com.example.feed/datacard/delete/12");
        assert_eq!(delete.segments(), vec!["datacard", "delete", "12"]);
    }

    #[test]
    fn test_parse_rejects_foreign_schemes() {
        assert!(ResourceUri::parse("https://com.example.feed/datacard").is_none());
        assert!(ResourceUri::parse("content:///datacard").is_none());
        assert!(ResourceUri::parse("not a uri").is_none());
        assert!(ResourceUri::parse("content://com.example.feed/datacard/").is_some());
    }

    #[test]
    fn test_last_id_requires_digits() {
        let uri = ResourceUri::parse("content://s/datacard/abc").unwrap();
        assert_eq!(uri.last_id(), None);
    }
}
