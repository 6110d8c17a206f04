//! Cross-source card identity.

use serde::{Deserialize, Serialize};
use std::fmt;

/// `<source-id>/<local-id>`, the identifier handed to listeners and API callers.
///
/// Always derived from its two parts; the string form is never stored on its own.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct GlobalId {
    pub source_id: String,
    pub local_id: u64,
}

impl GlobalId {
    pub fn new(source_id: impl Into<String>, local_id: u64) -> Self {
        Self { source_id: source_id.into(), local_id }
    }

    /// Parse `source/local`. Returns `None` when the separator is missing, the
    /// source part is empty, or the trailing segment is not a plain non-negative
    /// integer that fits in `u64`.
    pub fn parse(raw: &str) -> Option<Self> {
        let (source_id, local) = raw.rsplit_once('/')?;
        if source_id.is_empty() || local.is_empty() || !local.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let local_id = local.parse::<u64>().ok()?;
        Some(Self::new(source_id, local_id))
    }
}

impl fmt::Display for GlobalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.source_id, self.local_id)
    }
}

impl From<GlobalId> for String {
    fn from(id: GlobalId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for GlobalId {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw).ok_or_else(|| format!("invalid global id: {raw}"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_display_roundtrips_through_parse() {
        let id = GlobalId::new("com.example.feed", 42);
        assert_eq!(id.to_string(), "com.example.feed/42");
        assert_eq!(GlobalId::parse("com.example.feed/42"), Some(id));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!(GlobalId::parse("bogus"), None);
        assert_eq!(GlobalId::parse("s/notanumber"), None);
        assert_eq!(GlobalId::parse("s/"), None);
        assert_eq!(GlobalId::parse("/7"), None);
        assert_eq!(GlobalId::parse("s/-1"), None);
        assert_eq!(GlobalId::parse("s/+1"), None);
        assert_eq!(GlobalId::parse("s/1.0"), None);
        assert_eq!(GlobalId::parse("s/99999999999999999999999"), None);
    }

    #[test]
    fn test_serializes_as_string() {
        let id = GlobalId::new("com.example.feed", 3);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"com.example.feed/3\"");
        let back: GlobalId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<GlobalId>("\"nope\"").is_err());
    }
}
