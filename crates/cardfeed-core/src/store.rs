//! Cache store: source id -> local id -> card.
//!
//! Writes come only from the dispatcher worker. Reads may happen from any
//! thread; every entry is replaced as a whole, so a reader sees either the old
//! or the new card, never a mix.

use cardfeed_types::{Card, CardImage, GlobalId};
use dashmap::DashMap;
use std::collections::HashMap;

#[derive(Default)]
pub struct CardStore {
    cards: DashMap<String, DashMap<u64, Card>>,
    /// Image index per source, keyed by image id
    images: DashMap<String, DashMap<u64, CardImage>>,
}

impl CardStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, source_id: &str, local_id: u64) -> bool {
        self.cards.get(source_id).is_some_and(|partition| partition.contains_key(&local_id))
    }

    pub fn get(&self, source_id: &str, local_id: u64) -> Option<Card> {
        self.cards.get(source_id)?.get(&local_id).map(|card| card.value().clone())
    }

    /// Look up `source/local`. Malformed ids are simply not found.
    pub fn get_by_global_id(&self, global_id: &str) -> Option<Card> {
        let id = GlobalId::parse(global_id)?;
        self.get(&id.source_id, id.local_id)
    }

    /// Insert or replace; creates the partition for an unseen source.
    pub fn upsert(&self, source_id: &str, card: Card) {
        self.cards.entry(source_id.to_string()).or_default().insert(card.id, card);
    }

    /// Remove and return the prior value.
    pub fn delete(&self, source_id: &str, local_id: u64) -> Option<Card> {
        self.cards.get(source_id)?.remove(&local_id).map(|(_, card)| card)
    }

    /// Snapshot of every cached card, in no particular order.
    pub fn all(&self) -> Vec<Card> {
        self.cards
            .iter()
            .flat_map(|partition| {
                partition.value().iter().map(|card| card.value().clone()).collect::<Vec<_>>()
            })
            .collect()
    }

    /// Swap in a freshly loaded partition for `source_id`.
    pub fn replace_partition(&self, source_id: &str, cards: Vec<Card>) {
        let partition: DashMap<u64, Card> = cards.into_iter().map(|c| (c.id, c)).collect();
        self.cards.insert(source_id.to_string(), partition);
    }

    pub fn partition_snapshot(&self, source_id: &str) -> HashMap<u64, Card> {
        self.cards
            .get(source_id)
            .map(|partition| {
                partition.iter().map(|card| (*card.key(), card.value().clone())).collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.cards.iter().map(|partition| partition.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn source_count(&self) -> usize {
        self.cards.len()
    }

    /// Index an image; returns the previous version with the same id.
    pub fn upsert_image(&self, source_id: &str, image: CardImage) -> Option<CardImage> {
        self.images.entry(source_id.to_string()).or_default().insert(image.id, image)
    }

    pub fn delete_image(&self, source_id: &str, image_id: u64) -> Option<CardImage> {
        self.images.get(source_id)?.remove(&image_id).map(|(_, image)| image)
    }

    pub fn replace_images(&self, source_id: &str, images: Vec<CardImage>) {
        let index: DashMap<u64, CardImage> = images.into_iter().map(|i| (i.id, i)).collect();
        self.images.insert(source_id.to_string(), index);
    }

    /// Images owned by `card_id`, ordered by image id.
    pub fn images_for_card(&self, source_id: &str, card_id: u64) -> Vec<CardImage> {
        let mut images: Vec<CardImage> = self
            .images
            .get(source_id)
            .map(|index| {
                index
                    .iter()
                    .filter(|image| image.data_card_id == card_id)
                    .map(|image| image.value().clone())
                    .collect()
            })
            .unwrap_or_default();
        images.sort_by_key(|image| image.id);
        images
    }

    pub fn remove_images_for_card(&self, source_id: &str, card_id: u64) {
        if let Some(index) = self.images.get(source_id) {
            index.retain(|_, image| image.data_card_id != card_id);
        }
    }

    /// Drop every partition and image index.
    pub fn clear(&self) {
        self.cards.clear();
        self.images.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(source: &str, id: u64, title: &str) -> Card {
        let mut card = Card::new(source, id);
        card.title = Some(title.to_string());
        card
    }

    #[test]
    fn test_upsert_get_delete() {
        let store = CardStore::new();
        assert!(!store.has("s", 1));
        assert!(store.get("s", 1).is_none());

        store.upsert("s", card("s", 1, "first"));
        assert!(store.has("s", 1));
        assert_eq!(store.source_count(), 1);

        store.upsert("s", card("s", 1, "second"));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("s", 1).and_then(|c| c.title).as_deref(), Some("second"));

        let removed = store.delete("s", 1);
        assert_eq!(removed.map(|c| c.global_id().to_string()).as_deref(), Some("s/1"));
        assert!(!store.has("s", 1));
        assert!(store.delete("s", 1).is_none());
        assert!(store.delete("unknown", 1).is_none());
    }

    #[test]
    fn test_global_id_lookup() {
        let store = CardStore::new();
        store.upsert("com.example.feed", card("com.example.feed", 3, "x"));

        assert_eq!(store.get_by_global_id("com.example.feed/3"), store.get("com.example.feed", 3));
        assert!(store.get_by_global_id("com.example.feed/3").is_some());
        assert!(store.get_by_global_id("bogus").is_none());
        assert!(store.get_by_global_id("com.example.feed/notanumber").is_none());
        assert!(store.get_by_global_id("com.example.feed/4").is_none());
    }

    #[test]
    fn test_replace_partition_drops_stale_ids() {
        let store = CardStore::new();
        store.upsert("s", card("s", 1, "a"));
        store.upsert("s", card("s", 2, "b"));
        store.upsert("t", card("t", 1, "c"));

        store.replace_partition("s", vec![card("s", 3, "d")]);

        let mut ids: Vec<String> = store.all().iter().map(|c| c.global_id().to_string()).collect();
        ids.sort();
        assert_eq!(ids, vec!["s/3", "t/1"]);
    }

    #[test]
    fn test_image_index() {
        let store = CardStore::new();
        store.upsert_image("s", CardImage::new(5, 1, "u://5"));
        store.upsert_image("s", CardImage::new(2, 1, "u://2"));
        store.upsert_image("s", CardImage::new(3, 2, "u://3"));

        let ids: Vec<u64> = store.images_for_card("s", 1).iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![2, 5]);

        let prior = store.upsert_image("s", CardImage::new(5, 2, "u://5"));
        assert_eq!(prior.map(|i| i.data_card_id), Some(1));

        store.remove_images_for_card("s", 2);
        assert!(store.images_for_card("s", 2).is_empty());
        assert_eq!(store.delete_image("s", 2).map(|i| i.id), Some(2));
        assert!(store.delete_image("s", 2).is_none());
    }

    #[test]
    fn test_concurrent_readers_see_whole_records() {
        use std::sync::Arc;

        let store = Arc::new(CardStore::new());
        let writer = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for i in 0..2_000u64 {
                    let mut c = card("s", 1, &format!("title-{i}"));
                    c.body_text = Some(format!("body-{i}"));
                    store.upsert("s", c);
                }
            })
        };

        for _ in 0..2_000 {
            if let Some(c) = store.get("s", 1) {
                let title = c.title.unwrap_or_default();
                let body = c.body_text.unwrap_or_default();
                assert_eq!(title.trim_start_matches("title-"), body.trim_start_matches("body-"));
            }
        }
        assert!(writer.join().is_ok());
    }
}
