//! Card and card image records as published by sources.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

use super::GlobalId;
use crate::contract::{data_card as dc, data_card_image as dci, ID_COL};
use crate::error::SourceError;

/// One row of a source query, keyed by column name.
pub type Row = serde_json::Map<String, Value>;

/// A labeled action attached to a card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardAction {
    pub text: Option<String>,
    /// Target reference opened when the action fires
    pub target: Option<String>,
}

/// Image attached to a card of the same source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardImage {
    pub id: u64,
    /// `Card::id` of the owning card within the same source
    pub data_card_id: u64,
    pub image_uri: String,
}

impl CardImage {
    pub fn new(id: u64, data_card_id: u64, image_uri: impl Into<String>) -> Self {
        Self { id, data_card_id, image_uri: image_uri.into() }
    }

    pub fn from_row(row: &Row) -> Result<Self, SourceError> {
        Ok(Self {
            id: required_id(row, ID_COL)?,
            data_card_id: required_id(row, dci::DATA_CARD_ID_COL)?,
            image_uri: optional_text(row, dci::IMAGE_URI_COL)?
                .ok_or_else(|| SourceError::malformed(dci::IMAGE_URI_COL, "missing"))?,
        })
    }

    pub fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.insert(ID_COL.to_string(), Value::from(self.id));
        row.insert(dci::DATA_CARD_ID_COL.to_string(), Value::from(self.data_card_id));
        row.insert(dci::IMAGE_URI_COL.to_string(), Value::from(self.image_uri.clone()));
        row
    }
}

/// A card record. Identity is `(source_id, id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: u64,
    pub source_id: String,
    pub subject: Option<String>,
    pub content_created_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub last_modified_at: Option<DateTime<Utc>>,
    pub content_source_image_uri: Option<String>,
    pub avatar_image_uri: Option<String>,
    pub title: Option<String>,
    pub small_text: Option<String>,
    pub body_text: Option<String>,
    pub action_1: Option<CardAction>,
    pub action_2: Option<CardAction>,
    /// Default sort key, ascending
    pub priority: i64,
    /// Attached images, ordered by image id
    #[serde(default)]
    pub images: Vec<CardImage>,
}

impl Card {
    /// Empty card with only its identity set.
    pub fn new(source_id: impl Into<String>, id: u64) -> Self {
        Self {
            id,
            source_id: source_id.into(),
            subject: None,
            content_created_at: None,
            created_at: None,
            last_modified_at: None,
            content_source_image_uri: None,
            avatar_image_uri: None,
            title: None,
            small_text: None,
            body_text: None,
            action_1: None,
            action_2: None,
            priority: 0,
            images: Vec::new(),
        }
    }

    pub fn global_id(&self) -> GlobalId {
        GlobalId::new(self.source_id.clone(), self.id)
    }

    /// Build a card from a row fetched with the canonical card projection.
    pub fn from_row(source_id: &str, row: &Row) -> Result<Self, SourceError> {
        Ok(Self {
            id: required_id(row, ID_COL)?,
            source_id: source_id.to_string(),
            subject: optional_text(row, dc::SUBJECT_COL)?,
            content_created_at: optional_timestamp(row, dc::DATE_CONTENT_CREATED_COL)?,
            created_at: optional_timestamp(row, dc::DATE_CREATED_COL)?,
            last_modified_at: optional_timestamp(row, dc::LAST_MODIFIED_COL)?,
            content_source_image_uri: optional_text(row, dc::CONTENT_SOURCE_IMAGE_URI_COL)?,
            avatar_image_uri: optional_text(row, dc::AVATAR_IMAGE_URI_COL)?,
            title: optional_text(row, dc::TITLE_TEXT_COL)?,
            small_text: optional_text(row, dc::SMALL_TEXT_COL)?,
            body_text: optional_text(row, dc::BODY_TEXT_COL)?,
            action_1: optional_action(row, dc::ACTION_1_TEXT_COL, dc::ACTION_1_URI_COL)?,
            action_2: optional_action(row, dc::ACTION_2_TEXT_COL, dc::ACTION_2_URI_COL)?,
            priority: optional_i64(row, dc::PRIORITY_COL)?.unwrap_or(0),
            images: Vec::new(),
        })
    }

    /// Inverse of [`Card::from_row`]. Images are not part of the card row.
    pub fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.insert(ID_COL.to_string(), Value::from(self.id));
        put_text(&mut row, dc::SUBJECT_COL, &self.subject);
        put_timestamp(&mut row, dc::DATE_CONTENT_CREATED_COL, &self.content_created_at);
        put_timestamp(&mut row, dc::DATE_CREATED_COL, &self.created_at);
        put_timestamp(&mut row, dc::LAST_MODIFIED_COL, &self.last_modified_at);
        put_text(&mut row, dc::CONTENT_SOURCE_IMAGE_URI_COL, &self.content_source_image_uri);
        put_text(&mut row, dc::AVATAR_IMAGE_URI_COL, &self.avatar_image_uri);
        put_text(&mut row, dc::TITLE_TEXT_COL, &self.title);
        put_text(&mut row, dc::SMALL_TEXT_COL, &self.small_text);
        put_text(&mut row, dc::BODY_TEXT_COL, &self.body_text);
        let action_1 = self.action_1.as_ref();
        put_text(&mut row, dc::ACTION_1_TEXT_COL, &action_1.and_then(|a| a.text.clone()));
        put_text(&mut row, dc::ACTION_1_URI_COL, &action_1.and_then(|a| a.target.clone()));
        let action_2 = self.action_2.as_ref();
        put_text(&mut row, dc::ACTION_2_TEXT_COL, &action_2.and_then(|a| a.text.clone()));
        put_text(&mut row, dc::ACTION_2_URI_COL, &action_2.and_then(|a| a.target.clone()));
        row.insert(dc::PRIORITY_COL.to_string(), Value::from(self.priority));
        row
    }

    /// Priority ascending, then global id so the order is total.
    pub fn default_order(a: &Card, b: &Card) -> Ordering {
        a.priority
            .cmp(&b.priority)
            .then_with(|| a.source_id.cmp(&b.source_id))
            .then_with(|| a.id.cmp(&b.id))
    }
}

/// Sort cards by [`Card::default_order`].
pub fn sort_default(cards: &mut [Card]) {
    cards.sort_by(Card::default_order);
}

fn required_id(row: &Row, column: &str) -> Result<u64, SourceError> {
    match row.get(column) {
        Some(Value::Number(n)) => {
            n.as_u64().ok_or_else(|| SourceError::malformed(column, format!("not a valid id: {n}")))
        },
        Some(Value::String(s)) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => {
            s.parse().map_err(|_| SourceError::malformed(column, format!("id out of range: {s}")))
        },
        Some(other) => Err(SourceError::malformed(column, format!("not a valid id: {other}"))),
        None => Err(SourceError::malformed(column, "missing")),
    }
}

fn optional_text(row: &Row, column: &str) -> Result<Option<String>, SourceError> {
    match row.get(column) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(SourceError::malformed(column, format!("expected text, got {other}"))),
    }
}

fn optional_i64(row: &Row, column: &str) -> Result<Option<i64>, SourceError> {
    match row.get(column) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| SourceError::malformed(column, format!("not an integer: {n}"))),
        Some(other) => Err(SourceError::malformed(column, format!("expected integer, got {other}"))),
    }
}

fn optional_timestamp(row: &Row, column: &str) -> Result<Option<DateTime<Utc>>, SourceError> {
    match optional_i64(row, column)? {
        None => Ok(None),
        Some(millis) => DateTime::from_timestamp_millis(millis)
            .map(Some)
            .ok_or_else(|| SourceError::malformed(column, format!("timestamp out of range: {millis}"))),
    }
}

fn optional_action(
    row: &Row,
    text_column: &str,
    target_column: &str,
) -> Result<Option<CardAction>, SourceError> {
    let text = optional_text(row, text_column)?;
    let target = optional_text(row, target_column)?;
    if text.is_none() && target.is_none() {
        return Ok(None);
    }
    Ok(Some(CardAction { text, target }))
}

fn put_text(row: &mut Row, column: &str, value: &Option<String>) {
    let value = value.clone().map(Value::from).unwrap_or(Value::Null);
    row.insert(column.to_string(), value);
}

fn put_timestamp(row: &mut Row, column: &str, value: &Option<DateTime<Utc>>) {
    let value = value.map(|ts| Value::from(ts.timestamp_millis())).unwrap_or(Value::Null);
    row.insert(column.to_string(), value);
}
