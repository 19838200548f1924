//! # Cards
//!
//! Flashcards belong to exactly one list and are deleted with it.
//!
//! ## Updates
//!
//! Clients send several payload shapes to the same endpoint (accuracy
//! tracking, inline editing, chunking, bulk import). The payload is resolved
//! once into a [`CardUpdate`], checked in this order:
//!
//! 1. `correct_attempts` + `total_attempts`: accuracy counters
//! 2. `field` + `value`: one editable column
//! 3. `chunk_id`: chunk only
//! 4. `term` + `translation` (+ `secondary_translation`): legacy combined edit
//!
//! A payload may satisfy more than one shape, the first match wins.
use rusqlite::{ErrorCode, OptionalExtension, Row, ToSql, params};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::{database::Store, error::AppError};

pub const EDITABLE_FIELDS: [&str; 5] = [
    "term",
    "translation",
    "secondary_translation",
    "starred",
    "chunk_id",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Card {
    pub id: i64,
    pub list_id: i64,
    pub chunk_id: i64,
    pub term: String,
    pub translation: String,
    pub secondary_translation: String,
    pub correct_attempts: i64,
    pub total_attempts: i64,
    pub starred: bool,
}

impl Card {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            list_id: row.get("list_id")?,
            chunk_id: row.get("chunk_id")?,
            term: row.get("term")?,
            translation: row.get("translation")?,
            secondary_translation: row.get("secondary_translation")?,
            correct_attempts: row.get("correct_attempts")?,
            total_attempts: row.get("total_attempts")?,
            starred: row.get("starred")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewCard {
    pub id: i64,
    pub list_id: i64,
}

/// Only the counters are typed. Everything else is coerced once its mode is
/// picked, so a stray field of the wrong type never blocks another mode.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CardUpdatePayload {
    pub field: Option<Value>,
    pub value: Option<Value>,
    pub term: Option<Value>,
    pub translation: Option<Value>,
    pub secondary_translation: Option<Value>,
    pub correct_attempts: Option<i64>,
    pub total_attempts: Option<i64>,
    pub chunk_id: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CardField {
    Term(String),
    Translation(String),
    SecondaryTranslation(String),
    Starred(bool),
    ChunkId(i64),
}

impl CardField {
    /// `name` must already be one of [`EDITABLE_FIELDS`].
    fn coerce(name: &str, value: Value) -> Result<Self, AppError> {
        let invalid = || AppError::Validation(format!("Invalid value for field: {name}"));

        let field = match name {
            "term" => CardField::Term(text(value).ok_or_else(invalid)?),
            "translation" => CardField::Translation(text(value).ok_or_else(invalid)?),
            "secondary_translation" => {
                CardField::SecondaryTranslation(text(value).ok_or_else(invalid)?)
            }
            "starred" => CardField::Starred(flag(&value).ok_or_else(invalid)?),
            "chunk_id" => CardField::ChunkId(integer(&value).ok_or_else(invalid)?),
            other => return Err(AppError::InvalidField(other.to_string())),
        };

        Ok(field)
    }

    fn column(&self) -> &'static str {
        match self {
            CardField::Term(_) => "term",
            CardField::Translation(_) => "translation",
            CardField::SecondaryTranslation(_) => "secondary_translation",
            CardField::Starred(_) => "starred",
            CardField::ChunkId(_) => "chunk_id",
        }
    }

    fn value(&self) -> &dyn ToSql {
        match self {
            CardField::Term(v) | CardField::Translation(v) | CardField::SecondaryTranslation(v) => {
                v as &dyn ToSql
            }
            CardField::Starred(v) => v as &dyn ToSql,
            CardField::ChunkId(v) => v as &dyn ToSql,
        }
    }
}

fn text(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|n| n != 0.0),
        _ => None,
    }
}

fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CardUpdate {
    Accuracy {
        correct_attempts: i64,
        total_attempts: i64,
    },
    Field(CardField),
    Chunk(i64),
    Combined {
        term: String,
        translation: String,
        secondary_translation: String,
    },
}

impl TryFrom<CardUpdatePayload> for CardUpdate {
    type Error = AppError;

    fn try_from(payload: CardUpdatePayload) -> Result<Self, AppError> {
        if let (Some(correct_attempts), Some(total_attempts)) =
            (payload.correct_attempts, payload.total_attempts)
        {
            return Ok(CardUpdate::Accuracy {
                correct_attempts,
                total_attempts,
            });
        }

        // An unknown field without a value only fails once nothing else matched.
        let mut unknown_field = None;

        if let Some(field) = payload.field.and_then(field_name) {
            let known = EDITABLE_FIELDS.contains(&field.as_str());

            match payload.value {
                Some(value) if known => {
                    return CardField::coerce(&field, value).map(CardUpdate::Field);
                }
                Some(_) => return Err(AppError::InvalidField(field)),
                None if !known => unknown_field = Some(field),
                None => {}
            }
        }

        if let Some(chunk_id) = payload.chunk_id.filter(|value| !value.is_null()) {
            return integer(&chunk_id)
                .map(CardUpdate::Chunk)
                .ok_or_else(|| AppError::Validation("Invalid value for field: chunk_id".into()));
        }

        let term = payload.term.and_then(text).filter(|s| !s.is_empty());
        let translation = payload.translation.and_then(text).filter(|s| !s.is_empty());

        match (term, translation) {
            (Some(term), Some(translation)) => Ok(CardUpdate::Combined {
                term,
                translation,
                secondary_translation: payload
                    .secondary_translation
                    .and_then(text)
                    .unwrap_or_default(),
            }),
            _ => Err(unknown_field
                .map(AppError::InvalidField)
                .unwrap_or(AppError::InvalidUpdate)),
        }
    }
}

/// Empty and null names count as no field at all.
fn field_name(field: Value) -> Option<String> {
    match field {
        Value::Null => None,
        Value::String(name) if name.is_empty() => None,
        Value::String(name) => Some(name),
        other => Some(other.to_string()),
    }
}

const CARD_COLUMNS: &str = "id, list_id, chunk_id, term, translation, secondary_translation, \
                            correct_attempts, total_attempts, starred";

impl Store {
    pub fn cards(&self, list_id: i64) -> Result<Vec<Card>, AppError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {CARD_COLUMNS} FROM cards WHERE list_id = ?1"))?;

        let cards = stmt
            .query_map([list_id], Card::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(cards)
    }

    pub fn card(&self, id: i64) -> Result<Card, AppError> {
        self.conn
            .query_row(
                &format!("SELECT {CARD_COLUMNS} FROM cards WHERE id = ?1"),
                [id],
                Card::from_row,
            )
            .optional()?
            .ok_or(AppError::NotFound("Card"))
    }

    pub fn create_card(&self, list_id: i64) -> Result<NewCard, AppError> {
        self.conn
            .execute("INSERT INTO cards (list_id) VALUES (?1)", [list_id])
            .map_err(|e| match e.sqlite_error_code() {
                Some(ErrorCode::ConstraintViolation) => AppError::NotFound("List"),
                _ => AppError::Database(e),
            })?;
        let id = self.conn.last_insert_rowid();

        debug!("Created card {id} in list {list_id}");
        Ok(NewCard { id, list_id })
    }

    pub fn update_card(&self, id: i64, update: &CardUpdate) -> Result<(), AppError> {
        let changed = match update {
            CardUpdate::Accuracy {
                correct_attempts,
                total_attempts,
            } => self.conn.execute(
                "UPDATE cards SET correct_attempts = ?1, total_attempts = ?2 WHERE id = ?3",
                params![correct_attempts, total_attempts, id],
            )?,
            CardUpdate::Field(field) => self.conn.execute(
                &format!("UPDATE cards SET {} = ?1 WHERE id = ?2", field.column()),
                params![field.value(), id],
            )?,
            CardUpdate::Chunk(chunk_id) => self.conn.execute(
                "UPDATE cards SET chunk_id = ?1 WHERE id = ?2",
                params![chunk_id, id],
            )?,
            CardUpdate::Combined {
                term,
                translation,
                secondary_translation,
            } => self.conn.execute(
                "UPDATE cards SET term = ?1, translation = ?2, secondary_translation = ?3 \
                 WHERE id = ?4",
                params![term, translation, secondary_translation, id],
            )?,
        };

        debug!("Updated card {id}, {changed} row(s)");
        Ok(())
    }

    pub fn delete_card(&self, id: i64) -> Result<(), AppError> {
        let changed = self.conn.execute("DELETE FROM cards WHERE id = ?1", [id])?;

        debug!("Deleted card {id}, {changed} row(s)");
        Ok(())
    }

    pub fn reset_accuracy(&self, list_id: i64) -> Result<(), AppError> {
        let changed = self.conn.execute(
            "UPDATE cards SET correct_attempts = 0, total_attempts = 0 WHERE list_id = ?1",
            [list_id],
        )?;

        debug!("Reset accuracy of {changed} card(s) in list {list_id}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn store_with_list() -> (Store, i64) {
        let store = Store::open_in_memory().unwrap();
        let list = store.create_list(None, 1.0).unwrap();
        (store, list.id)
    }

    fn resolve(payload: Value) -> Result<CardUpdate, AppError> {
        let payload: CardUpdatePayload = serde_json::from_value(payload).unwrap();
        CardUpdate::try_from(payload)
    }

    #[test]
    fn test_new_card_defaults() {
        let (store, list_id) = store_with_list();

        let created = store.create_card(list_id).unwrap();
        let card = store.card(created.id).unwrap();

        assert_eq!(
            card,
            Card {
                id: created.id,
                list_id,
                chunk_id: 0,
                term: String::new(),
                translation: String::new(),
                secondary_translation: String::new(),
                correct_attempts: 0,
                total_attempts: 0,
                starred: false,
            }
        );
    }

    #[test]
    fn test_card_requires_existing_list() {
        let store = Store::open_in_memory().unwrap();

        assert!(matches!(
            store.create_card(7),
            Err(AppError::NotFound("List"))
        ));
    }

    #[test]
    fn test_cards_scoped_to_list() {
        let (store, first) = store_with_list();
        let second = store.create_list(None, 1.0).unwrap().id;

        store.create_card(first).unwrap();
        store.create_card(first).unwrap();
        store.create_card(second).unwrap();

        assert_eq!(store.cards(first).unwrap().len(), 2);
        assert_eq!(store.cards(second).unwrap().len(), 1);
        assert!(store.cards(999).unwrap().is_empty());
    }

    #[test]
    fn test_delete_list_cascades() {
        let (store, list_id) = store_with_list();
        let card = store.create_card(list_id).unwrap();

        store.delete_list(list_id).unwrap();

        assert!(matches!(
            store.card(card.id),
            Err(AppError::NotFound("Card"))
        ));
    }

    #[test]
    fn test_accuracy_wins_over_other_shapes() {
        let update = resolve(json!({
            "correct_attempts": 3,
            "total_attempts": 5,
            "term": "perro",
            "translation": "dog",
            "field": "starred",
            "value": true,
        }))
        .unwrap();

        assert_eq!(
            update,
            CardUpdate::Accuracy {
                correct_attempts: 3,
                total_attempts: 5,
            }
        );
    }

    #[test]
    fn test_zero_counts_are_present() {
        let update = resolve(json!({ "correct_attempts": 0, "total_attempts": 0 })).unwrap();

        assert_eq!(
            update,
            CardUpdate::Accuracy {
                correct_attempts: 0,
                total_attempts: 0,
            }
        );
    }

    #[test]
    fn test_single_field() {
        assert_eq!(
            resolve(json!({ "field": "starred", "value": true })).unwrap(),
            CardUpdate::Field(CardField::Starred(true))
        );
        assert_eq!(
            resolve(json!({ "field": "chunk_id", "value": "4" })).unwrap(),
            CardUpdate::Field(CardField::ChunkId(4))
        );
        assert_eq!(
            resolve(json!({ "field": "term", "value": "" })).unwrap(),
            CardUpdate::Field(CardField::Term(String::new()))
        );
    }

    #[test]
    fn test_unknown_field() {
        assert!(matches!(
            resolve(json!({ "field": "color" })),
            Err(AppError::InvalidField(field)) if field == "color"
        ));
        assert!(matches!(
            resolve(json!({ "field": "color", "value": "red" })),
            Err(AppError::InvalidField(_))
        ));
    }

    #[test]
    fn test_unknown_field_without_value_falls_through() {
        assert_eq!(
            resolve(json!({ "field": "color", "chunk_id": 2 })).unwrap(),
            CardUpdate::Chunk(2)
        );
        assert_eq!(
            resolve(json!({
                "field": "color",
                "value": null,
                "term": "a",
                "translation": "b",
            }))
            .unwrap(),
            CardUpdate::Combined {
                term: "a".to_string(),
                translation: "b".to_string(),
                secondary_translation: String::new(),
            }
        );
    }

    #[test]
    fn test_unused_fields_are_not_type_checked() {
        assert_eq!(
            resolve(json!({ "correct_attempts": 3, "total_attempts": 5, "chunk_id": "2" }))
                .unwrap(),
            CardUpdate::Accuracy {
                correct_attempts: 3,
                total_attempts: 5,
            }
        );
        assert_eq!(
            resolve(json!({ "correct_attempts": 1, "total_attempts": 2, "term": 7 })).unwrap(),
            CardUpdate::Accuracy {
                correct_attempts: 1,
                total_attempts: 2,
            }
        );
    }

    #[test]
    fn test_chunk_coercion() {
        assert_eq!(
            resolve(json!({ "chunk_id": "4" })).unwrap(),
            CardUpdate::Chunk(4)
        );
        assert!(matches!(
            resolve(json!({ "chunk_id": "four" })),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_uncoercible_value() {
        assert!(matches!(
            resolve(json!({ "field": "starred", "value": "yes" })),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_field_without_value_falls_through() {
        assert_eq!(
            resolve(json!({ "field": "term", "value": null, "chunk_id": 2 })).unwrap(),
            CardUpdate::Chunk(2)
        );
    }

    #[test]
    fn test_legacy_combined() {
        assert_eq!(
            resolve(json!({ "term": "gato", "translation": "cat" })).unwrap(),
            CardUpdate::Combined {
                term: "gato".to_string(),
                translation: "cat".to_string(),
                secondary_translation: String::new(),
            }
        );
        assert!(matches!(
            resolve(json!({ "term": "gato", "translation": "" })),
            Err(AppError::InvalidUpdate)
        ));
    }

    #[test]
    fn test_empty_payload() {
        assert!(matches!(resolve(json!({})), Err(AppError::InvalidUpdate)));
    }

    #[test]
    fn test_apply_updates() {
        let (store, list_id) = store_with_list();
        let id = store.create_card(list_id).unwrap().id;

        store
            .update_card(
                id,
                &CardUpdate::Combined {
                    term: "casa".to_string(),
                    translation: "house".to_string(),
                    secondary_translation: "home".to_string(),
                },
            )
            .unwrap();
        store
            .update_card(id, &CardUpdate::Field(CardField::Starred(true)))
            .unwrap();
        store.update_card(id, &CardUpdate::Chunk(3)).unwrap();
        store
            .update_card(
                id,
                &CardUpdate::Accuracy {
                    correct_attempts: 3,
                    total_attempts: 5,
                },
            )
            .unwrap();

        let card = store.card(id).unwrap();
        assert_eq!(card.term, "casa");
        assert_eq!(card.translation, "house");
        assert_eq!(card.secondary_translation, "home");
        assert!(card.starred);
        assert_eq!(card.chunk_id, 3);
        assert_eq!((card.correct_attempts, card.total_attempts), (3, 5));
    }

    #[test]
    fn test_reset_accuracy() {
        let (store, list_id) = store_with_list();
        let other = store.create_list(None, 1.0).unwrap().id;

        for (list, correct, total) in [(list_id, 3, 5), (list_id, 1, 1), (other, 2, 2)] {
            let id = store.create_card(list).unwrap().id;
            store
                .update_card(
                    id,
                    &CardUpdate::Accuracy {
                        correct_attempts: correct,
                        total_attempts: total,
                    },
                )
                .unwrap();
        }

        store.reset_accuracy(list_id).unwrap();

        for card in store.cards(list_id).unwrap() {
            assert_eq!((card.correct_attempts, card.total_attempts), (0, 0));
        }
        assert_eq!(store.cards(other).unwrap()[0].correct_attempts, 2);
    }

    #[test]
    fn test_reset_accuracy_on_empty_list() {
        let (store, list_id) = store_with_list();

        store.reset_accuracy(list_id).unwrap();
        store.reset_accuracy(12345).unwrap();
    }

    #[test]
    fn test_delete_card_is_idempotent() {
        let (store, list_id) = store_with_list();
        let id = store.create_card(list_id).unwrap().id;

        store.delete_card(id).unwrap();
        store.delete_card(id).unwrap();

        assert!(store.cards(list_id).unwrap().is_empty());
    }
}
