use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CharacterRecord {
    pub id: i64,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub personality: String,
    #[serde(default)]
    pub greeting_message: String,
    pub avatar_url: Option<String>,
    pub is_preset: bool,
    pub creator_id: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl CharacterRecord {
    /// Shared with everyone.
    pub fn is_public(&self) -> bool {
        self.is_preset
    }

    /// Owned by the given `users.id`.
    pub fn is_personal_to(&self, user_id: i64) -> bool {
        !self.is_preset && self.creator_id == user_id
    }
}

/// Insert payload for the `characters` table.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct NewCharacter {
    pub name: String,
    pub description: String,
    pub personality: String,
    pub greeting_message: String,
    pub avatar_url: Option<String>,
    pub is_preset: bool,
    pub creator_id: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Free-text fields as typed into the creation form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CharacterFields {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub personality: String,
    #[serde(default)]
    pub greeting_message: String,
    #[serde(default)]
    pub is_preset: bool,
}

impl NewCharacter {
    pub fn from_fields(fields: &CharacterFields, creator_id: i64) -> Self {
        Self {
            name: fields.name.trim().to_string(),
            description: fields.description.trim().to_string(),
            personality: fields.personality.trim().to_string(),
            greeting_message: fields.greeting_message.trim().to_string(),
            avatar_url: None,
            is_preset: fields.is_preset,
            creator_id,
            is_active: true,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A row change on a watched table.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub table: String,
    pub kind: ChangeKind,
    pub record_id: Option<i64>,
}
