use crate::database::CharacterRecord;
use serde::{Deserialize, Serialize};

/// Identity claimed by the host platform for the current app session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformUser {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
}

/// The mini-app runtime provided by the chat client.
pub trait HostBridge: Send + Sync {
    fn expand(&self);

    /// Tells the host the first screen is ready to show.
    fn ready(&self);

    /// Read on every use; the host may re-issue it at any time.
    fn platform_user(&self) -> Option<PlatformUser>;

    /// Fire-and-forget message to the host's bot.
    fn send_data(&self, payload: String);

    fn navigate(&self, url: &str);

    fn go_back(&self);
}

pub const SELECT_CHARACTER_ACTION: &str = "select_character";

/// Payload handed to [`HostBridge::send_data`] when a card is picked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionMessage {
    pub action: String,
    pub character_id: i64,
    pub character_name: String,
    pub character_description: String,
    pub character_avatar: Option<String>,
    pub telegram_id: Option<i64>,
    pub username: Option<String>,
    pub first_name: Option<String>,
}

impl SelectionMessage {
    pub fn new(
        character: &CharacterRecord,
        telegram_id: Option<i64>,
        platform_user: Option<&PlatformUser>,
    ) -> Self {
        Self {
            action: SELECT_CHARACTER_ACTION.to_string(),
            character_id: character.id,
            character_name: character.name.clone(),
            character_description: character.description.clone(),
            character_avatar: character.avatar_url.clone(),
            telegram_id,
            username: platform_user.and_then(|u| u.username.clone()),
            first_name: platform_user.and_then(|u| u.first_name.clone()),
        }
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Host that records every call.
    #[derive(Default)]
    pub struct RecordingHost {
        pub user: Mutex<Option<PlatformUser>>,
        pub expanded: Mutex<usize>,
        pub readied: Mutex<usize>,
        pub sent: Mutex<Vec<String>>,
        pub navigations: Mutex<Vec<String>>,
        pub backs: Mutex<usize>,
    }

    impl RecordingHost {
        pub fn with_user(id: i64) -> Self {
            let host = Self::default();
            *host.user.lock().unwrap() = Some(PlatformUser {
                id,
                username: Some("platform_user".to_string()),
                first_name: Some("Pat".to_string()),
                photo_url: Some("https://t.me/photo.jpg".to_string()),
            });
            host
        }

        pub fn ready_count(&self) -> usize {
            *self.readied.lock().unwrap()
        }
    }

    impl HostBridge for RecordingHost {
        fn expand(&self) {
            *self.expanded.lock().unwrap() += 1;
        }

        fn ready(&self) {
            *self.readied.lock().unwrap() += 1;
        }

        fn platform_user(&self) -> Option<PlatformUser> {
            self.user.lock().unwrap().clone()
        }

        fn send_data(&self, payload: String) {
            self.sent.lock().unwrap().push(payload);
        }

        fn navigate(&self, url: &str) {
            self.navigations.lock().unwrap().push(url.to_string());
        }

        fn go_back(&self) {
            *self.backs.lock().unwrap() += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::character;

    #[test]
    fn test_selection_message_schema() {
        let mut record = character(5, "Nova", true, 1);
        record.avatar_url = Some("https://cdn/nova.png".to_string());
        let user = PlatformUser {
            id: 77,
            username: None,
            first_name: Some("Pat".to_string()),
            photo_url: None,
        };

        let json = serde_json::to_value(SelectionMessage::new(&record, Some(77), Some(&user))).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "action": "select_character",
                "character_id": 5,
                "character_name": "Nova",
                "character_description": "Nova description",
                "character_avatar": "https://cdn/nova.png",
                "telegram_id": 77,
                "username": null,
                "first_name": "Pat"
            })
        );
    }
}
