//! In-process store used by controller tests.

use super::errors::DatabaseError;
use super::types::{ChangeEvent, ChangeKind, CharacterRecord, NewCharacter, UserRecord};
use super::{ChangeSubscription, DataStore, CHARACTERS_TABLE};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;

#[derive(Default)]
pub struct Failures {
    pub lookup: bool,
    pub insert: bool,
    pub upload: bool,
    pub update: bool,
    pub list: bool,
}

#[derive(Default)]
struct State {
    users: Vec<UserRecord>,
    characters: Vec<CharacterRecord>,
    objects: HashMap<String, (Vec<u8>, String)>,
    subscribers: Vec<mpsc::Sender<ChangeEvent>>,
    failures: Failures,
    burst_on_list: usize,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    list_calls: AtomicUsize,
    remote_calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(self, user: UserRecord) -> Self {
        self.state.lock().unwrap().users.push(user);
        self
    }

    pub fn with_character(self, character: CharacterRecord) -> Self {
        self.state.lock().unwrap().characters.push(character);
        self
    }

    pub fn fail(&self, configure: impl FnOnce(&mut Failures)) {
        configure(&mut self.state.lock().unwrap().failures);
    }

    pub fn characters(&self) -> Vec<CharacterRecord> {
        self.state.lock().unwrap().characters.clone()
    }

    pub fn object(&self, key: &str) -> Option<(Vec<u8>, String)> {
        self.state.lock().unwrap().objects.get(key).cloned()
    }

    pub fn object_keys(&self) -> Vec<String> {
        self.state.lock().unwrap().objects.keys().cloned().collect()
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn remote_calls(&self) -> usize {
        self.remote_calls.load(Ordering::SeqCst)
    }

    /// Subscriptions whose receiving side is still alive.
    pub fn live_subscribers(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.subscribers.iter().filter(|s| !s.is_closed()).count()
    }

    /// Pushes an event to every subscriber without touching the rows.
    pub fn notify(&self, kind: ChangeKind, record_id: Option<i64>) {
        let state = self.state.lock().unwrap();
        for subscriber in &state.subscribers {
            let _ = subscriber.try_send(ChangeEvent {
                table: CHARACTERS_TABLE.to_string(),
                kind,
                record_id,
            });
        }
    }

    /// The next catalog fetch pushes `count` notifications while it runs.
    pub fn notify_on_next_list(&self, count: usize) {
        self.state.lock().unwrap().burst_on_list = count;
    }

    fn count_call(&self) {
        self.remote_calls.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn character(id: i64, name: &str, is_preset: bool, creator_id: i64) -> CharacterRecord {
    CharacterRecord {
        id,
        name: name.to_string(),
        description: format!("{} description", name),
        personality: String::new(),
        greeting_message: String::new(),
        avatar_url: None,
        is_preset,
        creator_id,
        is_active: true,
        created_at: chrono::Utc::now() + chrono::Duration::seconds(id),
    }
}

pub fn user(id: i64, telegram_id: i64) -> UserRecord {
    UserRecord {
        id,
        telegram_id,
        first_name: Some("Ann".to_string()),
        username: Some("ann".to_string()),
        total_message_count: Some(40),
        daily_message_count: Some(3),
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn find_user_by_telegram_id(
        &self,
        telegram_id: i64,
    ) -> Result<Option<UserRecord>, DatabaseError> {
        self.count_call();
        let state = self.state.lock().unwrap();
        if state.failures.lookup {
            return Err(DatabaseError::QueryError("lookup failed".to_string()));
        }
        Ok(state
            .users
            .iter()
            .find(|u| u.telegram_id == telegram_id)
            .cloned())
    }

    async fn insert_character(
        &self,
        character: &NewCharacter,
    ) -> Result<CharacterRecord, DatabaseError> {
        self.count_call();
        let record = {
            let mut state = self.state.lock().unwrap();
            if state.failures.insert {
                return Err(DatabaseError::QueryError("insert failed".to_string()));
            }
            let id = state.characters.iter().map(|c| c.id).max().unwrap_or(0) + 1;
            let record = CharacterRecord {
                id,
                name: character.name.clone(),
                description: character.description.clone(),
                personality: character.personality.clone(),
                greeting_message: character.greeting_message.clone(),
                avatar_url: character.avatar_url.clone(),
                is_preset: character.is_preset,
                creator_id: character.creator_id,
                is_active: character.is_active,
                created_at: character.created_at,
            };
            state.characters.push(record.clone());
            record
        };
        self.notify(ChangeKind::Insert, Some(record.id));
        Ok(record)
    }

    async fn update_character_avatar(
        &self,
        character_id: i64,
        avatar_url: &str,
    ) -> Result<(), DatabaseError> {
        self.count_call();
        {
            let mut state = self.state.lock().unwrap();
            if state.failures.update {
                return Err(DatabaseError::QueryError("update failed".to_string()));
            }
            if let Some(record) = state.characters.iter_mut().find(|c| c.id == character_id) {
                record.avatar_url = Some(avatar_url.to_string());
            }
        }
        self.notify(ChangeKind::Update, Some(character_id));
        Ok(())
    }

    async fn list_active_characters(&self) -> Result<Vec<CharacterRecord>, DatabaseError> {
        self.count_call();
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let (result, burst) = {
            let mut state = self.state.lock().unwrap();
            let burst = std::mem::take(&mut state.burst_on_list);
            if state.failures.list {
                (Err(DatabaseError::QueryError("list failed".to_string())), burst)
            } else {
                let mut active: Vec<CharacterRecord> = state
                    .characters
                    .iter()
                    .filter(|c| c.is_active)
                    .cloned()
                    .collect();
                active.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                (Ok(active), burst)
            }
        };
        for _ in 0..burst {
            self.notify(ChangeKind::Update, None);
        }
        result
    }

    async fn upload_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, DatabaseError> {
        self.count_call();
        let mut state = self.state.lock().unwrap();
        if state.failures.upload {
            return Err(DatabaseError::StorageError("upload failed".to_string()));
        }
        state
            .objects
            .insert(key.to_string(), (bytes, content_type.to_string()));
        Ok(key.to_string())
    }

    fn public_url(&self, key: &str) -> String {
        format!("https://storage.test/public/{}", key)
    }

    fn subscribe_to_changes(&self, _table: &str) -> Result<ChangeSubscription, DatabaseError> {
        let (sender, receiver) = mpsc::channel(100);
        self.state.lock().unwrap().subscribers.push(sender);
        Ok(ChangeSubscription::new(receiver, None))
    }
}
