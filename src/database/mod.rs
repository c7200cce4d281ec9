pub mod errors;
#[cfg(test)]
pub mod memory;
pub mod services;
pub mod types;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub use errors::DatabaseError;
pub use services::{StoreSettings, SupabaseStore};
pub use types::*;

pub const USERS_TABLE: &str = "users";
pub const CHARACTERS_TABLE: &str = "characters";

/// Remote data store as seen by the pages. Every call is a single attempt.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// `None` when no user row carries this id.
    async fn find_user_by_telegram_id(
        &self,
        telegram_id: i64,
    ) -> Result<Option<UserRecord>, DatabaseError>;

    async fn insert_character(
        &self,
        character: &NewCharacter,
    ) -> Result<CharacterRecord, DatabaseError>;

    async fn update_character_avatar(
        &self,
        character_id: i64,
        avatar_url: &str,
    ) -> Result<(), DatabaseError>;

    /// Active characters, newest first.
    async fn list_active_characters(&self) -> Result<Vec<CharacterRecord>, DatabaseError>;

    /// Stores the object and returns its key.
    async fn upload_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, DatabaseError>;

    fn public_url(&self, key: &str) -> String;

    fn subscribe_to_changes(&self, table: &str) -> Result<ChangeSubscription, DatabaseError>;
}

/// Stream of row changes for one table. Dropping it stops the producer.
pub struct ChangeSubscription {
    receiver: mpsc::Receiver<ChangeEvent>,
    task: Option<JoinHandle<()>>,
}

impl ChangeSubscription {
    pub fn new(receiver: mpsc::Receiver<ChangeEvent>, task: Option<JoinHandle<()>>) -> Self {
        Self { receiver, task }
    }

    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.receiver.recv().await
    }

    /// Next event only if one is already queued.
    pub fn try_recv(&mut self) -> Option<ChangeEvent> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for ChangeSubscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
