use super::errors::DatabaseError;
use super::types::{CharacterRecord, NewCharacter, UserRecord};
use super::{ChangeSubscription, DataStore};
use async_trait::async_trait;
use postgrest::Postgrest;
use serde::de::DeserializeOwned;
use std::env;
use std::time::Duration;
use tracing::error;

mod character;
mod realtime;
mod storage;
mod user;

pub const DEFAULT_AVATAR_BUCKET: &str = "character-avatars";

#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub avatar_bucket: String,
    pub poll_interval: Duration,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            avatar_bucket: DEFAULT_AVATAR_BUCKET.to_string(),
            poll_interval: Duration::from_secs(5),
        }
    }
}

/// Supabase project: PostgREST tables plus the Storage object API.
pub struct SupabaseStore {
    pub client: Postgrest,
    http: reqwest::Client,
    base_url: String,
    service_key: String,
    settings: StoreSettings,
}

impl SupabaseStore {
    pub fn new(settings: StoreSettings) -> Result<Self, DatabaseError> {
        let url = env::var("SUPABASE_URL")
            .map_err(|_| DatabaseError::ConnectionError("SUPABASE_URL not found".to_string()))?;
        let service_key = env::var("SUPABASE_KEY")
            .map_err(|_| DatabaseError::ConnectionError("SUPABASE_KEY not found".to_string()))?;

        Ok(Self::with_credentials(&url, &service_key, settings))
    }

    pub fn with_credentials(url: &str, service_key: &str, settings: StoreSettings) -> Self {
        let base_url = url.trim_end_matches('/').to_string();
        Self {
            client: rest_client(&base_url, service_key),
            http: reqwest::Client::new(),
            base_url,
            service_key: service_key.to_string(),
            settings,
        }
    }
}

fn rest_client(base_url: &str, service_key: &str) -> Postgrest {
    let rest_url = format!("{}/rest/v1", base_url);
    Postgrest::new(&rest_url)
        .insert_header("apikey", service_key)
        .insert_header("Authorization", &format!("Bearer {}", service_key))
}

/// PostgREST puts the human readable part of a failure in `message`.
fn query_failure(status: u16, body: &str) -> DatabaseError {
    error!(status, error = %body, "Supabase request failed");
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| value.get("message").and_then(|m| m.as_str()).map(String::from))
        .unwrap_or_else(|| body.to_string());
    DatabaseError::QueryError(message)
}

/// Reads a PostgREST body as `T`. The client's response type has no JSON helper.
fn parse_body<T: DeserializeOwned>(body: &str) -> Result<T, DatabaseError> {
    serde_json::from_str(body).map_err(|e| DatabaseError::QueryError(e.to_string()))
}

#[async_trait]
impl DataStore for SupabaseStore {
    async fn find_user_by_telegram_id(
        &self,
        telegram_id: i64,
    ) -> Result<Option<UserRecord>, DatabaseError> {
        self.get_user_by_telegram_id(telegram_id).await
    }

    async fn insert_character(
        &self,
        character: &NewCharacter,
    ) -> Result<CharacterRecord, DatabaseError> {
        self.create_character(character).await
    }

    async fn update_character_avatar(
        &self,
        character_id: i64,
        avatar_url: &str,
    ) -> Result<(), DatabaseError> {
        self.set_character_avatar(character_id, avatar_url).await
    }

    async fn list_active_characters(&self) -> Result<Vec<CharacterRecord>, DatabaseError> {
        self.get_active_characters().await
    }

    async fn upload_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, DatabaseError> {
        self.upload_avatar(key, bytes, content_type).await
    }

    fn public_url(&self, key: &str) -> String {
        self.avatar_public_url(key)
    }

    fn subscribe_to_changes(&self, table: &str) -> Result<ChangeSubscription, DatabaseError> {
        Ok(self.watch_table(table))
    }
}
