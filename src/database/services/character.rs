use super::super::types::{CharacterRecord, NewCharacter};
use super::DatabaseError;
use super::{parse_body, query_failure, SupabaseStore};
use crate::database::CHARACTERS_TABLE;
use tracing::info;

impl SupabaseStore {
    pub async fn get_active_characters(&self) -> Result<Vec<CharacterRecord>, DatabaseError> {
        let response = self
            .client
            .from(CHARACTERS_TABLE)
            .select("*")
            .eq("is_active", "true")
            .order("created_at.desc")
            .execute()
            .await
            .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(query_failure(status.as_u16(), &body));
        }

        let body = response
            .text()
            .await
            .map_err(|e| DatabaseError::QueryError(e.to_string()))?;

        let characters: Vec<CharacterRecord> = parse_body(&body)?;

        info!(count = characters.len(), "Loaded active characters");
        Ok(characters)
    }

    pub async fn create_character(
        &self,
        character: &NewCharacter,
    ) -> Result<CharacterRecord, DatabaseError> {
        let body = serde_json::to_string(character)
            .map_err(|e| DatabaseError::QueryError(e.to_string()))?;

        let response = self
            .client
            .from(CHARACTERS_TABLE)
            .insert(body)
            .execute()
            .await
            .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(query_failure(status.as_u16(), &body));
        }

        let body = response
            .text()
            .await
            .map_err(|e| DatabaseError::QueryError(e.to_string()))?;

        let mut created: Vec<CharacterRecord> = parse_body(&body)?;

        if created.is_empty() {
            return Err(DatabaseError::QueryError(
                "No character returned".to_string(),
            ));
        }
        Ok(created.remove(0))
    }

    pub async fn set_character_avatar(
        &self,
        character_id: i64,
        avatar_url: &str,
    ) -> Result<(), DatabaseError> {
        let response = self
            .client
            .from(CHARACTERS_TABLE)
            .update(serde_json::json!({ "avatar_url": avatar_url }).to_string())
            .eq("id", character_id.to_string())
            .execute()
            .await
            .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(query_failure(status.as_u16(), &body));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::StoreSettings;
    use super::*;
    use crate::database::CharacterFields;
    use mockito::Matcher;

    const ROW: &str = r#"{"id":11,"name":"Alice","description":"A bot","personality":"",
        "greeting_message":"","avatar_url":null,"is_preset":false,"creator_id":7,
        "is_active":true,"created_at":"2024-05-01T10:00:00+00:00"}"#;

    #[tokio::test]
    async fn test_get_active_characters_filters_and_orders() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/rest/v1/characters")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("is_active".to_string(), "eq.true".to_string()),
                Matcher::UrlEncoded("order".to_string(), "created_at.desc".to_string()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(format!("[{}]", ROW))
            .create_async()
            .await;

        let store = SupabaseStore::with_credentials(&server.url(), "k", StoreSettings::default());
        let characters = store.get_active_characters().await.unwrap();

        assert_eq!(characters.len(), 1);
        assert_eq!(characters[0].name, "Alice");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_character_returns_inserted_row() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/rest/v1/characters")
            .match_body(Matcher::PartialJsonString(
                r#"{"name":"Alice","avatar_url":null,"is_active":true,"creator_id":7}"#.to_string(),
            ))
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(format!("[{}]", ROW))
            .create_async()
            .await;

        let store = SupabaseStore::with_credentials(&server.url(), "k", StoreSettings::default());
        let fields = CharacterFields {
            name: " Alice ".to_string(),
            description: "A bot".to_string(),
            ..Default::default()
        };
        let created = store
            .create_character(&NewCharacter::from_fields(&fields, 7))
            .await
            .unwrap();

        assert_eq!(created.id, 11);
        assert_eq!(created.avatar_url, None);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_character_error_is_verbatim() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/rest/v1/characters")
            .with_status(409)
            .with_body(r#"{"message":"duplicate key value violates unique constraint"}"#)
            .create_async()
            .await;

        let store = SupabaseStore::with_credentials(&server.url(), "k", StoreSettings::default());
        let err = store
            .create_character(&NewCharacter::from_fields(&CharacterFields::default(), 1))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "duplicate key value violates unique constraint"
        );
    }

    #[tokio::test]
    async fn test_set_character_avatar_patches_by_id() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PATCH", "/rest/v1/characters")
            .match_query(Matcher::UrlEncoded("id".to_string(), "eq.11".to_string()))
            .match_body(Matcher::JsonString(
                r#"{"avatar_url":"https://cdn/a.png"}"#.to_string(),
            ))
            .with_status(204)
            .create_async()
            .await;

        let store = SupabaseStore::with_credentials(&server.url(), "k", StoreSettings::default());
        store.set_character_avatar(11, "https://cdn/a.png").await.unwrap();
        mock.assert_async().await;
    }
}
