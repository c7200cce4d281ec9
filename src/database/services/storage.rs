use super::DatabaseError;
use super::SupabaseStore;
use reqwest::header::CONTENT_TYPE;
use tracing::{error, info};

impl SupabaseStore {
    pub async fn upload_avatar(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, DatabaseError> {
        let url = format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url,
            self.settings.avatar_bucket,
            urlencoding::encode(key)
        );
        let size = bytes.len();

        let response = self
            .http
            .post(&url)
            .header("apikey", &self.service_key)
            .header("Authorization", format!("Bearer {}", self.service_key))
            .header("cache-control", "3600")
            .header("x-upsert", "false")
            .header(CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| DatabaseError::StorageError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!(status = %status, error = %body, key, "Avatar upload failed");
            return Err(DatabaseError::StorageError(body));
        }

        info!(key, size, "Avatar uploaded");
        Ok(key.to_string())
    }

    pub fn avatar_public_url(&self, key: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url,
            self.settings.avatar_bucket,
            urlencoding::encode(key)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::super::StoreSettings;
    use super::*;

    #[tokio::test]
    async fn test_upload_avatar_sends_bytes_without_upsert() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/storage/v1/object/character-avatars/avatar_1_abc123.png")
            .match_header("x-upsert", "false")
            .match_header("cache-control", "3600")
            .match_header("content-type", "image/png")
            .match_header("authorization", "Bearer k")
            .with_status(200)
            .with_body(r#"{"Key":"character-avatars/avatar_1_abc123.png"}"#)
            .create_async()
            .await;

        let store = SupabaseStore::with_credentials(&server.url(), "k", StoreSettings::default());
        let key = store
            .upload_avatar("avatar_1_abc123.png", vec![1, 2, 3], "image/png")
            .await
            .unwrap();

        assert_eq!(key, "avatar_1_abc123.png");
        assert_eq!(
            store.avatar_public_url(&key),
            format!(
                "{}/storage/v1/object/public/character-avatars/avatar_1_abc123.png",
                server.url()
            )
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_upload_avatar_failure_is_storage_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/storage/v1/object/character-avatars/a.png")
            .with_status(400)
            .with_body("The resource already exists")
            .create_async()
            .await;

        let store = SupabaseStore::with_credentials(&server.url(), "k", StoreSettings::default());
        let err = store
            .upload_avatar("a.png", vec![0], "image/png")
            .await
            .unwrap_err();
        assert_eq!(
            err,
            DatabaseError::StorageError("The resource already exists".to_string())
        );
    }
}
