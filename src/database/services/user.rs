use super::super::types::UserRecord;
use super::DatabaseError;
use super::{parse_body, query_failure, SupabaseStore};
use crate::database::USERS_TABLE;

impl SupabaseStore {
    // Find user based on telegram id
    pub async fn get_user_by_telegram_id(
        &self,
        telegram_id: i64,
    ) -> Result<Option<UserRecord>, DatabaseError> {
        let response = self
            .client
            .from(USERS_TABLE)
            .select("*")
            .eq("telegram_id", telegram_id.to_string())
            .single()
            .execute()
            .await
            .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

        if response.status() == 406 {
            // No single row: zero matches, or more than one
            return Ok(None);
        }

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(query_failure(status.as_u16(), &body));
        }

        let body = response
            .text()
            .await
            .map_err(|e| DatabaseError::QueryError(e.to_string()))?;

        let user: UserRecord = parse_body(&body)?;

        Ok(Some(user))
    }
}

#[cfg(test)]
mod tests {
    use super::super::StoreSettings;
    use super::*;
    use mockito::Matcher;

    #[tokio::test]
    async fn test_get_user_by_telegram_id_found() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/rest/v1/users")
            .match_query(Matcher::UrlEncoded(
                "telegram_id".to_string(),
                "eq.2050924196".to_string(),
            ))
            .match_header("apikey", "service-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"id":7,"telegram_id":2050924196,"first_name":"Ann","username":null,
                    "total_message_count":12,"daily_message_count":null}"#,
            )
            .create_async()
            .await;

        let store =
            SupabaseStore::with_credentials(&server.url(), "service-key", StoreSettings::default());
        let user = store.get_user_by_telegram_id(2050924196).await.unwrap().unwrap();

        assert_eq!(user.id, 7);
        assert_eq!(user.first_name.as_deref(), Some("Ann"));
        assert_eq!(user.total_messages(), 12);
        assert_eq!(user.daily_messages(), 0);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_user_by_telegram_id_missing_is_none() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/rest/v1/users")
            .match_query(Matcher::Any)
            .with_status(406)
            .with_body(r#"{"code":"PGRST116","message":"JSON object requested, multiple (or no) rows returned"}"#)
            .create_async()
            .await;

        let store = SupabaseStore::with_credentials(&server.url(), "k", StoreSettings::default());
        assert_eq!(store.get_user_by_telegram_id(1).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_get_user_by_telegram_id_surfaces_error_text() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/rest/v1/users")
            .match_query(Matcher::Any)
            .with_status(401)
            .with_body(r#"{"message":"Invalid API key"}"#)
            .create_async()
            .await;

        let store = SupabaseStore::with_credentials(&server.url(), "k", StoreSettings::default());
        let err = store.get_user_by_telegram_id(1).await.unwrap_err();
        assert_eq!(err, DatabaseError::QueryError("Invalid API key".to_string()));
    }
}
