use crate::creation::CreationError;
use crate::database::DatabaseError;

pub const UNIDENTIFIED_MESSAGE: &str =
    "Could not determine the user. Open the app through the bot.";

pub const NOT_REGISTERED_HINT: &str = "You may need to send /start to the bot first.";

pub fn map_creation_error_to_user_message(error: &CreationError) -> String {
    match error {
        CreationError::IdentityMissing => "Could not determine the user".to_string(),
        CreationError::UserNotRegistered => {
            "User not found in the database. Please send /start to the bot".to_string()
        }
        CreationError::LookupFailed(e) => format!("Error looking up user: {}", e),
        CreationError::InsertFailed(e) => format!("Error creating character: {}", e),
    }
}

pub fn map_load_error_to_user_message(error: &DatabaseError) -> String {
    match error {
        DatabaseError::ConnectionError(_) => {
            format!("Could not reach the server - {}", error)
        }
        _ => error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_text_is_kept_verbatim() {
        let error = CreationError::LookupFailed(DatabaseError::QueryError(
            "permission denied for table users".to_string(),
        ));
        assert_eq!(
            map_creation_error_to_user_message(&error),
            "Error looking up user: permission denied for table users"
        );
        assert!(map_creation_error_to_user_message(&CreationError::UserNotRegistered)
            .contains("/start"));
    }

    #[test]
    fn test_load_error_messages() {
        let error = DatabaseError::QueryError("relation \"characters\" does not exist".to_string());
        assert_eq!(
            map_load_error_to_user_message(&error),
            "relation \"characters\" does not exist"
        );
        let error = DatabaseError::ConnectionError("dns error".to_string());
        assert!(map_load_error_to_user_message(&error).contains("dns error"));
    }
}
