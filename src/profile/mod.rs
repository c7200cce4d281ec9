use crate::communication::error_handler::map_load_error_to_user_message;
use crate::core::session::Session;
use crate::database::DataStore;
use tracing::{error, info};

#[derive(Debug, Clone, PartialEq)]
pub struct ProfileView {
    pub display_name: String,
    pub initial: String,
    pub username: Option<String>,
    pub photo_url: Option<String>,
    pub total_messages: i64,
    pub daily_messages: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProfileRender {
    Profile(ProfileView),
    Unidentified,
    NotRegistered { telegram_id: i64 },
    LoadFailed { message: String },
}

/// Usage profile of the session's user. Record fields win over the
/// platform assertion; the photo only exists on the platform side.
pub async fn load_profile(session: &mut Session, store: &dyn DataStore) -> ProfileRender {
    let Some(telegram_id) = session.telegram_id else {
        return ProfileRender::Unidentified;
    };

    let user = match session.load_user(store).await {
        Ok(Some(user)) => user.clone(),
        Ok(None) => return ProfileRender::NotRegistered { telegram_id },
        Err(e) => {
            error!(telegram_id, error = %e, "Failed to load profile");
            return ProfileRender::LoadFailed {
                message: map_load_error_to_user_message(&e),
            };
        }
    };

    let platform = session.platform_user.as_ref();
    let first_name = user
        .first_name
        .clone()
        .or_else(|| platform.and_then(|p| p.first_name.clone()));

    let initial = first_name
        .as_deref()
        .and_then(|name| name.chars().next())
        .map(|c| c.to_uppercase().collect::<String>())
        .unwrap_or_else(|| "?".to_string());

    info!(telegram_id, "Profile loaded");
    ProfileRender::Profile(ProfileView {
        display_name: first_name.unwrap_or_else(|| "User".to_string()),
        initial,
        username: user
            .username
            .clone()
            .or_else(|| platform.and_then(|p| p.username.clone())),
        photo_url: platform.and_then(|p| p.photo_url.clone()),
        total_messages: user.total_messages(),
        daily_messages: user.daily_messages(),
    })
}
