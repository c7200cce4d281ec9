//! Per-page identity context.
//!
//! Pages build a [`Session`] in a fixed order and pass it to every operation:
//!
//! 1. [`Session::resolve`] decodes the URL token and reads the platform
//!    assertion, preferring the URL id.
//! 2. [`Session::load_user`] fetches the backing user row.
//! 3. The catalog is loaded.
//! 4. The page subscribes to change notifications.

use crate::communication::PlatformUser;
use crate::database::{DataStore, DatabaseError, UserRecord};
use crate::identity::{self, IdentityPolicy};
use tracing::{info, warn};

#[derive(Debug, Clone, Default)]
pub struct Session {
    /// Token to carry into the next navigation.
    pub token: Option<String>,
    pub telegram_id: Option<i64>,
    pub platform_user: Option<PlatformUser>,
    pub user: Option<UserRecord>,
    pub identity_mismatch: bool,
}

impl Session {
    pub fn resolve(
        policy: IdentityPolicy,
        url_token: Option<&str>,
        platform_user: Option<PlatformUser>,
    ) -> Self {
        let url_id = url_token.and_then(identity::decode);
        let platform_id = platform_user.as_ref().map(|u| u.id);

        let identity_mismatch = !identity::reconcile(url_id, platform_id);
        if identity_mismatch {
            warn!("Continuing with the URL identity");
        }

        let telegram_id = identity::resolve(policy, url_id, platform_id);
        info!(?url_id, ?platform_id, ?telegram_id, "Resolved session identity");

        Self {
            token: telegram_id.map(identity::encode),
            telegram_id,
            platform_user,
            user: None,
            identity_mismatch,
        }
    }

    pub fn is_identified(&self) -> bool {
        self.telegram_id.is_some()
    }

    /// Looks the user up and keeps the row. A missing row is not an error.
    pub async fn load_user(
        &mut self,
        store: &dyn DataStore,
    ) -> Result<Option<&UserRecord>, DatabaseError> {
        let Some(telegram_id) = self.telegram_id else {
            return Ok(None);
        };

        self.user = store.find_user_by_telegram_id(telegram_id).await?;
        if self.user.is_none() {
            warn!(telegram_id, "User not found in database");
        }
        Ok(self.user.as_ref())
    }

    /// `users.id` of the viewer, when the row is known.
    pub fn viewer_id(&self) -> Option<i64> {
        self.user.as_ref().map(|u| u.id)
    }

    pub fn url(&self, page: &str) -> String {
        identity::url_with_token(page, self.token.as_deref())
    }
}
