use crate::communication::error_handler::{
    map_creation_error_to_user_message, UNIDENTIFIED_MESSAGE,
};
use crate::communication::HostBridge;
use crate::database::{CharacterFields, CharacterRecord, DataStore, DatabaseError, NewCharacter};
use crate::identity;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

pub mod avatar;

pub use avatar::{storage_key, validate_avatar, AvatarFile, ValidationError, MAX_AVATAR_BYTES};

/// Pause between the success message and leaving the page.
pub const REDIRECT_DELAY: Duration = Duration::from_secs(2);

pub const SUCCESS_MESSAGE: &str = "Character created successfully!";

#[derive(Debug, Error)]
pub enum CreationError {
    #[error("No user identity to create the character for")]
    IdentityMissing,
    #[error("User has no record, registration through the bot is required")]
    UserNotRegistered,
    #[error("User lookup failed: {0}")]
    LookupFailed(DatabaseError),
    #[error("Character insert failed: {0}")]
    InsertFailed(DatabaseError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormState {
    Idle,
    Submitting,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormMessage {
    Error(String),
    Success(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Redirect {
    To { url: String, after: Duration },
    Back { after: Duration },
}

/// The character exists once `record` is returned; the avatar may not.
#[derive(Debug, Clone, PartialEq)]
pub struct CreationOutcome {
    pub record: CharacterRecord,
    pub avatar_attached: bool,
}

/// UI state of the creation page.
#[derive(Debug, Clone)]
pub struct CreationForm {
    token: Option<String>,
    state: FormState,
    submit_enabled: bool,
    pending_avatar: Option<AvatarFile>,
    message: Option<FormMessage>,
    redirect: Option<Redirect>,
    max_avatar_bytes: usize,
}

impl CreationForm {
    /// Without a decodable token the form stays visible but cannot submit.
    pub fn open(host: &dyn HostBridge, url_token: Option<&str>, max_avatar_bytes: usize) -> Self {
        host.expand();

        let mut form = Self {
            token: url_token.map(str::to_string),
            state: FormState::Idle,
            submit_enabled: true,
            pending_avatar: None,
            message: None,
            redirect: None,
            max_avatar_bytes,
        };

        match url_token.and_then(identity::decode) {
            Some(telegram_id) => {
                info!(telegram_id, "Creation page opened");
                host.ready();
            }
            None => {
                error!("Creation page opened without a user token");
                form.submit_enabled = false;
                form.message = Some(FormMessage::Error(UNIDENTIFIED_MESSAGE.to_string()));
            }
        }
        form
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn state(&self) -> FormState {
        self.state
    }

    pub fn submit_enabled(&self) -> bool {
        self.submit_enabled
    }

    pub fn message(&self) -> Option<&FormMessage> {
        self.message.as_ref()
    }

    pub fn pending_avatar(&self) -> Option<&AvatarFile> {
        self.pending_avatar.as_ref()
    }

    pub fn redirect(&self) -> Option<&Redirect> {
        self.redirect.as_ref()
    }

    /// Accepts the file only if it passes validation. A rejected file also
    /// drops any earlier selection.
    pub fn select_avatar(&mut self, file: AvatarFile) -> Result<(), ValidationError> {
        if let Err(e) = validate_avatar(&file, self.max_avatar_bytes) {
            warn!(file_name = %file.file_name, error = %e, "Avatar rejected");
            self.reject_avatar(&e);
            return Err(e);
        }

        info!(file_name = %file.file_name, size = file.bytes.len(), "Avatar selected");
        self.pending_avatar = Some(file);
        Ok(())
    }

    /// Drops any pending file and shows `error` inline. The form stays usable.
    pub fn reject_avatar(&mut self, error: &ValidationError) {
        self.pending_avatar = None;
        self.message = Some(FormMessage::Error(error.to_string()));
    }

    pub fn max_avatar_bytes(&self) -> usize {
        self.max_avatar_bytes
    }

    /// Back button: to the catalog with the token, or plain history back.
    pub fn back(&self, host: &dyn HostBridge, catalog_page: &str) {
        match &self.token {
            Some(token) => host.navigate(&identity::url_with_token(catalog_page, Some(token))),
            None => host.go_back(),
        }
    }

    fn begin_submit(&mut self) {
        self.state = FormState::Submitting;
        self.submit_enabled = false;
        self.message = None;
    }

    fn fail(&mut self, error: &CreationError) {
        self.state = FormState::Failed;
        if !matches!(error, CreationError::IdentityMissing) {
            self.submit_enabled = true;
        }
        self.message = Some(FormMessage::Error(map_creation_error_to_user_message(error)));
    }

    fn succeed(&mut self, catalog_page: &str) {
        self.state = FormState::Succeeded;
        self.message = Some(FormMessage::Success(SUCCESS_MESSAGE.to_string()));
        self.redirect = Some(match &self.token {
            Some(token) => Redirect::To {
                url: identity::url_with_token(catalog_page, Some(token)),
                after: REDIRECT_DELAY,
            },
            None => Redirect::Back {
                after: REDIRECT_DELAY,
            },
        });
    }
}

/// Waits out the redirect delay, then leaves the page.
pub async fn follow_redirect(host: &dyn HostBridge, redirect: &Redirect) {
    match redirect {
        Redirect::To { url, after } => {
            tokio::time::sleep(*after).await;
            host.navigate(url);
        }
        Redirect::Back { after } => {
            tokio::time::sleep(*after).await;
            host.go_back();
        }
    }
}

pub struct CreationFlow {
    store: Arc<dyn DataStore>,
    catalog_page: String,
}

impl CreationFlow {
    pub fn new(store: Arc<dyn DataStore>, catalog_page: &str) -> Self {
        Self {
            store,
            catalog_page: catalog_page.to_string(),
        }
    }

    /// Creates the character, then tries to attach the pending avatar.
    /// Only identity, lookup and insert failures fail the submit.
    pub async fn submit(
        &self,
        form: &mut CreationForm,
        fields: &CharacterFields,
    ) -> Result<CreationOutcome, CreationError> {
        let Some(telegram_id) = form.token().and_then(identity::decode) else {
            let e = CreationError::IdentityMissing;
            form.fail(&e);
            return Err(e);
        };

        form.begin_submit();
        let result = self
            .create(telegram_id, fields, form.pending_avatar())
            .await;

        match result {
            Ok(outcome) => {
                form.succeed(&self.catalog_page);
                Ok(outcome)
            }
            Err(e) => {
                error!(telegram_id, error = %e, "Character creation failed");
                form.fail(&e);
                Err(e)
            }
        }
    }

    async fn create(
        &self,
        telegram_id: i64,
        fields: &CharacterFields,
        avatar: Option<&AvatarFile>,
    ) -> Result<CreationOutcome, CreationError> {
        let user = self
            .store
            .find_user_by_telegram_id(telegram_id)
            .await
            .map_err(CreationError::LookupFailed)?
            .ok_or(CreationError::UserNotRegistered)?;

        let new_character = NewCharacter::from_fields(fields, user.id);
        let mut record = self
            .store
            .insert_character(&new_character)
            .await
            .map_err(CreationError::InsertFailed)?;
        info!(character_id = record.id, creator_id = user.id, "Character created");

        let mut avatar_attached = false;
        if let Some(file) = avatar {
            match self.attach_avatar(record.id, file).await {
                Ok(url) => {
                    record.avatar_url = Some(url);
                    avatar_attached = true;
                }
                Err(e) => {
                    warn!(character_id = record.id, error = %e, "Character kept without avatar");
                }
            }
        }

        Ok(CreationOutcome {
            record,
            avatar_attached,
        })
    }

    async fn attach_avatar(
        &self,
        character_id: i64,
        file: &AvatarFile,
    ) -> Result<String, DatabaseError> {
        let key = storage_key(&file.file_name);
        let stored = self
            .store
            .upload_object(&key, file.bytes.clone(), &file.content_type)
            .await?;
        let url = self.store.public_url(&stored);
        self.store.update_character_avatar(character_id, &url).await?;
        info!(character_id, url = %url, "Avatar attached");
        Ok(url)
    }
}
