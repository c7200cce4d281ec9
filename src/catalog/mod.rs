use crate::communication::error_handler::map_load_error_to_user_message;
use crate::communication::{HostBridge, SelectionMessage};
use crate::core::session::Session;
use crate::database::{
    ChangeEvent, ChangeSubscription, CharacterRecord, DataStore, DatabaseError, CHARACTERS_TABLE,
};
use crate::identity::{self, CATALOG_IDENTITY, SELECTION_IDENTITY};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

pub const DESCRIPTION_PREVIEW_CHARS: usize = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    #[default]
    Public,
    Personal,
}

/// Records visible in `scope`. Personal records need a known viewer.
pub fn filter_by_scope(
    records: &[CharacterRecord],
    scope: Scope,
    viewer_id: Option<i64>,
) -> Vec<&CharacterRecord> {
    records
        .iter()
        .filter(|record| match scope {
            Scope::Public => record.is_public(),
            Scope::Personal => viewer_id.is_some_and(|id| record.is_personal_to(id)),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub enum CardImage {
    Url(String),
    Initial(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CharacterCard {
    pub id: i64,
    pub name: String,
    pub short_description: String,
    pub image: CardImage,
}

impl From<&CharacterRecord> for CharacterCard {
    fn from(record: &CharacterRecord) -> Self {
        let short_description = if record.description.chars().count() > DESCRIPTION_PREVIEW_CHARS
        {
            let cut: String = record
                .description
                .chars()
                .take(DESCRIPTION_PREVIEW_CHARS)
                .collect();
            format!("{}...", cut)
        } else {
            record.description.clone()
        };

        let image = match &record.avatar_url {
            Some(url) => CardImage::Url(url.clone()),
            None => CardImage::Initial(
                record
                    .name
                    .chars()
                    .next()
                    .map(String::from)
                    .unwrap_or_else(|| "?".to_string()),
            ),
        };

        Self {
            id: record.id,
            name: record.name.clone(),
            short_description,
            image,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CatalogRender {
    Cards(Vec<CharacterCard>),
    /// No public characters. Deliberately offers no way to create one.
    EmptyPublic,
    /// No personal characters yet, with a link to the creation page.
    EmptyPersonal { create_url: String },
    /// Personal tab while the viewer has no user row.
    ViewerUnknown,
    Unidentified,
    LoadFailed { message: String },
}

pub fn render_catalog(
    records: &[CharacterRecord],
    scope: Scope,
    viewer_id: Option<i64>,
    create_url: &str,
) -> CatalogRender {
    if scope == Scope::Personal && viewer_id.is_none() {
        return CatalogRender::ViewerUnknown;
    }

    let visible = filter_by_scope(records, scope, viewer_id);
    if visible.is_empty() {
        return match scope {
            Scope::Public => CatalogRender::EmptyPublic,
            Scope::Personal => CatalogRender::EmptyPersonal {
                create_url: create_url.to_string(),
            },
        };
    }

    CatalogRender::Cards(visible.into_iter().map(CharacterCard::from).collect())
}

/// The characters page: its session, the fetched list and the active tab.
pub struct CatalogPage {
    store: Arc<dyn DataStore>,
    pub session: Session,
    records: Vec<CharacterRecord>,
    scope: Scope,
    create_page: String,
    load_error: Option<String>,
}

impl CatalogPage {
    /// Resolves identity, loads the user and the catalog, then signals the
    /// host. An unidentified viewer stops before any network call.
    pub async fn init(
        store: Arc<dyn DataStore>,
        host: &dyn HostBridge,
        url_token: Option<&str>,
        scope: Scope,
        create_page: &str,
    ) -> Self {
        host.expand();

        let session = Session::resolve(CATALOG_IDENTITY, url_token, host.platform_user());
        let mut page = Self {
            store,
            session,
            records: Vec::new(),
            scope,
            create_page: create_page.to_string(),
            load_error: None,
        };

        if !page.session.is_identified() {
            error!("Could not determine the user");
            return page;
        }

        if let Err(e) = page.session.load_user(page.store.as_ref()).await {
            error!(error = %e, "Failed to load user");
        }

        let _ = page.load_catalog().await;
        host.ready();
        page
    }

    /// Single attempt. On failure the previous list is kept and the view
    /// switches to the error state.
    pub async fn load_catalog(&mut self) -> Result<(), DatabaseError> {
        match self.store.list_active_characters().await {
            Ok(records) => {
                info!(count = records.len(), "Catalog loaded");
                self.records = records;
                self.load_error = None;
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Failed to load characters");
                self.load_error = Some(map_load_error_to_user_message(&e));
                Err(e)
            }
        }
    }

    pub fn records(&self) -> &[CharacterRecord] {
        &self.records
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn switch_scope(&mut self, scope: Scope) {
        self.scope = scope;
    }

    pub fn create_url(&self) -> String {
        self.session.url(&self.create_page)
    }

    pub fn view(&self) -> CatalogRender {
        if !self.session.is_identified() {
            return CatalogRender::Unidentified;
        }
        if let Some(message) = &self.load_error {
            return CatalogRender::LoadFailed {
                message: message.clone(),
            };
        }
        render_catalog(
            &self.records,
            self.scope,
            self.session.viewer_id(),
            &self.create_url(),
        )
    }

    pub fn subscribe(&self) -> Result<ChangeSubscription, DatabaseError> {
        self.store.subscribe_to_changes(CHARACTERS_TABLE)
    }

    /// Any change, on any row or field, means a full re-fetch.
    pub async fn on_external_change(&mut self, event: &ChangeEvent) {
        info!(table = %event.table, kind = ?event.kind, record_id = ?event.record_id, "Catalog changed");
        let _ = self.load_catalog().await;
    }

    /// Re-fetches on notifications, one fetch at a time. Notifications that
    /// pile up during a fetch collapse into a single follow-up fetch. Each
    /// resulting view is pushed to `renders`. Stops as soon as either side
    /// closes, releasing the subscription even on a quiet table.
    pub async fn follow_changes(
        &mut self,
        mut changes: ChangeSubscription,
        renders: mpsc::Sender<CatalogRender>,
    ) {
        loop {
            let event = tokio::select! {
                event = changes.recv() => event,
                _ = renders.closed() => {
                    info!("Catalog viewer disconnected");
                    break;
                }
            };
            let Some(event) = event else {
                break;
            };

            let mut skipped = 0usize;
            while changes.try_recv().is_some() {
                skipped += 1;
            }
            if skipped > 0 {
                info!(skipped, "Coalesced catalog notifications");
            }

            self.on_external_change(&event).await;
            if renders.send(self.view()).await.is_err() {
                break;
            }
        }
    }

    /// Sends the picked character to the host's bot. Uses the platform
    /// identity, not the URL one, since the bot trusts only the host.
    pub fn select(&self, character_id: i64, host: &dyn HostBridge) -> Option<SelectionMessage> {
        let Some(character) = self.records.iter().find(|c| c.id == character_id) else {
            warn!(character_id, "Selected character is not in the catalog");
            return None;
        };

        let platform_user = host.platform_user();
        let telegram_id = identity::resolve(
            SELECTION_IDENTITY,
            self.session.telegram_id,
            platform_user.as_ref().map(|u| u.id),
        );
        let message = SelectionMessage::new(character, telegram_id, platform_user.as_ref());

        match serde_json::to_string(&message) {
            Ok(payload) => {
                info!(character_id, ?telegram_id, "Sending character selection");
                host.send_data(payload);
                Some(message)
            }
            Err(e) => {
                error!(error = %e, "Failed to serialize selection");
                None
            }
        }
    }
}
