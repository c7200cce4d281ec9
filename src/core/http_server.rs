use super::bridge::{RequestBridge, SESSION_TOKEN_HEADER};
use super::session::Session;
use crate::catalog::{CatalogPage, CatalogRender, Scope};
use crate::communication::HostBridge;
use crate::configuration::Context;
use crate::creation::{AvatarFile, CreationFlow, CreationForm, ValidationError};
use crate::database::CharacterFields;
use crate::identity::CATALOG_IDENTITY;
use crate::profile;
use crate::render;
use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header::CONTENT_LENGTH, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        Html, IntoResponse, Json, Response,
    },
    routing::{get, post},
    Router,
};
use futures_util::stream::Stream;
use serde::Deserialize;
use std::convert::Infallible;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

/// Room for the multipart framing and text fields around the avatar.
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

pub struct HttpServer;

impl HttpServer {
    pub async fn start(context: Context) -> Result<(), Box<dyn std::error::Error>> {
        let port = context.config.server.port;
        let app = router(context);

        let listener = TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
        info!(port, "HTTP server running");

        axum::serve(listener, app).await?;
        Ok(())
    }
}

pub fn router(context: Context) -> Router {
    let catalog_page = format!("/{}", context.config.pages.catalog_page);
    let create_page = format!("/{}", context.config.pages.create_page);
    let body_limit = context.config.limits.max_avatar_bytes + FORM_OVERHEAD_BYTES;

    Router::new()
        .route("/health", get(health_check))
        .route("/", get(catalog_shell))
        .route(&catalog_page, get(catalog_shell))
        .route(&create_page, get(creation_shell))
        .route("/api/catalog", get(catalog))
        .route("/api/catalog/events", get(catalog_events))
        .route("/api/profile", get(user_profile))
        .route("/api/select/{id}", post(select))
        .route("/api/create", get(creation_form).post(create))
        .route("/api/create/back", get(creation_back))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(context)
}

#[derive(Debug, Default, Deserialize)]
struct PageQuery {
    user: Option<String>,
    tab: Option<Scope>,
}

impl PageQuery {
    /// The `user` token; an empty value counts as absent.
    fn token(&self) -> Option<&str> {
        self.user.as_deref().filter(|token| !token.trim().is_empty())
    }

    fn scope(&self) -> Scope {
        self.tab.unwrap_or_default()
    }
}

fn bridge_for(context: &Context, headers: &HeaderMap) -> RequestBridge {
    RequestBridge::from_headers(headers, context.bot_token.as_deref())
}

/// Attaches the recorded host effects and the session token.
fn respond(bridge: &RequestBridge, session_token: Option<&str>, body: impl IntoResponse) -> Response {
    let mut response = body.into_response();
    response.headers_mut().extend(bridge.headers());
    if let Some(value) = session_token.and_then(|token| HeaderValue::from_str(token).ok()) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(SESSION_TOKEN_HEADER), value);
    }
    response
}

async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}

async fn catalog_shell() -> Html<String> {
    Html(render::catalog_shell())
}

async fn creation_shell(State(context): State<Context>) -> Html<String> {
    Html(render::creation_shell(context.config.limits.max_avatar_bytes))
}

async fn open_catalog(
    context: &Context,
    bridge: &RequestBridge,
    token: Option<&str>,
    scope: Scope,
) -> CatalogPage {
    CatalogPage::init(
        context.store.clone(),
        bridge,
        token,
        scope,
        &context.config.pages.create_page,
    )
    .await
}

async fn catalog(
    State(context): State<Context>,
    Query(query): Query<PageQuery>,
    headers: HeaderMap,
) -> Response {
    let bridge = bridge_for(&context, &headers);
    let page = open_catalog(&context, &bridge, query.token(), query.scope()).await;

    let html = render::catalog_fragment(&page.view());
    respond(&bridge, page.session.token.as_deref(), Html(html))
}

/// Streams a fresh catalog fragment after every change to the table.
async fn catalog_events(
    State(context): State<Context>,
    Query(query): Query<PageQuery>,
    headers: HeaderMap,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, StatusCode> {
    let bridge = bridge_for(&context, &headers);
    let mut page =
        open_catalog(&context, &bridge, query.token(), query.scope()).await;
    if !page.session.is_identified() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    let changes = page.subscribe().map_err(|e| {
        error!(error = %e, "Failed to subscribe to catalog changes");
        StatusCode::BAD_GATEWAY
    })?;

    let (sender, receiver) = mpsc::channel::<CatalogRender>(16);
    tokio::spawn(async move {
        page.follow_changes(changes, sender).await;
        info!("Catalog change stream closed");
    });

    let stream = futures_util::stream::unfold(receiver, |mut receiver| async move {
        let render = receiver.recv().await?;
        let event = Event::default().data(render::catalog_fragment(&render));
        Some((Ok(event), receiver))
    });
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

async fn user_profile(
    State(context): State<Context>,
    Query(query): Query<PageQuery>,
    headers: HeaderMap,
) -> Response {
    let bridge = bridge_for(&context, &headers);
    let mut session = Session::resolve(CATALOG_IDENTITY, query.token(), bridge.platform_user());

    let render = profile::load_profile(&mut session, context.store.as_ref()).await;
    respond(
        &bridge,
        session.token.as_deref(),
        Html(render::profile_fragment(&render)),
    )
}

async fn select(
    State(context): State<Context>,
    Path(id): Path<i64>,
    Query(query): Query<PageQuery>,
    headers: HeaderMap,
) -> Response {
    let bridge = bridge_for(&context, &headers);
    let page = open_catalog(&context, &bridge, query.token(), Scope::default()).await;

    match page.select(id, &bridge) {
        Some(message) => respond(&bridge, page.session.token.as_deref(), Json(message)),
        None => respond(&bridge, None, StatusCode::NOT_FOUND),
    }
}

async fn creation_form(
    State(context): State<Context>,
    Query(query): Query<PageQuery>,
    headers: HeaderMap,
) -> Response {
    let bridge = bridge_for(&context, &headers);
    let form = CreationForm::open(
        &bridge,
        query.token(),
        context.config.limits.max_avatar_bytes,
    );

    let html = render::creation_fragment(&form, &CharacterFields::default());
    respond(&bridge, None, Html(html))
}

async fn creation_back(
    State(context): State<Context>,
    Query(query): Query<PageQuery>,
    headers: HeaderMap,
) -> Response {
    let bridge = bridge_for(&context, &headers);
    let form = CreationForm::open(
        &bridge,
        query.token(),
        context.config.limits.max_avatar_bytes,
    );

    form.back(&bridge, &context.config.pages.catalog_page);
    respond(&bridge, None, StatusCode::NO_CONTENT)
}

/// Text fields and the optional avatar. An empty file input counts as no avatar.
async fn read_submission(
    mut multipart: Multipart,
) -> Result<(CharacterFields, Option<AvatarFile>), MultipartError> {
    let mut fields = CharacterFields::default();
    let mut avatar = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "avatar" {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let content_type = field.content_type().unwrap_or_default().to_string();
            let bytes = field.bytes().await?;
            if !file_name.is_empty() && !bytes.is_empty() {
                avatar = Some(AvatarFile {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            continue;
        }

        let value = field.text().await?;
        match name.as_str() {
            "name" => fields.name = value,
            "description" => fields.description = value,
            "personality" => fields.personality = value,
            "greeting_message" => fields.greeting_message = value,
            "is_preset" => fields.is_preset = matches!(value.as_str(), "on" | "true" | "1"),
            other => warn!(field = other, "Ignoring unknown form field"),
        }
    }
    Ok((fields, avatar))
}

async fn create(
    State(context): State<Context>,
    Query(query): Query<PageQuery>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Response {
    let bridge = bridge_for(&context, &headers);
    let mut form = CreationForm::open(
        &bridge,
        query.token(),
        context.config.limits.max_avatar_bytes,
    );

    let (fields, avatar) = match read_submission(multipart).await {
        Ok(submission) => submission,
        Err(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            let size = headers
                .get(CONTENT_LENGTH)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.parse::<usize>().ok())
                .unwrap_or(form.max_avatar_bytes() + 1);
            warn!(size, error = %e, "Creation form over the body limit");
            form.reject_avatar(&ValidationError::FileTooLarge {
                size,
                max: form.max_avatar_bytes(),
            });
            let html = render::creation_fragment(&form, &CharacterFields::default());
            return respond(&bridge, None, Html(html));
        }
        Err(e) => {
            warn!(error = %e, "Unreadable creation form");
            return (e.status(), e.body_text()).into_response();
        }
    };

    // A rejected file stops the submit; the form comes back with the error.
    if let Some(file) = avatar {
        if form.select_avatar(file).is_err() {
            return respond(&bridge, None, Html(render::creation_fragment(&form, &fields)));
        }
    }

    let flow = CreationFlow::new(context.store.clone(), &context.config.pages.catalog_page);
    match flow.submit(&mut form, &fields).await {
        Ok(outcome) => info!(
            character_id = outcome.record.id,
            avatar_attached = outcome.avatar_attached,
            "Creation form submitted"
        ),
        Err(e) => warn!(error = %e, "Creation form rejected"),
    }

    if let Some(redirect) = form.redirect() {
        bridge.schedule(redirect);
    }
    respond(&bridge, None, Html(render::creation_fragment(&form, &fields)))
}
