//! HTML for every page state. Fragments are swapped into the shell pages,
//! which own the host script and the header plumbing.

use crate::catalog::{CardImage, CatalogRender, CharacterCard};
use crate::communication::error_handler::{NOT_REGISTERED_HINT, UNIDENTIFIED_MESSAGE};
use crate::creation::{CreationForm, FormMessage, ValidationError};
use crate::database::CharacterFields;
use crate::profile::ProfileRender;

pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn error_block(message: &str) -> String {
    format!(
        r#"<div class="error-message">{}</div>"#,
        escape(message)
    )
}

fn card(card: &CharacterCard) -> String {
    let image = match &card.image {
        CardImage::Url(url) => format!(
            r#"<img src="{}" alt="{}">"#,
            escape(url),
            escape(&card.name)
        ),
        CardImage::Initial(initial) => escape(initial),
    };
    format!(
        r#"<div class="card" data-id="{}"><div class="card-image">{}</div><div class="card-content"><div class="card-title">{}</div><div class="card-description">{}</div></div></div>"#,
        card.id,
        image,
        escape(&card.name),
        escape(&card.short_description)
    )
}

pub fn catalog_fragment(render: &CatalogRender) -> String {
    match render {
        CatalogRender::Cards(cards) => {
            let cards: String = cards.iter().map(card).collect();
            format!(r#"<div class="characters-grid">{}</div>"#, cards)
        }
        CatalogRender::EmptyPublic => r#"<div class="empty-state"><div class="empty-state-text">No public characters found</div></div>"#.to_string(),
        CatalogRender::EmptyPersonal { create_url } => format!(
            r#"<div class="empty-state"><div class="empty-state-text">You have no personal characters yet</div><a class="create-button" href="{}">Create a character</a></div>"#,
            escape(create_url)
        ),
        CatalogRender::ViewerUnknown => error_block(NOT_REGISTERED_HINT),
        CatalogRender::Unidentified => error_block(UNIDENTIFIED_MESSAGE),
        CatalogRender::LoadFailed { message } => error_block(message),
    }
}

pub fn profile_fragment(render: &ProfileRender) -> String {
    match render {
        ProfileRender::Profile(view) => {
            let avatar = match &view.photo_url {
                Some(url) => format!(r#"<img src="{}" alt="Avatar">"#, escape(url)),
                None => escape(&view.initial),
            };
            let username = view
                .username
                .as_deref()
                .map(|u| format!(r#"<div class="profile-username">@{}</div>"#, escape(u)))
                .unwrap_or_default();
            format!(
                r#"<div class="profile-header"><div class="profile-avatar">{}</div><div class="profile-name">{}</div>{}</div><div class="profile-stats"><div class="stat-card"><div class="stat-value">{}</div><div class="stat-label">Total messages</div></div><div class="stat-card"><div class="stat-value">{}</div><div class="stat-label">Messages today</div></div></div>"#,
                avatar,
                escape(&view.display_name),
                username,
                view.total_messages,
                view.daily_messages
            )
        }
        ProfileRender::Unidentified => error_block(UNIDENTIFIED_MESSAGE),
        ProfileRender::NotRegistered { .. } => error_block(NOT_REGISTERED_HINT),
        ProfileRender::LoadFailed { message } => error_block(message),
    }
}

/// The form with its inline message. Field values are kept across a
/// failed submit.
pub fn creation_fragment(form: &CreationForm, fields: &CharacterFields) -> String {
    let message = match form.message() {
        Some(FormMessage::Error(text)) => {
            format!(r#"<div id="errorMsg" class="error-message">{}</div>"#, escape(text))
        }
        Some(FormMessage::Success(text)) => {
            format!(r#"<div id="successMsg" class="success-message">{}</div>"#, escape(text))
        }
        None => String::new(),
    };
    let disabled = if form.submit_enabled() { "" } else { " disabled" };
    let checked = if fields.is_preset { " checked" } else { "" };

    format!(
        r#"<form id="characterForm" enctype="multipart/form-data">
{message}
<label>Name<input id="nameInput" name="name" maxlength="50" required value="{name}"></label>
<label>Description<textarea id="descInput" name="description" maxlength="500" required>{description}</textarea></label>
<label>Personality<textarea id="persInput" name="personality" maxlength="1000" required>{personality}</textarea></label>
<label>Greeting<textarea id="greetInput" name="greeting_message" maxlength="500" required>{greeting}</textarea></label>
<label>Avatar<input id="avatarInput" name="avatar" type="file" accept="image/*"></label>
<label><input id="isPresetCheckbox" name="is_preset" type="checkbox"{checked}> Public preset</label>
<button id="submitBtn" type="submit"{disabled}>Create</button>
</form>"#,
        message = message,
        name = escape(&fields.name),
        description = escape(&fields.description),
        personality = escape(&fields.personality),
        greeting = escape(&fields.greeting_message),
        checked = checked,
        disabled = disabled,
    )
}

const HOST_SCRIPT: &str = r#"<script src="https://telegram.org/js/telegram-web-app.js"></script>
<script>
const tg = window.Telegram.WebApp;
let token = new URLSearchParams(location.search).get('user');
function withUser(path) {
  if (!token) return path;
  const sep = path.includes('?') ? '&' : '?';
  return path + sep + 'user=' + encodeURIComponent(token);
}
function applyHost(res) {
  const session = res.headers.get('X-Session-Token');
  if (session) token = session;
  if (res.headers.get('X-Host-Expand')) tg.expand();
  if (res.headers.get('X-Host-Ready')) tg.ready();
  const after = Number(res.headers.get('X-Host-Navigate-After-Ms') || 0);
  const target = res.headers.get('X-Host-Navigate');
  if (target) setTimeout(() => { location.href = target; }, after);
  if (res.headers.get('X-Host-Back')) setTimeout(() => history.back(), after);
}
async function call(path, options = {}) {
  options.headers = Object.assign({}, options.headers, { 'X-Telegram-Init-Data': tg.initData || '' });
  const res = await fetch(withUser(path), options);
  applyHost(res);
  return res;
}
</script>"#;

fn shell(title: &str, body: &str, script: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{}</title>
</head>
<body>
{}
{}
<script>
{}
</script>
</body>
</html>"#,
        escape(title),
        body,
        HOST_SCRIPT,
        script
    )
}

pub fn catalog_shell() -> String {
    shell(
        "Characters",
        r#"<nav class="tabs">
<button data-tab="public" class="tab active">Public</button>
<button data-tab="personal" class="tab">Mine</button>
<button data-tab="profile" class="tab">Profile</button>
</nav>
<main id="content"><div class="loader">Loading...</div></main>"#,
        r#"const content = document.getElementById('content');
let tab = 'public';
let events = null;
async function load() {
  const path = tab === 'profile' ? '/api/profile' : '/api/catalog?tab=' + tab;
  const res = await call(path);
  content.innerHTML = await res.text();
  follow();
}
function follow() {
  if (events) events.close();
  events = null;
  if (tab === 'profile' || !token) return;
  events = new EventSource(withUser('/api/catalog/events?tab=' + tab));
  events.onmessage = (e) => { content.innerHTML = e.data; };
}
document.querySelectorAll('.tab').forEach((button) => {
  button.addEventListener('click', () => {
    document.querySelectorAll('.tab').forEach((b) => b.classList.remove('active'));
    button.classList.add('active');
    tab = button.dataset.tab;
    load();
  });
});
content.addEventListener('click', async (e) => {
  const card = e.target.closest('.card');
  if (!card) return;
  const res = await call('/api/select/' + card.dataset.id, { method: 'POST' });
  if (res.ok) tg.sendData(JSON.stringify(await res.json()));
});
load();"#,
    )
}

/// Creation page. The avatar is checked as soon as it is picked, with the
/// same limits and messages the server applies on submit.
pub fn creation_shell(max_avatar_bytes: usize) -> String {
    let too_large = ValidationError::FileTooLarge {
        size: max_avatar_bytes,
        max: max_avatar_bytes,
    };
    let not_image = ValidationError::NotAnImage {
        content_type: String::new(),
    };
    let limits = format!(
        "const AVATAR_LIMITS = {{ max: {}, tooLarge: {}, notImage: {} }};\n",
        max_avatar_bytes,
        serde_json::Value::from(too_large.to_string()),
        serde_json::Value::from(not_image.to_string())
    );

    let script = limits
        + r#"const content = document.getElementById('content');
async function load() {
  const res = await call('/api/create');
  content.innerHTML = await res.text();
}
function showInlineError(form, text) {
  let box = document.getElementById('errorMsg');
  if (!box) {
    box = document.createElement('div');
    box.id = 'errorMsg';
    box.className = 'error-message';
    form.prepend(box);
  }
  box.textContent = text;
}
content.addEventListener('change', (e) => {
  const input = e.target;
  if (input.id !== 'avatarInput') return;
  const file = input.files[0];
  if (!file) return;
  let problem = null;
  if (file.size > AVATAR_LIMITS.max) problem = AVATAR_LIMITS.tooLarge;
  else if (!file.type.startsWith('image/')) problem = AVATAR_LIMITS.notImage;
  if (problem) {
    input.value = '';
    showInlineError(input.form, problem);
    return;
  }
  const box = document.getElementById('errorMsg');
  if (box) box.remove();
});
content.addEventListener('submit', async (e) => {
  e.preventDefault();
  const submit = document.getElementById('submitBtn');
  if (submit) submit.disabled = true;
  const res = await call('/api/create', { method: 'POST', body: new FormData(e.target) });
  content.innerHTML = await res.text();
});
document.getElementById('backBtn').addEventListener('click', () => call('/api/create/back'));
load();"#;

    shell(
        "New character",
        r#"<header><button id="backBtn" type="button">Back</button></header>
<main id="content"><div class="loader">Loading...</div></main>"#,
        &script,
    )
}
