//! Carries the numeric Telegram id between pages as a `user=<token>` query
//! parameter and reconciles it with the id asserted by the host platform.

use base64::{engine::general_purpose, Engine as _};
use tracing::warn;

/// Query parameter holding the encoded id on every page.
pub const USER_PARAM: &str = "user";

/// Which identity source an operation trusts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityPolicy {
    /// URL token first, platform assertion only when the token is absent.
    /// The token is the only identity that survives a page navigation.
    UrlFirst,
    /// Platform assertion only. Used where the receiving side is the host's
    /// own bot and expects a platform-verified id.
    PlatformOnly,
}

pub const CATALOG_IDENTITY: IdentityPolicy = IdentityPolicy::UrlFirst;
pub const CREATION_IDENTITY: IdentityPolicy = IdentityPolicy::UrlFirst;
pub const SELECTION_IDENTITY: IdentityPolicy = IdentityPolicy::PlatformOnly;

pub fn encode(telegram_id: i64) -> String {
    general_purpose::STANDARD.encode(telegram_id.to_string())
}

/// Inverse of [`encode`]. Never fails loudly: anything that is not base64 of a
/// decimal integer yields `None`.
pub fn decode(token: &str) -> Option<i64> {
    let token = token.trim();
    if token.is_empty() {
        return None;
    }

    let bytes = match general_purpose::STANDARD.decode(token) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(token, error = %e, "User token is not valid base64");
            return None;
        }
    };

    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(_) => {
            warn!(token, "User token does not decode to text");
            return None;
        }
    };

    match text.trim().parse::<i64>() {
        Ok(id) => Some(id),
        Err(_) => {
            warn!(token, decoded = %text, "User token does not hold a numeric id");
            None
        }
    }
}

/// Returns `false` only when both ids are present and differ. A mismatch is a
/// warning for the caller, never a reason to stop.
pub fn reconcile(url_id: Option<i64>, platform_id: Option<i64>) -> bool {
    match (url_id, platform_id) {
        (Some(url_id), Some(platform_id)) if url_id != platform_id => {
            warn!(url_id, platform_id, "URL identity does not match platform identity");
            false
        }
        _ => true,
    }
}

pub fn resolve(
    policy: IdentityPolicy,
    url_id: Option<i64>,
    platform_id: Option<i64>,
) -> Option<i64> {
    match policy {
        IdentityPolicy::UrlFirst => url_id.or(platform_id),
        IdentityPolicy::PlatformOnly => platform_id,
    }
}

pub fn url_with_token(page: &str, token: Option<&str>) -> String {
    match token {
        Some(token) => format!("{}?{}={}", page, USER_PARAM, urlencoding::encode(token)),
        None => page.to_string(),
    }
}
