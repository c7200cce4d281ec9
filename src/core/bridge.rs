use crate::communication::{init_data, HostBridge, PlatformUser};
use crate::creation::Redirect;
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{info, warn};

pub const INIT_DATA_HEADER: &str = "x-telegram-init-data";
pub const SESSION_TOKEN_HEADER: &str = "x-session-token";
const EXPAND_HEADER: &str = "x-host-expand";
const READY_HEADER: &str = "x-host-ready";
const NAVIGATE_HEADER: &str = "x-host-navigate";
const NAVIGATE_AFTER_HEADER: &str = "x-host-navigate-after-ms";
const BACK_HEADER: &str = "x-host-back";

/// Host calls made while serving one request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostEffects {
    pub expand: bool,
    pub ready: bool,
    pub sent: Vec<String>,
    pub navigate: Option<String>,
    pub back: bool,
    pub delay: Duration,
}

/// [`HostBridge`] for one HTTP request. The platform identity comes from the
/// init data the shell forwards; every effect is recorded and handed back to
/// the shell as response headers.
pub struct RequestBridge {
    platform_user: Option<PlatformUser>,
    effects: Mutex<HostEffects>,
}

impl RequestBridge {
    pub fn from_headers(headers: &HeaderMap, bot_token: Option<&str>) -> Self {
        let platform_user = headers
            .get(INIT_DATA_HEADER)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .and_then(|value| init_data::trusted_user(value, bot_token));

        Self {
            platform_user,
            effects: Mutex::new(HostEffects::default()),
        }
    }

    fn effects_mut(&self) -> MutexGuard<'_, HostEffects> {
        self.effects
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn effects(&self) -> HostEffects {
        self.effects_mut().clone()
    }

    /// Records a delayed redirect; the shell runs the timer.
    pub fn schedule(&self, redirect: &Redirect) {
        let mut effects = self.effects_mut();
        match redirect {
            Redirect::To { url, after } => {
                effects.navigate = Some(url.clone());
                effects.delay = *after;
            }
            Redirect::Back { after } => {
                effects.back = true;
                effects.delay = *after;
            }
        }
    }

    pub fn headers(&self) -> HeaderMap {
        let effects = self.effects();
        let mut headers = HeaderMap::new();
        let flag = HeaderValue::from_static("1");

        if effects.expand {
            headers.insert(HeaderName::from_static(EXPAND_HEADER), flag.clone());
        }
        if effects.ready {
            headers.insert(HeaderName::from_static(READY_HEADER), flag.clone());
        }
        if let Some(url) = &effects.navigate {
            match HeaderValue::from_str(url) {
                Ok(value) => {
                    headers.insert(HeaderName::from_static(NAVIGATE_HEADER), value);
                }
                Err(e) => warn!(url = %url, error = %e, "Navigation target is not a valid header"),
            }
        }
        if effects.back {
            headers.insert(HeaderName::from_static(BACK_HEADER), flag);
        }
        if effects.navigate.is_some() || effects.back {
            headers.insert(
                HeaderName::from_static(NAVIGATE_AFTER_HEADER),
                HeaderValue::from(effects.delay.as_millis() as u64),
            );
        }
        headers
    }
}

impl HostBridge for RequestBridge {
    fn expand(&self) {
        self.effects_mut().expand = true;
    }

    fn ready(&self) {
        self.effects_mut().ready = true;
    }

    fn platform_user(&self) -> Option<PlatformUser> {
        self.platform_user.clone()
    }

    fn send_data(&self, payload: String) {
        info!(bytes = payload.len(), "Queued data for the host");
        self.effects_mut().sent.push(payload);
    }

    fn navigate(&self, url: &str) {
        let mut effects = self.effects_mut();
        effects.navigate = Some(url.to_string());
        effects.delay = Duration::ZERO;
    }

    fn go_back(&self) {
        let mut effects = self.effects_mut();
        effects.back = true;
        effects.delay = Duration::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::communication::init_data::tests::signed_init_data;

    const USER_JSON: &str = r#"{"id":100,"first_name":"Pat","username":"pat"}"#;

    fn headers_with(init_data: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(INIT_DATA_HEADER, HeaderValue::from_str(init_data).unwrap());
        headers
    }

    #[test]
    fn test_platform_user_from_signed_init_data() {
        let init_data = signed_init_data(&[("user", USER_JSON), ("auth_date", "1")], "123:ABC");
        let headers = headers_with(&init_data);

        let bridge = RequestBridge::from_headers(&headers, Some("123:ABC"));
        assert_eq!(bridge.platform_user().map(|u| u.id), Some(100));

        let forged = RequestBridge::from_headers(&headers, Some("other:TOKEN"));
        assert_eq!(forged.platform_user(), None);

        let unchecked = RequestBridge::from_headers(&headers, None);
        assert_eq!(unchecked.platform_user().map(|u| u.id), Some(100));
    }

    #[test]
    fn test_missing_init_data() {
        let bridge = RequestBridge::from_headers(&HeaderMap::new(), None);
        assert_eq!(bridge.platform_user(), None);
        assert_eq!(bridge.effects(), HostEffects::default());
        assert!(bridge.headers().is_empty());
    }

    #[test]
    fn test_effects_become_headers() {
        let bridge = RequestBridge::from_headers(&HeaderMap::new(), None);
        bridge.expand();
        bridge.ready();
        bridge.send_data("{}".to_string());
        bridge.schedule(&Redirect::To {
            url: "index.html?user=MTAw".to_string(),
            after: Duration::from_secs(2),
        });

        let headers = bridge.headers();
        assert_eq!(headers[EXPAND_HEADER], "1");
        assert_eq!(headers[READY_HEADER], "1");
        assert_eq!(headers[NAVIGATE_HEADER], "index.html?user=MTAw");
        assert_eq!(headers[NAVIGATE_AFTER_HEADER], "2000");
        assert!(!headers.contains_key(BACK_HEADER));
        assert_eq!(bridge.effects().sent, vec!["{}".to_string()]);
    }

    #[test]
    fn test_go_back_is_immediate() {
        let bridge = RequestBridge::from_headers(&HeaderMap::new(), None);
        bridge.go_back();
        let headers = bridge.headers();
        assert_eq!(headers[BACK_HEADER], "1");
        assert_eq!(headers[NAVIGATE_AFTER_HEADER], "0");
    }
}
