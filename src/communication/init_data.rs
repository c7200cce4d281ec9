//! The host's signed launch parameters (`initData`): a urlencoded string with
//! a JSON `user` field and a `hash` over the remaining fields.

use super::host::PlatformUser;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::BTreeMap;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

const SECRET_KEY_SALT: &[u8] = b"WebAppData";

/// Decoded `key -> value` pairs. Malformed pairs are skipped.
fn parse_pairs(init_data: &str) -> BTreeMap<String, String> {
    init_data
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .filter_map(|(key, value)| {
            let value = urlencoding::decode(&value.replace('+', " "))
                .ok()?
                .into_owned();
            Some((key.to_string(), value))
        })
        .collect()
}

/// Reads the asserted user. No signature check.
pub fn parse_user(init_data: &str) -> Option<PlatformUser> {
    let pairs = parse_pairs(init_data);
    let user = pairs.get("user")?;
    match serde_json::from_str::<PlatformUser>(user) {
        Ok(user) => Some(user),
        Err(e) => {
            warn!(error = %e, "Init data carries an unreadable user");
            None
        }
    }
}

/// Checks the `hash` field against the bot token.
/// Returns true if the signature is valid
pub fn verify(init_data: &str, bot_token: &str) -> bool {
    let pairs = parse_pairs(init_data);
    let expected = match pairs.get("hash").and_then(|hash| hex::decode(hash).ok()) {
        Some(expected) => expected,
        None => return false,
    };

    let data = build_data_check_string(&pairs);

    let mut secret = match HmacSha256::new_from_slice(SECRET_KEY_SALT) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    secret.update(bot_token.as_bytes());
    let secret_key = secret.finalize().into_bytes();

    let mut mac = match HmacSha256::new_from_slice(&secret_key) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(data.as_bytes());

    mac.verify_slice(&expected).is_ok()
}

/// Builds the string the host signs: sorted `key=value` lines without `hash`.
fn build_data_check_string(pairs: &BTreeMap<String, String>) -> String {
    pairs
        .iter()
        .filter(|(key, _)| key.as_str() != "hash")
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("\n")
}

/// User from init data, dropped when a bot token is configured and the
/// signature does not hold.
pub fn trusted_user(init_data: &str, bot_token: Option<&str>) -> Option<PlatformUser> {
    if let Some(token) = bot_token {
        if !verify(init_data, token) {
            warn!("Init data signature rejected, ignoring platform identity");
            return None;
        }
    }
    parse_user(init_data)
}
