//! HMAC-SHA256 signing of the session id carried in the `cv_session` cookie.
//!
//! Cookie value format: `<session id>.<hex signature>`.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const COOKIE_NAME: &str = "cv_session";

fn mac(secret: &str, id: &str) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(id.as_bytes());
    Some(mac)
}

/// Returns the signed cookie value for `id`.
pub fn sign(secret: &str, id: &str) -> String {
    match mac(secret, id) {
        Some(mac) => format!("{id}.{}", hex::encode(mac.finalize().into_bytes())),
        // HMAC accepts keys of any length.
        None => id.to_string(),
    }
}

/// Returns the session id if `value` carries a valid signature for it.
pub fn verify(secret: &str, value: &str) -> Option<String> {
    let (id, signature) = value.rsplit_once('.')?;
    let signature = hex::decode(signature).ok()?;
    mac(secret, id)?.verify_slice(&signature).ok()?;
    Some(id.to_string())
}

/// Finds the `cv_session` pair in a `Cookie` header value.
pub fn find_in_header(header: &str) -> Option<&str> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == COOKIE_NAME)
        .map(|(_, value)| value)
}

/// `Set-Cookie` header value for a signed session id.
pub fn set_cookie_header(secret: &str, id: &str, max_age_secs: u64) -> String {
    format!(
        "{COOKIE_NAME}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_secs}",
        sign(secret, id)
    )
}
