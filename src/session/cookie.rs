//! Signed session cookie.
//!
//! Cookie value: `base64url(session_id).base64url(hmac_sha256(secret, session_id))`.
//! Only the id travels; the record lives in the session store.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

pub const COOKIE_NAME: &str = "tracker_sid";

/// Sign a session ID, returning the cookie value.
pub fn sign_session_id(secret: &[u8], session_id: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC key length is always valid");
    mac.update(session_id.as_bytes());
    let signature = mac.finalize().into_bytes();

    format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(session_id.as_bytes()),
        URL_SAFE_NO_PAD.encode(signature)
    )
}

/// Verify a signed cookie value and extract the session ID.
///
/// Returns `None` if the signature is invalid or the format is wrong.
pub fn verify_cookie(secret: &[u8], cookie_value: &str) -> Option<String> {
    let (id_part, sig_part) = cookie_value.split_once('.')?;

    let id_bytes = URL_SAFE_NO_PAD.decode(id_part).ok()?;
    let session_id = String::from_utf8(id_bytes).ok()?;
    let signature = URL_SAFE_NO_PAD.decode(sig_part).ok()?;

    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC key length is always valid");
    mac.update(session_id.as_bytes());
    mac.verify_slice(&signature).ok()?;

    Some(session_id)
}

/// `Set-Cookie` value carrying the signed session id.
pub fn make_set_cookie(secret: &str, session_id: &str, max_age: Duration, secure: bool) -> String {
    let signed = sign_session_id(secret.as_bytes(), session_id);
    let mut parts = vec![
        format!("{COOKIE_NAME}={signed}"),
        format!("Max-Age={}", max_age.as_secs()),
        "Path=/".into(),
        "HttpOnly".into(),
        "SameSite=Lax".into(),
    ];
    if secure {
        parts.push("Secure".into());
    }
    parts.join("; ")
}

/// `Set-Cookie` value that clears the session cookie.
pub fn make_delete_cookie(secure: bool) -> String {
    let mut parts = vec![
        format!("{COOKIE_NAME}="),
        "Max-Age=0".into(),
        "Path=/".into(),
        "HttpOnly".into(),
        "SameSite=Lax".into(),
    ];
    if secure {
        parts.push("Secure".into());
    }
    parts.join("; ")
}

/// Find a cookie by name in a `Cookie` header value.
pub fn parse_cookie<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header.split(';').find_map(|part| {
        part.trim()
            .strip_prefix(name)
            .and_then(|rest| rest.strip_prefix('='))
    })
}
