use base64::Engine;
use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use serde_json::Value;

pub(crate) fn claims(token: &str) -> Option<Value> {
    let payload = token.split('.').nth(1)?;
    let trimmed = payload.trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD
        .decode(trimmed)
        .or_else(|_| STANDARD_NO_PAD.decode(trimmed))
        .ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Numeric claim in epoch seconds. Millisecond values are scaled down.
pub(crate) fn epoch_claim(token: &str, name: &str) -> Option<i64> {
    let claims = claims(token)?;
    let raw = match claims.get(name)? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    let secs = if raw > 1e12 { raw / 1000.0 } else { raw };
    Some(secs as i64)
}

pub(crate) fn string_claim(token: &str, name: &str) -> Option<String> {
    claims(token)?.get(name)?.as_str().map(str::to_string)
}

/// A token with an unreadable expiry claim counts as expired.
pub(crate) fn is_expired(token: &str, claim: &str, now: i64) -> bool {
    match epoch_claim(token, claim) {
        Some(exp) => exp <= now,
        None => true,
    }
}

#[cfg(test)]
pub(crate) fn encode_for_test(claims: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{body}.c2ln")
}
