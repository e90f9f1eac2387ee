use rand::Rng;
use serde_json::{Map, Value, json};

pub const APP_VERSION: &str = "5.4.1";
pub const THOME_VERSION: &str = "4.8.1";
pub const CLIENT_VERSION: &str = "4.8.1";
pub const USER_AGENT: &str = "Android";
pub const CONTENT_TYPE_JSON: &str = "application/json; charset=UTF-8";

const NONCE_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const NONCE_LEN: usize = 16;

pub fn md5_hex(input: &str) -> String {
    format!("{:x}", md5::compute(input.as_bytes()))
}

/// `sign` header value: MD5 of timestamp, nonce and SaaS token concatenated.
pub fn sign(timestamp: &str, nonce: &str, saas_token: &str) -> String {
    md5_hex(&format!("{timestamp}{nonce}{saas_token}"))
}

pub fn random_nonce() -> String {
    let mut rng = rand::rng();
    (0..NONCE_LEN)
        .map(|_| NONCE_ALPHABET[rng.random_range(0..NONCE_ALPHABET.len())] as char)
        .collect()
}

pub fn timestamp_ms() -> String {
    chrono::Utc::now().timestamp_millis().to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    pub timestamp: String,
    pub nonce: String,
    pub sign: String,
}

impl SignedHeaders {
    pub fn new(saas_token: &str) -> Self {
        Self::with(timestamp_ms(), random_nonce(), saas_token)
    }

    pub fn with(timestamp: String, nonce: String, saas_token: &str) -> Self {
        let sign = sign(&timestamp, &nonce, saas_token);
        Self {
            timestamp,
            nonce,
            sign,
        }
    }

    pub fn headers(&self, saas_token: &str) -> Vec<(&'static str, String)> {
        vec![
            ("platform", "android".to_string()),
            ("appversion", APP_VERSION.to_string()),
            ("thomeversion", THOME_VERSION.to_string()),
            ("accesstoken", saas_token.to_string()),
            ("content-type", CONTENT_TYPE_JSON.to_string()),
            ("accept-language", "en".to_string()),
            ("user-agent", USER_AGENT.to_string()),
            ("timestamp", self.timestamp.clone()),
            ("nonce", self.nonce.clone()),
            ("sign", self.sign.clone()),
        ]
    }
}

pub fn login_payload(username: &str, password: &str) -> Value {
    json!({
        "equipment": 2,
        "password": md5_hex(password),
        "osType": 1,
        "username": username,
        "clientVersion": CLIENT_VERSION,
        "osVersion": "6.0",
        "deviceModel": "AndroidAndroid SDK built for x86",
        "captchaRule": 2,
        "channel": "app"
    })
}

pub fn shadow_update_topic(device_id: &str) -> String {
    format!("$aws/things/{device_id}/shadow/update")
}

pub fn client_token(unix_secs: i64) -> String {
    format!("mobile_{unix_secs}")
}

pub fn shadow_update_message(desired: &Map<String, Value>, unix_secs: i64) -> Value {
    json!({
        "state": { "desired": desired },
        "clientToken": client_token(unix_secs)
    })
}

pub fn get_either<'a>(obj: &'a Value, camel: &str) -> Option<&'a Value> {
    obj.get(camel).or_else(|| obj.get(camel_to_snake(camel).as_str()))
}

fn camel_to_snake(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            out.push('_');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

pub fn envelope_code(body: &Value) -> i64 {
    match body.get("code") {
        Some(Value::Number(n)) => n.as_i64().unwrap_or(-1),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(-1),
        _ => 0,
    }
}
