use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::device::{Family, Mode};

/// Redacts a secret in `Debug` output.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(pub String);

impl Secret {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("REDACTED")
    }
}

impl From<String> for Secret {
    fn from(s: String) -> Self {
        Secret(s)
    }
}

impl From<&str> for Secret {
    fn from(s: &str) -> Self {
        Secret(s.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    #[serde(default)]
    pub username: String,
    #[serde(rename = "countryAbbr", alias = "country_abbr", default)]
    pub country_abbr: String,
    #[serde(default)]
    pub nickname: String,
}

/// Result of the SSO password login.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthData {
    pub token: Secret,
    #[serde(rename = "refreshToken", alias = "refresh_token", alias = "refreshtoken", default)]
    pub refresh_token: Secret,
    #[serde(default)]
    pub user: UserInfo,
    #[serde(default, deserialize_with = "flex_i64")]
    pub status: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshTokens {
    #[serde(rename = "saasToken", alias = "saas_token")]
    pub saas_token: Secret,
    #[serde(rename = "cognitoToken", alias = "cognito_token")]
    pub cognito_token: Secret,
    #[serde(rename = "cognitoId", alias = "cognito_id", default)]
    pub cognito_id: String,
    #[serde(rename = "mqttEndpoint", alias = "mqtt_endpoint", default)]
    pub mqtt_endpoint: String,
}

/// Temporary STS credentials. `expiration` is in epoch seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AwsCredentials {
    #[serde(rename = "accessKeyId", alias = "access_key_id", alias = "AccessKeyId")]
    pub access_key_id: String,
    #[serde(rename = "secretKey", alias = "secret_key", alias = "SecretKey")]
    pub secret_key: Secret,
    #[serde(rename = "sessionToken", alias = "session_token", alias = "SessionToken")]
    pub session_token: Secret,
    pub expiration: i64,
}

/// Regional endpoint set discovered for one user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionEndpoints {
    #[serde(rename = "ssoRegion", alias = "sso_region", default)]
    pub sso_region: String,
    #[serde(rename = "cloudRegion", alias = "cloud_region", default)]
    pub cloud_region: String,
    #[serde(rename = "ssoUrl", alias = "sso_url", default)]
    pub sso_url: String,
    #[serde(rename = "cloudUrl", alias = "cloud_url", default)]
    pub cloud_url: String,
    #[serde(rename = "deviceUrl", alias = "device_url", default)]
    pub device_url: String,
    #[serde(rename = "identityPoolId", alias = "identity_pool_id", default)]
    pub identity_pool_id: String,
    #[serde(rename = "mqttEndpoint", alias = "mqtt_endpoint", default)]
    pub mqtt_endpoint: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RegionEndpoints {
    /// Region hosting the IoT data plane. Falls back to the SSO region.
    pub fn iot_region(&self) -> &str {
        if self.cloud_region.is_empty() {
            &self.sso_region
        } else {
            &self.cloud_region
        }
    }
}

/// One entry of the user's thing list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Thing {
    #[serde(rename = "deviceId", alias = "device_id")]
    pub device_id: String,
    #[serde(rename = "productKey", alias = "product_key", default)]
    pub product_key: String,
    #[serde(rename = "nickName", alias = "nick_name", alias = "nickname", default)]
    pub nick_name: String,
    /// Family tag, e.g. `Split AC`.
    #[serde(rename = "deviceName", alias = "device_name", default)]
    pub device_name: String,
    #[serde(rename = "firmwareVersion", alias = "firmware_version", default)]
    pub firmware_version: String,
    #[serde(rename = "isOnline", alias = "is_online", default, deserialize_with = "flex_bool")]
    pub is_online: bool,
    #[serde(default)]
    pub room: String,
    #[serde(default, deserialize_with = "flex_string")]
    pub category: String,
    #[serde(rename = "type", default, deserialize_with = "flex_string")]
    pub kind: String,
    #[serde(rename = "netType", alias = "net_type", default, deserialize_with = "flex_string")]
    pub net_type: String,
    #[serde(rename = "deviceType", alias = "device_type", default, deserialize_with = "flex_string")]
    pub device_type: String,
    #[serde(default, deserialize_with = "flex_string")]
    pub platform: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<Label>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Label {
    #[serde(rename = "labelKey", alias = "label_key", default)]
    pub label_key: String,
    #[serde(rename = "labelValue", alias = "label_value", alias = "labelName", default)]
    pub label_value: String,
}

impl Thing {
    pub fn family(&self) -> Family {
        Family::from_device_name(&self.device_name)
    }

    /// Display name: nickname, else the room label, else the device id.
    pub fn display_name(&self) -> &str {
        if !self.nick_name.is_empty() {
            return &self.nick_name;
        }
        self.labels
            .iter()
            .find(|l| l.label_key == "room" && !l.label_value.is_empty())
            .map(|l| l.label_value.as_str())
            .unwrap_or(&self.device_id)
    }
}

/// Mobile-app plug-in record from `/v3/config/get`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigRecord {
    #[serde(rename = "plugInVersion", alias = "plug_in_version", default)]
    pub plug_in_version: String,
    #[serde(rename = "plugInUrl", alias = "plug_in_url", default)]
    pub plug_in_url: String,
    #[serde(rename = "productKey", alias = "product_key", default)]
    pub product_key: String,
}

/// Period selector for work-time and energy statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsFilter {
    Week {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },
    Month { year: i32, month: u32 },
    Year(i32),
}

impl StatsFilter {
    pub fn to_path_suffix(&self) -> String {
        match self {
            StatsFilter::Week { start, end } => format!(
                "?week={}-{}",
                start.format("%Y%m%d"),
                end.format("%Y%m%d")
            ),
            StatsFilter::Month { year, month } => format!("/{year:04}/{month:02}"),
            StatsFilter::Year(year) => format!("/{year:04}"),
        }
    }
}

/// Work-time or energy statistics as returned by the cloud.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsResponse {
    #[serde(default, deserialize_with = "flex_i64")]
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Value,
}

impl StatsResponse {
    /// Sums every numeric `value`-like field found in the data entries.
    pub fn total(&self) -> f64 {
        fn entry_value(v: &Value) -> Option<f64> {
            ["value", "workTime", "work_time", "consumption", "electricity"]
                .iter()
                .find_map(|k| v.get(*k))
                .and_then(|v| v.as_f64().or_else(|| v.as_str()?.parse().ok()))
        }
        match &self.data {
            Value::Array(items) => items.iter().filter_map(entry_value).sum(),
            Value::Object(_) => match self.data.get("list") {
                Some(Value::Array(items)) => items.iter().filter_map(entry_value).sum(),
                _ => entry_value(&self.data).unwrap_or(0.0),
            },
            Value::Number(n) => n.as_f64().unwrap_or(0.0),
            _ => 0.0,
        }
    }
}

/// Events emitted by the coordinator when a device's state changes.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    DeviceAdded { device_id: String, family: Family },
    OnlineChanged { device_id: String, online: bool },
    PowerChanged { device_id: String, on: bool },
    ModeChanged { device_id: String, mode: Mode },
    TargetTemperatureChanged { device_id: String, celsius: f64 },
    CurrentTemperatureChanged { device_id: String, celsius: f64 },

    PropertyNumeric { device_id: String, path: String, value: f64 },
    PropertyString { device_id: String, path: String, value: String },
    PropertyBool { device_id: String, path: String, value: bool },
}

impl Event {
    pub fn device_id(&self) -> &str {
        match self {
            Event::DeviceAdded { device_id, .. }
            | Event::OnlineChanged { device_id, .. }
            | Event::PowerChanged { device_id, .. }
            | Event::ModeChanged { device_id, .. }
            | Event::TargetTemperatureChanged { device_id, .. }
            | Event::CurrentTemperatureChanged { device_id, .. }
            | Event::PropertyNumeric { device_id, .. }
            | Event::PropertyString { device_id, .. }
            | Event::PropertyBool { device_id, .. } => device_id,
        }
    }
}

fn flex_bool<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().map(|v| v != 0.0).unwrap_or(false),
        Value::String(s) => matches!(s.trim(), "1" | "true" | "True" | "online"),
        _ => false,
    })
}

fn flex_i64<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Number(n) => n.as_i64().unwrap_or_default(),
        Value::String(s) => s.trim().parse().unwrap_or_default(),
        Value::Bool(b) => i64::from(b),
        _ => 0,
    })
}

fn flex_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn thing_accepts_both_key_styles() {
        let camel: Thing = serde_json::from_value(json!({
            "deviceId": "d1", "deviceName": "Split AC", "isOnline": "1", "type": 3
        }))
        .unwrap();
        let snake: Thing = serde_json::from_value(json!({
            "device_id": "d1", "device_name": "Split AC", "is_online": true
        }))
        .unwrap();
        assert_eq!(camel.device_id, snake.device_id);
        assert!(camel.is_online && snake.is_online);
        assert_eq!(camel.kind, "3");
        assert_eq!(camel.family(), Family::SplitAc);
    }

    #[test]
    fn display_name_falls_back_to_room_label() {
        let thing: Thing = serde_json::from_value(json!({
            "deviceId": "d1",
            "labels": [{"labelKey": "color", "labelValue": "blue"}, {"labelKey": "room", "labelValue": "Bedroom"}]
        }))
        .unwrap();
        assert_eq!(thing.display_name(), "Bedroom");
    }

    #[test]
    fn stats_filter_shapes() {
        let week = StatsFilter::Week {
            start: chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end: chrono::NaiveDate::from_ymd_opt(2024, 1, 7).unwrap(),
        };
        assert_eq!(week.to_path_suffix(), "?week=20240101-20240107");
        assert_eq!(StatsFilter::Month { year: 2024, month: 3 }.to_path_suffix(), "/2024/03");
        assert_eq!(StatsFilter::Year(2024).to_path_suffix(), "/2024");
    }

    #[test]
    fn stats_total_sums_entries() {
        let resp: StatsResponse = serde_json::from_value(json!({
            "code": 0, "message": "ok",
            "data": [{"date": "01", "value": 1.5}, {"date": "02", "value": "2.5"}]
        }))
        .unwrap();
        assert!((resp.total() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn secrets_are_redacted() {
        let creds = AwsCredentials {
            access_key_id: "AKIA".into(),
            secret_key: "topsecret".into(),
            session_token: "session".into(),
            expiration: 0,
        };
        let dbg = format!("{creds:?}");
        assert!(!dbg.contains("topsecret"));
        assert!(dbg.contains("AKIA"));
    }
}
