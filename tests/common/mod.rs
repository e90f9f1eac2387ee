#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::{Value, json};
use tcl_hvac::{AwsCredentials, Clock, Error, IotData, IotDataConnector, Result, TclClientBuilder};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const NOW: i64 = 1_700_000_000;

pub fn jwt(claims: Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.sig")
}

pub struct ManualClock(AtomicI64);

impl ManualClock {
    pub fn new(now: i64) -> Arc<Self> {
        Arc::new(Self(AtomicI64::new(now)))
    }

    pub fn set(&self, now: i64) {
        self.0.store(now, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// In-process data plane that records publishes and can fail on demand.
#[derive(Default)]
pub struct MockIot {
    pub shadows: Mutex<HashMap<String, Value>>,
    pub published: Mutex<Vec<(String, Value)>>,
    pub publish_attempts: AtomicUsize,
    pub connects: AtomicUsize,
    pub fail_publishes: AtomicUsize,
}

impl MockIot {
    pub fn with_shadow(device_id: &str, reported: Value) -> Arc<Self> {
        let iot = Self::default();
        iot.shadows
            .lock()
            .unwrap()
            .insert(device_id.to_string(), json!({"state": {"reported": reported}}));
        Arc::new(iot)
    }

    pub fn fail_next_publishes(&self, n: usize) {
        self.fail_publishes.store(n, Ordering::SeqCst);
    }

    pub fn published(&self) -> Vec<(String, Value)> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl IotData for MockIot {
    async fn get_shadow(&self, device_id: &str) -> Result<Value> {
        self.shadows
            .lock()
            .unwrap()
            .get(device_id)
            .cloned()
            .ok_or_else(|| Error::UnknownDevice(device_id.to_string()))
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        self.publish_attempts.fetch_add(1, Ordering::SeqCst);
        let pending = self.fail_publishes.load(Ordering::SeqCst);
        if pending > 0 {
            self.fail_publishes.store(pending - 1, Ordering::SeqCst);
            return Err(Error::CredentialsRejected("ExpiredTokenException".into()));
        }
        let message: Value = serde_json::from_slice(&payload)?;
        self.published.lock().unwrap().push((topic.to_string(), message));
        Ok(())
    }
}

pub struct MockConnector(pub Arc<MockIot>);

#[async_trait]
impl IotDataConnector for MockConnector {
    async fn connect(&self, _: &AwsCredentials, _: &str, _: &str) -> Result<Arc<dyn IotData>> {
        self.0.connects.fetch_add(1, Ordering::SeqCst);
        Ok(self.0.clone())
    }
}

pub fn login_body(exp: i64) -> Value {
    json!({
        "status": 1,
        "token": jwt(json!({"exp": exp})),
        "refreshtoken": "opaque-refresh",
        "user": {"username": "u", "countryAbbr": "DE", "nickname": "u"}
    })
}

pub fn urls_body(server: &MockServer) -> Value {
    json!({"code": 0, "data": {
        "ssoRegion": "eu-central-1",
        "cloudRegion": "eu-central-1",
        "cloudUrl": server.uri(),
        "deviceUrl": server.uri(),
        "mqttEndpoint": "iot.example.test"
    }})
}

pub fn tokens_body(saas_exp: i64, cognito_exp: i64) -> Value {
    json!({"code": 0, "data": {
        "saasToken": jwt(json!({"expiredDate": saas_exp})),
        "cognitoToken": jwt(json!({"exp": cognito_exp, "sub": "eu-central-1:identity"})),
        "cognitoId": "eu-central-1:identity",
        "mqttEndpoint": "iot.example.test"
    }})
}

pub fn credentials_body(expiration: i64) -> Value {
    json!({"IdentityId": "eu-central-1:identity", "Credentials": {
        "AccessKeyId": "AKIA", "SecretKey": "secret", "SessionToken": "session", "Expiration": expiration
    }})
}

pub fn things_body(things: Value) -> Value {
    json!({"code": 0, "data": things})
}

/// Upstream call counts expected by a test; `None` leaves a route unverified.
#[derive(Clone, Copy, Default)]
pub struct Expect {
    pub login: Option<u64>,
    pub urls: Option<u64>,
    pub tokens: Option<u64>,
    pub cognito: Option<u64>,
    pub things: Option<u64>,
}

/// Cognito `GetCredentialsForIdentity`, matched on the JSON-protocol target header.
pub async fn mount_cognito(server: &MockServer, expiration: i64, times: Option<u64>) {
    counted(
        Mock::given(method("POST"))
            .and(header("x-amz-target", "AWSCognitoIdentityService.GetCredentialsForIdentity"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/x-amz-json-1.1")
                    .set_body_string(credentials_body(expiration).to_string()),
            ),
        times,
    )
    .mount(server)
    .await;
}

fn counted(mock: Mock, n: Option<u64>) -> Mock {
    match n {
        Some(n) => mock.expect(n),
        None => mock,
    }
}

/// Mounts every account and cloud route with tokens valid for an hour.
pub async fn mount_cloud(server: &MockServer, things: Value, expect: Expect) {
    counted(
        Mock::given(method("POST"))
            .and(path("/account/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(login_body(NOW + 3600))),
        expect.login,
    )
    .mount(server)
    .await;
    counted(
        Mock::given(method("POST"))
            .and(path("/v3/global/cloud_url_get"))
            .respond_with(ResponseTemplate::new(200).set_body_json(urls_body(server))),
        expect.urls,
    )
    .mount(server)
    .await;
    counted(
        Mock::given(method("POST"))
            .and(path("/v3/auth/refresh_tokens"))
            .respond_with(ResponseTemplate::new(200).set_body_json(tokens_body(NOW + 3600, NOW + 3600))),
        expect.tokens,
    )
    .mount(server)
    .await;
    mount_cognito(server, NOW + 3600, expect.cognito).await;
    counted(
        Mock::given(method("POST"))
            .and(path("/v3/user/get_things"))
            .respond_with(ResponseTemplate::new(200).set_body_json(things_body(things))),
        expect.things,
    )
    .mount(server)
    .await;
}

pub fn builder(server: &MockServer, clock: Arc<ManualClock>, iot: Arc<MockIot>) -> TclClientBuilder {
    tcl_hvac::TclClient::builder("u", "p")
        .app_login_url(format!("{}/account/login", server.uri()))
        .cloud_urls(format!("{}/v3/global/cloud_url_get", server.uri()))
        .cognito_endpoint(server.uri())
        .clock(clock)
        .iot_connector(Arc::new(MockConnector(iot)))
}
