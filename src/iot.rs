use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_iotdataplane::config::http::HttpResponse;
use aws_sdk_iotdataplane::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_iotdataplane::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_iotdataplane::primitives::Blob;
use serde_json::{Map, Value, json};
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

use crate::protocol::{shadow_update_message, shadow_update_topic};
use crate::session::SessionManager;
use crate::types::AwsCredentials;
use crate::{Error, Result};

const QOS_AT_LEAST_ONCE: i32 = 1;
const CREDENTIAL_ERROR_CODES: &[&str] = &[
    "UnauthorizedException",
    "ForbiddenException",
    "ExpiredTokenException",
    "InvalidSignatureException",
    "UnrecognizedClientException",
];

#[async_trait]
pub trait IotData: Send + Sync {
    async fn get_shadow(&self, device_id: &str) -> Result<Value>;
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()>;
}

#[async_trait]
pub trait IotDataConnector: Send + Sync {
    async fn connect(&self, creds: &AwsCredentials, region: &str, endpoint: &str) -> Result<Arc<dyn IotData>>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AwsIotConnector;

#[async_trait]
impl IotDataConnector for AwsIotConnector {
    async fn connect(&self, creds: &AwsCredentials, region: &str, endpoint: &str) -> Result<Arc<dyn IotData>> {
        let credentials = Credentials::new(
            creds.access_key_id.clone(),
            creds.secret_key.expose().to_string(),
            Some(creds.session_token.expose().to_string()),
            None,
            "tcl-cognito",
        );
        let mut builder = aws_sdk_iotdataplane::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .credentials_provider(credentials);
        if !endpoint.is_empty() {
            let url = if endpoint.starts_with("http") {
                endpoint.to_string()
            } else {
                format!("https://{endpoint}")
            };
            builder = builder.endpoint_url(url);
        }
        debug!(region, endpoint, "connecting IoT data client");
        let client = aws_sdk_iotdataplane::Client::from_conf(builder.build());
        Ok(Arc::new(AwsIotData { client }))
    }
}

struct AwsIotData {
    client: aws_sdk_iotdataplane::Client,
}

#[async_trait]
impl IotData for AwsIotData {
    async fn get_shadow(&self, device_id: &str) -> Result<Value> {
        let out = self
            .client
            .get_thing_shadow()
            .thing_name(device_id)
            .send()
            .await
            .map_err(sdk_error)?;
        match out.payload() {
            Some(blob) => Ok(serde_json::from_slice(blob.as_ref())?),
            None => Ok(json!({})),
        }
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        self.client
            .publish()
            .topic(topic)
            .qos(QOS_AT_LEAST_ONCE)
            .payload(Blob::new(payload))
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }
}

fn sdk_error<E>(err: SdkError<E, HttpResponse>) -> Error
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let status = err.raw_response().map(|r| r.status().as_u16());
    let code = err.code().unwrap_or_default().to_string();
    let message = DisplayErrorContext(&err).to_string();
    if matches!(status, Some(401 | 403)) || CREDENTIAL_ERROR_CODES.contains(&code.as_str()) {
        Error::CredentialsRejected(message)
    } else {
        Error::transport(status, message)
    }
}

/// In-process shadows used in fake mode. Publishing merges the desired
/// patch straight into `state.reported`.
#[derive(Default)]
pub struct FakeIot {
    shadows: Mutex<HashMap<String, Value>>,
}

impl FakeIot {
    pub fn new(shadows: HashMap<String, Value>) -> Self {
        Self {
            shadows: Mutex::new(shadows),
        }
    }

    pub fn from_fake_data(data: &Value) -> Self {
        let shadows = data
            .get("shadows")
            .and_then(Value::as_object)
            .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();
        Self::new(shadows)
    }
}

#[async_trait]
impl IotData for FakeIot {
    async fn get_shadow(&self, device_id: &str) -> Result<Value> {
        self.shadows
            .lock()
            .await
            .get(device_id)
            .cloned()
            .ok_or_else(|| Error::UnknownDevice(device_id.to_string()))
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        let device_id = topic
            .strip_prefix("$aws/things/")
            .and_then(|t| t.strip_suffix("/shadow/update"))
            .ok_or_else(|| Error::invalid(format!("unexpected topic {topic}")))?;
        let message: Value = serde_json::from_slice(&payload)?;
        let Some(desired) = message.pointer("/state/desired").and_then(Value::as_object) else {
            return Ok(());
        };
        let now = chrono::Utc::now().timestamp();
        let mut shadows = self.shadows.lock().await;
        let shadow = shadows
            .entry(device_id.to_string())
            .or_insert_with(|| json!({"state": {"reported": {}}}));
        for (key, value) in desired {
            if let Some(reported) = shadow.pointer_mut("/state/reported").and_then(Value::as_object_mut) {
                reported.insert(key.clone(), value.clone());
            }
            set_metadata_timestamp(shadow, key, now);
        }
        Ok(())
    }
}

fn set_metadata_timestamp(shadow: &mut Value, key: &str, ts: i64) {
    let Some(root) = shadow.as_object_mut() else {
        return;
    };
    let reported = root
        .entry("metadata")
        .or_insert_with(|| json!({}))
        .as_object_mut()
        .map(|m| m.entry("reported").or_insert_with(|| json!({})));
    if let Some(Value::Object(reported)) = reported {
        reported.insert(key.to_string(), json!({ "timestamp": ts }));
    }
}

pub struct IotClient {
    session: Option<Arc<SessionManager>>,
    connector: Option<Arc<dyn IotDataConnector>>,
    handle: Mutex<Option<Arc<dyn IotData>>>,
}

impl IotClient {
    pub fn new(session: Arc<SessionManager>, connector: Arc<dyn IotDataConnector>) -> Self {
        Self {
            session: Some(session),
            connector: Some(connector),
            handle: Mutex::new(None),
        }
    }

    pub fn offline(iot: Arc<dyn IotData>) -> Self {
        Self {
            session: None,
            connector: None,
            handle: Mutex::new(Some(iot)),
        }
    }

    pub async fn get_shadow(&self, device_id: &str) -> Result<Value> {
        let shadow = self
            .with_reauth("get_shadow", |iot| async move { iot.get_shadow(device_id).await })
            .await?;
        trace!(device_id, shadow = %shadow, "shadow fetched");
        Ok(shadow)
    }

    /// Publishes `{"state":{"desired":…},"clientToken":"mobile_<secs>"}` to
    /// the thing's shadow update topic.
    pub async fn publish_desired(&self, device_id: &str, desired: &Map<String, Value>) -> Result<()> {
        let topic = shadow_update_topic(device_id);
        let payload = serde_json::to_vec(&shadow_update_message(desired, self.now()))?;
        debug!(device_id, desired = %serde_json::Value::Object(desired.clone()), "publishing desired state");
        self.with_reauth("publish", |iot| {
            let topic = topic.clone();
            let payload = payload.clone();
            async move { iot.publish(&topic, payload).await }
        })
        .await
    }

    pub async fn close(&self) {
        if self.session.is_some() {
            self.handle.lock().await.take();
        }
    }

    fn now(&self) -> i64 {
        match &self.session {
            Some(session) => session.now(),
            None => chrono::Utc::now().timestamp(),
        }
    }

    async fn with_reauth<T, F, Fut>(&self, op: &str, f: F) -> Result<T>
    where
        F: Fn(Arc<dyn IotData>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let iot = self.connected().await?;
        let Some(session) = &self.session else {
            return f(iot).await;
        };
        match f(iot).await {
            Ok(v) => Ok(v),
            Err(first) if !first.is_credential_error() => Err(first),
            Err(first) => {
                warn!(op, "IoT call failed, rebuilding credentials and retrying once: {first}");
                self.close().await;
                session.invalidate_aws_credentials().await?;
                let iot = self.connected().await?;
                f(iot).await
            }
        }
    }

    async fn connected(&self) -> Result<Arc<dyn IotData>> {
        let mut handle = self.handle.lock().await;
        if let Some(iot) = handle.as_ref() {
            return Ok(iot.clone());
        }
        let (Some(session), Some(connector)) = (&self.session, &self.connector) else {
            return Err(Error::NotConnected);
        };
        let creds = session.get_aws_credentials().await?;
        let urls = session.get_cloud_urls().await?;
        let endpoint = if urls.mqtt_endpoint.is_empty() {
            session.get_refresh_tokens().await?.mqtt_endpoint
        } else {
            urls.mqtt_endpoint.clone()
        };
        let iot = connector.connect(&creds, urls.iot_region(), &endpoint).await?;
        *handle = Some(iot.clone());
        Ok(iot)
    }
}
