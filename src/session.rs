use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, trace};

use crate::cognito::CognitoBroker;
use crate::config::ClientConfig;
use crate::jwt;
use crate::rest::TclRestClient;
use crate::store::{Store, internal_settings_key, load_json, update_json};
use crate::types::{AuthData, AwsCredentials, RefreshTokens, RegionEndpoints};
use crate::{Error, Result};

pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(default)]
    pub auth_data: Option<AuthData>,
    #[serde(default)]
    pub refresh_tokens: Option<RefreshTokens>,
    #[serde(default)]
    pub aws_credentials: Option<AwsCredentials>,
    #[serde(default)]
    pub cloud_urls: Option<RegionEndpoints>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FakeSettings {
    #[serde(default)]
    pub use_fake_data: bool,
    #[serde(default)]
    pub data: Value,
}

/// Layout of `<namespace>.internal_settings_storage`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InternalSettings {
    #[serde(default)]
    pub fake: FakeSettings,
    #[serde(flatten)]
    pub session: SessionRecord,
}

pub fn auth_expired(auth: &AuthData, now: i64) -> bool {
    if jwt::is_expired(auth.token.expose(), "exp", now) {
        return true;
    }
    match jwt::epoch_claim(auth.refresh_token.expose(), "exp") {
        Some(exp) => exp <= now,
        None => false,
    }
}

pub fn tokens_expired(tokens: &RefreshTokens, now: i64) -> bool {
    jwt::is_expired(tokens.saas_token.expose(), "expiredDate", now)
        || jwt::is_expired(tokens.cognito_token.expose(), "exp", now)
}

pub fn credentials_expired(creds: &AwsCredentials, now: i64) -> bool {
    creds.expiration <= now
}

pub struct SessionManager {
    config: ClientConfig,
    rest: TclRestClient,
    cognito: CognitoBroker,
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    record: Mutex<Option<SessionRecord>>,
    auth_lock: Mutex<()>,
    region_lock: Mutex<()>,
    tokens_lock: Mutex<()>,
    aws_lock: Mutex<()>,
}

impl SessionManager {
    pub fn new(
        config: ClientConfig,
        rest: TclRestClient,
        cognito: CognitoBroker,
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            rest,
            cognito,
            store,
            clock,
            record: Mutex::new(None),
            auth_lock: Mutex::new(()),
            region_lock: Mutex::new(()),
            tokens_lock: Mutex::new(()),
            aws_lock: Mutex::new(()),
        }
    }

    pub fn rest(&self) -> &TclRestClient {
        &self.rest
    }

    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    pub async fn get_auth_data(&self) -> Result<AuthData> {
        let _guard = self.auth_lock.lock().await;
        let now = self.clock.now();
        if let Some(auth) = self.snapshot().await?.auth_data
            && !auth_expired(&auth, now)
        {
            return Ok(auth);
        }

        self.trace_session("auth data missing or expired, logging in");
        let auth = self
            .rest
            .login(&self.config.app_login_url, &self.config.username, &self.config.password)
            .await?;
        if auth_expired(&auth, now) {
            return Err(Error::TokenExpired("login token"));
        }
        info!(user = %auth.user.username, "logged in");
        self.mutate(|r| r.auth_data = Some(auth.clone())).await?;
        Ok(auth)
    }

    pub async fn get_cloud_urls(&self) -> Result<RegionEndpoints> {
        let _guard = self.region_lock.lock().await;
        if let Some(urls) = self.snapshot().await?.cloud_urls {
            return Ok(urls);
        }

        let auth = self.get_auth_data().await?;
        self.trace_session("discovering regional endpoints");
        let sso_id = if auth.user.username.is_empty() {
            self.config.username.as_str()
        } else {
            auth.user.username.as_str()
        };
        let urls = self
            .rest
            .discover_cloud_urls(&self.config.cloud_urls, sso_id, auth.token.expose())
            .await?;
        debug!(sso_region = %urls.sso_region, cloud_region = %urls.cloud_region, "regional endpoints discovered");
        self.mutate(|r| r.cloud_urls = Some(urls.clone())).await?;
        Ok(urls)
    }

    pub async fn get_refresh_tokens(&self) -> Result<RefreshTokens> {
        let _guard = self.tokens_lock.lock().await;
        let now = self.clock.now();
        if let Some(tokens) = self.snapshot().await?.refresh_tokens
            && !tokens_expired(&tokens, now)
        {
            return Ok(tokens);
        }

        let auth = self.get_auth_data().await?;
        let urls = self.get_cloud_urls().await?;
        self.trace_session("saas/cognito tokens missing or expired, refreshing");
        let user_id = if auth.user.username.is_empty() {
            self.config.username.as_str()
        } else {
            auth.user.username.as_str()
        };
        let tokens = self
            .rest
            .refresh_tokens(&urls.cloud_url, user_id, auth.token.expose(), &self.config.app_id)
            .await?;
        if tokens_expired(&tokens, now) {
            return Err(Error::TokenExpired("saas/cognito tokens"));
        }
        self.mutate(|r| r.refresh_tokens = Some(tokens.clone())).await?;
        Ok(tokens)
    }

    pub async fn get_aws_credentials(&self) -> Result<AwsCredentials> {
        let _guard = self.aws_lock.lock().await;
        let now = self.clock.now();
        if let Some(creds) = self.snapshot().await?.aws_credentials
            && !credentials_expired(&creds, now)
        {
            return Ok(creds);
        }

        let tokens = self.get_refresh_tokens().await?;
        let urls = self.get_cloud_urls().await?;
        self.trace_session("AWS credentials missing or expired, exchanging cognito token");
        let creds = self
            .cognito
            .get_credentials(&urls.sso_region, tokens.cognito_token.expose())
            .await?;
        debug!(expiration = creds.expiration, "AWS credentials refreshed");
        self.mutate(|r| r.aws_credentials = Some(creds.clone())).await?;
        Ok(creds)
    }

    pub async fn invalidate_aws_credentials(&self) -> Result<()> {
        let _guard = self.aws_lock.lock().await;
        self.mutate(|r| r.aws_credentials = None).await
    }

    pub async fn clear_storage(&self) -> Result<()> {
        self.mutate(|r| *r = SessionRecord::default()).await
    }

    pub async fn record(&self) -> Result<SessionRecord> {
        self.snapshot().await
    }

    pub async fn fake_settings(&self) -> Result<FakeSettings> {
        let key = internal_settings_key(&self.config.namespace);
        let settings: Option<InternalSettings> = load_json(self.store.as_ref(), &key).await?;
        Ok(settings.map(|s| s.fake).unwrap_or_default())
    }

    async fn snapshot(&self) -> Result<SessionRecord> {
        let mut record = self.record.lock().await;
        Ok(self.loaded(&mut record).await?.clone())
    }

    async fn loaded<'a>(&self, record: &'a mut Option<SessionRecord>) -> Result<&'a mut SessionRecord> {
        if record.is_none() {
            let key = internal_settings_key(&self.config.namespace);
            let stored: Option<InternalSettings> = load_json(self.store.as_ref(), &key).await?;
            *record = Some(stored.map(|s| s.session).unwrap_or_default());
        }
        Ok(record.get_or_insert_with(SessionRecord::default))
    }

    async fn mutate(&self, f: impl FnOnce(&mut SessionRecord)) -> Result<()> {
        let mut record = self.record.lock().await;
        let current = self.loaded(&mut record).await?;
        f(current);
        let updated = current.clone();
        let key = internal_settings_key(&self.config.namespace);
        update_json(self.store.as_ref(), &key, |settings: &mut InternalSettings| {
            settings.session = updated;
        })
        .await?;
        Ok(())
    }

    fn trace_session(&self, msg: &str) {
        if self.config.verbose_session_logging {
            debug!("{msg}");
        } else {
            trace!("{msg}");
        }
    }
}
