use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::protocol::{
    CONTENT_TYPE_JSON, SignedHeaders, THOME_VERSION, USER_AGENT, envelope_code, login_payload,
};
use crate::types::{
    AuthData, ConfigRecord, RefreshTokens, RegionEndpoints, StatsFilter, StatsResponse, Thing,
};
use crate::{Error, Result};

pub const REFRESH_TOKENS_PATH: &str = "/v3/auth/refresh_tokens";
pub const LIST_THINGS_PATH: &str = "/v3/user/get_things";
pub const CONFIG_GET_PATH: &str = "/v3/config/get";
pub const WORK_TIME_PATH: &str = "/v3/device/work_time";
pub const ENERGY_PATH: &str = "/v3/device/power_consumption";

#[derive(Debug, Clone)]
pub struct TclRestClient {
    http: reqwest::Client,
    verbose: bool,
}

impl TclRestClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            http,
            verbose: false,
        })
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Password login. Succeeds iff HTTP 200 and `status == 1`.
    pub async fn login(&self, login_url: &str, username: &str, password: &str) -> Result<AuthData> {
        debug!(url = %login_url, "logging in");
        let resp = self
            .http
            .post(login_url)
            .header("th_platform", "android")
            .header("th_version", THOME_VERSION)
            .header("content-type", CONTENT_TYPE_JSON)
            .json(&login_payload(username, password))
            .send()
            .await?;

        let status = resp.status().as_u16();
        let body = resp.text().await?;
        if status != 200 {
            return Err(Error::AuthFailed(format!("HTTP {status}: {body}")));
        }
        let value: Value = serde_json::from_str(&body)
            .map_err(|_| Error::AuthFailed(format!("unparseable login response: {body}")))?;
        let login_status = value.get("status").and_then(|v| {
            v.as_i64()
                .or_else(|| v.as_str().and_then(|s| s.parse().ok()))
        });
        if login_status != Some(1) {
            let msg = value
                .get("msg")
                .or_else(|| value.get("message"))
                .and_then(|v| v.as_str())
                .unwrap_or("login rejected");
            return Err(Error::AuthFailed(msg.to_string()));
        }
        serde_json::from_value(value).map_err(|e| Error::AuthFailed(e.to_string()))
    }

    pub async fn discover_cloud_urls(
        &self,
        bootstrap_url: &str,
        sso_id: &str,
        sso_token: &str,
    ) -> Result<RegionEndpoints> {
        debug!(url = %bootstrap_url, "discovering cloud urls");
        let req = self
            .http
            .post(bootstrap_url)
            .header("content-type", CONTENT_TYPE_JSON)
            .json(&json!({ "ssoId": sso_id, "ssoToken": sso_token }));
        let body = self.send(req).await?;
        envelope_data(body)
    }

    pub async fn refresh_tokens(
        &self,
        cloud_url: &str,
        user_id: &str,
        sso_token: &str,
        app_id: &str,
    ) -> Result<RefreshTokens> {
        let url = join(cloud_url, REFRESH_TOKENS_PATH);
        debug!(url = %url, "refreshing tokens");
        let req = self
            .http
            .post(&url)
            .header("content-type", CONTENT_TYPE_JSON)
            .json(&json!({ "userId": user_id, "ssoToken": sso_token, "appId": app_id }));
        let body = self.send(req).await?;
        envelope_data(body)
    }

    pub async fn list_things(
        &self,
        device_url: &str,
        saas_token: &str,
        country_abbr: &str,
    ) -> Result<Vec<Thing>> {
        let url = join(device_url, LIST_THINGS_PATH);
        let req = self
            .signed(self.http.post(&url), saas_token)
            .header("countryabbr", country_abbr)
            .json(&json!({}));
        let body = self.send(req).await?;
        let items = match body.get("data") {
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        };
        let mut things = Vec::with_capacity(items.len());
        for item in items {
            match serde_json::from_value::<Thing>(item) {
                Ok(thing) => things.push(thing),
                Err(e) => warn!("skipping malformed thing entry: {e}"),
            }
        }
        Ok(things)
    }

    /// Plug-in configuration records; empty when `data` is not an array.
    pub async fn get_rn_config(
        &self,
        cloud_url: &str,
        saas_token: &str,
        product_key: &str,
        country_abbr: &str,
    ) -> Result<Vec<ConfigRecord>> {
        let url = join(cloud_url, CONFIG_GET_PATH);
        let req = self
            .signed(self.http.post(&url), saas_token)
            .json(&json!({ "productKey": product_key, "countryAbbr": country_abbr }));
        let body = self.send(req).await?;
        let records = match body.get("data") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| serde_json::from_value(v.clone()).ok())
                .collect(),
            _ => Vec::new(),
        };
        Ok(records)
    }

    pub async fn get_work_time(
        &self,
        device_url: &str,
        saas_token: &str,
        device_id: &str,
        filter: &StatsFilter,
    ) -> Result<StatsResponse> {
        self.stats(device_url, WORK_TIME_PATH, saas_token, device_id, filter)
            .await
    }

    pub async fn get_energy_consumption(
        &self,
        device_url: &str,
        saas_token: &str,
        device_id: &str,
        filter: &StatsFilter,
    ) -> Result<StatsResponse> {
        self.stats(device_url, ENERGY_PATH, saas_token, device_id, filter)
            .await
    }

    pub async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::transport(Some(status.as_u16()), body));
        }
        Ok(resp.bytes().await?.to_vec())
    }

    async fn stats(
        &self,
        device_url: &str,
        path: &str,
        saas_token: &str,
        device_id: &str,
        filter: &StatsFilter,
    ) -> Result<StatsResponse> {
        let url = format!(
            "{}/{device_id}{}",
            join(device_url, path),
            filter.to_path_suffix()
        );
        let req = self.signed(self.http.get(&url), saas_token);
        let body = self.send(req).await?;
        Ok(serde_json::from_value(body)?)
    }

    fn signed(&self, req: reqwest::RequestBuilder, saas_token: &str) -> reqwest::RequestBuilder {
        SignedHeaders::new(saas_token)
            .headers(saas_token)
            .into_iter()
            .fold(req, |req, (name, value)| req.header(name, value))
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<Value> {
        let resp = req.send().await?;
        let status = resp.status().as_u16();
        let url = resp.url().path().to_string();
        let body = resp.text().await?;
        if self.verbose {
            debug!(path = %url, status, body = %body, "response");
        } else {
            tracing::trace!(path = %url, status, "response");
        }
        if status != 200 {
            return Err(Error::transport(Some(status), body));
        }
        let value: Value =
            serde_json::from_str(&body).map_err(|_| Error::transport(Some(status), body.clone()))?;
        let code = envelope_code(&value);
        if code != 0 {
            let message = value
                .get("message")
                .or_else(|| value.get("msg"))
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            return Err(Error::Api {
                code,
                message,
                body,
            });
        }
        Ok(value)
    }
}

fn envelope_data<T: DeserializeOwned>(body: Value) -> Result<T> {
    let data = body
        .get("data")
        .cloned()
        .ok_or_else(|| Error::transport(Some(200), body.to_string()))?;
    Ok(serde_json::from_value(data)?)
}

fn join(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_strips_trailing_slash() {
        assert_eq!(join("https://x/", "/v3/a"), "https://x/v3/a");
        assert_eq!(join("https://x", "/v3/a"), "https://x/v3/a");
    }

    #[test]
    fn envelope_data_requires_data() {
        let err = envelope_data::<RegionEndpoints>(serde_json::json!({"code": 0})).unwrap_err();
        assert!(matches!(err, Error::Transport { .. }));
    }
}
