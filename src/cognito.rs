use aws_sdk_cognitoidentity::config::http::HttpResponse;
use aws_sdk_cognitoidentity::config::retry::RetryConfig;
use aws_sdk_cognitoidentity::config::{BehaviorVersion, Region};
use aws_sdk_cognitoidentity::error::{DisplayErrorContext, SdkError};
use aws_sdk_cognitoidentity::operation::get_credentials_for_identity::GetCredentialsForIdentityError;
use tracing::debug;

use crate::jwt;
use crate::types::AwsCredentials;
use crate::{Error, Result};

const LOGIN_PROVIDER: &str = "cognito-identity.amazonaws.com";

/// Exchanges the Cognito OpenID token for temporary STS credentials.
#[derive(Debug, Clone, Default)]
pub struct CognitoBroker {
    endpoint_override: Option<String>,
}

impl CognitoBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sends requests to `url` instead of the regional AWS endpoint.
    pub fn with_endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint_override = Some(url.into());
        self
    }

    pub fn endpoint(&self, region: &str) -> String {
        match &self.endpoint_override {
            Some(url) => url.clone(),
            None => format!("https://cognito-identity.{region}.amazonaws.com/"),
        }
    }

    fn client(&self, region: &str) -> aws_sdk_cognitoidentity::Client {
        let mut builder = aws_sdk_cognitoidentity::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .retry_config(RetryConfig::disabled());
        if let Some(url) = &self.endpoint_override {
            builder = builder.endpoint_url(url);
        }
        aws_sdk_cognitoidentity::Client::from_conf(builder.build())
    }

    pub async fn get_credentials(&self, region: &str, cognito_token: &str) -> Result<AwsCredentials> {
        let identity_id = jwt::string_claim(cognito_token, "sub")
            .ok_or_else(|| Error::AuthFailed("cognito token has no sub claim".into()))?;
        debug!(endpoint = %self.endpoint(region), "requesting AWS credentials for identity");

        let out = self
            .client(region)
            .get_credentials_for_identity()
            .identity_id(identity_id)
            .logins(LOGIN_PROVIDER, cognito_token)
            .send()
            .await
            .map_err(credentials_error)?;
        let creds = out
            .credentials()
            .ok_or_else(|| Error::CredentialsRejected("no credentials in Cognito response".into()))?;
        Ok(AwsCredentials {
            access_key_id: creds.access_key_id().unwrap_or_default().to_string(),
            secret_key: creds.secret_key().unwrap_or_default().to_string().into(),
            session_token: creds.session_token().unwrap_or_default().to_string().into(),
            expiration: creds.expiration().map(|t| t.secs()).unwrap_or_default(),
        })
    }
}

fn credentials_error(err: SdkError<GetCredentialsForIdentityError, HttpResponse>) -> Error {
    let status = err.raw_response().map(|r| r.status().as_u16());
    let rejected = err
        .as_service_error()
        .is_some_and(GetCredentialsForIdentityError::is_not_authorized_exception);
    let message = DisplayErrorContext(&err).to_string();
    if rejected {
        Error::CredentialsRejected(message)
    } else {
        Error::transport(status, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regional_endpoint() {
        let broker = CognitoBroker::new();
        assert_eq!(
            broker.endpoint("eu-central-1"),
            "https://cognito-identity.eu-central-1.amazonaws.com/"
        );
        let broker = broker.with_endpoint("http://127.0.0.1:1234/");
        assert_eq!(broker.endpoint("eu-central-1"), "http://127.0.0.1:1234/");
    }

    #[tokio::test]
    async fn token_without_sub_is_rejected_locally() {
        let broker = CognitoBroker::new();
        let token = jwt::encode_for_test(&serde_json::json!({"exp": 1}));
        let err = broker.get_credentials("eu-central-1", &token).await.unwrap_err();
        assert!(matches!(err, Error::AuthFailed(_)));
    }
}
