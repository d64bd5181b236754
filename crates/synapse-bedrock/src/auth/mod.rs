//! Request authorization: bearer API keys or SigV4
//!
//! A key with an `api_key` is sent as a bearer token and never signed. Keys
//! with an explicit access/secret pair sign with it; anything else falls
//! back to the ambient AWS provider chain (environment, profile, IMDS, web
//! identity).

pub mod sigv4;

use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use synapse_config::BedrockKey;
use tokio::sync::OnceCell;
use tracing::debug;

pub use sigv4::Credentials;
use sigv4::{SigningKeyCache, SigningScope};

use crate::error::BedrockError;

/// Signing name of the AWS surface a request targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum Service {
    /// Both the runtime and the control plane sign as `bedrock`
    Bedrock,
    S3,
}

/// How one call authenticates
#[derive(Debug, Clone)]
pub enum Authorization {
    Bearer(SecretString),
    SigV4(Credentials),
}

/// Resolves credentials per key and authorizes outgoing requests
#[derive(Debug, Default)]
pub struct Signer {
    ambient: OnceCell<Option<SharedCredentialsProvider>>,
    keys: SigningKeyCache,
}

impl Signer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick bearer, explicit key pair or ambient credentials, in that order
    pub async fn authorization(&self, key: &BedrockKey, region: &str) -> Result<Authorization, BedrockError> {
        if let Some(token) = key.bearer_token() {
            return Ok(Authorization::Bearer(token.clone()));
        }

        if let Some((access, secret)) = key.key_pair() {
            return Ok(Authorization::SigV4(Credentials {
                access_key_id: access.expose_secret().to_owned(),
                secret_access_key: secret.clone(),
                session_token: key.session_token().cloned(),
            }));
        }

        debug!(key = %key.name, "using ambient AWS credentials");
        self.ambient_credentials(region).await.map(Authorization::SigV4)
    }

    async fn ambient_credentials(&self, region: &str) -> Result<Credentials, BedrockError> {
        let provider = self
            .ambient
            .get_or_init(|| async {
                let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
                    .region(aws_config::Region::new(region.to_owned()))
                    .load()
                    .await;
                config.credentials_provider()
            })
            .await
            .as_ref()
            .ok_or_else(|| BedrockError::Configuration("no AWS credential provider is available".to_owned()))?;

        let creds = provider
            .provide_credentials()
            .await
            .map_err(|e| BedrockError::Configuration(format!("failed to resolve AWS credentials: {e}")))?;

        Ok(Credentials {
            access_key_id: creds.access_key_id().to_owned(),
            secret_access_key: SecretString::from(creds.secret_access_key()),
            session_token: creds.session_token().map(SecretString::from),
        })
    }

    /// Add authentication headers to a fully built request
    pub fn authorize(
        &self,
        auth: &Authorization,
        request: &mut reqwest::Request,
        region: &str,
        service: Service,
    ) -> Result<(), BedrockError> {
        let payload = request
            .body()
            .and_then(reqwest::Body::as_bytes)
            .map(<[u8]>::to_vec)
            .unwrap_or_default();

        prepare_headers(request.headers_mut(), &payload);

        match auth {
            Authorization::Bearer(token) => {
                let value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
                    .map_err(|e| BedrockError::Configuration(format!("invalid bearer token: {e}")))?;
                request.headers_mut().insert(AUTHORIZATION, value);
                Ok(())
            }
            Authorization::SigV4(creds) => {
                let method = request.method().clone();
                let url = request.url().clone();
                let scope = SigningScope {
                    region,
                    service: service.into(),
                    time: jiff::Timestamp::now(),
                };
                sigv4::sign(&method, &url, request.headers_mut(), &payload, creds, scope, &self.keys)
            }
        }
    }
}

/// JSON defaults the caller did not override, plus the payload hash
pub fn prepare_headers(headers: &mut HeaderMap, payload: &[u8]) {
    headers
        .entry(CONTENT_TYPE)
        .or_insert_with(|| HeaderValue::from_static("application/json"));
    headers
        .entry(ACCEPT)
        .or_insert_with(|| HeaderValue::from_static("application/json"));

    if let Ok(hash) = HeaderValue::from_str(&sigv4::sha256_hex(payload)) {
        headers.insert("x-amz-content-sha256", hash);
    }
}
