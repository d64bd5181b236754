use std::time::Duration;

use indexmap::IndexMap;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use url::Url;

/// Region used when neither the key nor the call names one
pub const DEFAULT_REGION: &str = "us-east-1";

/// Bedrock adapter configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BedrockConfig {
    /// Region for keys that do not set their own
    #[serde(default = "default_region")]
    pub default_region: String,
    /// Upper bound for a single provider call (e.g. "30s", "10m")
    #[serde(default = "default_timeout", deserialize_with = "duration_str::deserialize_duration")]
    pub timeout: Duration,
    /// Endpoint overrides, mostly for pointing at local mocks
    #[serde(default)]
    pub endpoints: EndpointOverrides,
    /// Ordered credential set; list calls page through it in this order
    #[serde(default)]
    pub keys: Vec<BedrockKey>,
}

impl Default for BedrockConfig {
    fn default() -> Self {
        Self {
            default_region: default_region(),
            timeout: default_timeout(),
            endpoints: EndpointOverrides::default(),
            keys: Vec::new(),
        }
    }
}

/// Base URL overrides for the three AWS surfaces the adapter talks to
///
/// When `storage` is set, objects are addressed path-style
/// (`{storage}/{bucket}/{key}`) instead of virtual-hosted style.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointOverrides {
    /// Replaces `https://bedrock-runtime.{region}.amazonaws.com`
    #[serde(default)]
    pub runtime: Option<Url>,
    /// Replaces `https://bedrock.{region}.amazonaws.com`
    #[serde(default)]
    pub control: Option<Url>,
    /// Replaces `https://{bucket}.s3.{region}.amazonaws.com`
    #[serde(default)]
    pub storage: Option<Url>,
}

/// One credential set
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BedrockKey {
    /// Name used in logs
    pub name: String,
    /// Region override for this key
    #[serde(default)]
    pub region: Option<String>,
    /// Access key ID; uses the ambient AWS credential chain if absent
    #[serde(default)]
    pub access_key_id: Option<SecretString>,
    /// Secret access key
    #[serde(default)]
    pub secret_access_key: Option<SecretString>,
    /// Session token for temporary credentials
    #[serde(default)]
    pub session_token: Option<SecretString>,
    /// Bedrock API key, sent as a bearer token instead of signing
    #[serde(default)]
    pub api_key: Option<SecretString>,
    /// IAM role Bedrock assumes to run batch jobs
    #[serde(default)]
    pub role_arn: Option<String>,
    /// Inference profile ARN that prefixes every model path
    #[serde(default)]
    pub inference_profile_arn: Option<String>,
    /// Default output location for batch jobs
    #[serde(default)]
    pub batch_output_s3_uri: Option<String>,
    /// Model alias to deployment id
    #[serde(default)]
    pub deployments: IndexMap<String, String>,
    /// Allow-list of model ids; empty allows all
    #[serde(default)]
    pub models: Vec<String>,
}

impl BedrockKey {
    /// Region for this key, falling back to `default`
    pub fn region_or<'a>(&'a self, default: &'a str) -> &'a str {
        match self.region.as_deref() {
            Some(region) if !region.trim().is_empty() => region,
            _ => default,
        }
    }

    /// Deployment id for `model`, or `model` itself when no alias applies
    pub fn deployment<'a>(&'a self, model: &'a str) -> &'a str {
        match self.deployments.get(model) {
            Some(deployment) if !deployment.is_empty() => deployment,
            _ => model,
        }
    }

    /// Bearer token, if one is configured and non-empty
    pub fn bearer_token(&self) -> Option<&SecretString> {
        non_empty(self.api_key.as_ref())
    }

    /// Explicit key pair, present only when both halves are non-empty
    pub fn key_pair(&self) -> Option<(&SecretString, &SecretString)> {
        Some((
            non_empty(self.access_key_id.as_ref())?,
            non_empty(self.secret_access_key.as_ref())?,
        ))
    }

    /// Session token, if one is configured and non-empty
    pub fn session_token(&self) -> Option<&SecretString> {
        non_empty(self.session_token.as_ref())
    }
}

fn non_empty(secret: Option<&SecretString>) -> Option<&SecretString> {
    secret.filter(|s| !s.expose_secret().is_empty())
}

fn default_region() -> String {
    DEFAULT_REGION.to_owned()
}

const fn default_timeout() -> Duration {
    Duration::from_secs(600)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> BedrockKey {
        BedrockKey {
            name: "primary".to_owned(),
            ..BedrockKey::default()
        }
    }

    #[test]
    fn blank_region_falls_back() {
        let mut key = key();
        assert_eq!(key.region_or("eu-west-1"), "eu-west-1");

        key.region = Some("  ".to_owned());
        assert_eq!(key.region_or("eu-west-1"), "eu-west-1");

        key.region = Some("ap-south-1".to_owned());
        assert_eq!(key.region_or("eu-west-1"), "ap-south-1");
    }

    #[test]
    fn deployment_alias_applies_when_non_empty() {
        let mut key = key();
        key.deployments.insert("claude".to_owned(), "anthropic.claude-3-haiku".to_owned());
        key.deployments.insert("blank".to_owned(), String::new());

        assert_eq!(key.deployment("claude"), "anthropic.claude-3-haiku");
        assert_eq!(key.deployment("blank"), "blank");
        assert_eq!(key.deployment("other"), "other");
    }

    #[test]
    fn key_pair_requires_both_halves() {
        let mut key = key();
        key.access_key_id = Some(SecretString::from("AKID"));
        assert!(key.key_pair().is_none());

        key.secret_access_key = Some(SecretString::from(""));
        assert!(key.key_pair().is_none());

        key.secret_access_key = Some(SecretString::from("secret"));
        let (access, secret) = key.key_pair().unwrap();
        assert_eq!(access.expose_secret(), "AKID");
        assert_eq!(secret.expose_secret(), "secret");
    }

    #[test]
    fn empty_bearer_token_is_ignored() {
        let mut key = key();
        key.api_key = Some(SecretString::from(""));
        assert!(key.bearer_token().is_none());
    }
}
