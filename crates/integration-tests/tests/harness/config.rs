//! Programmatic configuration builder for integration tests

use secrecy::SecretString;
use synapse_config::{BedrockConfig, BedrockKey, Config, EndpointOverrides, LogConfig};
use url::Url;

/// Builder for configs whose every endpoint points at one mock server
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new(endpoint: &str) -> Self {
        let base: Url = endpoint.parse().expect("valid URL");
        Self {
            config: Config {
                log: LogConfig::default(),
                bedrock: BedrockConfig {
                    endpoints: EndpointOverrides {
                        runtime: Some(base.clone()),
                        control: Some(base.clone()),
                        storage: Some(base),
                    },
                    ..BedrockConfig::default()
                },
            },
        }
    }

    /// Add a key with a static `SigV4` key pair
    pub fn with_key(mut self, name: &str) -> Self {
        self.config.bedrock.keys.push(BedrockKey {
            name: name.to_owned(),
            access_key_id: Some(SecretString::from(format!("AKID{}", name.to_ascii_uppercase()))),
            secret_access_key: Some(SecretString::from("test-secret")),
            ..BedrockKey::default()
        });
        self
    }

    /// Add a key that authenticates with a bearer token
    pub fn with_bearer_key(mut self, name: &str, token: &str) -> Self {
        self.config.bedrock.keys.push(BedrockKey {
            name: name.to_owned(),
            api_key: Some(SecretString::from(token)),
            ..BedrockKey::default()
        });
        self
    }

    /// Batch role and output location on the most recently added key
    pub fn with_batch_defaults(mut self, role_arn: &str, output: &str) -> Self {
        let key = self.last_key();
        key.role_arn = Some(role_arn.to_owned());
        key.batch_output_s3_uri = Some(output.to_owned());
        self
    }

    /// Deployment alias on the most recently added key
    pub fn with_deployment(mut self, alias: &str, deployment: &str) -> Self {
        self.last_key()
            .deployments
            .insert(alias.to_owned(), deployment.to_owned());
        self
    }

    /// Allow-list entry on the most recently added key
    pub fn with_model(mut self, model: &str) -> Self {
        self.last_key().models.push(model.to_owned());
        self
    }

    /// Build and validate the final config
    pub fn build(self) -> Config {
        self.config.validate().expect("valid test config");
        self.config
    }

    fn last_key(&mut self) -> &mut BedrockKey {
        self.config
            .bedrock
            .keys
            .last_mut()
            .expect("add a key before configuring it")
    }
}
