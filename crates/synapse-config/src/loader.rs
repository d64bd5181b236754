use std::path::Path;

use secrecy::ExposeSecret;

use crate::{BedrockKey, Config, EndpointOverrides};

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Reads the file, expands `{{ env.VAR }}` placeholders, then
    /// deserializes and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, a placeholder cannot be
    /// resolved, the TOML is malformed, or validation fails
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        Self::parse(&raw)
    }

    /// Parse and validate configuration text
    ///
    /// # Errors
    ///
    /// Same as [`Config::load`], minus the file read
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let expanded =
            crate::env::expand_env(raw).map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        let config: Self = toml::from_str(&expanded).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate that the configuration is internally consistent
    ///
    /// # Errors
    ///
    /// Returns an error if no key is configured, a key mixes credential
    /// styles, or an endpoint override is not an absolute http(s) URL
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.bedrock.keys.is_empty() {
            anyhow::bail!("at least one [[bedrock.keys]] entry must be configured");
        }

        if self.bedrock.default_region.trim().is_empty() {
            anyhow::bail!("bedrock.default_region must not be empty");
        }

        for (index, key) in self.bedrock.keys.iter().enumerate() {
            validate_key(index, key)?;
        }

        validate_endpoints(&self.bedrock.endpoints)
    }
}

fn validate_key(index: usize, key: &BedrockKey) -> anyhow::Result<()> {
    let label = format!("bedrock.keys[{index}] ({})", key.name);

    if key.name.trim().is_empty() {
        anyhow::bail!("bedrock.keys[{index}]: name must not be empty");
    }

    let present = |secret: Option<&secrecy::SecretString>| secret.is_some_and(|s| !s.expose_secret().is_empty());
    let has_access = present(key.access_key_id.as_ref());
    let has_secret = present(key.secret_access_key.as_ref());

    if has_access != has_secret {
        anyhow::bail!("{label}: access_key_id and secret_access_key must be set together");
    }

    if present(key.api_key.as_ref()) && has_access {
        anyhow::bail!("{label}: api_key cannot be combined with access_key_id/secret_access_key");
    }

    if present(key.session_token.as_ref()) && !has_access {
        anyhow::bail!("{label}: session_token requires access_key_id and secret_access_key");
    }

    Ok(())
}

fn validate_endpoints(endpoints: &EndpointOverrides) -> anyhow::Result<()> {
    let named = [
        ("runtime", endpoints.runtime.as_ref()),
        ("control", endpoints.control.as_ref()),
        ("storage", endpoints.storage.as_ref()),
    ];

    for (name, url) in named {
        if let Some(url) = url
            && !matches!(url.scheme(), "http" | "https")
        {
            anyhow::bail!("bedrock.endpoints.{name} must be an http(s) URL, got {url}");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::time::Duration;

    use super::*;
    use crate::LogFormat;

    const MINIMAL: &str = r#"
[[bedrock.keys]]
name = "primary"
"#;

    #[test]
    fn minimal_config_uses_defaults() {
        let config = Config::parse(MINIMAL).unwrap();

        assert_eq!(config.bedrock.default_region, "us-east-1");
        assert_eq!(config.bedrock.timeout, Duration::from_secs(600));
        assert_eq!(config.log.filter, "info");
        assert_eq!(config.log.format, LogFormat::Text);
        assert_eq!(config.bedrock.keys.len(), 1);
    }

    #[test]
    fn full_config_parses() {
        let raw = r#"
[log]
filter = "synapse_bedrock=debug"
format = "json"

[bedrock]
default_region = "us-west-2"
timeout = "30s"

[bedrock.endpoints]
runtime = "http://127.0.0.1:9000"
storage = "http://127.0.0.1:9001"

[[bedrock.keys]]
name = "primary"
region = "eu-central-1"
access_key_id = "AKID"
secret_access_key = "secret"
role_arn = "arn:aws:iam::123456789012:role/batch"
batch_output_s3_uri = "s3://results/out"
models = ["anthropic.claude-3-haiku-20240307-v1:0"]

[bedrock.keys.deployments]
haiku = "us.anthropic.claude-3-haiku-20240307-v1:0"

[[bedrock.keys]]
name = "bearer"
api_key = "bedrock-api-key"
"#;
        let config = Config::parse(raw).unwrap();

        assert_eq!(config.log.format, LogFormat::Json);
        assert_eq!(config.bedrock.timeout, Duration::from_secs(30));
        assert_eq!(
            config.bedrock.endpoints.runtime.as_ref().map(url::Url::as_str),
            Some("http://127.0.0.1:9000/")
        );

        let primary = &config.bedrock.keys[0];
        assert_eq!(primary.region_or(&config.bedrock.default_region), "eu-central-1");
        assert_eq!(primary.deployment("haiku"), "us.anthropic.claude-3-haiku-20240307-v1:0");
        assert!(primary.key_pair().is_some());

        let bearer = &config.bedrock.keys[1];
        assert_eq!(bearer.region_or(&config.bedrock.default_region), "us-west-2");
        assert!(bearer.bearer_token().is_some());
    }

    #[test]
    fn no_keys_is_rejected() {
        let err = Config::parse("[bedrock]\ndefault_region = \"us-east-1\"\n").unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"at least one [[bedrock.keys]] entry must be configured");
    }

    #[test]
    fn half_a_key_pair_is_rejected() {
        let raw = "[[bedrock.keys]]\nname = \"primary\"\naccess_key_id = \"AKID\"\n";
        let err = Config::parse(raw).unwrap_err();
        insta::assert_snapshot!(
            err.to_string(),
            @"bedrock.keys[0] (primary): access_key_id and secret_access_key must be set together"
        );
    }

    #[test]
    fn bearer_and_key_pair_are_exclusive() {
        let raw = r#"
[[bedrock.keys]]
name = "mixed"
access_key_id = "AKID"
secret_access_key = "secret"
api_key = "token"
"#;
        let err = Config::parse(raw).unwrap_err();
        assert!(err.to_string().contains("api_key cannot be combined"));
    }

    #[test]
    fn non_http_endpoint_is_rejected() {
        let raw = r#"
[bedrock.endpoints]
control = "ftp://example.com"

[[bedrock.keys]]
name = "primary"
"#;
        let err = Config::parse(raw).unwrap_err();
        assert!(err.to_string().contains("bedrock.endpoints.control"));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let raw = "[[bedrock.keys]]\nname = \"primary\"\nregionn = \"us-east-1\"\n";
        let err = Config::parse(raw).unwrap_err();
        assert!(err.to_string().contains("failed to parse config"));
    }

    #[test]
    fn load_expands_environment() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[[bedrock.keys]]\nname = \"env\"\napi_key = \"{{{{ env.BEDROCK_LOADER_TEST_KEY }}}}\""
        )
        .unwrap();

        temp_env::with_var("BEDROCK_LOADER_TEST_KEY", Some("from-env"), || {
            let config = Config::load(file.path()).unwrap();
            let token = config.bedrock.keys[0].bearer_token().unwrap();
            assert_eq!(token.expose_secret(), "from-env");
        });
    }

    #[test]
    fn missing_file_reports_path() {
        let err = Config::load(Path::new("/nonexistent/bedrock.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/bedrock.toml"));
    }
}
