//! HTTP client for the Bedrock runtime, the Bedrock control plane and S3
//!
//! Every call takes the credential set it should use; picking among keys is
//! the caller's business. Operations that look up an existing resource
//! (files, batch jobs) accept the whole ordered key set and try each key in
//! turn, returning the last error when none succeeds.

use std::future::Future;

use bytes::Bytes;
use http::header::ACCEPT;
use http::{HeaderValue, Method};
use serde::Serialize;
use serde::de::DeserializeOwned;
use synapse_config::{BedrockConfig, BedrockKey, EndpointOverrides};
use synapse_core::CallContext;
use tracing::{debug, error, warn};
use url::Url;

use crate::auth::sigv4::uri_encode;
use crate::auth::{Service, Signer};
use crate::convert::{ModelFamily, converse, image, invoke, text};
use crate::error::{BedrockError, ProviderError};
use crate::protocol::converse::ConverseResponse;
use crate::protocol::invoke::InvokeRequest;
use crate::protocol::native::TitanImageResponse;
use crate::storage::ObjectLocation;
use crate::stream::{ConverseStreamState, EventStream, TextStreamState, spawn_stream};
use crate::types::{
    CompletionRequest, CompletionResponse, ImageGenerationRequest, ImageGenerationResponse, TextCompletionRequest,
    TextCompletionResponse,
};

/// `Accept` value for streaming actions
const EVENT_STREAM: &str = "application/vnd.amazon.eventstream";

/// Reply of a native invoke body, by the dialect it was normalised to
#[derive(Debug, Clone, PartialEq)]
pub enum InvokeOutput {
    Chat(CompletionResponse),
    Text(TextCompletionResponse),
}

/// Bedrock adapter client
#[derive(Debug)]
pub struct BedrockClient {
    http: reqwest::Client,
    endpoints: EndpointOverrides,
    default_region: String,
    signer: Signer,
}

impl BedrockClient {
    /// Build a client from the `[bedrock]` config section
    pub fn new(config: &BedrockConfig) -> Result<Self, BedrockError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| BedrockError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoints: config.endpoints.clone(),
            default_region: config.default_region.clone(),
            signer: Signer::new(),
        })
    }

    /// Region a key's calls go to
    pub fn region<'a>(&'a self, key: &'a BedrockKey) -> &'a str {
        key.region_or(&self.default_region)
    }

    // -- URLs --

    /// `/model/{model}/{action}` on the runtime endpoint
    ///
    /// The model is the key's deployment for it, prefixed by the key's
    /// inference profile ARN when one is configured.
    pub(crate) fn runtime_url(&self, key: &BedrockKey, model: &str, action: &str) -> Result<Url, BedrockError> {
        let deployment = key.deployment(model);
        let model_path = match key.inference_profile_arn.as_deref().filter(|arn| !arn.is_empty()) {
            Some(arn) => uri_encode(&format!("{arn}/{deployment}")),
            None => uri_encode(deployment),
        };

        let base = base_url(self.endpoints.runtime.as_ref(), || {
            format!("https://bedrock-runtime.{}.amazonaws.com", self.region(key))
        });
        parse_url(&format!("{base}/model/{model_path}/{action}"))
    }

    /// `path` (already escaped) on the control-plane endpoint
    pub(crate) fn control_url(&self, key: &BedrockKey, path: &str) -> Result<Url, BedrockError> {
        let base = base_url(self.endpoints.control.as_ref(), || {
            format!("https://bedrock.{}.amazonaws.com", self.region(key))
        });
        parse_url(&format!("{base}/{}", path.trim_start_matches('/')))
    }

    /// Virtual-hosted object URL, or path-style under a storage override
    pub(crate) fn object_url(&self, key: &BedrockKey, location: &ObjectLocation) -> Result<Url, BedrockError> {
        let escaped = location.escaped_key();
        let raw = match &self.endpoints.storage {
            Some(base) => format!("{}/{}/{escaped}", base.as_str().trim_end_matches('/'), location.bucket),
            None => format!(
                "https://{}.s3.{}.amazonaws.com/{escaped}",
                location.bucket,
                self.region(key)
            ),
        };
        parse_url(&raw)
    }

    // -- Transport --

    /// Authorize and send, mapping non-success replies to provider errors
    pub(crate) async fn send(
        &self,
        ctx: &CallContext,
        key: &BedrockKey,
        service: Service,
        mut request: reqwest::Request,
        resource: &str,
    ) -> Result<reqwest::Response, BedrockError> {
        if let Some(interrupt) = ctx.check() {
            return Err(interrupt.into());
        }

        let region = self.region(key);
        let auth = self.signer.authorization(key, region).await?;
        self.signer.authorize(&auth, &mut request, region, service)?;

        debug!(
            key = %key.name,
            method = %request.method(),
            url = %request.url(),
            "sending bedrock request"
        );

        let response = tokio::select! {
            biased;
            interrupt = ctx.interrupted() => return Err(interrupt.into()),
            response = self.http.execute(request) => response.map_err(|e| {
                error!(key = %key.name, resource, error = %e, "bedrock request failed");
                BedrockError::transport(&e)
            })?,
        };

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let headers = response.headers().clone();
        let body = read_body(ctx, response).await.unwrap_or_default();
        let error = ProviderError::from_reply(status, &headers, &body, Some(resource.to_owned()));
        warn!(
            key = %key.name,
            status = %status,
            code = error.code.as_deref().unwrap_or_default(),
            resource,
            "bedrock returned error"
        );
        Err(BedrockError::provider(error))
    }

    /// Send and read the whole reply body
    pub(crate) async fn send_bytes(
        &self,
        ctx: &CallContext,
        key: &BedrockKey,
        service: Service,
        request: reqwest::Request,
        resource: &str,
    ) -> Result<Bytes, BedrockError> {
        let response = self.send(ctx, key, service, request, resource).await?;
        read_body(ctx, response).await
    }

    /// Send and decode a JSON reply
    pub(crate) async fn send_json<T: DeserializeOwned>(
        &self,
        ctx: &CallContext,
        key: &BedrockKey,
        service: Service,
        request: reqwest::Request,
        resource: &str,
    ) -> Result<T, BedrockError> {
        let body = self.send_bytes(ctx, key, service, request, resource).await?;
        parse_json(resource, &body)
    }

    // -- Chat --

    /// Non-streaming chat completion through Converse
    pub async fn chat(
        &self,
        ctx: &CallContext,
        key: &BedrockKey,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, BedrockError> {
        let (body, structured) = encode_chat(key, request)?;
        let structured = structured.or_else(|| ctx.structured_output_tool().map(str::to_owned));
        let url = self.runtime_url(key, &request.model, "converse")?;

        let reply: ConverseResponse = self
            .send_json(ctx, key, Service::Bedrock, post(url, body), &request.model)
            .await?;
        Ok(converse::decode(reply, &request.model, structured.as_deref()))
    }

    /// Streaming chat completion through `converse-stream`
    pub async fn chat_stream(
        &self,
        ctx: &CallContext,
        key: &BedrockKey,
        request: &CompletionRequest,
    ) -> Result<EventStream, BedrockError> {
        let (body, structured) = encode_chat(key, request)?;
        let structured = structured.or_else(|| ctx.structured_output_tool().map(str::to_owned));
        let url = self.runtime_url(key, &request.model, "converse-stream")?;

        let response = self
            .send(ctx, key, Service::Bedrock, streaming(post(url, body)), &request.model)
            .await?;
        Ok(spawn_stream(
            ctx.clone(),
            Box::pin(response.bytes_stream()),
            ConverseStreamState::new(structured),
        ))
    }

    // -- Text completion --

    /// Legacy prompt completion through `invoke`
    pub async fn text_completion(
        &self,
        ctx: &CallContext,
        key: &BedrockKey,
        request: &TextCompletionRequest,
    ) -> Result<TextCompletionResponse, BedrockError> {
        let native = with_deployment(key, request);
        let body = json_body(&text::encode(&native)?)?;
        let url = self.runtime_url(key, &request.model, "invoke")?;

        let reply = self
            .send_bytes(ctx, key, Service::Bedrock, post(url, body), &request.model)
            .await?;
        let mut response = text::decode(&native.model, &reply)?;
        response.model.clone_from(&request.model);
        Ok(response)
    }

    /// Legacy prompt completion through `invoke-with-response-stream`
    pub async fn text_completion_stream(
        &self,
        ctx: &CallContext,
        key: &BedrockKey,
        request: &TextCompletionRequest,
    ) -> Result<EventStream, BedrockError> {
        let native = with_deployment(key, request);
        let body = json_body(&text::encode(&native)?)?;
        let url = self.runtime_url(key, &request.model, "invoke-with-response-stream")?;

        let response = self
            .send(ctx, key, Service::Bedrock, streaming(post(url, body)), &request.model)
            .await?;
        Ok(spawn_stream(
            ctx.clone(),
            Box::pin(response.bytes_stream()),
            TextStreamState::new(ModelFamily::detect(&native.model)),
        ))
    }

    // -- Native invoke --

    /// Run a family-native invoke body
    ///
    /// `messages` and Cohere Command R bodies go through Converse; prompt
    /// bodies through the text completion path.
    pub async fn invoke(
        &self,
        ctx: &CallContext,
        key: &BedrockKey,
        model: &str,
        request: InvokeRequest,
    ) -> Result<InvokeOutput, BedrockError> {
        if !request.is_messages_request() && !request.is_cohere_command_r_request() {
            let text_request = invoke::to_text_request(request, model)?;
            return self
                .text_completion(ctx, key, &text_request)
                .await
                .map(InvokeOutput::Text);
        }

        let converse_request = invoke::to_converse(request)?;
        let url = self.runtime_url(key, model, "converse")?;
        let reply: ConverseResponse = self
            .send_json(ctx, key, Service::Bedrock, post(url, json_body(&converse_request)?), model)
            .await?;

        Ok(InvokeOutput::Chat(converse::decode(
            reply,
            model,
            ctx.structured_output_tool(),
        )))
    }

    // -- Images --

    /// Titan Image / Nova Canvas `TEXT_IMAGE` generation
    pub async fn generate_image(
        &self,
        ctx: &CallContext,
        key: &BedrockKey,
        request: &ImageGenerationRequest,
    ) -> Result<ImageGenerationResponse, BedrockError> {
        let body = json_body(&image::encode(request)?)?;
        let url = self.runtime_url(key, &request.model, "invoke")?;

        let reply: TitanImageResponse = self
            .send_json(ctx, key, Service::Bedrock, post(url, body), &request.model)
            .await?;
        image::decode(&request.model, reply)
    }
}

// -- Helpers --

/// Run `op` with each key in order until one succeeds
///
/// Cancellation stops the walk; otherwise the last error is returned.
pub(crate) async fn try_each_key<'k, T, F, Fut>(keys: &'k [BedrockKey], what: &str, mut op: F) -> Result<T, BedrockError>
where
    F: FnMut(&'k BedrockKey) -> Fut,
    Fut: Future<Output = Result<T, BedrockError>>,
{
    let mut last = BedrockError::Configuration("no bedrock keys configured".to_owned());

    for key in keys {
        match op(key).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_cancellation() => return Err(e),
            Err(e) => {
                debug!(key = %key.name, error = %e, "{what} failed with this key");
                last = e;
            }
        }
    }

    Err(last)
}

fn base_url(configured: Option<&Url>, default: impl FnOnce() -> String) -> String {
    configured.map_or_else(default, |url| url.as_str().trim_end_matches('/').to_owned())
}

fn parse_url(raw: &str) -> Result<Url, BedrockError> {
    Url::parse(raw).map_err(|e| BedrockError::InvalidRequest(format!("invalid url {raw}: {e}")))
}

/// Converse body with the model resolved through the key's deployments
fn encode_chat(key: &BedrockKey, request: &CompletionRequest) -> Result<(Vec<u8>, Option<String>), BedrockError> {
    let mut native = request.clone();
    key.deployment(&request.model).clone_into(&mut native.model);

    let encoded = converse::encode(&native)?;
    Ok((json_body(&encoded.request)?, encoded.structured_output_tool))
}

fn with_deployment(key: &BedrockKey, request: &TextCompletionRequest) -> TextCompletionRequest {
    let mut native = request.clone();
    key.deployment(&request.model).clone_into(&mut native.model);
    native
}

pub(crate) fn request(method: Method, url: Url, body: Option<Vec<u8>>) -> reqwest::Request {
    let mut request = reqwest::Request::new(method, url);
    if let Some(body) = body {
        *request.body_mut() = Some(body.into());
    }
    request
}

pub(crate) fn post(url: Url, body: Vec<u8>) -> reqwest::Request {
    request(Method::POST, url, Some(body))
}

fn streaming(mut request: reqwest::Request) -> reqwest::Request {
    request
        .headers_mut()
        .insert(ACCEPT, HeaderValue::from_static(EVENT_STREAM));
    request
}

pub(crate) fn json_body<T: Serialize>(value: &T) -> Result<Vec<u8>, BedrockError> {
    serde_json::to_vec(value).map_err(|e| BedrockError::Internal(anyhow::anyhow!("failed to encode request body: {e}")))
}

pub(crate) fn parse_json<T: DeserializeOwned>(what: &str, body: &[u8]) -> Result<T, BedrockError> {
    serde_json::from_slice(body).map_err(|e| BedrockError::decode(what, e))
}

pub(crate) async fn read_body(ctx: &CallContext, response: reqwest::Response) -> Result<Bytes, BedrockError> {
    tokio::select! {
        biased;
        interrupt = ctx.interrupted() => Err(interrupt.into()),
        body = response.bytes() => body.map_err(|e| BedrockError::transport(&e)),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures_util::StreamExt;
    use secrecy::SecretString;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::eventstream;
    use crate::types::{ExtraParams, FinishReason, Message, StreamEvent, TextPrompt};

    fn key() -> BedrockKey {
        BedrockKey {
            name: "primary".to_owned(),
            access_key_id: Some(SecretString::from("AKIDEXAMPLE")),
            secret_access_key: Some(SecretString::from("secret")),
            ..BedrockKey::default()
        }
    }

    fn client(server: &MockServer) -> BedrockClient {
        let base: Url = server.uri().parse().unwrap();
        BedrockClient::new(&BedrockConfig {
            endpoints: EndpointOverrides {
                runtime: Some(base.clone()),
                control: Some(base.clone()),
                storage: Some(base),
            },
            ..BedrockConfig::default()
        })
        .unwrap()
    }

    fn converse_reply() -> serde_json::Value {
        json!({
            "output": {"message": {"role": "assistant", "content": [{"text": "Hello!"}]}},
            "stopReason": "end_turn",
            "usage": {"inputTokens": 7, "outputTokens": 2, "totalTokens": 9}
        })
    }

    #[test]
    fn runtime_url_uses_deployment_and_profile() {
        let mut key = key();
        key.region = Some("eu-west-1".to_owned());
        key.deployments
            .insert("claude".to_owned(), "anthropic.claude-3-haiku-20240307-v1:0".to_owned());

        let client = BedrockClient::new(&BedrockConfig::default()).unwrap();
        assert_eq!(
            client.runtime_url(&key, "claude", "converse").unwrap().as_str(),
            "https://bedrock-runtime.eu-west-1.amazonaws.com/model/anthropic.claude-3-haiku-20240307-v1%3A0/converse"
        );

        key.inference_profile_arn = Some("arn:aws:bedrock:eu-west-1:123:application-inference-profile/p1".to_owned());
        let url = client.runtime_url(&key, "claude", "invoke").unwrap();
        assert!(url.path().starts_with("/model/arn%3Aaws%3Abedrock%3Aeu-west-1%3A123%3Aapplication-inference-profile%2Fp1%2Fanthropic."));
        assert!(url.path().ends_with("/invoke"));
    }

    #[test]
    fn object_url_is_virtual_hosted_by_default() {
        let client = BedrockClient::new(&BedrockConfig::default()).unwrap();
        let location = ObjectLocation::parse("s3://my-bucket/in put/a.jsonl").unwrap();

        assert_eq!(
            client.object_url(&key(), &location).unwrap().as_str(),
            "https://my-bucket.s3.us-east-1.amazonaws.com/in%20put/a.jsonl"
        );
    }

    #[tokio::test]
    async fn chat_is_signed_and_decoded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/model/anthropic.claude-3-haiku-20240307-v1%3A0/converse"))
            .and(header_exists("x-amz-date"))
            .and(header_exists("x-amz-content-sha256"))
            .respond_with(ResponseTemplate::new(200).set_body_json(converse_reply()))
            .expect(1)
            .mount(&server)
            .await;

        let request = CompletionRequest::new("anthropic.claude-3-haiku-20240307-v1:0", vec![Message::user("Hi")]);
        let response = client(&server)
            .chat(&CallContext::new(), &key(), &request)
            .await
            .unwrap();

        assert_eq!(response.choices[0].message.text_content(), Some("Hello!"));
        assert_eq!(response.choices[0].finish_reason, Some(FinishReason::Stop));
        assert_eq!(response.usage.unwrap().total_tokens, 9);
    }

    #[tokio::test]
    async fn bearer_keys_skip_signing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer br-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(converse_reply()))
            .expect(1)
            .mount(&server)
            .await;

        let key = BedrockKey {
            name: "bearer".to_owned(),
            api_key: Some(SecretString::from("br-key")),
            ..BedrockKey::default()
        };
        let request = CompletionRequest::new("amazon.nova-lite-v1:0", vec![Message::user("Hi")]);
        client(&server).chat(&CallContext::new(), &key, &request).await.unwrap();
    }

    #[tokio::test]
    async fn provider_errors_are_structured() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("x-amzn-errortype", "ThrottlingException:http://internal.amazon.com/")
                    .insert_header("x-amzn-requestid", "req-9")
                    .set_body_json(json!({"message": "Too many requests, please wait."})),
            )
            .mount(&server)
            .await;

        let request = CompletionRequest::new("amazon.nova-lite-v1:0", vec![Message::user("Hi")]);
        let err = client(&server)
            .chat(&CallContext::new(), &key(), &request)
            .await
            .unwrap_err();

        let BedrockError::Provider(provider) = &err else { panic!("expected provider error, got {err}") };
        assert_eq!(provider.status, 429);
        assert_eq!(provider.code.as_deref(), Some("ThrottlingException"));
        assert_eq!(provider.request_id.as_deref(), Some("req-9"));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn deadline_interrupts_a_slow_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(converse_reply())
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let ctx = CallContext::new().with_timeout(Duration::from_millis(50));
        let request = CompletionRequest::new("amazon.nova-lite-v1:0", vec![Message::user("Hi")]);
        let err = client(&server).chat(&ctx, &key(), &request).await.unwrap_err();

        assert!(matches!(err, BedrockError::Timeout));
    }

    #[tokio::test]
    async fn chat_stream_decodes_frames() {
        let mut body = Vec::new();
        for (event, payload) in [
            ("messageStart", json!({"role": "assistant"})),
            ("contentBlockDelta", json!({"contentBlockIndex": 0, "delta": {"text": "Hi"}})),
            ("messageStop", json!({"stopReason": "end_turn"})),
            ("metadata", json!({"usage": {"inputTokens": 3, "outputTokens": 1, "totalTokens": 4}})),
        ] {
            body.extend_from_slice(&eventstream::event(event, payload.to_string().as_bytes()));
        }

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/model/amazon.nova-lite-v1%3A0/converse-stream"))
            .and(header("accept", EVENT_STREAM))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, EVENT_STREAM))
            .mount(&server)
            .await;

        let request = CompletionRequest::new("amazon.nova-lite-v1:0", vec![Message::user("Hi")]);
        let events: Vec<_> = client(&server)
            .chat_stream(&CallContext::new(), &key(), &request)
            .await
            .unwrap()
            .map(Result::unwrap)
            .collect()
            .await;

        assert_eq!(events.len(), 3);
        assert!(matches!(
            &events[2],
            StreamEvent::Done {
                finish_reason: Some(FinishReason::Stop),
                usage: Some(usage),
            } if usage.total_tokens == 4
        ));
    }

    #[tokio::test]
    async fn text_completion_keeps_the_requested_model() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/model/meta.llama3-8b-instruct-v1%3A0/invoke"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "generation": "Paris",
                "stop_reason": "stop",
                "prompt_token_count": 5,
                "generation_token_count": 1
            })))
            .mount(&server)
            .await;

        let mut key = key();
        key.deployments
            .insert("llama".to_owned(), "meta.llama3-8b-instruct-v1:0".to_owned());

        let request = TextCompletionRequest {
            model: "llama".to_owned(),
            prompt: TextPrompt::Single("Capital of France?".to_owned()),
            max_tokens: Some(8),
            temperature: None,
            top_p: None,
            stop: None,
            stream: false,
            extra_params: crate::types::ExtraParams::new(),
        };
        let response = client(&server)
            .text_completion(&CallContext::new(), &key, &request)
            .await
            .unwrap();

        assert_eq!(response.model, "llama");
        assert_eq!(response.choices[0].text, "Paris");
        assert_eq!(response.usage.unwrap().total_tokens, 6);
    }

    #[tokio::test]
    async fn image_generation_invokes_a_text_image_task() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/model/amazon.nova-canvas-v1%3A0/invoke"))
            .and(body_partial_json(json!({
                "taskType": "TEXT_IMAGE",
                "textToImageParams": {"text": "a lighthouse at dusk"},
                "imageGenerationConfig": {"numberOfImages": 2, "width": 1024, "height": 768, "quality": "premium"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"images": ["aW1nMQ==", "aW1nMg=="]})))
            .expect(1)
            .mount(&server)
            .await;

        let request = ImageGenerationRequest {
            model: "amazon.nova-canvas-v1:0".to_owned(),
            prompt: "a lighthouse at dusk".to_owned(),
            n: Some(2),
            size: Some("1024x768".to_owned()),
            quality: Some("high".to_owned()),
            style: None,
            seed: None,
            negative_prompt: None,
            extra_params: ExtraParams::default(),
        };
        let response = client(&server)
            .generate_image(&CallContext::new(), &key(), &request)
            .await
            .unwrap();

        assert_eq!(response.data.len(), 2);
        assert_eq!(response.data[1].index, 1);
        assert_eq!(response.data[1].b64_json, "aW1nMg==");
    }

    #[tokio::test]
    async fn malformed_image_size_fails_before_sending() {
        let server = MockServer::start().await;
        let request = ImageGenerationRequest {
            model: "amazon.titan-image-generator-v2:0".to_owned(),
            prompt: "a lighthouse".to_owned(),
            n: None,
            size: Some("abcx768".to_owned()),
            quality: None,
            style: None,
            seed: None,
            negative_prompt: None,
            extra_params: ExtraParams::default(),
        };

        let err = client(&server)
            .generate_image(&CallContext::new(), &key(), &request)
            .await
            .unwrap_err();

        assert!(matches!(err, BedrockError::InvalidRequest(_)));
        assert!(server.received_requests().await.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn try_each_key_returns_last_error() {
        let keys = [
            BedrockKey {
                name: "a".to_owned(),
                ..BedrockKey::default()
            },
            BedrockKey {
                name: "b".to_owned(),
                ..BedrockKey::default()
            },
        ];

        let err = try_each_key(&keys, "lookup", |key| async move {
            Err::<(), _>(BedrockError::InvalidRequest(key.name.clone()))
        })
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "invalid request: b");

        let found = try_each_key(&keys, "lookup", |key| async move {
            if key.name == "b" {
                Ok(key.name.clone())
            } else {
                Err(BedrockError::Network("down".to_owned()))
            }
        })
        .await
        .unwrap();
        assert_eq!(found, "b");
    }
}
