//! Mock Bedrock runtime, control plane and S3 behind one wiremock server

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value, json};
use synapse_bedrock::{BedrockClient, eventstream};
use synapse_config::Config;
use wiremock::{Mock, MockServer, Request};

/// `Content-Type` of streamed replies
pub const EVENT_STREAM: &str = "application/vnd.amazon.eventstream";

/// Mock backend every endpoint override points at
pub struct MockBedrock {
    server: MockServer,
}

impl MockBedrock {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    pub async fn mount(&self, mock: Mock) {
        mock.mount(&self.server).await;
    }

    /// Requests received so far, in arrival order
    pub async fn requests(&self) -> Vec<Request> {
        self.server.received_requests().await.unwrap_or_default()
    }

    /// Requests whose path starts with `prefix`
    pub async fn requests_to(&self, prefix: &str) -> Vec<Request> {
        self.requests()
            .await
            .into_iter()
            .filter(|r| r.url.path().starts_with(prefix))
            .collect()
    }
}

pub fn client(config: &Config) -> BedrockClient {
    BedrockClient::new(&config.bedrock).expect("client builds")
}

/// Non-streaming Converse reply with one text block
pub fn converse_text(text: &str) -> Value {
    json!({
        "output": {"message": {"role": "assistant", "content": [{"text": text}]}},
        "stopReason": "end_turn",
        "usage": {"inputTokens": 12, "outputTokens": 3, "totalTokens": 15}
    })
}

/// Event-stream body from `(event type, payload)` pairs
pub fn frames(events: &[(&str, Value)]) -> Vec<u8> {
    events
        .iter()
        .flat_map(|(event, payload)| eventstream::event(event, payload.to_string().as_bytes()))
        .collect()
}

/// `chunk` event wrapping a family-native JSON payload, as invoke streams send it
pub fn invoke_chunk(payload: &Value) -> (&'static str, Value) {
    ("chunk", json!({"bytes": STANDARD.encode(payload.to_string())}))
}

/// Authorization header of a received request
pub fn authorization(request: &Request) -> String {
    request
        .headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_owned()
}
