use std::fmt;

use http::{HeaderMap, StatusCode};
use serde_json::Value;
use synapse_core::{HttpError, Interrupt};
use thiserror::Error;

use crate::eventstream::FrameError;
use crate::storage::xml;

const REQUEST_ID_HEADERS: [&str; 2] = ["x-amzn-requestid", "x-amz-request-id"];
const ERROR_TYPE_HEADER: &str = "x-amzn-errortype";

/// Errors raised by the Bedrock adapter
#[derive(Debug, Error)]
pub enum BedrockError {
    /// Missing credential fields or required parameters
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Caller sent something the target model family cannot express
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The caller's cancellation token fired
    #[error("request cancelled")]
    Cancelled,

    /// The caller's deadline (or the client timeout) expired
    #[error("request timed out")]
    Timeout,

    /// Could not reach the endpoint at all
    #[error("network error: {0}")]
    Network(String),

    /// Connection broke after the request was sent
    #[error("transport error: {0}")]
    Transport(String),

    /// Bedrock or S3 answered with a non-success status
    #[error("{0}")]
    Provider(Box<ProviderError>),

    /// Malformed JSON or XML in a reply
    #[error("decode error: {0}")]
    Decode(String),

    /// The event stream carried an exception frame
    #[error("bedrock stream {exception}: {message}")]
    Stream {
        /// Exception type from the frame headers
        exception: String,
        /// Best-effort message from the frame payload
        message: String,
    },

    /// The binary event stream could not be framed
    #[error("event stream framing error: {0}")]
    Frame(#[from] FrameError),

    /// A pagination cursor failed to decode or verify
    #[error("invalid pagination cursor: {0}")]
    InvalidCursor(String),

    /// Unexpected internal error
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Structured form of a non-success reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    /// HTTP status returned by the service
    pub status: u16,
    /// Human readable message, parsed from the body when possible
    pub message: String,
    /// Service error code such as `ValidationException` or `NoSuchKey`
    pub code: Option<String>,
    /// Value of the request id header or body field
    pub request_id: Option<String>,
    /// Bucket/key or model the call targeted
    pub resource: Option<String>,
    /// Unparsed reply body
    pub raw: Option<String>,
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bedrock returned {}", self.status)?;

        if let Some(code) = &self.code {
            write!(f, " {code}")?;
        }

        write!(f, ": {}", self.message)?;

        if let Some(resource) = &self.resource {
            write!(f, " ({resource})")?;
        }

        if let Some(request_id) = &self.request_id {
            write!(f, " [request id {request_id}]")?;
        }

        Ok(())
    }
}

impl ProviderError {
    /// Best-effort parse of a non-success reply
    ///
    /// Bedrock answers `{"message": …}` with the code in `x-amzn-errortype`;
    /// S3 answers `<Error><Code/><Message/><RequestId/></Error>`. Anything
    /// else keeps the raw text as the message.
    pub fn from_reply(status: StatusCode, headers: &HeaderMap, body: &[u8], resource: Option<String>) -> Self {
        let raw = String::from_utf8_lossy(body).trim().to_owned();

        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.is_empty())
                .map(str::to_owned)
        };

        let mut code = header(ERROR_TYPE_HEADER).map(|t| t.split(':').next().unwrap_or_default().to_owned());
        let mut request_id = REQUEST_ID_HEADERS.iter().find_map(|name| header(name));
        let mut message = None;

        if let Ok(json) = serde_json::from_slice::<Value>(body) {
            let field = |names: &[&str]| {
                names
                    .iter()
                    .find_map(|name| json.get(*name).and_then(Value::as_str))
                    .map(str::to_owned)
            };
            message = field(&["message", "Message"]);
            code = code.or_else(|| {
                field(&["__type", "code", "Code"]).map(|t| t.rsplit('#').next().unwrap_or_default().to_owned())
            });
            request_id = request_id.or_else(|| field(&["requestId", "RequestId"]));
        } else if raw.contains("<Error>") {
            message = xml::tag(&raw, "Message");
            code = code.or_else(|| xml::tag(&raw, "Code"));
            request_id = request_id.or_else(|| xml::tag(&raw, "RequestId"));
        }

        let message = message
            .filter(|m| !m.is_empty())
            .or_else(|| Some(raw.clone()).filter(|r| !r.is_empty()))
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_owned());

        Self {
            status: status.as_u16(),
            message,
            code: code.filter(|c| !c.is_empty()),
            request_id,
            resource,
            raw: Some(raw).filter(|r| !r.is_empty()),
        }
    }
}

impl BedrockError {
    /// Whether the error came from the caller's cancellation or deadline
    pub const fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Timeout)
    }

    /// Whether another credential or a later attempt may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::Network(_) | Self::Transport(_) => true,
            Self::Provider(err) => err.status == 429 || err.status >= 500,
            _ => false,
        }
    }

    /// HTTP status of a provider reply, if this is one
    pub fn provider_status(&self) -> Option<u16> {
        match self {
            Self::Provider(err) => Some(err.status),
            _ => None,
        }
    }

    pub(crate) fn provider(error: ProviderError) -> Self {
        Self::Provider(Box::new(error))
    }

    pub(crate) fn decode(what: &str, err: impl fmt::Display) -> Self {
        Self::Decode(format!("{what}: {err}"))
    }

    /// Timeout before connect before anything else
    pub(crate) fn transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Network(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<Interrupt> for BedrockError {
    fn from(interrupt: Interrupt) -> Self {
        match interrupt {
            Interrupt::Cancelled => Self::Cancelled,
            Interrupt::DeadlineExceeded => Self::Timeout,
        }
    }
}

impl HttpError for BedrockError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::InvalidCursor(_) => StatusCode::BAD_REQUEST,
            // nginx's "client closed request"
            Self::Cancelled => StatusCode::from_u16(499).unwrap_or(StatusCode::BAD_REQUEST),
            Self::Timeout => StatusCode::GATEWAY_TIMEOUT,
            Self::Network(_) | Self::Transport(_) | Self::Decode(_) | Self::Stream { .. } | Self::Frame(_) => {
                StatusCode::BAD_GATEWAY
            }
            Self::Provider(err) => match StatusCode::from_u16(err.status) {
                Ok(status) if status.is_client_error() => status,
                _ => StatusCode::BAD_GATEWAY,
            },
            Self::Configuration(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_type(&self) -> &str {
        match self {
            Self::Configuration(_) => "configuration_error",
            Self::InvalidRequest(_) | Self::InvalidCursor(_) => "invalid_request_error",
            Self::Cancelled => "cancelled",
            Self::Timeout => "timeout_error",
            Self::Network(_) | Self::Transport(_) => "network_error",
            Self::Provider(err) if err.status == 429 => "rate_limit_error",
            Self::Provider(_) => "provider_error",
            Self::Decode(_) | Self::Frame(_) => "decode_error",
            Self::Stream { .. } => "stream_error",
            Self::Internal(_) => "internal_error",
        }
    }

    fn client_message(&self) -> String {
        match self {
            Self::Internal(_) | Self::Configuration(_) => "an internal error occurred".to_owned(),
            Self::Provider(err) => err.message.clone(),
            other => other.to_string(),
        }
    }
}
