//! Event-stream bodies to unified stream events
//!
//! Each streaming call gets one tokio task that owns the HTTP body, the
//! frame decoder and the per-call [`FrameMapper`]. Events are sent over a
//! bounded channel in frame-arrival order; the task holds the only sender,
//! so the channel closes exactly once when it returns.

use std::pin::Pin;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use indexmap::IndexMap;
use serde_json::Value;
use synapse_core::CallContext;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::convert::ModelFamily;
use crate::convert::converse::usage;
use crate::convert::text::decode_stream_chunk;
use crate::error::BedrockError;
use crate::eventstream::{FrameDecoder, Message};
use crate::protocol::converse::{ConverseStreamEvent, TokenUsage};
use crate::protocol::native::InvokeStreamChunk;
use crate::types::{
    FinishReason, ReasoningDetail, ReasoningKind, StreamDelta, StreamEvent, StreamFunctionCall, StreamToolCall, Usage,
};

/// Unified stream handed back to callers
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, BedrockError>> + Send>>;

const CHANNEL_CAPACITY: usize = 32;

/// Translates event frames of one call into unified events
pub trait FrameMapper: Send + 'static {
    /// Handle one normal event frame
    fn map(&mut self, message: &Message, out: &mut Vec<StreamEvent>) -> Result<(), BedrockError>;

    /// Final aggregate emitted at graceful end of body
    fn finish(&mut self) -> StreamEvent;
}

/// Token counts merged by element-wise maximum
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageAggregate {
    tokens: Option<TokenUsage>,
}

fn max_opt(a: Option<u32>, b: Option<u32>) -> Option<u32> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

impl UsageAggregate {
    pub fn merge(&mut self, other: TokenUsage) {
        let merged = match self.tokens {
            None => other,
            Some(current) => TokenUsage {
                input_tokens: current.input_tokens.max(other.input_tokens),
                output_tokens: current.output_tokens.max(other.output_tokens),
                total_tokens: current.total_tokens.max(other.total_tokens),
                cache_read_input_tokens: max_opt(current.cache_read_input_tokens, other.cache_read_input_tokens),
                cache_write_input_tokens: max_opt(current.cache_write_input_tokens, other.cache_write_input_tokens),
            },
        };
        self.tokens = Some(merged);
    }

    pub fn usage(&self) -> Option<Usage> {
        self.tokens.map(usage)
    }
}

/// What a content block of the current message carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Text,
    Reasoning,
    ToolUse,
    /// Tool call against the structured-output tool, surfaced as text
    StructuredOutput,
}

/// Per-call state for `converse-stream`
#[derive(Debug, Default)]
pub struct ConverseStreamState {
    role_sent: bool,
    structured_output_tool: Option<String>,
    blocks: IndexMap<u32, BlockKind>,
    /// Tool input received so far, per block
    arguments: IndexMap<u32, String>,
    reasoning_index: u32,
    finish_reason: Option<FinishReason>,
    usage: UsageAggregate,
}

impl ConverseStreamState {
    pub fn new(structured_output_tool: Option<String>) -> Self {
        Self {
            structured_output_tool,
            ..Self::default()
        }
    }

    pub fn block_kind(&self, index: u32) -> Option<BlockKind> {
        self.blocks.get(&index).copied()
    }

    /// Tool input accumulated for a block
    pub fn tool_arguments(&self, index: u32) -> Option<&str> {
        self.arguments.get(&index).map(String::as_str)
    }

    fn role(&mut self, role: &str, out: &mut Vec<StreamEvent>) {
        if !self.role_sent {
            self.role_sent = true;
            out.push(StreamEvent::Delta(StreamDelta::role(role)));
        }
    }

    fn reasoning(&mut self, index: u32, text: Option<String>, signature: Option<String>) -> Option<StreamDelta> {
        let text = text.filter(|t| !t.is_empty());
        let signature = signature.filter(|s| !s.is_empty());
        if text.is_none() && signature.is_none() {
            return None;
        }

        let detail = ReasoningDetail {
            index: self.reasoning_index,
            kind: ReasoningKind::Text,
            text: text.clone(),
            signature,
        };
        self.reasoning_index += 1;

        Some(StreamDelta {
            index,
            reasoning: text,
            reasoning_details: Some(vec![detail]),
            ..StreamDelta::default()
        })
    }

    /// Translate one decoded frame payload
    pub fn apply(&mut self, event: ConverseStreamEvent, out: &mut Vec<StreamEvent>) {
        if let Some(role) = &event.role {
            self.role(role, out);
        }

        let block = event.content_block_index.unwrap_or_default();

        if let Some(tool) = event.start.and_then(|start| start.tool_use) {
            if self.structured_output_tool.as_deref() == Some(tool.name.as_str()) {
                self.blocks.insert(block, BlockKind::StructuredOutput);
            } else {
                self.blocks.insert(block, BlockKind::ToolUse);
                out.push(StreamEvent::Delta(
                    StreamDelta::tool_call(StreamToolCall {
                        index: block,
                        id: Some(tool.tool_use_id),
                        function: Some(StreamFunctionCall {
                            name: Some(tool.name),
                            arguments: None,
                        }),
                    })
                    .at(block),
                ));
            }
            self.arguments.insert(block, String::new());
        }

        if let Some(delta) = event.delta {
            if let Some(text) = delta.text.filter(|t| !t.is_empty()) {
                self.blocks.entry(block).or_insert(BlockKind::Text);
                out.push(StreamEvent::Delta(StreamDelta::text(text).at(block)));
            }

            if let Some(tool) = delta.tool_use.filter(|t| !t.input.is_empty()) {
                self.arguments.entry(block).or_default().push_str(&tool.input);
                let kind = *self.blocks.entry(block).or_insert(BlockKind::ToolUse);
                let delta = if kind == BlockKind::StructuredOutput {
                    StreamDelta::text(tool.input)
                } else {
                    StreamDelta::tool_call(StreamToolCall {
                        index: block,
                        id: None,
                        function: Some(StreamFunctionCall {
                            name: None,
                            arguments: Some(tool.input),
                        }),
                    })
                };
                out.push(StreamEvent::Delta(delta.at(block)));
            }

            if let Some(reasoning) = delta.reasoning_content {
                self.blocks.entry(block).or_insert(BlockKind::Reasoning);
                if let Some(delta) = self.reasoning(block, reasoning.text, reasoning.signature) {
                    out.push(StreamEvent::Delta(delta));
                }
            }
        }

        if let Some(reason) = event.stop_reason {
            let mut finish = FinishReason::from_native(&reason);
            if finish == FinishReason::ToolCalls && self.structured_output_tool.is_some() {
                finish = FinishReason::Stop;
            }
            self.finish_reason = Some(finish);
        }

        if let Some(tokens) = event.usage {
            self.usage.merge(tokens);
        }
    }

    /// Close a content block
    ///
    /// A tool call that never received input is completed with `{}` so the
    /// assembled arguments are always valid JSON.
    pub fn stop_block(&mut self, index: u32, out: &mut Vec<StreamEvent>) {
        if self.block_kind(index) != Some(BlockKind::ToolUse) {
            return;
        }
        let arguments = self.arguments.entry(index).or_default();
        if arguments.is_empty() {
            arguments.push_str("{}");
            out.push(StreamEvent::Delta(
                StreamDelta::tool_call(StreamToolCall {
                    index,
                    id: None,
                    function: Some(StreamFunctionCall {
                        name: None,
                        arguments: Some("{}".to_owned()),
                    }),
                })
                .at(index),
            ));
        }
        debug!(block = index, bytes = arguments.len(), "tool call block complete");
    }
}

impl FrameMapper for ConverseStreamState {
    fn map(&mut self, message: &Message, out: &mut Vec<StreamEvent>) -> Result<(), BedrockError> {
        if message.payload.is_empty() {
            return Ok(());
        }
        let event: ConverseStreamEvent = serde_json::from_slice(&message.payload)
            .map_err(|e| BedrockError::decode("converse stream event", e))?;
        let block = event.content_block_index;
        self.apply(event, out);

        if message.event_type() == Some("contentBlockStop")
            && let Some(block) = block
        {
            self.stop_block(block, out);
        }
        Ok(())
    }

    fn finish(&mut self) -> StreamEvent {
        StreamEvent::Done {
            finish_reason: self.finish_reason,
            usage: self.usage.usage(),
        }
    }
}

/// Per-call state for `invoke-with-response-stream` on text families
#[derive(Debug)]
pub struct TextStreamState {
    family: ModelFamily,
    role_sent: bool,
    finish_reason: Option<FinishReason>,
    usage: Option<Usage>,
}

impl TextStreamState {
    pub const fn new(family: ModelFamily) -> Self {
        Self {
            family,
            role_sent: false,
            finish_reason: None,
            usage: None,
        }
    }
}

impl FrameMapper for TextStreamState {
    fn map(&mut self, message: &Message, out: &mut Vec<StreamEvent>) -> Result<(), BedrockError> {
        let wrapper: InvokeStreamChunk = serde_json::from_slice(&message.payload)
            .map_err(|e| BedrockError::decode("invoke stream chunk", e))?;
        let payload = STANDARD
            .decode(wrapper.bytes.as_bytes())
            .map_err(|e| BedrockError::decode("invoke stream chunk bytes", e))?;

        let chunk = decode_stream_chunk(self.family, &payload)?;

        if !self.role_sent {
            self.role_sent = true;
            out.push(StreamEvent::Delta(StreamDelta::role("assistant")));
        }
        if let Some(text) = chunk.text {
            out.push(StreamEvent::Delta(StreamDelta::text(text)));
        }
        if chunk.finish_reason.is_some() {
            self.finish_reason = chunk.finish_reason;
        }
        if chunk.usage.is_some() {
            self.usage = chunk.usage;
        }
        Ok(())
    }

    fn finish(&mut self) -> StreamEvent {
        StreamEvent::Done {
            finish_reason: self.finish_reason,
            usage: self.usage.clone(),
        }
    }
}

/// Error carried by an exception frame
pub fn exception_error(message: &Message) -> BedrockError {
    let exception = message
        .exception_type()
        .or_else(|| message.message_type())
        .unwrap_or("unknown")
        .to_owned();

    let parsed = serde_json::from_slice::<Value>(&message.payload).ok().and_then(|body| {
        body.get("message")
            .or_else(|| body.get("Message"))
            .and_then(Value::as_str)
            .map(str::to_owned)
    });
    let text = parsed.unwrap_or_else(|| String::from_utf8_lossy(&message.payload).into_owned());

    BedrockError::Stream {
        exception,
        message: text,
    }
}

/// Drive `body` on its own task and expose the mapped events
pub fn spawn_stream<B, M>(ctx: CallContext, body: B, mapper: M) -> EventStream
where
    B: Stream<Item = Result<Bytes, reqwest::Error>> + Send + Unpin + 'static,
    M: FrameMapper,
{
    let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);

    tokio::spawn(async move {
        if let Err(e) = drive(&ctx, body, mapper, &sender).await {
            debug!(error = %e, "bedrock stream ended with error");
            let _ = sender.send(Err(e)).await;
        }
    });

    Box::pin(futures_util::stream::unfold(receiver, |mut receiver| async move {
        receiver.recv().await.map(|item| (item, receiver))
    }))
}

type Sender = mpsc::Sender<Result<StreamEvent, BedrockError>>;

async fn drive<B, M>(ctx: &CallContext, mut body: B, mut mapper: M, sender: &Sender) -> Result<(), BedrockError>
where
    B: Stream<Item = Result<Bytes, reqwest::Error>> + Send + Unpin,
    M: FrameMapper,
{
    let mut decoder = FrameDecoder::new();
    let mut pending = Vec::new();

    loop {
        if let Some(interrupt) = ctx.check() {
            return Err(interrupt.into());
        }

        if let Some(message) = decoder.next_frame()? {
            if !message.is_event() {
                return Err(exception_error(&message));
            }

            mapper.map(&message, &mut pending)?;
            for event in pending.drain(..) {
                if sender.send(Ok(event)).await.is_err() {
                    debug!("stream receiver dropped");
                    return Ok(());
                }
            }
            continue;
        }

        let chunk = tokio::select! {
            biased;
            interrupt = ctx.interrupted() => return Err(interrupt.into()),
            chunk = body.next() => chunk,
        };

        match chunk {
            Some(Ok(bytes)) => decoder.push(&bytes),
            Some(Err(e)) => {
                warn!(error = %e, "bedrock stream body failed");
                return Err(BedrockError::transport(&e));
            }
            None => {
                decoder.finish()?;
                let _ = sender.send(Ok(mapper.finish())).await;
                return Ok(());
            }
        }
    }
}
