//! Native invoke bodies -> Converse or text completion
//!
//! Callers that speak a family's own `InvokeModel` dialect are normalised
//! here so the rest of the adapter only deals with Converse and the unified
//! text request.

use serde_json::{Value, json};

use crate::error::BedrockError;
use crate::protocol::converse::{
    BlockSource, ContentBlock, ConverseMessage, ConverseRequest, ConverseTool, ConverseToolChoice, Empty, ImageBlock,
    InferenceConfig, ReasoningContentBlock, ReasoningText, SpecificTool, SystemContentBlock, ToolConfig,
    ToolInputSchema, ToolResultBlock, ToolResultContent, ToolSpec, ToolUseBlock,
};
use crate::protocol::invoke::{
    AnthropicBlock, AnthropicTool, InvokeContentBlock, InvokeMessage, InvokeRequest, SystemBlock, SystemPrompt,
};
use crate::types::{ExtraParams, TextCompletionRequest, TextPrompt};

/// Converse body for a chat-style invoke request
///
/// Accepts `messages` bodies and Cohere Command R `message` + history
/// bodies; anything else has no conversation to send.
pub fn to_converse(request: InvokeRequest) -> Result<ConverseRequest, BedrockError> {
    let messages = if request.is_messages_request() {
        request.messages.iter().cloned().map(converse_message).collect()
    } else if request.is_cohere_command_r_request() {
        cohere_command_r_messages(&request)
    } else {
        return Err(BedrockError::InvalidRequest(
            "invoke request has no messages to send through converse".to_owned(),
        ));
    };

    let inference_config = match &request.inference_config {
        Some(config) => Some(config.clone()),
        None => {
            let config = InferenceConfig {
                max_tokens: request
                    .max_tokens
                    .or(request.max_tokens_to_sample)
                    .or(request.max_gen_len),
                temperature: request.temperature,
                top_p: request.top_p.or(request.p),
                stop_sequences: request
                    .stop_sequences
                    .clone()
                    .filter(|s| !s.is_empty())
                    .or_else(|| request.stop.clone().filter(|s| !s.is_empty())),
            };
            (!config.is_empty()).then_some(config)
        }
    };

    let tool_config = match &request.tool_config {
        Some(config) => Some(config.clone()),
        None => request
            .tools
            .as_deref()
            .and_then(|tools| anthropic_tool_config(tools, request.tool_choice.as_ref())),
    };

    let additional = additional_fields(&request);

    Ok(ConverseRequest {
        messages,
        system: system_blocks(request.system),
        inference_config,
        tool_config,
        additional_model_request_fields: (!additional.is_empty()).then_some(additional),
        ..ConverseRequest::default()
    })
}

/// Family fields Converse has no slot for, in a fixed order, then the
/// caller's own additional fields and finally unrecognised top-level fields
fn additional_fields(request: &InvokeRequest) -> ExtraParams {
    let mut fields = ExtraParams::new();

    if let Some(top_k) = request.top_k.or(request.k) {
        fields.insert("top_k".to_owned(), json!(top_k));
    }
    if let Some(thinking) = &request.thinking {
        fields.insert("thinking".to_owned(), thinking.clone());
    }
    if let Some(output_config) = &request.output_config {
        fields.insert("output_config".to_owned(), output_config.clone());
    }
    if let Some(n) = request.n {
        fields.insert("n".to_owned(), json!(n));
    }
    if let Some(penalty) = request.frequency_penalty {
        fields.insert("frequency_penalty".to_owned(), json!(penalty));
    }
    if let Some(penalty) = request.presence_penalty {
        fields.insert("presence_penalty".to_owned(), json!(penalty));
    }
    if let Some(beta) = &request.anthropic_beta {
        fields.insert("anthropic_beta".to_owned(), beta.clone());
    }

    for (key, value) in request.additional_model_request_fields.iter().flatten() {
        fields.insert(key.clone(), value.clone());
    }

    for (key, value) in &request.extra {
        fields.insert(key.clone(), value.clone());
    }

    fields
}

/// Unified text request for a prompt-style invoke body
pub fn to_text_request(request: InvokeRequest, model: &str) -> Result<TextCompletionRequest, BedrockError> {
    let prompt = match request.prompt.as_deref() {
        Some(prompt) if !prompt.is_empty() => prompt.to_owned(),
        _ if request.is_cohere_command_r_request() => cohere_command_r_prompt(&request),
        _ => {
            return Err(BedrockError::InvalidRequest(
                "invoke request has neither prompt nor message".to_owned(),
            ));
        }
    };

    let mut extra_params = request.extra;
    if let Some(top_k) = request.top_k.or(request.k) {
        extra_params.insert("top_k".to_owned(), json!(top_k));
    }

    Ok(TextCompletionRequest {
        model: model.to_owned(),
        prompt: TextPrompt::Single(prompt),
        max_tokens: request
            .max_tokens
            .or(request.max_tokens_to_sample)
            .or(request.max_gen_len),
        temperature: request.temperature,
        top_p: request.top_p.or(request.p),
        stop: request
            .stop_sequences
            .filter(|s| !s.is_empty())
            .or_else(|| request.stop.filter(|s| !s.is_empty())),
        stream: request.stream.unwrap_or_default(),
        extra_params,
    })
}

/// Rolling `User:` / `Assistant:` transcript ending with the current turn
pub fn cohere_command_r_prompt(request: &InvokeRequest) -> String {
    let mut prompt = String::new();

    for entry in request.chat_history.iter().flatten() {
        if entry.role.eq_ignore_ascii_case("user") {
            prompt.push_str("User: ");
        } else {
            prompt.push_str("Assistant: ");
        }
        prompt.push_str(&entry.message);
        prompt.push('\n');
    }

    prompt.push_str("User: ");
    prompt.push_str(request.message.as_deref().unwrap_or_default());
    prompt
}

fn cohere_command_r_messages(request: &InvokeRequest) -> Vec<ConverseMessage> {
    let mut messages: Vec<ConverseMessage> = request
        .chat_history
        .iter()
        .flatten()
        .map(|entry| ConverseMessage {
            role: if entry.role.eq_ignore_ascii_case("user") { "user" } else { "assistant" }.to_owned(),
            content: vec![ContentBlock::Text(entry.message.clone())],
        })
        .collect();

    messages.push(ConverseMessage {
        role: "user".to_owned(),
        content: vec![ContentBlock::Text(request.message.clone().unwrap_or_default())],
    });

    messages
}

/// Canonical system blocks for the polymorphic `system` field
///
/// An empty string yields no block.
pub fn system_blocks(system: Option<SystemPrompt>) -> Vec<SystemContentBlock> {
    match system {
        None => Vec::new(),
        Some(SystemPrompt::Text(text)) if text.is_empty() => Vec::new(),
        Some(SystemPrompt::Text(text)) => vec![SystemContentBlock::Text(text)],
        Some(SystemPrompt::Blocks(blocks)) => blocks
            .into_iter()
            .filter_map(|block| match block {
                SystemBlock::Typed { kind, text } if kind == "text" && !text.is_empty() => {
                    Some(SystemContentBlock::Text(text))
                }
                SystemBlock::Typed { .. } => None,
                SystemBlock::Converse(block) => Some(block),
            })
            .collect(),
    }
}

fn converse_message(message: InvokeMessage) -> ConverseMessage {
    ConverseMessage {
        role: message.role,
        content: message
            .content
            .into_blocks()
            .into_iter()
            .filter_map(converse_block)
            .collect(),
    }
}

fn converse_block(block: InvokeContentBlock) -> Option<ContentBlock> {
    match block {
        InvokeContentBlock::Converse(block) => Some(block),
        InvokeContentBlock::Text { text } | InvokeContentBlock::Anthropic(AnthropicBlock::Text { text }) => {
            Some(ContentBlock::Text(text))
        }
        InvokeContentBlock::Anthropic(AnthropicBlock::Image { source }) => {
            let format = source
                .media_type
                .strip_prefix("image/")
                .filter(|f| matches!(*f, "png" | "gif" | "webp"))
                .unwrap_or("jpeg");

            Some(ContentBlock::Image(ImageBlock {
                format: format.to_owned(),
                source: BlockSource {
                    bytes: Some(source.data),
                    text: None,
                },
            }))
        }
        InvokeContentBlock::Anthropic(AnthropicBlock::ToolUse { id, name, input }) => {
            Some(ContentBlock::ToolUse(ToolUseBlock {
                tool_use_id: id,
                name,
                input,
            }))
        }
        InvokeContentBlock::Anthropic(AnthropicBlock::ToolResult {
            tool_use_id,
            content,
            is_error,
        }) => Some(ContentBlock::ToolResult(ToolResultBlock {
            tool_use_id,
            content: tool_result_content(content),
            status: Some(if is_error.unwrap_or_default() { "error" } else { "success" }.to_owned()),
        })),
        InvokeContentBlock::Anthropic(AnthropicBlock::Thinking { thinking, signature }) => {
            Some(ContentBlock::ReasoningContent(ReasoningContentBlock {
                reasoning_text: Some(ReasoningText {
                    text: thinking,
                    signature,
                }),
                redacted_content: None,
            }))
        }
    }
}

fn tool_result_content(content: Option<Value>) -> Vec<ToolResultContent> {
    match content {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::String(text)) => vec![ToolResultContent::Text(text)],
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|item| match item.get("text").and_then(Value::as_str) {
                Some(text) if item.get("type").and_then(Value::as_str) == Some("text") => {
                    ToolResultContent::Text(text.to_owned())
                }
                _ => ToolResultContent::Json(item),
            })
            .collect(),
        Some(other) => vec![ToolResultContent::Json(other)],
    }
}

fn anthropic_tool_config(tools: &[AnthropicTool], tool_choice: Option<&Value>) -> Option<ToolConfig> {
    if tools.is_empty() {
        return None;
    }

    let tools = tools
        .iter()
        .map(|tool| {
            ConverseTool::ToolSpec(ToolSpec {
                name: tool.name.clone(),
                description: tool.description.clone(),
                input_schema: ToolInputSchema {
                    json: tool.input_schema.clone().unwrap_or_else(|| json!({})),
                },
            })
        })
        .collect();

    Some(ToolConfig {
        tools,
        tool_choice: tool_choice.and_then(anthropic_tool_choice),
    })
}

/// `{"type": "auto" | "any" | "tool", "name": ...}`
///
/// Unrecognised shapes yield no choice rather than an error.
pub fn anthropic_tool_choice(choice: &Value) -> Option<ConverseToolChoice> {
    match choice.get("type").and_then(Value::as_str)? {
        "auto" => Some(ConverseToolChoice::Auto(Empty {})),
        "any" => Some(ConverseToolChoice::Any(Empty {})),
        "tool" => choice.get("name").and_then(Value::as_str).map(|name| {
            ConverseToolChoice::Tool(SpecificTool {
                name: name.to_owned(),
            })
        }),
        _ => None,
    }
}
