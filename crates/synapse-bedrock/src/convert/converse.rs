//! Unified chat <-> Converse
//!
//! Converse is the common chat surface for every Bedrock chat family, so
//! this is the encoder used for all chat completions regardless of
//! [`ModelFamily`]. The family only decides family-specific extras such as
//! the Anthropic thinking budget.

use indexmap::IndexMap;
use serde_json::{Value, json};

use super::document;
use super::family::ModelFamily;
use crate::error::BedrockError;
use crate::protocol::converse::{
    BlockSource, ContentBlock, ConverseMessage, ConverseRequest, ConverseResponse, ConverseTool, ConverseToolChoice,
    Empty, ImageBlock, InferenceConfig, ReasoningContentBlock, ReasoningText, ServiceTier, SpecificTool,
    SystemContentBlock, TokenUsage, ToolConfig, ToolInputSchema, ToolResultBlock, ToolResultContent, ToolSpec,
    ToolUseBlock,
};
use crate::types::{
    Choice, ChoiceMessage, CompletionParams, CompletionRequest, CompletionResponse, Content, ContentPart, ExtraParams,
    FinishReason, FunctionCall, Message, ReasoningDetail, ReasoningKind, ResponseFormat, Role, TokenDetails, ToolCall,
    ToolChoice, ToolChoiceMode, Usage,
};

/// Prefix of the synthetic tool that carries `json_schema` output
pub const STRUCTURED_OUTPUT_PREFIX: &str = "bf_so_";

/// Smallest thinking budget Anthropic accepts
pub const MIN_REASONING_BUDGET: u32 = 1024;

const DEFAULT_REASONING_MAX_TOKENS: u32 = 4096;
const DEFAULT_TOOL_DESCRIPTION: &str = "Function tool";
const HISTORY_TOOL_DESCRIPTION: &str = "Tool extracted from conversation history";
const STRUCTURED_OUTPUT_DESCRIPTION: &str = "Returns structured JSON output";

/// A Converse body plus the structured-output tool it registered
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedConverse {
    pub request: ConverseRequest,
    /// Register this on the call context so the reply is intercepted
    pub structured_output_tool: Option<String>,
}

// -- Encoding --

/// Build a Converse body from a unified chat request
pub fn encode(request: &CompletionRequest) -> Result<EncodedConverse, BedrockError> {
    if request.messages.is_empty() {
        return Err(BedrockError::InvalidRequest("at least one message is required".to_owned()));
    }

    let family = ModelFamily::detect(&request.model);
    let (messages, system) = encode_messages(&request.messages)?;

    let mut converse = ConverseRequest {
        messages,
        system,
        inference_config: inference_config(&request.params),
        tool_config: tool_config(request),
        ..ConverseRequest::default()
    };

    apply_reasoning(&mut converse, &request.params, family)?;

    let structured_output_tool = structured_output_tool(&request.params);
    if let Some(spec) = &structured_output_tool {
        let name = spec.name.clone();
        let config = converse.tool_config.get_or_insert_with(|| ToolConfig {
            tools: Vec::new(),
            tool_choice: None,
        });
        config.tools.insert(0, ConverseTool::ToolSpec(spec.clone()));
        config.tool_choice = Some(ConverseToolChoice::Tool(SpecificTool { name }));
    }

    if let Some(tier) = &request.params.service_tier {
        converse.service_tier = Some(ServiceTier { kind: tier.clone() });
    }

    apply_extra_params(&mut converse, &request.extra_params)?;
    backfill_history_tools(&mut converse, &request.messages);

    Ok(EncodedConverse {
        request: converse,
        structured_output_tool: structured_output_tool.map(|spec| spec.name),
    })
}

fn encode_messages(messages: &[Message]) -> Result<(Vec<ConverseMessage>, Vec<SystemContentBlock>), BedrockError> {
    let mut out: Vec<ConverseMessage> = Vec::with_capacity(messages.len());
    let mut system = Vec::new();

    for message in messages {
        match message.role {
            Role::System => {
                let text = system_text(&message.content);
                if !text.is_empty() {
                    system.push(SystemContentBlock::Text(text));
                }
            }
            Role::User | Role::Assistant => {
                let mut content = Vec::new();

                if message.role == Role::Assistant {
                    content.extend(reasoning_blocks(message));
                }

                content.extend(content_blocks(&message.content)?);

                if let Some(calls) = &message.tool_calls {
                    content.extend(calls.iter().map(tool_use_block));
                }

                if content.is_empty() {
                    continue;
                }

                let role = if message.role == Role::User { "user" } else { "assistant" };
                out.push(ConverseMessage {
                    role: role.to_owned(),
                    content,
                });
            }
            Role::Tool => {
                let block = tool_result_block(message)?;

                // Consecutive results answer one assistant turn
                match out.last_mut() {
                    Some(last)
                        if last.role == "user"
                            && last.content.iter().all(|b| matches!(b, ContentBlock::ToolResult(_))) =>
                    {
                        last.content.push(block);
                    }
                    _ => out.push(ConverseMessage {
                        role: "user".to_owned(),
                        content: vec![block],
                    }),
                }
            }
        }
    }

    Ok((out, system))
}

fn system_text(content: &Content) -> String {
    match content {
        Content::Text(text) => text.clone(),
        Content::Parts(parts) => parts
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

fn content_blocks(content: &Content) -> Result<Vec<ContentBlock>, BedrockError> {
    match content {
        Content::Text(text) if text.is_empty() => Ok(Vec::new()),
        Content::Text(text) => Ok(vec![ContentBlock::Text(text.clone())]),
        Content::Parts(parts) => parts
            .iter()
            .filter(|part| !matches!(part, ContentPart::Text { text } if text.is_empty()))
            .map(content_block)
            .collect(),
    }
}

fn content_block(part: &ContentPart) -> Result<ContentBlock, BedrockError> {
    match part {
        ContentPart::Text { text } => Ok(ContentBlock::Text(text.clone())),
        ContentPart::Image { url, .. } => image_block(url).map(ContentBlock::Image),
        ContentPart::File {
            file_data,
            filename,
            file_type,
        } => document::from_file_part(file_data.as_deref(), filename.as_deref(), file_type.as_deref())
            .map(ContentBlock::Document),
    }
}

/// Image block from a `data:` URI
///
/// Bedrock cannot fetch remote images.
fn image_block(url: &str) -> Result<ImageBlock, BedrockError> {
    let Some((header, payload)) = url.trim().strip_prefix("data:").and_then(|rest| rest.split_once(',')) else {
        return Err(BedrockError::InvalidRequest(
            "only base64-encoded images (data URI format) are supported; remote image URLs are not allowed".to_owned(),
        ));
    };

    let media_type = header.strip_suffix(";base64").unwrap_or(header);
    let format = match media_type {
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "jpeg",
    };

    Ok(ImageBlock {
        format: format.to_owned(),
        source: BlockSource {
            bytes: Some(payload.to_owned()),
            text: None,
        },
    })
}

fn reasoning_blocks(message: &Message) -> impl Iterator<Item = ContentBlock> + '_ {
    message
        .reasoning_details
        .iter()
        .flatten()
        .filter_map(|detail| {
            let text = detail.text.clone()?;
            Some(ContentBlock::ReasoningContent(ReasoningContentBlock {
                reasoning_text: Some(ReasoningText {
                    text,
                    signature: detail.signature.clone(),
                }),
                redacted_content: None,
            }))
        })
}

fn tool_use_block(call: &ToolCall) -> ContentBlock {
    let input = serde_json::from_str(&call.function.arguments).unwrap_or_else(|_| json!({}));

    ContentBlock::ToolUse(ToolUseBlock {
        tool_use_id: call.id.clone(),
        name: call.function.name.clone(),
        input,
    })
}

fn tool_result_block(message: &Message) -> Result<ContentBlock, BedrockError> {
    let tool_use_id = message
        .tool_call_id
        .clone()
        .ok_or_else(|| BedrockError::InvalidRequest("tool message missing tool_call_id".to_owned()))?;

    let content = match &message.content {
        Content::Text(text) => match serde_json::from_str::<Value>(text) {
            Ok(parsed) => vec![ToolResultContent::Json(parsed)],
            Err(_) => vec![ToolResultContent::Text(text.clone())],
        },
        Content::Parts(parts) => {
            let mut content = Vec::with_capacity(parts.len());
            for part in parts {
                match content_block(part)? {
                    ContentBlock::Text(text) => content.push(ToolResultContent::Text(text)),
                    ContentBlock::Image(image) => content.push(ToolResultContent::Image(image)),
                    ContentBlock::Document(doc) => content.push(ToolResultContent::Document(doc)),
                    _ => {}
                }
            }
            content
        }
    };

    Ok(ContentBlock::ToolResult(ToolResultBlock {
        tool_use_id,
        content,
        status: Some("success".to_owned()),
    }))
}

fn inference_config(params: &CompletionParams) -> Option<InferenceConfig> {
    let config = InferenceConfig {
        max_tokens: params.max_tokens,
        temperature: params.temperature,
        top_p: params.top_p,
        stop_sequences: params.stop.clone(),
    };

    (!config.is_empty()).then_some(config)
}

fn empty_object_schema() -> Value {
    json!({"type": "object", "properties": {}})
}

fn tool_config(request: &CompletionRequest) -> Option<ToolConfig> {
    let tools = request.tools.as_deref().filter(|tools| !tools.is_empty())?;

    let tools = tools
        .iter()
        .map(|tool| {
            ConverseTool::ToolSpec(ToolSpec {
                name: tool.function.name.clone(),
                description: Some(
                    tool.function
                        .description
                        .clone()
                        .unwrap_or_else(|| DEFAULT_TOOL_DESCRIPTION.to_owned()),
                ),
                input_schema: ToolInputSchema {
                    json: tool.function.parameters.clone().unwrap_or_else(empty_object_schema),
                },
            })
        })
        .collect();

    Some(ToolConfig {
        tools,
        tool_choice: request.tool_choice.as_ref().and_then(tool_choice),
    })
}

fn tool_choice(choice: &ToolChoice) -> Option<ConverseToolChoice> {
    match choice {
        ToolChoice::Mode(ToolChoiceMode::Auto) => Some(ConverseToolChoice::Auto(Empty {})),
        ToolChoice::Mode(ToolChoiceMode::Required) => Some(ConverseToolChoice::Any(Empty {})),
        ToolChoice::Mode(ToolChoiceMode::None) => None,
        ToolChoice::Function(function) if function.function.name.is_empty() => None,
        ToolChoice::Function(function) => Some(ConverseToolChoice::Tool(SpecificTool {
            name: function.function.name.clone(),
        })),
    }
}

/// Thinking budget for an effort level
///
/// Never below [`MIN_REASONING_BUDGET`].
pub fn reasoning_budget(effort: &str, max_tokens: u32) -> u32 {
    let budget = match effort {
        "minimal" | "low" => max_tokens / 5,
        "high" => max_tokens.saturating_mul(4) / 5,
        _ => max_tokens / 2,
    };

    budget.max(MIN_REASONING_BUDGET)
}

fn apply_reasoning(
    converse: &mut ConverseRequest,
    params: &CompletionParams,
    family: ModelFamily,
) -> Result<(), BedrockError> {
    let Some(reasoning) = &params.reasoning else {
        return Ok(());
    };

    if family != ModelFamily::Anthropic {
        return Ok(());
    }

    let config = if let Some(budget) = reasoning.max_tokens {
        if budget < MIN_REASONING_BUDGET {
            return Err(BedrockError::InvalidRequest(format!(
                "reasoning.max_tokens must be at least {MIN_REASONING_BUDGET} for anthropic models"
            )));
        }

        json!({"type": "enabled", "budget_tokens": budget})
    } else if let Some(effort) = reasoning.effort.as_deref().filter(|effort| *effort != "none") {
        let inference = converse.inference_config.get_or_insert_with(InferenceConfig::default);
        let max_tokens = *inference.max_tokens.get_or_insert(DEFAULT_REASONING_MAX_TOKENS);

        json!({"type": "enabled", "budget_tokens": reasoning_budget(effort, max_tokens)})
    } else {
        json!({"type": "disabled"})
    };

    converse
        .additional_fields_mut()
        .insert("reasoning_config".to_owned(), config);

    Ok(())
}

fn structured_output_tool(params: &CompletionParams) -> Option<ToolSpec> {
    let Some(ResponseFormat::JsonSchema { json_schema }) = &params.response_format else {
        return None;
    };

    let schema = json_schema.schema.clone().filter(Value::is_object)?;

    let name = json_schema
        .name
        .as_deref()
        .filter(|name| !name.is_empty())
        .unwrap_or("json_response");

    let description = schema
        .get("description")
        .and_then(Value::as_str)
        .filter(|d| !d.is_empty())
        .or(json_schema.description.as_deref())
        .unwrap_or(STRUCTURED_OUTPUT_DESCRIPTION)
        .to_owned();

    Some(ToolSpec {
        name: format!("{STRUCTURED_OUTPUT_PREFIX}{name}"),
        description: Some(description),
        input_schema: ToolInputSchema { json: schema },
    })
}

fn apply_extra_params(converse: &mut ConverseRequest, extra: &ExtraParams) -> Result<(), BedrockError> {
    for (key, value) in extra {
        match key.as_str() {
            "guardrailConfig" => converse.guardrail_config = Some(value.clone()),
            "additionalModelRequestFieldPaths" => {
                let Value::Object(fields) = value else {
                    return Err(invalid_extra(key, "an object"));
                };
                let bag = converse.additional_fields_mut();
                for (field, field_value) in fields {
                    bag.insert(field.clone(), field_value.clone());
                }
            }
            "additionalModelResponseFieldPaths" => {
                converse.additional_model_response_field_paths =
                    Some(serde_json::from_value(value.clone()).map_err(|_| invalid_extra(key, "a list of strings"))?);
            }
            "performanceConfig" => converse.performance_config = Some(value.clone()),
            "promptVariables" => converse.prompt_variables = Some(value.clone()),
            "requestMetadata" => {
                converse.request_metadata = Some(
                    serde_json::from_value::<IndexMap<String, String>>(value.clone())
                        .map_err(|_| invalid_extra(key, "a map of strings"))?,
                );
            }
            "serviceTier" => {
                let kind = match value {
                    Value::String(kind) => kind.clone(),
                    other => other
                        .get("type")
                        .and_then(Value::as_str)
                        .ok_or_else(|| invalid_extra(key, "a string or {\"type\": ...}"))?
                        .to_owned(),
                };
                converse.service_tier = Some(ServiceTier { kind });
            }
            _ => {
                converse.additional_fields_mut().insert(key.clone(), value.clone());
            }
        }
    }

    Ok(())
}

fn invalid_extra(key: &str, expected: &str) -> BedrockError {
    BedrockError::InvalidRequest(format!("extra_params.{key} must be {expected}"))
}

/// Converse rejects tool history without a tool config, so declare
/// placeholder tools for every tool name the history mentions
fn backfill_history_tools(converse: &mut ConverseRequest, messages: &[Message]) {
    let mut has_tool_content = false;
    let mut names: Vec<&str> = Vec::new();

    for message in messages {
        if message.tool_call_id.is_some() {
            has_tool_content = true;
        }

        for call in message.tool_calls.iter().flatten() {
            has_tool_content = true;
            if !names.contains(&call.function.name.as_str()) {
                names.push(&call.function.name);
            }
        }
    }

    if !has_tool_content || names.is_empty() {
        return;
    }

    let config = converse.tool_config.get_or_insert_with(|| ToolConfig {
        tools: Vec::new(),
        tool_choice: None,
    });

    for name in names {
        let declared = config
            .tools
            .iter()
            .any(|tool| matches!(tool, ConverseTool::ToolSpec(spec) if spec.name == name));

        if !declared {
            config.tools.push(ConverseTool::ToolSpec(ToolSpec {
                name: name.to_owned(),
                description: Some(HISTORY_TOOL_DESCRIPTION.to_owned()),
                input_schema: ToolInputSchema {
                    json: empty_object_schema(),
                },
            }));
        }
    }
}

// -- Decoding --

/// Unified response for a Converse reply
///
/// `structured_output_tool` is the name registered by [`encode`]; a call to
/// it becomes the scalar content instead of a tool call.
pub fn decode(response: ConverseResponse, model: &str, structured_output_tool: Option<&str>) -> CompletionResponse {
    let blocks = response.output.message.map(|m| m.content).unwrap_or_default();

    let mut parts = Vec::new();
    let mut tool_calls = Vec::new();
    let mut reasoning_details = Vec::new();
    let mut reasoning_texts = Vec::new();
    let mut structured = None;

    for block in blocks {
        match block {
            ContentBlock::Text(text) if !text.is_empty() => parts.push(ContentPart::Text { text }),
            ContentBlock::ToolUse(tool_use) if structured_output_tool == Some(tool_use.name.as_str()) => {
                structured = Some(structured_content(tool_use.input));
            }
            ContentBlock::ToolUse(tool_use) => tool_calls.push(ToolCall {
                id: tool_use.tool_use_id,
                function: FunctionCall {
                    name: tool_use.name,
                    arguments: arguments_json(&tool_use.input),
                },
            }),
            ContentBlock::ReasoningContent(ReasoningContentBlock {
                reasoning_text: Some(reasoning),
                ..
            }) => {
                reasoning_details.push(ReasoningDetail {
                    index: u32::try_from(reasoning_details.len()).unwrap_or(u32::MAX),
                    kind: ReasoningKind::Text,
                    text: Some(reasoning.text.clone()),
                    signature: reasoning.signature,
                });
                reasoning_texts.push(reasoning.text);
            }
            ContentBlock::Document(doc) => parts.push(document::to_file_part(doc)),
            _ => {}
        }
    }

    let content = match structured {
        Some(text) => Some(Content::Text(text)),
        None => collapse_parts(parts),
    };

    let mut finish_reason = FinishReason::from_native(&response.stop_reason);
    if structured_output_tool.is_some() && finish_reason == FinishReason::ToolCalls {
        finish_reason = FinishReason::Stop;
    }

    let message = ChoiceMessage {
        role: "assistant".to_owned(),
        content,
        tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
        reasoning: (!reasoning_texts.is_empty()).then(|| reasoning_texts.join("\n")),
        reasoning_details: (!reasoning_details.is_empty()).then_some(reasoning_details),
    };

    CompletionResponse {
        id: uuid::Uuid::new_v4().to_string(),
        object: "chat.completion".to_owned(),
        created: super::unix_now(),
        model: model.to_owned(),
        choices: vec![Choice {
            index: 0,
            message,
            finish_reason: Some(finish_reason),
        }],
        usage: response.usage.map(usage),
        service_tier: response.service_tier.map(|tier| tier.kind),
    }
}

/// Exactly one text part collapses to scalar content
fn collapse_parts(mut parts: Vec<ContentPart>) -> Option<Content> {
    if parts.len() == 1
        && let Some(ContentPart::Text { text }) = parts.pop_if(|part| matches!(part, ContentPart::Text { .. }))
    {
        return Some(Content::Text(text));
    }

    (!parts.is_empty()).then_some(Content::Parts(parts))
}

fn structured_content(input: Value) -> String {
    match input {
        Value::String(raw) => raw,
        other => other.to_string(),
    }
}

/// Tool arguments as a JSON string, `{}` when absent
pub(crate) fn arguments_json(input: &Value) -> String {
    match input {
        Value::Null => "{}".to_owned(),
        other => other.to_string(),
    }
}

/// Unified usage for Converse token counts
///
/// Cache details only appear when the provider reported a non-zero count.
pub(crate) fn usage(tokens: TokenUsage) -> Usage {
    let total = if tokens.total_tokens == 0 {
        tokens.input_tokens.saturating_add(tokens.output_tokens)
    } else {
        tokens.total_tokens
    };

    Usage {
        prompt_tokens: tokens.input_tokens,
        completion_tokens: tokens.output_tokens,
        total_tokens: total,
        prompt_tokens_details: tokens
            .cache_read_input_tokens
            .filter(|n| *n > 0)
            .map(|cached_tokens| TokenDetails { cached_tokens }),
        completion_tokens_details: tokens
            .cache_write_input_tokens
            .filter(|n| *n > 0)
            .map(|cached_tokens| TokenDetails { cached_tokens }),
    }
}

impl From<ChoiceMessage> for Message {
    fn from(choice: ChoiceMessage) -> Self {
        Self {
            role: Role::Assistant,
            content: choice.content.unwrap_or_default(),
            name: None,
            tool_calls: choice.tool_calls,
            tool_call_id: None,
            reasoning_details: choice.reasoning_details,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::converse::{ConverseOutput, DocumentBlock};
    use crate::types::{JsonSchemaFormat, ReasoningParams, ToolDefinition};

    const CLAUDE: &str = "anthropic.claude-3-7-sonnet-20250219-v1:0";

    fn reply(content: Vec<ContentBlock>, stop_reason: &str) -> ConverseResponse {
        ConverseResponse {
            output: ConverseOutput {
                message: Some(ConverseMessage {
                    role: "assistant".to_owned(),
                    content,
                }),
            },
            stop_reason: stop_reason.to_owned(),
            usage: Some(TokenUsage {
                input_tokens: 12,
                output_tokens: 3,
                total_tokens: 15,
                cache_read_input_tokens: Some(0),
                cache_write_input_tokens: None,
            }),
            metrics: None,
            additional_model_response_fields: None,
            service_tier: None,
        }
    }

    #[test]
    fn system_messages_become_system_blocks() {
        let request = CompletionRequest::new(
            CLAUDE,
            vec![
                Message::system("be brief"),
                Message::system(""),
                Message {
                    content: Content::Parts(vec![
                        ContentPart::Text { text: "a".to_owned() },
                        ContentPart::Text { text: "b".to_owned() },
                    ]),
                    ..Message::system("")
                },
                Message::user("hi"),
            ],
        );

        let encoded = encode(&request).unwrap().request;
        assert_eq!(
            encoded.system,
            vec![
                SystemContentBlock::Text("be brief".to_owned()),
                SystemContentBlock::Text("a\nb".to_owned()),
            ]
        );
        assert_eq!(encoded.messages.len(), 1);
    }

    #[test]
    fn empty_messages_are_rejected() {
        let request = CompletionRequest::new(CLAUDE, Vec::new());
        assert!(matches!(encode(&request), Err(BedrockError::InvalidRequest(_))));
    }

    #[test]
    fn tool_round_trip_history() {
        let mut assistant = Message::assistant("");
        assistant.tool_calls = Some(vec![
            ToolCall {
                id: "t1".to_owned(),
                function: FunctionCall {
                    name: "weather".to_owned(),
                    arguments: r#"{"city":"Oslo"}"#.to_owned(),
                },
            },
            ToolCall {
                id: "t2".to_owned(),
                function: FunctionCall {
                    name: "time".to_owned(),
                    arguments: "not json".to_owned(),
                },
            },
        ]);

        let request = CompletionRequest::new(
            CLAUDE,
            vec![
                Message::user("weather and time?"),
                assistant,
                Message::tool("t1", r#"{"temp":3}"#),
                Message::tool("t2", "noon"),
            ],
        );

        let encoded = encode(&request).unwrap().request;
        let body = serde_json::to_value(&encoded).unwrap();

        assert_eq!(
            body["messages"][1]["content"][1],
            json!({"toolUse": {"toolUseId": "t2", "name": "time", "input": {}}})
        );
        assert_eq!(encoded.messages.len(), 3, "tool results share one user turn");
        assert_eq!(
            body["messages"][2]["content"],
            json!([
                {"toolResult": {"toolUseId": "t1", "content": [{"json": {"temp": 3}}], "status": "success"}},
                {"toolResult": {"toolUseId": "t2", "content": [{"text": "noon"}], "status": "success"}}
            ])
        );

        // no tools were declared, so the history is backfilled
        assert_eq!(
            body["toolConfig"]["tools"][0],
            json!({"toolSpec": {
                "name": "weather",
                "description": "Tool extracted from conversation history",
                "inputSchema": {"json": {"type": "object", "properties": {}}}
            }})
        );
        assert_eq!(body["toolConfig"]["tools"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn tool_message_requires_call_id() {
        let mut tool = Message::tool("x", "done");
        tool.tool_call_id = None;
        let request = CompletionRequest::new(CLAUDE, vec![Message::user("hi"), tool]);

        let err = encode(&request).unwrap_err();
        assert!(err.to_string().contains("tool_call_id"), "{err}");
    }

    #[test]
    fn remote_images_are_rejected() {
        let message = Message {
            content: Content::Parts(vec![ContentPart::Image {
                url: "https://example.com/cat.png".to_owned(),
                detail: None,
            }]),
            ..Message::user("")
        };

        let err = encode(&CompletionRequest::new(CLAUDE, vec![message])).unwrap_err();
        assert!(err.to_string().contains("data URI"), "{err}");
    }

    #[test]
    fn data_uri_images_carry_their_format() {
        let block = image_block("data:image/webp;base64,UklGRg==").unwrap();
        assert_eq!(block.format, "webp");
        assert_eq!(block.source.bytes.as_deref(), Some("UklGRg=="));
        assert_eq!(image_block("data:image/jpg;base64,AA==").unwrap().format, "jpeg");
    }

    #[test]
    fn tools_and_choice_are_mapped() {
        let mut request = CompletionRequest::new(CLAUDE, vec![Message::user("hi")]);
        request.tools = Some(vec![ToolDefinition::function("lookup", None, None)]);
        request.tool_choice = Some(ToolChoice::Mode(ToolChoiceMode::Required));

        let body = serde_json::to_value(encode(&request).unwrap().request).unwrap();
        assert_eq!(
            body["toolConfig"],
            json!({
                "tools": [{"toolSpec": {
                    "name": "lookup",
                    "description": "Function tool",
                    "inputSchema": {"json": {"type": "object", "properties": {}}}
                }}],
                "toolChoice": {"any": {}}
            })
        );

        request.tool_choice = Some(ToolChoice::Mode(ToolChoiceMode::None));
        let encoded = encode(&request).unwrap().request;
        assert!(encoded.tool_config.unwrap().tool_choice.is_none());
    }

    #[test]
    fn inference_params_map_to_inference_config() {
        let mut request = CompletionRequest::new(CLAUDE, vec![Message::user("hi")]);
        request.params.max_tokens = Some(256);
        request.params.temperature = Some(0.2);
        request.params.stop = Some(vec!["END".to_owned()]);

        let body = serde_json::to_value(encode(&request).unwrap().request).unwrap();
        assert_eq!(
            body["inferenceConfig"],
            json!({"maxTokens": 256, "temperature": 0.2, "stopSequences": ["END"]})
        );
    }

    #[test]
    fn reasoning_budget_below_minimum_is_rejected() {
        let mut request = CompletionRequest::new(CLAUDE, vec![Message::user("hi")]);
        request.params.reasoning = Some(ReasoningParams {
            effort: None,
            max_tokens: Some(512),
        });

        assert!(matches!(encode(&request), Err(BedrockError::InvalidRequest(_))));
    }

    #[test]
    fn reasoning_effort_sets_budget_and_default_max_tokens() {
        let mut request = CompletionRequest::new(CLAUDE, vec![Message::user("hi")]);
        request.params.reasoning = Some(ReasoningParams {
            effort: Some("high".to_owned()),
            max_tokens: None,
        });

        let encoded = encode(&request).unwrap().request;
        assert_eq!(encoded.inference_config.unwrap().max_tokens, Some(4096));
        assert_eq!(
            encoded.additional_model_request_fields.unwrap()["reasoning_config"],
            json!({"type": "enabled", "budget_tokens": 3276})
        );
    }

    #[test]
    fn reasoning_effort_none_disables_thinking() {
        let mut request = CompletionRequest::new(CLAUDE, vec![Message::user("hi")]);
        request.params.reasoning = Some(ReasoningParams {
            effort: Some("none".to_owned()),
            max_tokens: None,
        });

        let encoded = encode(&request).unwrap().request;
        assert_eq!(
            encoded.additional_model_request_fields.unwrap()["reasoning_config"],
            json!({"type": "disabled"})
        );
    }

    #[test]
    fn low_effort_budget_is_clamped() {
        assert_eq!(reasoning_budget("low", 4096), MIN_REASONING_BUDGET);
        assert_eq!(reasoning_budget("medium", 8000), 4000);
    }

    #[test]
    fn json_schema_registers_forced_tool() {
        let mut request = CompletionRequest::new(CLAUDE, vec![Message::user("who?")]);
        request.tools = Some(vec![ToolDefinition::function("lookup", None, None)]);
        request.params.response_format = Some(ResponseFormat::JsonSchema {
            json_schema: JsonSchemaFormat {
                name: Some("person".to_owned()),
                schema: Some(json!({"type": "object", "description": "A person"})),
                ..JsonSchemaFormat::default()
            },
        });

        let encoded = encode(&request).unwrap();
        assert_eq!(encoded.structured_output_tool.as_deref(), Some("bf_so_person"));

        let body = serde_json::to_value(encoded.request).unwrap();
        assert_eq!(body["toolConfig"]["tools"][0]["toolSpec"]["name"], "bf_so_person");
        assert_eq!(body["toolConfig"]["tools"][0]["toolSpec"]["description"], "A person");
        assert_eq!(body["toolConfig"]["tools"][1]["toolSpec"]["name"], "lookup");
        assert_eq!(body["toolConfig"]["toolChoice"], json!({"tool": {"name": "bf_so_person"}}));
    }

    #[test]
    fn extra_params_are_routed() {
        let mut request = CompletionRequest::new(CLAUDE, vec![Message::user("hi")]);
        request.extra_params.insert("top_k".to_owned(), json!(40));
        request
            .extra_params
            .insert("guardrailConfig".to_owned(), json!({"guardrailIdentifier": "g1"}));
        request.extra_params.insert("serviceTier".to_owned(), json!("priority"));
        request
            .extra_params
            .insert("requestMetadata".to_owned(), json!({"team": "search"}));

        let body = serde_json::to_value(encode(&request).unwrap().request).unwrap();
        assert_eq!(body["additionalModelRequestFields"], json!({"top_k": 40}));
        assert_eq!(body["guardrailConfig"]["guardrailIdentifier"], "g1");
        assert_eq!(body["serviceTier"], json!({"type": "priority"}));
        assert_eq!(body["requestMetadata"], json!({"team": "search"}));
    }

    #[test]
    fn single_text_block_collapses_and_round_trips() {
        let response = decode(reply(vec![ContentBlock::Text("hello".to_owned())], "end_turn"), CLAUDE, None);

        let choice = &response.choices[0];
        assert_eq!(choice.message.text_content(), Some("hello"));
        assert_eq!(choice.finish_reason, Some(FinishReason::Stop));

        let usage = response.usage.as_ref().unwrap();
        assert_eq!(usage.total_tokens, 15);
        assert!(usage.prompt_tokens_details.is_none(), "zero cache reads are omitted");

        let request = CompletionRequest::new(
            CLAUDE,
            vec![Message::user("hi"), Message::from(choice.message.clone())],
        );
        let encoded = encode(&request).unwrap().request;
        assert_eq!(encoded.messages[1].content, vec![ContentBlock::Text("hello".to_owned())]);
    }

    #[test]
    fn mixed_blocks_are_kept_as_parts() {
        let response = decode(
            reply(
                vec![
                    ContentBlock::ReasoningContent(ReasoningContentBlock {
                        reasoning_text: Some(ReasoningText {
                            text: "step one".to_owned(),
                            signature: Some("sig".to_owned()),
                        }),
                        redacted_content: None,
                    }),
                    ContentBlock::Text("a".to_owned()),
                    ContentBlock::Document(DocumentBlock {
                        format: "txt".to_owned(),
                        name: "notes".to_owned(),
                        source: BlockSource {
                            bytes: None,
                            text: Some("n".to_owned()),
                        },
                    }),
                    ContentBlock::ToolUse(ToolUseBlock {
                        tool_use_id: "t1".to_owned(),
                        name: "lookup".to_owned(),
                        input: Value::Null,
                    }),
                ],
                "tool_use",
            ),
            CLAUDE,
            None,
        );

        let choice = &response.choices[0];
        let Some(Content::Parts(parts)) = &choice.message.content else {
            panic!("expected parts");
        };
        assert_eq!(parts.len(), 2);
        assert_eq!(choice.message.reasoning.as_deref(), Some("step one"));

        let details = choice.message.reasoning_details.as_ref().unwrap();
        assert_eq!(details[0].index, 0);
        assert_eq!(details[0].signature.as_deref(), Some("sig"));

        let calls = choice.message.tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].function.arguments, "{}");
        assert_eq!(choice.finish_reason, Some(FinishReason::ToolCalls));
    }

    #[test]
    fn structured_output_tool_becomes_content() {
        let response = decode(
            reply(
                vec![ContentBlock::ToolUse(ToolUseBlock {
                    tool_use_id: "t1".to_owned(),
                    name: "bf_so_person".to_owned(),
                    input: json!({"name": "Ada"}),
                })],
                "tool_use",
            ),
            CLAUDE,
            Some("bf_so_person"),
        );

        let choice = &response.choices[0];
        assert_eq!(choice.message.text_content(), Some(r#"{"name":"Ada"}"#));
        assert!(choice.message.tool_calls.is_none());
        assert_eq!(choice.finish_reason, Some(FinishReason::Stop));
    }

    #[test]
    fn structured_output_turn_stops_even_with_a_real_tool_call() {
        let response = decode(
            reply(
                vec![
                    ContentBlock::ToolUse(ToolUseBlock {
                        tool_use_id: "t1".to_owned(),
                        name: "lookup".to_owned(),
                        input: json!({"id": 7}),
                    }),
                    ContentBlock::ToolUse(ToolUseBlock {
                        tool_use_id: "t2".to_owned(),
                        name: "bf_so_person".to_owned(),
                        input: json!({"name": "Ada"}),
                    }),
                ],
                "tool_use",
            ),
            CLAUDE,
            Some("bf_so_person"),
        );

        let choice = &response.choices[0];
        assert_eq!(choice.message.text_content(), Some(r#"{"name":"Ada"}"#));
        assert_eq!(choice.message.tool_calls.as_ref().map(Vec::len), Some(1));
        assert_eq!(choice.finish_reason, Some(FinishReason::Stop));
    }

    #[test]
    fn token_totals_saturate() {
        let usage = usage(TokenUsage {
            input_tokens: u32::MAX,
            output_tokens: 5,
            total_tokens: 0,
            cache_read_input_tokens: None,
            cache_write_input_tokens: None,
        });

        assert_eq!(usage.total_tokens, u32::MAX);
    }

    #[test]
    fn cache_counts_become_details() {
        let usage = usage(TokenUsage {
            input_tokens: 10,
            output_tokens: 2,
            total_tokens: 0,
            cache_read_input_tokens: Some(8),
            cache_write_input_tokens: Some(4),
        });

        assert_eq!(usage.total_tokens, 12);
        assert_eq!(usage.prompt_tokens_details, Some(TokenDetails { cached_tokens: 8 }));
        assert_eq!(usage.completion_tokens_details, Some(TokenDetails { cached_tokens: 4 }));
    }
}
