//! Legacy prompt completions for the text families

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::family::ModelFamily;
use super::residual_extras;
use crate::error::BedrockError;
use crate::protocol::native::{
    AnthropicTextRequest, AnthropicTextResponse, Ai21TextResponse, CohereTextResponse, InvocationMetrics,
    LlamaTextResponse, MistralTextResponse, NativeRequest, PromptTextRequest,
};
use crate::types::{FinishReason, TextChoice, TextCompletionRequest, TextCompletionResponse, Usage};

const DEFAULT_MAX_TOKENS_TO_SAMPLE: u32 = 4096;
const INVOCATION_METRICS: &str = "amazon-bedrock-invocationMetrics";

/// Native body for a unified text request
pub fn encode(request: &TextCompletionRequest) -> Result<NativeRequest, BedrockError> {
    let family = ModelFamily::detect(&request.model);
    if !family.supports_text_completion() {
        return Err(unsupported(family));
    }

    let prompt = request.prompt.joined();
    let mut extra = request.extra_params.clone();
    let top_k = extra
        .shift_remove("top_k")
        .and_then(|v| v.as_u64())
        .and_then(|k| u32::try_from(k).ok());

    let body = if family == ModelFamily::Anthropic {
        NativeRequest::AnthropicText(AnthropicTextRequest {
            prompt: anthropic_prompt(&prompt),
            max_tokens_to_sample: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS_TO_SAMPLE),
            temperature: request.temperature,
            top_p: request.top_p,
            top_k,
            stop_sequences: request.stop.clone(),
            extra: residual_extras(extra, AnthropicTextRequest::FIELDS),
        })
    } else {
        NativeRequest::PromptText(PromptTextRequest {
            prompt,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            top_p: request.top_p,
            top_k,
            stop: request.stop.clone(),
            extra: residual_extras(extra, PromptTextRequest::FIELDS),
        })
    };

    Ok(body)
}

/// Wrap a prompt in the `Human:` / `Assistant:` turns Claude text models expect
fn anthropic_prompt(prompt: &str) -> String {
    if prompt.contains("\n\nHuman:") {
        prompt.to_owned()
    } else {
        format!("\n\nHuman: {prompt}\n\nAssistant:")
    }
}

fn unsupported(family: ModelFamily) -> BedrockError {
    BedrockError::Configuration(format!("model family {family} does not support text completion"))
}

fn parse<T: DeserializeOwned>(body: &[u8], what: &str) -> Result<T, BedrockError> {
    serde_json::from_slice(body).map_err(|e| BedrockError::decode(what, e))
}

fn choice(index: u32, text: String, reason: Option<&str>) -> TextChoice {
    TextChoice {
        index,
        text,
        finish_reason: reason.map(FinishReason::from_native),
    }
}

/// Unified text response for a family's invoke reply
pub fn decode(model: &str, body: &[u8]) -> Result<TextCompletionResponse, BedrockError> {
    let family = ModelFamily::detect(model);

    let (choices, usage) = match family {
        ModelFamily::Anthropic => {
            let reply: AnthropicTextResponse = parse(body, "anthropic text response")?;
            (vec![choice(0, reply.completion, reply.stop_reason.as_deref())], None)
        }
        ModelFamily::Mistral => {
            let reply: MistralTextResponse = parse(body, "mistral text response")?;
            let choices = (0u32..)
                .zip(reply.outputs)
                .map(|(i, output)| choice(i, output.text, output.stop_reason.as_deref()))
                .collect();
            (choices, None)
        }
        ModelFamily::Llama => {
            let reply: LlamaTextResponse = parse(body, "llama text response")?;
            let usage = match (reply.prompt_token_count, reply.generation_token_count) {
                (None, None) => None,
                (prompt, generation) => Some(Usage::new(prompt.unwrap_or_default(), generation.unwrap_or_default())),
            };
            (vec![choice(0, reply.generation, reply.stop_reason.as_deref())], usage)
        }
        ModelFamily::CohereCommand => {
            let reply: CohereTextResponse = parse(body, "cohere text response")?;
            let choices = (0u32..)
                .zip(reply.generations)
                .map(|(i, generation)| choice(i, generation.text, generation.finish_reason.as_deref()))
                .collect();
            (choices, None)
        }
        ModelFamily::Ai21Jamba => {
            let reply: Ai21TextResponse = parse(body, "ai21 text response")?;
            let choices = (0u32..)
                .zip(reply.choices)
                .map(|(i, c)| {
                    let text = c.message.map(|m| m.content).unwrap_or_default();
                    choice(i, text, c.finish_reason.as_deref())
                })
                .collect();
            let usage = reply.usage.map(|u| Usage {
                total_tokens: u.total_tokens.max(u.prompt_tokens.saturating_add(u.completion_tokens)),
                ..Usage::new(u.prompt_tokens, u.completion_tokens)
            });
            (choices, usage)
        }
        other => return Err(unsupported(other)),
    };

    Ok(TextCompletionResponse {
        id: uuid::Uuid::new_v4().to_string(),
        object: "text_completion".to_owned(),
        created: super::unix_now(),
        model: model.to_owned(),
        choices,
        usage,
    })
}

/// One decoded `invoke-with-response-stream` chunk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextChunk {
    pub text: Option<String>,
    pub finish_reason: Option<FinishReason>,
    /// Only on the last chunk, from Bedrock's invocation metrics
    pub usage: Option<Usage>,
}

/// Decode a family's stream chunk (already unwrapped from base64)
pub fn decode_stream_chunk(family: ModelFamily, payload: &[u8]) -> Result<TextChunk, BedrockError> {
    let chunk: Value = parse(payload, "text stream chunk")?;

    let (text, reason) = match family {
        ModelFamily::Anthropic => (chunk.get("completion"), chunk.get("stop_reason")),
        ModelFamily::Llama => (chunk.get("generation"), chunk.get("stop_reason")),
        ModelFamily::Mistral => {
            let output = chunk.pointer("/outputs/0");
            (
                output.and_then(|o| o.get("text")),
                output.and_then(|o| o.get("stop_reason")),
            )
        }
        ModelFamily::CohereCommand => match chunk.pointer("/generations/0") {
            Some(generation) => (generation.get("text"), generation.get("finish_reason")),
            None => (chunk.get("text"), chunk.get("finish_reason")),
        },
        ModelFamily::Ai21Jamba => {
            let first = chunk.pointer("/choices/0");
            let text = first.and_then(|c| c.pointer("/delta/content").or_else(|| c.pointer("/message/content")));
            (text, first.and_then(|c| c.get("finish_reason")))
        }
        other => return Err(unsupported(other)),
    };

    let usage = chunk
        .get(INVOCATION_METRICS)
        .and_then(|metrics| serde_json::from_value::<InvocationMetrics>(metrics.clone()).ok())
        .map(|metrics| Usage::new(metrics.input_token_count, metrics.output_token_count));

    Ok(TextChunk {
        text: text.and_then(Value::as_str).filter(|t| !t.is_empty()).map(str::to_owned),
        finish_reason: reason.and_then(Value::as_str).map(FinishReason::from_native),
        usage,
    })
}
