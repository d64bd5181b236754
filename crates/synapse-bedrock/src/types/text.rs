use serde::{Deserialize, Serialize};

use super::ExtraParams;
use super::response::{FinishReason, Usage};

/// Prompt of a legacy text completion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TextPrompt {
    Single(String),
    /// Joined with blank lines before it is sent
    Many(Vec<String>),
}

impl TextPrompt {
    pub fn joined(&self) -> String {
        match self {
            Self::Single(prompt) => prompt.clone(),
            Self::Many(prompts) => prompts.join("\n\n"),
        }
    }
}

/// Unified text (non-chat) completion request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextCompletionRequest {
    pub model: String,
    pub prompt: TextPrompt,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    #[serde(default)]
    pub stream: bool,
    /// `top_k` and other family knobs
    #[serde(default, skip_serializing_if = "ExtraParams::is_empty")]
    pub extra_params: ExtraParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextChoice {
    pub index: u32,
    pub text: String,
    pub finish_reason: Option<FinishReason>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextCompletionResponse {
    pub id: String,
    /// Always "text_completion"
    pub object: String,
    pub created: u64,
    pub model: String,
    pub choices: Vec<TextChoice>,
    pub usage: Option<Usage>,
}
