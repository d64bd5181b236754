//! Unified, provider-agnostic request and response shapes
//!
//! Everything the adapter accepts from or hands back to the gateway is
//! expressed in these types. The native Bedrock wire shapes live in
//! [`crate::protocol`] and the translation between the two in
//! [`crate::convert`].

pub mod batch;
pub mod file;
pub mod image;
pub mod message;
pub mod model;
pub mod request;
pub mod response;
pub mod stream;
pub mod text;
pub mod tool;

use indexmap::IndexMap;

pub use batch::{BatchCreateRequest, BatchJob, BatchList, BatchRequestItem, BatchResult, BatchResults, BatchStatus, RequestCounts};
pub use file::{FileContent, FileDeleted, FileList, FileListRequest, FileObject, FileUploadRequest};
pub use image::{ImageData, ImageGenerationRequest, ImageGenerationResponse};
pub use message::{Content, ContentPart, FunctionCall, Message, ReasoningDetail, ReasoningKind, Role, ToolCall};
pub use model::{ListModelsRequest, ModelInfo, ModelList};
pub use request::{CompletionParams, CompletionRequest, JsonSchemaFormat, ReasoningParams, ResponseFormat};
pub use response::{Choice, ChoiceMessage, CompletionResponse, FinishReason, TokenDetails, Usage};
pub use stream::{StreamDelta, StreamEvent, StreamFunctionCall, StreamToolCall};
pub use text::{TextChoice, TextCompletionRequest, TextCompletionResponse, TextPrompt};
pub use tool::{FunctionDefinition, ToolChoice, ToolChoiceFunction, ToolChoiceFunctionName, ToolChoiceMode, ToolDefinition};

/// Fields a request carried that no known schema claimed
///
/// Key order is preserved so re-serialized bodies read the way they were
/// written.
pub type ExtraParams = IndexMap<String, serde_json::Value>;
