use serde::{Deserialize, Serialize};

/// Filters forwarded to the foundation-model listing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListModelsRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by_provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by_output_modality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by_inference_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by_customization_type: Option<String>,
    /// Opaque cursor from a previous page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Deployment alias, allow-list entry, or raw Bedrock model id
    pub id: String,
    pub name: String,
    pub owned_by: String,
    #[serde(default)]
    pub input_modalities: Vec<String>,
    #[serde(default)]
    pub output_modalities: Vec<String>,
    /// Deployment id when `id` is an alias
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelList {
    pub data: Vec<ModelInfo>,
    pub has_more: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
}
