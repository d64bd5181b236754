use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::request::CompletionRequest;

/// Lifecycle state of a batch job
///
/// Unknown provider states pass through verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Validating,
    InProgress,
    Completed,
    Failed,
    Cancelling,
    Cancelled,
    Expired,
    #[serde(untagged)]
    Other(String),
}

impl BatchStatus {
    /// Map a Bedrock model-invocation-job status
    pub fn from_native(status: &str) -> Self {
        match status {
            "Submitted" | "Validating" | "Scheduled" => Self::Validating,
            "InProgress" => Self::InProgress,
            "Completed" => Self::Completed,
            "Failed" | "PartiallyCompleted" => Self::Failed,
            "Stopping" => Self::Cancelling,
            "Stopped" => Self::Cancelled,
            "Expired" => Self::Expired,
            other => Self::Other(other.to_owned()),
        }
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled | Self::Expired)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestCounts {
    pub total: u64,
    pub completed: u64,
    pub failed: u64,
}

/// An asynchronous inference job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchJob {
    /// Job ARN
    pub id: String,
    /// Always "batch"
    pub object: String,
    pub status: BatchStatus,
    /// `s3://` input location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_file_id: Option<String>,
    /// `s3://` output location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_file_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    /// Filled from the output manifest when it exists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_counts: Option<RequestCounts>,
    /// Job name, model id, failure message and network placement
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub metadata: IndexMap<String, String>,
}

impl BatchJob {
    pub(crate) fn new(id: impl Into<String>, status: BatchStatus) -> Self {
        Self {
            id: id.into(),
            object: "batch".to_owned(),
            status,
            input_file_id: None,
            output_file_id: None,
            created_at: None,
            completed_at: None,
            expires_at: None,
            request_counts: None,
            metadata: IndexMap::new(),
        }
    }
}

/// One inline request of a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRequestItem {
    /// Caller correlation id, becomes the record id
    pub custom_id: String,
    /// An empty model falls back to the job's model
    pub body: CompletionRequest,
}

/// Parameters for creating a batch job
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchCreateRequest {
    pub model: String,
    /// Existing `s3://` JSONL input; otherwise `requests` are uploaded
    pub input_file_id: Option<String>,
    pub requests: Vec<BatchRequestItem>,
    /// Falls back to the key's `role_arn`
    pub role_arn: Option<String>,
    /// Falls back to the key's `batch_output_s3_uri`
    pub output_s3_uri: Option<String>,
    /// Defaults to `synapse-batch-{unix}`
    pub job_name: Option<String>,
    /// Rounded up to whole hours
    pub completion_window: Option<Duration>,
    pub vpc_security_group_ids: Vec<String>,
    pub vpc_subnet_ids: Vec<String>,
    pub tags: IndexMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchList {
    pub data: Vec<BatchJob>,
    pub has_more: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
}

/// One output record of a finished job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub custom_id: String,
    /// Native model output, absent when the record failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Parsed results plus the lines that did not parse
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchResults {
    pub batch_id: String,
    pub results: Vec<BatchResult>,
    /// `{object}:{line}: {error}` for each unparseable record
    pub errors: Vec<String>,
}
