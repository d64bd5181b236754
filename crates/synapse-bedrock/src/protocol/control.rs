//! Control-plane shapes served by `bedrock.{region}.amazonaws.com`

use serde::{Deserialize, Serialize};

// -- Foundation models --

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoundationModelsResponse {
    #[serde(default)]
    pub model_summaries: Vec<FoundationModelSummary>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoundationModelSummary {
    pub model_id: String,
    #[serde(default)]
    pub model_arn: Option<String>,
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default)]
    pub provider_name: Option<String>,
    #[serde(default)]
    pub input_modalities: Vec<String>,
    #[serde(default)]
    pub output_modalities: Vec<String>,
    #[serde(default)]
    pub response_streaming_supported: Option<bool>,
    #[serde(default)]
    pub inference_types_supported: Vec<String>,
}

// -- Model invocation jobs --

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobRequest {
    pub job_name: String,
    pub model_id: String,
    pub role_arn: String,
    pub input_data_config: InputDataConfig,
    pub output_data_config: OutputDataConfig,
    /// `Converse` when records carry Converse bodies
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_invocation_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_duration_in_hours: Option<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vpc_config: Option<VpcConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputDataConfig {
    pub s3_input_data_config: S3InputDataConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct S3InputDataConfig {
    pub s3_uri: String,
    /// Always `JSONL`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3_input_format: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputDataConfig {
    pub s3_output_data_config: S3OutputDataConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct S3OutputDataConfig {
    pub s3_uri: String,
}

impl InputDataConfig {
    pub fn jsonl(s3_uri: impl Into<String>) -> Self {
        Self {
            s3_input_data_config: S3InputDataConfig {
                s3_uri: s3_uri.into(),
                s3_input_format: Some("JSONL".to_owned()),
            },
        }
    }
}

impl OutputDataConfig {
    pub fn new(s3_uri: impl Into<String>) -> Self {
        Self {
            s3_output_data_config: S3OutputDataConfig { s3_uri: s3_uri.into() },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VpcConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub security_group_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subnet_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobResponse {
    pub job_arn: String,
}

/// Job description from `GET /model-invocation-job/{arn}`, also the list
/// summary shape (the list omits some fields)
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationJob {
    pub job_arn: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub job_name: Option<String>,
    #[serde(default)]
    pub model_id: Option<String>,
    #[serde(default)]
    pub role_arn: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub input_data_config: Option<InputDataConfig>,
    #[serde(default)]
    pub output_data_config: Option<OutputDataConfig>,
    #[serde(default)]
    pub vpc_config: Option<VpcConfig>,
    /// RFC 3339 timestamps
    #[serde(default)]
    pub submit_time: Option<String>,
    #[serde(default)]
    pub last_modified_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub job_expiration_time: Option<String>,
    #[serde(default)]
    pub timeout_duration_in_hours: Option<u64>,
}

impl InvocationJob {
    pub fn input_uri(&self) -> Option<&str> {
        self.input_data_config
            .as_ref()
            .map(|c| c.s3_input_data_config.s3_uri.as_str())
    }

    pub fn output_uri(&self) -> Option<&str> {
        self.output_data_config
            .as_ref()
            .map(|c| c.s3_output_data_config.s3_uri.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationJobList {
    #[serde(default)]
    pub invocation_job_summaries: Vec<InvocationJob>,
    #[serde(default)]
    pub next_token: Option<String>,
}

/// `manifest.json.out` written next to a job's results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchManifest {
    #[serde(default)]
    pub total_record_count: u64,
    #[serde(default)]
    pub processed_record_count: u64,
    #[serde(default)]
    pub error_record_count: u64,
}

// -- Batch records --

/// One line of a job's JSONL input
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InputRecord {
    pub record_id: String,
    pub model_input: serde_json::Value,
}

/// One line of a job's JSONL output
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputRecord {
    #[serde(default)]
    pub record_id: String,
    #[serde(default)]
    pub model_output: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<RecordError>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordError {
    /// Numeric in practice, string in some regions
    #[serde(default)]
    pub error_code: Option<serde_json::Value>,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn create_request_omits_unset_optionals() {
        let request = CreateJobRequest {
            job_name: "nightly".to_owned(),
            model_id: "anthropic.claude-3-haiku-20240307-v1:0".to_owned(),
            role_arn: "arn:aws:iam::123:role/batch".to_owned(),
            input_data_config: InputDataConfig::jsonl("s3://in/batch.jsonl"),
            output_data_config: OutputDataConfig::new("s3://out/"),
            model_invocation_type: None,
            timeout_duration_in_hours: None,
            tags: Vec::new(),
            vpc_config: None,
        };

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "jobName": "nightly",
                "modelId": "anthropic.claude-3-haiku-20240307-v1:0",
                "roleArn": "arn:aws:iam::123:role/batch",
                "inputDataConfig": {"s3InputDataConfig": {"s3Uri": "s3://in/batch.jsonl", "s3InputFormat": "JSONL"}},
                "outputDataConfig": {"s3OutputDataConfig": {"s3Uri": "s3://out/"}}
            })
        );
    }

    #[test]
    fn job_exposes_data_locations() {
        let job: InvocationJob = serde_json::from_value(json!({
            "jobArn": "arn:job",
            "status": "InProgress",
            "inputDataConfig": {"s3InputDataConfig": {"s3Uri": "s3://in/x.jsonl"}},
            "outputDataConfig": {"s3OutputDataConfig": {"s3Uri": "s3://out/"}},
            "submitTime": "2024-05-01T10:00:00Z"
        }))
        .unwrap();

        assert_eq!(job.input_uri(), Some("s3://in/x.jsonl"));
        assert_eq!(job.output_uri(), Some("s3://out/"));
        assert_eq!(job.submit_time.as_deref(), Some("2024-05-01T10:00:00Z"));
    }
}
