//! Batch job records: JSONL input building, output parsing and job mapping

use std::time::Duration;

use serde_json::Value;
use tracing::warn;

use super::converse;
use crate::error::BedrockError;
use crate::protocol::control::{BatchManifest, InputRecord, InvocationJob, OutputRecord};
use crate::types::{BatchJob, BatchRequestItem, BatchResult, BatchStatus, RequestCounts};

/// Object name of the progress manifest under a job's output location
pub const MANIFEST_NAME: &str = "manifest.json.out";

const RESULT_SUFFIXES: [&str; 2] = [".jsonl.out", ".jsonl"];

/// Job name used when the caller does not pick one
pub fn default_job_name(unix: u64) -> String {
    format!("synapse-batch-{unix}")
}

/// Key the inline input is uploaded under, in the output bucket
pub fn input_key(job_name: &str) -> String {
    format!("batch-inputs/{job_name}.jsonl")
}

/// Whether an object under the output location holds result records
pub fn is_result_file(key: &str) -> bool {
    RESULT_SUFFIXES.iter().any(|suffix| key.ends_with(suffix))
}

/// Completion window as whole hours, rounded up
pub fn timeout_hours(window: Duration) -> u64 {
    window.as_secs().div_ceil(3600)
}

/// Serialize inline requests into the job's JSONL input
///
/// A job runs one model: `model_id` is the deployment `requested` resolved
/// to, and every record is encoded for its family and tagged with it.
/// Requests may leave their model empty or name either form.
pub fn input_jsonl(items: &[BatchRequestItem], requested: &str, model_id: &str) -> Result<Vec<u8>, BedrockError> {
    let mut out = Vec::new();

    for item in items {
        let mut body = item.body.clone();
        if !body.model.is_empty() && body.model != requested && body.model != model_id {
            return Err(BedrockError::InvalidRequest(format!(
                "batch request {} targets {}, but the job runs {requested}",
                item.custom_id, body.model
            )));
        }
        model_id.clone_into(&mut body.model);

        let encoded = converse::encode(&body)
            .map_err(|e| BedrockError::InvalidRequest(format!("batch request {}: {e}", item.custom_id)))?;

        let mut model_input = serde_json::to_value(&encoded.request).map_err(|e| BedrockError::Internal(e.into()))?;
        if let Some(fields) = model_input.as_object_mut() {
            fields.insert("modelId".to_owned(), Value::String(model_id.to_owned()));
        }

        let record = InputRecord {
            record_id: item.custom_id.clone(),
            model_input,
        };

        serde_json::to_writer(&mut out, &record).map_err(|e| BedrockError::Internal(e.into()))?;
        out.push(b'\n');
    }

    Ok(out)
}

/// Parse one results object, collecting the lines that do not parse
pub fn parse_results(object: &str, content: &[u8], results: &mut Vec<BatchResult>, errors: &mut Vec<String>) {
    let lines = content
        .split(|b| *b == b'\n')
        .enumerate()
        .filter(|(_, line)| !line.trim_ascii().is_empty());

    for (index, line) in lines {
        match serde_json::from_slice::<OutputRecord>(line) {
            Ok(record) => results.push(result_from_record(record)),
            Err(e) => {
                warn!(object = %object, line = index + 1, error = %e, "skipping unparseable batch record");
                errors.push(format!("{object}:{}: {e}", index + 1));
            }
        }
    }
}

fn result_from_record(record: OutputRecord) -> BatchResult {
    let (error_code, error_message) = match record.error {
        Some(error) => {
            let code = error.error_code.map(|code| match code {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            });
            (code, error.error_message)
        }
        None => (None, None),
    };

    BatchResult {
        custom_id: record.record_id,
        output: record.model_output,
        error_code,
        error_message,
    }
}

/// Progress counts from a job manifest
pub const fn request_counts(manifest: BatchManifest) -> RequestCounts {
    RequestCounts {
        total: manifest.total_record_count,
        completed: manifest.processed_record_count.saturating_sub(manifest.error_record_count),
        failed: manifest.error_record_count,
    }
}

fn unix_seconds(timestamp: Option<&str>) -> Option<i64> {
    let parsed = timestamp?.parse::<jiff::Timestamp>();
    match parsed {
        Ok(ts) => Some(ts.as_second()),
        Err(e) => {
            warn!(error = %e, "ignoring unparseable job timestamp");
            None
        }
    }
}

/// Unified job record for a native job description
pub fn job_from_native(job: InvocationJob) -> BatchJob {
    let status = BatchStatus::from_native(&job.status);
    let mut batch = BatchJob::new(job.job_arn.clone(), status);

    batch.input_file_id = job.input_uri().map(str::to_owned);
    batch.output_file_id = job.output_uri().map(str::to_owned);
    batch.created_at = unix_seconds(job.submit_time.as_deref());
    batch.completed_at = unix_seconds(job.end_time.as_deref());
    batch.expires_at = unix_seconds(job.job_expiration_time.as_deref());

    let metadata = &mut batch.metadata;
    if let Some(name) = job.job_name {
        metadata.insert("job_name".to_owned(), name);
    }
    if let Some(model) = job.model_id {
        metadata.insert("model".to_owned(), model);
    }
    if let Some(message) = job.message.filter(|m| !m.is_empty()) {
        metadata.insert("message".to_owned(), message);
    }
    if let Some(vpc) = job.vpc_config {
        if !vpc.security_group_ids.is_empty() {
            metadata.insert("vpc_security_group_ids".to_owned(), vpc.security_group_ids.join(","));
        }
        if !vpc.subnet_ids.is_empty() {
            metadata.insert("vpc_subnet_ids".to_owned(), vpc.subnet_ids.join(","));
        }
    }

    batch
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::types::{CompletionRequest, Message, ReasoningParams};

    #[test]
    fn inline_requests_become_converse_records() {
        let items = vec![
            BatchRequestItem {
                custom_id: "r1".to_owned(),
                body: CompletionRequest::new("", vec![Message::user("hi")]),
            },
            BatchRequestItem {
                custom_id: "r2".to_owned(),
                body: CompletionRequest::new("nova", vec![Message::user("yo")]),
            },
        ];

        let jsonl = input_jsonl(&items, "nova", "amazon.nova-pro-v1:0").unwrap();
        let text = String::from_utf8(jsonl).unwrap();
        let lines: Vec<serde_json::Value> = text.lines().map(|l| serde_json::from_str(l).unwrap()).collect();

        assert_eq!(lines.len(), 2);
        assert!(text.ends_with('\n'));
        assert_eq!(lines[0]["recordId"], "r1");
        assert_eq!(
            lines[0]["modelInput"]["messages"],
            json!([{"role": "user", "content": [{"text": "hi"}]}])
        );
        assert!(lines.iter().all(|line| line["modelInput"]["modelId"] == "amazon.nova-pro-v1:0"));
    }

    #[test]
    fn records_are_encoded_for_the_deployed_family() {
        let mut body = CompletionRequest::new("claude-prod", vec![Message::user("think hard")]);
        body.params.max_tokens = Some(2048);
        body.params.reasoning = Some(ReasoningParams {
            effort: Some("medium".to_owned()),
            max_tokens: None,
        });
        let items = vec![BatchRequestItem {
            custom_id: "r1".to_owned(),
            body,
        }];

        let jsonl = input_jsonl(&items, "claude-prod", "us.anthropic.claude-sonnet-4-20250514-v1:0").unwrap();
        let line: serde_json::Value = serde_json::from_slice(jsonl.trim_ascii_end()).unwrap();

        assert_eq!(line["modelInput"]["modelId"], "us.anthropic.claude-sonnet-4-20250514-v1:0");
        assert_eq!(
            line["modelInput"]["additionalModelRequestFields"]["reasoning_config"],
            json!({"type": "enabled", "budget_tokens": 1024})
        );
    }

    #[test]
    fn request_for_another_model_is_rejected() {
        let items = vec![BatchRequestItem {
            custom_id: "odd".to_owned(),
            body: CompletionRequest::new("meta.llama3-8b-instruct-v1:0", vec![Message::user("hi")]),
        }];

        let err = input_jsonl(&items, "claude-prod", "anthropic.claude-3-haiku-20240307-v1:0").unwrap_err();
        assert!(matches!(err, BedrockError::InvalidRequest(ref msg) if msg.starts_with("batch request odd targets")));
    }

    #[test]
    fn empty_request_names_its_record() {
        let items = vec![BatchRequestItem {
            custom_id: "bad".to_owned(),
            body: CompletionRequest::new("m", Vec::new()),
        }];

        let err = input_jsonl(&items, "m", "m").unwrap_err();
        assert!(matches!(err, BedrockError::InvalidRequest(ref msg) if msg.starts_with("batch request bad")));
    }

    #[test]
    fn results_keep_good_records_and_report_bad_lines() {
        let content = concat!(
            r#"{"recordId":"a","modelOutput":{"stopReason":"end_turn"}}"#,
            "\n\n",
            "not json\n",
            r#"{"recordId":"b","error":{"errorCode":400,"errorMessage":"bad input"}}"#,
            "\n",
        );

        let mut results = Vec::new();
        let mut errors = Vec::new();
        parse_results("out/x.jsonl.out", content.as_bytes(), &mut results, &mut errors);

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].custom_id, "a");
        assert_eq!(results[1].error_code.as_deref(), Some("400"));
        assert_eq!(results[1].error_message.as_deref(), Some("bad input"));
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("out/x.jsonl.out:3: "));
    }

    #[test]
    fn manifest_counts_subtract_errors() {
        let counts = request_counts(BatchManifest {
            total_record_count: 10,
            processed_record_count: 8,
            error_record_count: 3,
        });

        assert_eq!(counts, RequestCounts { total: 10, completed: 5, failed: 3 });
    }

    #[test]
    fn windows_round_up_to_hours() {
        assert_eq!(timeout_hours(Duration::from_secs(24 * 3600)), 24);
        assert_eq!(timeout_hours(Duration::from_secs(90 * 60)), 2);
    }

    #[test]
    fn result_files_by_suffix() {
        assert!(is_result_file("job/abc/input.jsonl.out"));
        assert!(is_result_file("job/abc/input.jsonl"));
        assert!(!is_result_file("job/abc/manifest.json.out"));
    }

    #[test]
    fn native_job_maps_status_times_and_network() {
        let job: InvocationJob = serde_json::from_value(json!({
            "jobArn": "arn:aws:bedrock:us-east-1:123:model-invocation-job/abc",
            "jobName": "nightly",
            "modelId": "anthropic.claude-3-haiku",
            "status": "Stopped",
            "submitTime": "2024-05-01T10:00:00Z",
            "endTime": "2024-05-01T11:00:00Z",
            "outputDataConfig": {"s3OutputDataConfig": {"s3Uri": "s3://out/"}},
            "vpcConfig": {"securityGroupIds": ["sg-1", "sg-2"], "subnetIds": ["subnet-1"]}
        }))
        .unwrap();

        let batch = job_from_native(job);
        assert_eq!(batch.status, BatchStatus::Cancelled);
        assert_eq!(batch.created_at, Some(1_714_557_600));
        assert_eq!(batch.completed_at, Some(1_714_561_200));
        assert_eq!(batch.output_file_id.as_deref(), Some("s3://out/"));
        assert_eq!(batch.metadata["job_name"], "nightly");
        assert_eq!(batch.metadata["vpc_security_group_ids"], "sg-1,sg-2");
        assert_eq!(batch.metadata["vpc_subnet_ids"], "subnet-1");
    }
}
