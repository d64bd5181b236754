//! Batch inference jobs on the Bedrock control plane
//!
//! Inputs and outputs live in S3. A job created from inline requests first
//! uploads them as JSONL into the output bucket; results are read back from
//! the objects the job writes under its output location.

use http::Method;
use synapse_config::BedrockKey;
use synapse_core::CallContext;
use tracing::{debug, info, warn};

use crate::auth::Service;
use crate::auth::sigv4::uri_encode;
use crate::client::{BedrockClient, json_body, parse_json, post, request, try_each_key};
use crate::convert::batch::{
    MANIFEST_NAME, default_job_name, input_jsonl, input_key, is_result_file, job_from_native, parse_results,
    request_counts, timeout_hours,
};
use crate::convert::unix_now;
use crate::error::BedrockError;
use crate::pagination::{Page, serial_page};
use crate::protocol::control::{
    BatchManifest, CreateJobRequest, CreateJobResponse, InputDataConfig, InvocationJob, InvocationJobList,
    OutputDataConfig, Tag, VpcConfig,
};
use crate::storage::ObjectLocation;
use crate::types::{BatchCreateRequest, BatchJob, BatchList, BatchResults, BatchStatus};

const JSONL: &str = "application/jsonl";

/// Records carry Converse bodies rather than per-family invoke bodies
const CONVERSE_INVOCATION: &str = "Converse";

fn job_path(id: &str) -> String {
    format!("model-invocation-job/{}", uri_encode(id))
}

fn vpc_config(request: &BatchCreateRequest) -> Option<VpcConfig> {
    if request.vpc_security_group_ids.is_empty() && request.vpc_subnet_ids.is_empty() {
        return None;
    }
    Some(VpcConfig {
        security_group_ids: request.vpc_security_group_ids.clone(),
        subnet_ids: request.vpc_subnet_ids.clone(),
    })
}

/// Placeholder record for a job whose status could not be re-read
fn provisional(id: &str, status: BatchStatus, input: Option<&str>, output: Option<&str>) -> BatchJob {
    let mut job = BatchJob::new(id, status);
    job.input_file_id = input.map(str::to_owned);
    job.output_file_id = output.map(str::to_owned);
    job
}

impl BedrockClient {
    async fn describe_job(
        &self,
        ctx: &CallContext,
        key: &BedrockKey,
        id: &str,
    ) -> Result<InvocationJob, BedrockError> {
        let path = job_path(id);
        let url = self.control_url(key, &path)?;
        self.send_json(ctx, key, Service::Bedrock, request(Method::GET, url, None), id)
            .await
    }

    /// Progress counts from the job's manifest, if one has been written
    async fn manifest_counts(&self, ctx: &CallContext, key: &BedrockKey, job: &mut BatchJob) {
        let Some(output) = job.output_file_id.as_deref() else {
            return;
        };
        let location = match ObjectLocation::parse(output) {
            Ok(location) => location.join(MANIFEST_NAME),
            Err(e) => {
                warn!(batch = %job.id, error = %e, "job output location is not an s3 uri");
                return;
            }
        };

        let manifest = match self.get_object(ctx, key, &location).await {
            Ok((body, _)) => parse_json::<BatchManifest>("batch manifest", &body),
            Err(e) => {
                debug!(batch = %job.id, error = %e, "no batch manifest yet");
                return;
            }
        };

        match manifest {
            Ok(manifest) => job.request_counts = Some(request_counts(manifest)),
            Err(e) => warn!(batch = %job.id, error = %e, "ignoring unreadable batch manifest"),
        }
    }

    /// Submit a batch job with `key`
    ///
    /// Without an input file, the inline requests are uploaded to
    /// `batch-inputs/{job}.jsonl` in the output bucket first.
    pub async fn create_batch(
        &self,
        ctx: &CallContext,
        key: &BedrockKey,
        request: BatchCreateRequest,
    ) -> Result<BatchJob, BedrockError> {
        let role_arn = request
            .role_arn
            .clone()
            .or_else(|| key.role_arn.clone())
            .filter(|r| !r.is_empty())
            .ok_or_else(|| BedrockError::Configuration(format!("key {} has no batch role_arn", key.name)))?;
        let output_uri = request
            .output_s3_uri
            .clone()
            .or_else(|| key.batch_output_s3_uri.clone())
            .filter(|o| !o.is_empty())
            .ok_or_else(|| BedrockError::Configuration(format!("key {} has no batch_output_s3_uri", key.name)))?;
        let output = ObjectLocation::parse(&output_uri)?;

        let job_name = request
            .job_name
            .clone()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| default_job_name(unix_now()));
        let model_id = key.deployment(&request.model).to_owned();

        let input_uri = match request.input_file_id.as_deref().filter(|i| !i.is_empty()) {
            Some(input) => input.to_owned(),
            None if !request.requests.is_empty() => {
                let content = input_jsonl(&request.requests, &request.model, &model_id)?;
                let location = output.with_key(input_key(&job_name));
                self.put_object(ctx, key, &location, content, JSONL).await?;
                location.to_string()
            }
            None => {
                return Err(BedrockError::InvalidRequest(
                    "batch needs an input file or inline requests".to_owned(),
                ));
            }
        };

        let create = CreateJobRequest {
            job_name: job_name.clone(),
            model_id,
            role_arn,
            input_data_config: InputDataConfig::jsonl(input_uri.clone()),
            output_data_config: OutputDataConfig::new(output_uri.clone()),
            model_invocation_type: Some(CONVERSE_INVOCATION.to_owned()),
            timeout_duration_in_hours: request.completion_window.map(timeout_hours),
            tags: request
                .tags
                .iter()
                .map(|(key, value)| Tag {
                    key: key.clone(),
                    value: value.clone(),
                })
                .collect(),
            vpc_config: vpc_config(&request),
        };

        let url = self.control_url(key, "model-invocation-job")?;
        let created: CreateJobResponse = self
            .send_json(ctx, key, Service::Bedrock, post(url, json_body(&create)?), &job_name)
            .await?;
        info!(key = %key.name, job = %job_name, arn = %created.job_arn, "submitted batch job");

        match self.describe_job(ctx, key, &created.job_arn).await {
            Ok(job) => Ok(job_from_native(job)),
            Err(e) => {
                warn!(arn = %created.job_arn, error = %e, "could not re-read new batch job");
                let mut job = provisional(
                    &created.job_arn,
                    BatchStatus::Validating,
                    Some(&input_uri),
                    Some(&output_uri),
                );
                job.metadata.insert("job_name".to_owned(), job_name);
                Ok(job)
            }
        }
    }

    /// Page through jobs, one key at a time
    pub async fn list_batches(
        &self,
        ctx: &CallContext,
        keys: &[BedrockKey],
        after: Option<&str>,
        limit: Option<u32>,
    ) -> Result<BatchList, BedrockError> {
        let page = serial_page(keys, after, |key, token| async move {
            let mut url = self.control_url(key, "model-invocation-jobs")?;
            {
                let mut query = url.query_pairs_mut();
                if let Some(limit) = limit {
                    query.append_pair("maxResults", &limit.to_string());
                }
                if let Some(token) = token.as_deref() {
                    query.append_pair("nextToken", token);
                }
            }
            if url.query() == Some("") {
                url.set_query(None);
            }

            let list: InvocationJobList = self
                .send_json(ctx, key, Service::Bedrock, request(Method::GET, url, None), "model-invocation-jobs")
                .await?;
            Ok(Page {
                items: list.invocation_job_summaries.into_iter().map(job_from_native).collect(),
                next_token: list.next_token,
            })
        })
        .await?;

        Ok(BatchList {
            has_more: page.has_more(),
            data: page.items,
            after: page.after,
        })
    }

    /// Current state of a job plus manifest progress when available
    pub async fn retrieve_batch(
        &self,
        ctx: &CallContext,
        keys: &[BedrockKey],
        id: &str,
    ) -> Result<BatchJob, BedrockError> {
        try_each_key(keys, "retrieve batch", |key| async move {
            let mut job = job_from_native(self.describe_job(ctx, key, id).await?);
            self.manifest_counts(ctx, key, &mut job).await;
            Ok(job)
        })
        .await
    }

    /// Ask the provider to stop a job
    pub async fn cancel_batch(
        &self,
        ctx: &CallContext,
        keys: &[BedrockKey],
        id: &str,
    ) -> Result<BatchJob, BedrockError> {
        try_each_key(keys, "cancel batch", |key| async move {
            let url = self.control_url(key, &format!("{}/stop", job_path(id)))?;
            self.send(ctx, key, Service::Bedrock, post(url, b"{}".to_vec()), id)
                .await?;
            info!(key = %key.name, batch = %id, "stop requested for batch job");

            match self.describe_job(ctx, key, id).await {
                Ok(job) => Ok(job_from_native(job)),
                Err(e) => {
                    warn!(batch = %id, error = %e, "could not re-read stopped batch job");
                    Ok(provisional(id, BatchStatus::Cancelling, None, None))
                }
            }
        })
        .await
    }

    /// Download and parse every result object of a job
    pub async fn batch_results(
        &self,
        ctx: &CallContext,
        keys: &[BedrockKey],
        id: &str,
    ) -> Result<BatchResults, BedrockError> {
        try_each_key(keys, "batch results", |key| async move {
            let job = job_from_native(self.describe_job(ctx, key, id).await?);
            let output = job
                .output_file_id
                .as_deref()
                .ok_or_else(|| BedrockError::InvalidRequest(format!("batch {id} has no output location")))?;
            let output = ObjectLocation::parse(output)?;

            let mut results = Vec::new();
            let mut errors = Vec::new();

            match self.result_objects(ctx, key, &output).await {
                Ok(objects) => {
                    for object in objects {
                        let (content, _) = self.get_object(ctx, key, &object).await?;
                        parse_results(&object.to_string(), &content, &mut results, &mut errors);
                    }
                }
                Err(e) if e.is_cancellation() => return Err(e),
                Err(e) => {
                    warn!(batch = %id, error = %e, "listing batch output failed, reading it as one object");
                    let (content, _) = self.get_object(ctx, key, &output).await?;
                    parse_results(&output.to_string(), &content, &mut results, &mut errors);
                }
            }

            debug!(batch = %id, results = results.len(), errors = errors.len(), "collected batch results");
            Ok(BatchResults {
                batch_id: job.id,
                results,
                errors,
            })
        })
        .await
    }

    /// Every result file under `output`, across all listing pages
    async fn result_objects(
        &self,
        ctx: &CallContext,
        key: &BedrockKey,
        output: &ObjectLocation,
    ) -> Result<Vec<ObjectLocation>, BedrockError> {
        let prefix = output.join("");
        let mut objects = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let page = self
                .list_objects(ctx, key, &prefix, token.as_deref(), None)
                .await?;
            objects.extend(
                page.contents
                    .iter()
                    .filter(|entry| is_result_file(&entry.key))
                    .map(|entry| output.with_key(entry.key.clone())),
            );

            match page.next_token() {
                Some(next) => token = Some(next.to_owned()),
                None => return Ok(objects),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use secrecy::SecretString;
    use serde_json::json;
    use synapse_config::{BedrockConfig, EndpointOverrides};
    use url::Url;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::types::{BatchRequestItem, CompletionRequest, Message};

    const ARN: &str = "arn:aws:bedrock:us-east-1:123456789012:model-invocation-job/abc123";
    const ENCODED_ARN: &str = "arn%3Aaws%3Abedrock%3Aus-east-1%3A123456789012%3Amodel-invocation-job%2Fabc123";

    fn key(name: &str) -> BedrockKey {
        BedrockKey {
            name: name.to_owned(),
            access_key_id: Some(SecretString::from("AKIDEXAMPLE")),
            secret_access_key: Some(SecretString::from("secret")),
            role_arn: Some("arn:aws:iam::123456789012:role/batch".to_owned()),
            batch_output_s3_uri: Some("s3://out-bucket/results".to_owned()),
            ..BedrockKey::default()
        }
    }

    fn client(server: &MockServer) -> BedrockClient {
        let base: Url = server.uri().parse().unwrap();
        BedrockClient::new(&BedrockConfig {
            endpoints: EndpointOverrides {
                runtime: Some(base.clone()),
                control: Some(base.clone()),
                storage: Some(base),
            },
            ..BedrockConfig::default()
        })
        .unwrap()
    }

    fn job(status: &str) -> serde_json::Value {
        json!({
            "jobArn": ARN,
            "jobName": "nightly",
            "modelId": "anthropic.claude-3",
            "status": status,
            "inputDataConfig": {"s3InputDataConfig": {"s3Uri": "s3://out-bucket/batch-inputs/nightly.jsonl"}},
            "outputDataConfig": {"s3OutputDataConfig": {"s3Uri": "s3://out-bucket/results"}},
            "submitTime": "2024-05-01T12:00:00Z"
        })
    }

    fn inline_request() -> BatchCreateRequest {
        BatchCreateRequest {
            model: "anthropic.claude-3".to_owned(),
            requests: vec![BatchRequestItem {
                custom_id: "req-1".to_owned(),
                body: CompletionRequest::new("", vec![Message::user("hi")]),
            }],
            job_name: Some("nightly".to_owned()),
            completion_window: Some(Duration::from_secs(90 * 60)),
            ..BatchCreateRequest::default()
        }
    }

    #[tokio::test]
    async fn create_uploads_inline_requests_then_submits() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/out-bucket/batch-inputs/nightly.jsonl"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/model-invocation-job"))
            .and(body_partial_json(json!({
                "jobName": "nightly",
                "modelId": "anthropic.claude-3",
                "roleArn": "arn:aws:iam::123456789012:role/batch",
                "modelInvocationType": "Converse",
                "timeoutDurationInHours": 2,
                "inputDataConfig": {"s3InputDataConfig": {
                    "s3Uri": "s3://out-bucket/batch-inputs/nightly.jsonl",
                    "s3InputFormat": "JSONL"
                }},
                "outputDataConfig": {"s3OutputDataConfig": {"s3Uri": "s3://out-bucket/results"}}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"jobArn": ARN})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/model-invocation-job/{ENCODED_ARN}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(job("Submitted")))
            .mount(&server)
            .await;

        let job = client(&server)
            .create_batch(&CallContext::new(), &key("k"), inline_request())
            .await
            .unwrap();

        assert_eq!(job.id, ARN);
        assert_eq!(job.status, BatchStatus::Validating);
        assert_eq!(job.created_at, Some(1_714_564_800));
        assert_eq!(job.metadata.get("job_name").map(String::as_str), Some("nightly"));
    }

    #[tokio::test]
    async fn create_resolves_the_deployment_for_records_and_job() {
        const DEPLOYED: &str = "us.anthropic.claude-sonnet-4-20250514-v1:0";

        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/out-bucket/batch-inputs/nightly.jsonl"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/model-invocation-job"))
            .and(body_partial_json(json!({"modelId": DEPLOYED})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"jobArn": ARN})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/model-invocation-job/{ENCODED_ARN}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(job("Submitted")))
            .mount(&server)
            .await;

        let mut key = key("k");
        key.deployments.insert("claude-prod".to_owned(), DEPLOYED.to_owned());
        let mut request = inline_request();
        request.model = "claude-prod".to_owned();
        request.requests[0].body.model = "claude-prod".to_owned();

        client(&server)
            .create_batch(&CallContext::new(), &key, request)
            .await
            .unwrap();

        let uploads: Vec<_> = server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.url.path().starts_with("/out-bucket/batch-inputs/"))
            .collect();
        let record: serde_json::Value = serde_json::from_slice(uploads[0].body.trim_ascii_end()).unwrap();
        assert_eq!(record["recordId"], "req-1");
        assert_eq!(record["modelInput"]["modelId"], DEPLOYED);
    }

    #[tokio::test]
    async fn create_survives_a_failed_refetch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/model-invocation-job"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"jobArn": ARN})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({"message": "boom"})))
            .mount(&server)
            .await;

        let request = BatchCreateRequest {
            model: "anthropic.claude-3".to_owned(),
            input_file_id: Some("s3://in/records.jsonl".to_owned()),
            ..BatchCreateRequest::default()
        };
        let job = client(&server)
            .create_batch(&CallContext::new(), &key("k"), request)
            .await
            .unwrap();

        assert_eq!(job.status, BatchStatus::Validating);
        assert_eq!(job.input_file_id.as_deref(), Some("s3://in/records.jsonl"));
        assert_eq!(job.output_file_id.as_deref(), Some("s3://out-bucket/results"));
    }

    #[tokio::test]
    async fn create_without_role_is_a_configuration_error() {
        let server = MockServer::start().await;
        let mut key = key("k");
        key.role_arn = None;

        let err = client(&server)
            .create_batch(&CallContext::new(), &key, inline_request())
            .await
            .unwrap_err();
        assert!(matches!(err, BedrockError::Configuration(_)));
    }

    #[tokio::test]
    async fn retrieve_reads_the_manifest_when_present() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/model-invocation-job/{ENCODED_ARN}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(job("InProgress")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/out-bucket/results/manifest.json.out"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "totalRecordCount": 10,
                "processedRecordCount": 6,
                "errorRecordCount": 1
            })))
            .mount(&server)
            .await;

        let job = client(&server)
            .retrieve_batch(&CallContext::new(), &[key("k")], ARN)
            .await
            .unwrap();

        assert_eq!(job.status, BatchStatus::InProgress);
        let counts = job.request_counts.unwrap();
        assert_eq!((counts.total, counts.completed, counts.failed), (10, 5, 1));
    }

    #[tokio::test]
    async fn missing_manifest_leaves_counts_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/model-invocation-job/{ENCODED_ARN}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(job("Validating")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/out-bucket/results/manifest.json.out"))
            .respond_with(ResponseTemplate::new(404).set_body_string(
                "<Error><Code>NoSuchKey</Code><Message>missing</Message></Error>",
            ))
            .mount(&server)
            .await;

        let job = client(&server)
            .retrieve_batch(&CallContext::new(), &[key("k")], ARN)
            .await
            .unwrap();

        assert_eq!(job.request_counts, None);
    }

    #[tokio::test]
    async fn cancel_reports_cancelling_when_refetch_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/model-invocation-job/{ENCODED_ARN}/stop")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_json(json!({"message": "unavailable"})))
            .mount(&server)
            .await;

        let job = client(&server)
            .cancel_batch(&CallContext::new(), &[key("k")], ARN)
            .await
            .unwrap();

        assert_eq!(job.status, BatchStatus::Cancelling);
    }

    #[tokio::test]
    async fn list_batches_pages_with_next_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/model-invocation-jobs"))
            .and(query_param("nextToken", "p2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "invocationJobSummaries": [job("Completed")]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/model-invocation-jobs"))
            .and(query_param("maxResults", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "invocationJobSummaries": [job("InProgress")],
                "nextToken": "p2"
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        let client = client(&server);
        let ctx = CallContext::new();
        let keys = [key("k")];

        let first = client.list_batches(&ctx, &keys, None, Some(1)).await.unwrap();
        assert_eq!(first.data[0].status, BatchStatus::InProgress);
        assert!(first.has_more);

        let second = client
            .list_batches(&ctx, &keys, first.after.as_deref(), Some(1))
            .await
            .unwrap();
        assert_eq!(second.data[0].status, BatchStatus::Completed);
        assert!(!second.has_more);
    }

    #[tokio::test]
    async fn results_parse_every_result_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/model-invocation-job/{ENCODED_ARN}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(job("Completed")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/out-bucket/"))
            .and(query_param("list-type", "2"))
            .and(query_param("prefix", "results/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<ListBucketResult><IsTruncated>false</IsTruncated>\
                 <Contents><Key>results/abc123/nightly.jsonl.out</Key><Size>10</Size></Contents>\
                 <Contents><Key>results/abc123/manifest.json.out</Key><Size>3</Size></Contents>\
                 </ListBucketResult>",
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/out-bucket/results/abc123/nightly.jsonl.out"))
            .respond_with(ResponseTemplate::new(200).set_body_string(concat!(
                r#"{"recordId":"req-1","modelInput":{},"modelOutput":{"stopReason":"end_turn"}}"#,
                "\n",
                "not json\n",
                r#"{"recordId":"req-2","modelInput":{},"error":{"errorCode":400,"errorMessage":"bad input"}}"#,
                "\n"
            )))
            .mount(&server)
            .await;

        let results = client(&server)
            .batch_results(&CallContext::new(), &[key("k")], ARN)
            .await
            .unwrap();

        assert_eq!(results.batch_id, ARN);
        assert_eq!(results.results.len(), 2);
        assert_eq!(results.results[0].custom_id, "req-1");
        assert_eq!(results.results[1].error_code.as_deref(), Some("400"));
        assert_eq!(results.errors.len(), 1);
        assert!(results.errors[0].starts_with("s3://out-bucket/results/abc123/nightly.jsonl.out:2: "));
    }

    #[tokio::test]
    async fn results_fall_back_to_the_output_object() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/model-invocation-job/{ENCODED_ARN}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(job("Completed")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/out-bucket/"))
            .respond_with(ResponseTemplate::new(403).set_body_string(
                "<Error><Code>AccessDenied</Code><Message>no list</Message></Error>",
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/out-bucket/results"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"recordId":"only","modelInput":{},"modelOutput":{}}"#,
            ))
            .mount(&server)
            .await;

        let results = client(&server)
            .batch_results(&CallContext::new(), &[key("k")], ARN)
            .await
            .unwrap();

        assert_eq!(results.results.len(), 1);
        assert_eq!(results.results[0].custom_id, "only");
        assert!(results.errors.is_empty());
    }
}
