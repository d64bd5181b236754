#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod args;

use std::path::Path;

use anyhow::Context as _;
use args::{Args, BatchCommand, BatchCreateArgs, ChatArgs, Command, FilesCommand, ModelsArgs};
use clap::Parser;
use futures_util::StreamExt;
use serde::Serialize;
use synapse_bedrock::BedrockClient;
use synapse_bedrock::types::{
    BatchCreateRequest, BatchRequestItem, CompletionRequest, FileListRequest, FileUploadRequest, ListModelsRequest,
    Message, StreamEvent,
};
use synapse_config::{BedrockKey, Config};
use synapse_core::CallContext;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::load(&args.config)?;

    // Initialize logging
    synapse_telemetry::init(&config.log)?;

    tracing::debug!(config_path = %args.config.display(), "loaded configuration");

    let client = BedrockClient::new(&config.bedrock)?;
    let keys = selected_keys(&config.bedrock.keys, args.key.as_deref())?;

    // Ctrl+C cancels the in-flight call
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, cancelling");
            on_signal.cancel();
        }
    });

    let mut ctx = CallContext::new().with_cancellation(cancel);
    if let Some(timeout) = args.timeout {
        ctx = ctx.with_timeout(timeout);
    }

    let cli = Cli {
        client,
        ctx,
        keys,
    };

    match args.command {
        Command::Chat(chat) => cli.chat(chat).await,
        Command::Models(models) => cli.models(models).await,
        Command::Files(files) => cli.files(files).await,
        Command::Batch(batch) => cli.batch(batch).await,
    }
}

/// Keys a call may use: just the named one, or the whole ordered set
fn selected_keys(keys: &[BedrockKey], name: Option<&str>) -> anyhow::Result<Vec<BedrockKey>> {
    match name {
        Some(name) => keys
            .iter()
            .find(|key| key.name == name)
            .map(|key| vec![key.clone()])
            .with_context(|| format!("no bedrock key named {name}")),
        None => Ok(keys.to_vec()),
    }
}

struct Cli {
    client: BedrockClient,
    ctx: CallContext,
    keys: Vec<BedrockKey>,
}

impl Cli {
    fn first_key(&self) -> anyhow::Result<&BedrockKey> {
        self.keys.first().context("no bedrock keys configured")
    }

    async fn chat(&self, args: ChatArgs) -> anyhow::Result<()> {
        let mut messages = Vec::new();
        if let Some(system) = args.system {
            messages.push(Message::system(system));
        }
        messages.push(Message::user(args.prompt));

        let mut request = CompletionRequest::new(args.model, messages);
        request.params.max_tokens = args.max_tokens;
        request.params.temperature = args.temperature;
        request.stream = args.stream;

        let key = self.first_key()?;
        if !args.stream {
            let response = self.client.chat(&self.ctx, key, &request).await?;
            return print_json(&response);
        }

        let mut events = self.client.chat_stream(&self.ctx, key, &request).await?;
        let mut stdout = tokio::io::stdout();

        while let Some(event) = events.next().await {
            match event? {
                StreamEvent::Delta(delta) => {
                    if let Some(text) = delta.content {
                        stdout.write_all(text.as_bytes()).await?;
                        stdout.flush().await?;
                    }
                }
                StreamEvent::Done { finish_reason, usage } => {
                    stdout.write_all(b"\n").await?;
                    tracing::info!(?finish_reason, ?usage, "stream finished");
                }
            }
        }

        Ok(())
    }

    async fn models(&self, args: ModelsArgs) -> anyhow::Result<()> {
        let request = ListModelsRequest {
            by_provider: args.provider,
            by_output_modality: args.output_modality,
            by_inference_type: args.inference_type,
            by_customization_type: None,
            after: args.after,
        };
        let models = self.client.list_models(&self.ctx, &self.keys, &request).await?;
        print_json(&models)
    }

    async fn files(&self, command: FilesCommand) -> anyhow::Result<()> {
        match command {
            FilesCommand::List { location, limit, after } => {
                let request = FileListRequest { location, limit, after };
                print_json(&self.client.list_files(&self.ctx, &self.keys, &request).await?)
            }
            FilesCommand::Get { id } => print_json(&self.client.retrieve_file(&self.ctx, &self.keys, &id).await?),
            FilesCommand::Delete { id } => print_json(&self.client.delete_file(&self.ctx, &self.keys, &id).await?),
            FilesCommand::Upload {
                path,
                bucket,
                prefix,
                filename,
                content_type,
            } => {
                let content = tokio::fs::read(&path)
                    .await
                    .with_context(|| format!("failed to read {}", path.display()))?;
                let request = FileUploadRequest {
                    bucket,
                    prefix,
                    filename: filename.or_else(|| local_name(&path)),
                    content: content.into(),
                    content_type,
                };
                print_json(&self.client.upload_file(&self.ctx, self.first_key()?, request).await?)
            }
            FilesCommand::Content { id, output } => {
                let file = self.client.file_content(&self.ctx, &self.keys, &id).await?;
                tracing::debug!(id = %file.id, content_type = %file.content_type, bytes = file.content.len(), "downloaded file");
                match output {
                    Some(path) => tokio::fs::write(&path, &file.content)
                        .await
                        .with_context(|| format!("failed to write {}", path.display())),
                    None => {
                        let mut stdout = tokio::io::stdout();
                        stdout.write_all(&file.content).await?;
                        stdout.flush().await?;
                        Ok(())
                    }
                }
            }
        }
    }

    async fn batch(&self, command: BatchCommand) -> anyhow::Result<()> {
        match command {
            BatchCommand::Create(create) => {
                let request = batch_request(create).await?;
                print_json(&self.client.create_batch(&self.ctx, self.first_key()?, request).await?)
            }
            BatchCommand::List { limit, after } => print_json(
                &self
                    .client
                    .list_batches(&self.ctx, &self.keys, after.as_deref(), limit)
                    .await?,
            ),
            BatchCommand::Get { id } => print_json(&self.client.retrieve_batch(&self.ctx, &self.keys, &id).await?),
            BatchCommand::Cancel { id } => print_json(&self.client.cancel_batch(&self.ctx, &self.keys, &id).await?),
            BatchCommand::Results { id } => print_json(&self.client.batch_results(&self.ctx, &self.keys, &id).await?),
        }
    }
}

async fn batch_request(args: BatchCreateArgs) -> anyhow::Result<BatchCreateRequest> {
    let requests = match &args.requests {
        Some(path) => {
            let raw = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            parse_requests(&raw)?
        }
        None => Vec::new(),
    };

    if args.input.is_none() && requests.is_empty() {
        anyhow::bail!("either --input or a non-empty --requests file is required");
    }

    Ok(BatchCreateRequest {
        model: args.model,
        input_file_id: args.input,
        requests,
        role_arn: args.role_arn,
        output_s3_uri: args.output,
        job_name: args.job_name,
        completion_window: args.window,
        tags: args.tags.into_iter().collect(),
        ..BatchCreateRequest::default()
    })
}

fn parse_requests(raw: &str) -> anyhow::Result<Vec<BatchRequestItem>> {
    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line).with_context(|| format!("request line {} is not a batch request", index + 1))
        })
        .collect()
}

fn local_name(path: &Path) -> Option<String> {
    path.file_name().map(|name| name.to_string_lossy().into_owned())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
