use std::path::PathBuf;
use std::time::Duration;

use clap::{Args as ClapArgs, Parser, Subcommand};

/// Synapse Bedrock adapter
#[derive(Debug, Parser)]
#[command(name = "synapse-bedrock", about = "Talk to AWS Bedrock through the Synapse adapter")]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "synapse-bedrock.toml", env = "SYNAPSE_CONFIG")]
    pub config: PathBuf,

    /// Credential to use for single-key calls; defaults to the first key
    #[arg(short, long, env = "SYNAPSE_BEDROCK_KEY")]
    pub key: Option<String>,

    /// Give up on the call after this long (e.g. `30s`, `2m`)
    #[arg(long, value_parser = parse_duration)]
    pub timeout: Option<Duration>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Send one chat turn
    Chat(ChatArgs),
    /// List foundation models visible to the configured keys
    Models(ModelsArgs),
    /// Manage S3-backed files
    #[command(subcommand)]
    Files(FilesCommand),
    /// Manage batch inference jobs
    #[command(subcommand)]
    Batch(BatchCommand),
}

#[derive(Debug, ClapArgs)]
pub struct ChatArgs {
    /// Model id or deployment alias
    #[arg(short, long)]
    pub model: String,

    /// User message
    pub prompt: String,

    /// Optional system prompt
    #[arg(long)]
    pub system: Option<String>,

    #[arg(long)]
    pub max_tokens: Option<u32>,

    #[arg(long)]
    pub temperature: Option<f64>,

    /// Print deltas as they arrive
    #[arg(long)]
    pub stream: bool,
}

#[derive(Debug, ClapArgs)]
pub struct ModelsArgs {
    #[arg(long)]
    pub provider: Option<String>,

    #[arg(long)]
    pub output_modality: Option<String>,

    #[arg(long)]
    pub inference_type: Option<String>,

    /// Cursor from a previous page
    #[arg(long)]
    pub after: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum FilesCommand {
    /// List files under an `s3://bucket/prefix` location
    List {
        location: String,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long)]
        after: Option<String>,
    },
    /// Show one file's metadata
    Get { id: String },
    Delete { id: String },
    /// Upload a local file
    Upload {
        path: PathBuf,
        /// Target `s3://bucket[/prefix]`
        #[arg(long)]
        bucket: String,
        #[arg(long)]
        prefix: Option<String>,
        /// Defaults to the local file name
        #[arg(long)]
        filename: Option<String>,
        #[arg(long)]
        content_type: Option<String>,
    },
    /// Write a file's content to stdout or `--output`
    Content {
        id: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Subcommand)]
pub enum BatchCommand {
    /// Submit a job
    Create(BatchCreateArgs),
    List {
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long)]
        after: Option<String>,
    },
    Get { id: String },
    Cancel { id: String },
    /// Download and print the job's result records
    Results { id: String },
}

#[derive(Debug, ClapArgs)]
pub struct BatchCreateArgs {
    #[arg(short, long)]
    pub model: String,

    /// Existing `s3://` JSONL input
    #[arg(long, conflicts_with = "requests")]
    pub input: Option<String>,

    /// Local JSONL of `{"custom_id": .., "body": {..}}` lines to upload
    #[arg(long)]
    pub requests: Option<PathBuf>,

    #[arg(long)]
    pub role_arn: Option<String>,

    #[arg(long)]
    pub output: Option<String>,

    #[arg(long)]
    pub job_name: Option<String>,

    /// Completion window (e.g. `24h`)
    #[arg(long, value_parser = parse_duration)]
    pub window: Option<Duration>,

    /// `key=value`, repeatable
    #[arg(long = "tag", value_parser = parse_tag)]
    pub tags: Vec<(String, String)>,
}

fn parse_duration(raw: &str) -> Result<Duration, String> {
    duration_str::parse(raw)
}

fn parse_tag(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(key, value)| (key.trim().to_owned(), value.trim().to_owned()))
        .filter(|(key, _)| !key.is_empty())
        .ok_or_else(|| format!("expected key=value, got {raw}"))
}
