//! AWS Bedrock adapter for the Synapse gateway
//!
//! Translates unified chat, text-completion and image requests into Bedrock's
//! Converse and per-family invoke dialects, signs them, and normalises the
//! replies (including binary event-stream frames) back into the unified
//! shapes. Files and batch jobs are orchestrated over S3 and the Bedrock
//! control plane across an ordered set of credentials.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod auth;
pub mod batch;
pub mod client;
pub mod convert;
pub mod error;
pub mod eventstream;
pub mod models;
pub mod pagination;
pub mod protocol;
pub mod storage;
pub mod stream;
pub mod types;

pub use client::{BedrockClient, InvokeOutput};
pub use error::{BedrockError, ProviderError};
pub use pagination::SerialCursor;
pub use stream::EventStream;
pub use types::{CompletionRequest, CompletionResponse, StreamEvent};
