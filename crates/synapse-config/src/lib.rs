#![allow(clippy::must_use_candidate)]

pub mod bedrock;
mod env;
mod loader;
pub mod log;

use serde::Deserialize;

pub use bedrock::*;
pub use log::*;

/// Top-level configuration for the Bedrock adapter
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Log filter and output format
    #[serde(default)]
    pub log: LogConfig,
    /// Bedrock regions, endpoints and the ordered credential set
    #[serde(default)]
    pub bedrock: BedrockConfig,
}
