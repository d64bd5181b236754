//! Shared primitives for the Synapse Bedrock adapter
//!
//! Holds the pieces every other crate leans on: the [`HttpError`] contract
//! that maps domain errors onto HTTP semantics, and the per-call
//! [`CallContext`] carrying cancellation, deadline, and structured-output
//! state through a single provider call.

mod context;
mod error;

pub use context::{CallContext, Interrupt};
pub use error::HttpError;
