//! Native Bedrock wire formats
//!
//! Pure serde shapes, no behaviour. Conversion to and from the unified
//! types lives in [`crate::convert`].

pub mod control;
pub mod converse;
pub mod invoke;
pub mod native;
