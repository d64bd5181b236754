//! Translation between the unified types and native Bedrock shapes
//!
//! Everything in here is pure: no I/O, no clocks other than timestamps on
//! freshly built responses.

pub mod batch;
pub mod converse;
pub mod document;
pub mod family;
pub mod image;
pub mod invoke;
pub mod text;

pub use family::ModelFamily;

use crate::types::ExtraParams;

/// Unix seconds, for `created` fields
pub(crate) fn unix_now() -> u64 {
    u64::try_from(jiff::Timestamp::now().as_second()).unwrap_or_default()
}

/// Extras minus the keys a native body already sets as typed members
pub(crate) fn residual_extras(mut extra: ExtraParams, fields: &[&str]) -> ExtraParams {
    extra.retain(|key, _| {
        let typed = fields.contains(&key.as_str());
        if typed {
            tracing::debug!(field = %key, "extra param shadowed by a typed field");
        }
        !typed
    });
    extra
}
