use std::fmt;

use crate::auth::sigv4::uri_encode;
use crate::error::BedrockError;

const SCHEME: &str = "s3://";

/// A bucket plus a key, parsed from `s3://bucket/key` or a bare bucket name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectLocation {
    pub bucket: String,
    /// May be empty (the whole bucket) or end in `/` (a prefix)
    pub key: String,
}

impl ObjectLocation {
    /// Split on the first `/` after the scheme; a bare name is a bucket with an empty key
    pub fn parse(uri: &str) -> Result<Self, BedrockError> {
        let rest = uri.trim().strip_prefix(SCHEME).unwrap_or_else(|| uri.trim());
        let (bucket, key) = rest.split_once('/').unwrap_or((rest, ""));

        if bucket.is_empty() {
            return Err(BedrockError::InvalidRequest(format!("invalid s3 location {uri:?}: missing bucket")));
        }

        Ok(Self {
            bucket: bucket.to_owned(),
            key: key.to_owned(),
        })
    }

    /// Key under this location, treating the current key as a prefix
    pub fn join(&self, name: &str) -> Self {
        let key = match self.key.trim_end_matches('/') {
            "" => name.to_owned(),
            prefix => format!("{prefix}/{name}"),
        };
        Self {
            bucket: self.bucket.clone(),
            key,
        }
    }

    /// Sibling location in the same bucket
    pub fn with_key(&self, key: impl Into<String>) -> Self {
        Self {
            bucket: self.bucket.clone(),
            key: key.into(),
        }
    }

    /// Last path segment of the key
    pub fn filename(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or_default()
    }

    /// Key percent-encoded for a request path
    pub fn escaped_key(&self) -> String {
        escape_key(&self.key)
    }

    /// `bucket/key`, for error context
    pub fn resource(&self) -> String {
        format!("{}/{}", self.bucket, self.key)
    }
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SCHEME}{}/{}", self.bucket, self.key)
    }
}

/// Percent-encode each `/`-separated segment; the separator stays literal
pub fn escape_key(key: &str) -> String {
    key.split('/').map(uri_encode).collect::<Vec<_>>().join("/")
}
