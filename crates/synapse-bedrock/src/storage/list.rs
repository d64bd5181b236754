use serde::Deserialize;
use tracing::warn;

use super::xml;
use crate::error::BedrockError;

/// One page of a `ListObjectsV2` reply
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPage {
    #[serde(default)]
    pub contents: Vec<ObjectEntry>,
    #[serde(default)]
    pub is_truncated: bool,
    #[serde(default)]
    pub next_continuation_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectEntry {
    pub key: String,
    #[serde(default)]
    pub size: u64,
    /// RFC 3339 timestamp as sent
    #[serde(default)]
    pub last_modified: Option<String>,
}

impl ObjectEntry {
    /// Last-modified time in unix seconds, zero when absent or unparseable
    pub fn modified_unix(&self) -> i64 {
        self.last_modified
            .as_deref()
            .map_or(0, |raw| match raw.parse::<jiff::Timestamp>() {
                Ok(ts) => ts.as_second(),
                Err(e) => {
                    warn!(key = %self.key, error = %e, "unparseable LastModified");
                    0
                }
            })
    }
}

impl ListPage {
    /// Continuation token to request next, if this page was truncated
    pub fn next_token(&self) -> Option<&str> {
        if self.is_truncated {
            self.next_continuation_token.as_deref().filter(|t| !t.is_empty())
        } else {
            None
        }
    }
}

/// Parse a listing that is either JSON or the S3 XML dialect
///
/// JSON is only trusted when it actually lists something; anything else is
/// read as XML.
pub fn parse_list(body: &[u8]) -> Result<ListPage, BedrockError> {
    if let Ok(page) = serde_json::from_slice::<ListPage>(body)
        && !page.contents.is_empty()
    {
        return Ok(page);
    }

    let text = std::str::from_utf8(body).map_err(|e| BedrockError::decode("object listing", e))?;
    if !text.contains("ListBucketResult") {
        return Err(BedrockError::Decode("object listing is neither JSON nor ListBucketResult XML".to_owned()));
    }

    let contents = xml::blocks(text, "Contents")
        .into_iter()
        .filter_map(|block| {
            let key = xml::tag(block, "Key")?;
            let size = xml::tag(block, "Size")
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or_default();
            Some(ObjectEntry {
                key,
                size,
                last_modified: xml::tag(block, "LastModified"),
            })
        })
        .collect();

    Ok(ListPage {
        contents,
        is_truncated: xml::tag(text, "IsTruncated").is_some_and(|t| t.trim() == "true"),
        next_continuation_token: xml::tag(text, "NextContinuationToken"),
    })
}
