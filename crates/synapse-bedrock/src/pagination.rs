//! Serial pagination across an ordered credential set
//!
//! A list call pages through the first key until it is exhausted, then the
//! second, and so on. The cursor handed to callers records which key is
//! current and that key's native continuation token. It carries a checksum
//! so a tampered or truncated cursor fails instead of restarting the walk.

use std::future::Future;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use synapse_config::BedrockKey;

use crate::auth::sigv4::sha256_hex;
use crate::error::BedrockError;

const CHECKSUM_LEN: usize = 16;

/// Position in a serial walk over keys
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SerialCursor {
    pub key_index: usize,
    /// Native token for the current key; `None` means its first page
    pub token: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct Wire {
    k: usize,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    t: String,
    s: String,
}

fn checksum(index: usize, token: &str) -> String {
    let mut digest = sha256_hex(format!("{index}\n{token}").as_bytes());
    digest.truncate(CHECKSUM_LEN);
    digest
}

impl SerialCursor {
    /// Opaque URL-safe text for the caller to hand back
    pub fn encode(&self) -> String {
        let token = self.token.clone().unwrap_or_default();
        let wire = Wire {
            k: self.key_index,
            s: checksum(self.key_index, &token),
            t: token,
        };
        // Serializing a struct of plain strings and integers cannot fail
        let json = serde_json::to_vec(&wire).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    /// Decode a caller cursor; absent means the start of the walk
    pub fn decode(raw: Option<&str>, key_count: usize) -> Result<Self, BedrockError> {
        let Some(raw) = raw.filter(|r| !r.is_empty()) else {
            return Ok(Self::default());
        };

        let bytes = URL_SAFE_NO_PAD
            .decode(raw.trim())
            .map_err(|e| BedrockError::InvalidCursor(format!("not base64: {e}")))?;
        let wire: Wire =
            serde_json::from_slice(&bytes).map_err(|e| BedrockError::InvalidCursor(format!("malformed: {e}")))?;

        if wire.s != checksum(wire.k, &wire.t) {
            return Err(BedrockError::InvalidCursor("checksum mismatch".to_owned()));
        }
        if wire.k >= key_count {
            return Err(BedrockError::InvalidCursor(format!(
                "key index {} out of range for {key_count} keys",
                wire.k
            )));
        }

        Ok(Self {
            key_index: wire.k,
            token: Some(wire.t).filter(|t| !t.is_empty()),
        })
    }

    /// Where to go after the current key answered with `next_token`
    ///
    /// `None` once every key is exhausted.
    pub fn advance(&self, next_token: Option<String>, key_count: usize) -> Option<Self> {
        match next_token.filter(|t| !t.is_empty()) {
            Some(token) => Some(Self {
                key_index: self.key_index,
                token: Some(token),
            }),
            None if self.key_index + 1 < key_count => Some(Self {
                key_index: self.key_index + 1,
                token: None,
            }),
            None => None,
        }
    }
}

/// One native page from one key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_token: Option<String>,
}

/// Items of one page plus the cursor for the next call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialPage<T> {
    pub items: Vec<T>,
    pub after: Option<String>,
}

impl<T> SerialPage<T> {
    pub const fn has_more(&self) -> bool {
        self.after.is_some()
    }
}

/// Fetch exactly one native page from the key the cursor points at
pub async fn serial_page<'k, T, F, Fut>(
    keys: &'k [BedrockKey],
    after: Option<&str>,
    fetch: F,
) -> Result<SerialPage<T>, BedrockError>
where
    F: FnOnce(&'k BedrockKey, Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>, BedrockError>>,
{
    if keys.is_empty() {
        return Err(BedrockError::Configuration("no bedrock keys configured".to_owned()));
    }

    let cursor = SerialCursor::decode(after, keys.len())?;
    let page = fetch(&keys[cursor.key_index], cursor.token.clone()).await?;

    Ok(SerialPage {
        items: page.items,
        after: cursor.advance(page.next_token, keys.len()).map(|c| c.encode()),
    })
}
