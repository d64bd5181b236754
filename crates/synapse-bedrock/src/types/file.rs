use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A stored object, addressed by its `s3://bucket/key` URI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileObject {
    /// `s3://bucket/key`
    pub id: String,
    /// Always "file"
    pub object: String,
    pub bytes: u64,
    /// Unix seconds, from the object's last-modified time
    pub created_at: i64,
    /// Last path segment of the key
    pub filename: String,
    pub purpose: String,
    pub status: String,
}

impl FileObject {
    pub(crate) fn processed(id: String, bytes: u64, created_at: i64, filename: String) -> Self {
        Self {
            id,
            object: "file".to_owned(),
            bytes,
            created_at,
            filename,
            purpose: "batch".to_owned(),
            status: "processed".to_owned(),
        }
    }
}

/// Upload a new object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUploadRequest {
    /// Target bucket
    pub bucket: String,
    /// Key prefix, joined to the filename with `/`
    pub prefix: Option<String>,
    /// Defaults to `file-{nanos}.jsonl`
    pub filename: Option<String>,
    pub content: Bytes,
    pub content_type: Option<String>,
}

/// List objects under an `s3://bucket/prefix` location
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileListRequest {
    pub location: String,
    pub limit: Option<u32>,
    /// Opaque cursor from a previous page
    pub after: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileList {
    pub data: Vec<FileObject>,
    pub has_more: bool,
    /// Cursor for the next page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDeleted {
    pub id: String,
    pub object: String,
    pub deleted: bool,
}

/// Downloaded object body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContent {
    pub id: String,
    pub content: Bytes,
    /// From the reply's `Content-Type`, `application/octet-stream` if absent
    pub content_type: String,
}
