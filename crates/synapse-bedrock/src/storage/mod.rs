//! S3 object storage and the Files API built on it
//!
//! Files are plain S3 objects; a file id is its `s3://bucket/key` URI.
//! Uploads use one key; lookups try every key in order.

pub mod list;
pub mod uri;
pub mod xml;

use bytes::Bytes;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, LAST_MODIFIED};
use http::{HeaderMap, HeaderValue, Method};
use synapse_config::BedrockKey;
use synapse_core::CallContext;
use tracing::{debug, warn};

pub use list::{ListPage, ObjectEntry, parse_list};
pub use uri::{ObjectLocation, escape_key};

use crate::auth::Service;
use crate::client::{BedrockClient, read_body, request, try_each_key};
use crate::convert::unix_now;
use crate::error::BedrockError;
use crate::pagination::{Page, serial_page};
use crate::types::{FileContent, FileDeleted, FileList, FileListRequest, FileObject, FileUploadRequest};

const OCTET_STREAM: &str = "application/octet-stream";

/// Metadata from a `HEAD`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectMeta {
    pub size: u64,
    /// Unix seconds, zero when the reply carried no usable `Last-Modified`
    pub modified: i64,
}

fn header_str<'a>(headers: &'a HeaderMap, name: http::HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

impl ObjectMeta {
    fn from_headers(headers: &HeaderMap) -> Self {
        let size = header_str(headers, CONTENT_LENGTH)
            .and_then(|v| v.parse().ok())
            .unwrap_or_default();
        let modified = header_str(headers, LAST_MODIFIED).map_or(0, |raw| {
            jiff::fmt::rfc2822::parse(raw).map_or_else(
                |e| {
                    warn!(value = raw, error = %e, "unparseable Last-Modified");
                    0
                },
                |zoned| zoned.timestamp().as_second(),
            )
        });
        Self { size, modified }
    }
}

fn file_object(location: &ObjectLocation, size: u64, modified: i64) -> FileObject {
    FileObject::processed(location.to_string(), size, modified, location.filename().to_owned())
}

/// Key for an upload: bucket prefix, then request prefix, then filename
fn upload_location(request: &FileUploadRequest) -> Result<ObjectLocation, BedrockError> {
    let bucket = ObjectLocation::parse(&request.bucket)?;
    let prefix = format!("{}{}", bucket.key, request.prefix.as_deref().unwrap_or_default());
    let prefix = prefix.trim_matches('/');

    let filename = match request.filename.as_deref().filter(|f| !f.is_empty()) {
        Some(name) => name.to_owned(),
        None => format!("file-{}.jsonl", jiff::Timestamp::now().as_nanosecond()),
    };

    let key = if prefix.is_empty() {
        filename
    } else {
        format!("{prefix}/{filename}")
    };
    Ok(bucket.with_key(key))
}

impl BedrockClient {
    // -- Objects --

    pub(crate) async fn put_object(
        &self,
        ctx: &CallContext,
        key: &BedrockKey,
        location: &ObjectLocation,
        content: Vec<u8>,
        content_type: &str,
    ) -> Result<(), BedrockError> {
        let url = self.object_url(key, location)?;
        let mut put = request(Method::PUT, url, Some(content));
        if let Ok(value) = HeaderValue::from_str(content_type) {
            put.headers_mut().insert(CONTENT_TYPE, value);
        }

        debug!(location = %location, "uploading object");
        self.send(ctx, key, Service::S3, put, &location.resource()).await?;
        Ok(())
    }

    pub(crate) async fn head_object(
        &self,
        ctx: &CallContext,
        key: &BedrockKey,
        location: &ObjectLocation,
    ) -> Result<ObjectMeta, BedrockError> {
        let url = self.object_url(key, location)?;
        let response = self
            .send(ctx, key, Service::S3, request(Method::HEAD, url, None), &location.resource())
            .await?;
        Ok(ObjectMeta::from_headers(response.headers()))
    }

    /// Body plus `Content-Type`
    pub(crate) async fn get_object(
        &self,
        ctx: &CallContext,
        key: &BedrockKey,
        location: &ObjectLocation,
    ) -> Result<(Bytes, Option<String>), BedrockError> {
        let url = self.object_url(key, location)?;
        let response = self
            .send(ctx, key, Service::S3, request(Method::GET, url, None), &location.resource())
            .await?;
        let content_type = header_str(response.headers(), CONTENT_TYPE).map(str::to_owned);
        let body = read_body(ctx, response).await?;
        Ok((body, content_type))
    }

    pub(crate) async fn delete_object(
        &self,
        ctx: &CallContext,
        key: &BedrockKey,
        location: &ObjectLocation,
    ) -> Result<(), BedrockError> {
        let url = self.object_url(key, location)?;
        self.send(ctx, key, Service::S3, request(Method::DELETE, url, None), &location.resource())
            .await?;
        Ok(())
    }

    /// One `ListObjectsV2` page under `prefix`
    pub(crate) async fn list_objects(
        &self,
        ctx: &CallContext,
        key: &BedrockKey,
        prefix: &ObjectLocation,
        token: Option<&str>,
        limit: Option<u32>,
    ) -> Result<ListPage, BedrockError> {
        let mut url = self.object_url(key, &prefix.with_key(""))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("list-type", "2");
            query.append_pair("prefix", &prefix.key);
            if let Some(limit) = limit {
                query.append_pair("max-keys", &limit.to_string());
            }
            if let Some(token) = token {
                query.append_pair("continuation-token", token);
            }
        }

        let body = self
            .send_bytes(ctx, key, Service::S3, request(Method::GET, url, None), &prefix.resource())
            .await?;
        parse_list(&body)
    }

    // -- Files --

    /// Upload `request.content` and return the new file
    pub async fn upload_file(
        &self,
        ctx: &CallContext,
        key: &BedrockKey,
        request: FileUploadRequest,
    ) -> Result<FileObject, BedrockError> {
        let location = upload_location(&request)?;
        let size = request.content.len() as u64;
        let content_type = request.content_type.as_deref().unwrap_or(OCTET_STREAM);

        self.put_object(ctx, key, &location, request.content.to_vec(), content_type)
            .await?;

        Ok(file_object(&location, size, i64::try_from(unix_now()).unwrap_or_default()))
    }

    /// Page through objects under `request.location`, one key at a time
    pub async fn list_files(
        &self,
        ctx: &CallContext,
        keys: &[BedrockKey],
        request: &FileListRequest,
    ) -> Result<FileList, BedrockError> {
        let prefix = ObjectLocation::parse(&request.location)?;

        let page = serial_page(keys, request.after.as_deref(), |key, token| {
            let prefix = &prefix;
            async move {
                let listing = self
                    .list_objects(ctx, key, prefix, token.as_deref(), request.limit)
                    .await?;
                let next_token = listing.next_token().map(str::to_owned);
                let items = listing
                    .contents
                    .iter()
                    .map(|entry| file_object(&prefix.with_key(entry.key.clone()), entry.size, entry.modified_unix()))
                    .collect();
                Ok(Page { items, next_token })
            }
        })
        .await?;

        Ok(FileList {
            has_more: page.has_more(),
            data: page.items,
            after: page.after,
        })
    }

    /// Metadata of one file, from the first key that can see it
    pub async fn retrieve_file(
        &self,
        ctx: &CallContext,
        keys: &[BedrockKey],
        id: &str,
    ) -> Result<FileObject, BedrockError> {
        let location = ObjectLocation::parse(id)?;
        let meta = try_each_key(keys, "retrieve file", |key| self.head_object(ctx, key, &location)).await?;
        Ok(file_object(&location, meta.size, meta.modified))
    }

    pub async fn delete_file(
        &self,
        ctx: &CallContext,
        keys: &[BedrockKey],
        id: &str,
    ) -> Result<FileDeleted, BedrockError> {
        let location = ObjectLocation::parse(id)?;
        try_each_key(keys, "delete file", |key| self.delete_object(ctx, key, &location)).await?;

        Ok(FileDeleted {
            id: location.to_string(),
            object: "file".to_owned(),
            deleted: true,
        })
    }

    pub async fn file_content(
        &self,
        ctx: &CallContext,
        keys: &[BedrockKey],
        id: &str,
    ) -> Result<FileContent, BedrockError> {
        let location = ObjectLocation::parse(id)?;
        let (content, content_type) =
            try_each_key(keys, "download file", |key| self.get_object(ctx, key, &location)).await?;

        Ok(FileContent {
            id: location.to_string(),
            content,
            content_type: content_type.unwrap_or_else(|| OCTET_STREAM.to_owned()),
        })
    }
}
