//! Document content blocks

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use crate::error::BedrockError;
use crate::protocol::converse::{BlockSource, DocumentBlock};
use crate::types::ContentPart;

/// MIME type of a Bedrock document format code
///
/// Unknown codes read as PDF.
pub fn mime_type(format: &str) -> &'static str {
    match format {
        "txt" => "text/plain",
        "md" => "text/markdown",
        "html" => "text/html",
        "csv" => "text/csv",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        _ => "application/pdf",
    }
}

/// Bedrock document format code of a MIME type
pub fn format_code(mime: &str) -> Option<&'static str> {
    let code = match mime.split(';').next().unwrap_or_default().trim() {
        "application/pdf" => "pdf",
        "text/plain" => "txt",
        "text/markdown" => "md",
        "text/html" => "html",
        "text/csv" => "csv",
        "application/msword" => "doc",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => "docx",
        "application/vnd.ms-excel" => "xls",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => "xlsx",
        _ => return None,
    };

    Some(code)
}

const fn is_text_format(code: &str) -> bool {
    matches!(code.as_bytes(), b"txt" | b"md" | b"html" | b"csv")
}

/// Unified file part for a document block
pub fn to_file_part(block: DocumentBlock) -> ContentPart {
    let file_data = block.source.bytes.or(block.source.text);

    ContentPart::File {
        file_data,
        filename: Some(block.name),
        file_type: Some(mime_type(&block.format).to_owned()),
    }
}

/// Document block for a unified file part
///
/// `file_data` may be a bare base64 payload, a `data:` URI or, for text
/// formats, plain text.
pub fn from_file_part(
    file_data: Option<&str>,
    filename: Option<&str>,
    file_type: Option<&str>,
) -> Result<DocumentBlock, BedrockError> {
    let data = file_data
        .filter(|d| !d.is_empty())
        .ok_or_else(|| BedrockError::InvalidRequest("file content part has no file_data".to_owned()))?;

    let (mime, payload) = match data.strip_prefix("data:").and_then(|rest| rest.split_once(',')) {
        Some((header, payload)) => (header.strip_suffix(";base64").or(Some(header)), payload),
        None => (file_type, data),
    };

    let format = mime.and_then(format_code).unwrap_or("pdf");

    let source = if is_text_format(format) && STANDARD.decode(payload).is_err() {
        BlockSource {
            bytes: None,
            text: Some(payload.to_owned()),
        }
    } else {
        BlockSource {
            bytes: Some(payload.to_owned()),
            text: None,
        }
    };

    Ok(DocumentBlock {
        format: format.to_owned(),
        name: sanitize_name(filename.unwrap_or("document")),
        source,
    })
}

/// Bedrock only allows alphanumerics, whitespace, hyphens, parentheses and
/// square brackets in document names and rejects consecutive whitespace
fn sanitize_name(name: &str) -> String {
    let stem = name.rsplit_once('.').map_or(name, |(stem, _)| stem);

    let mut out = String::with_capacity(stem.len());
    for c in stem.chars() {
        let c = if c.is_ascii_alphanumeric() || matches!(c, '-' | '(' | ')' | '[' | ']') {
            c
        } else {
            ' '
        };

        if !(c == ' ' && out.ends_with(' ')) {
            out.push(c);
        }
    }

    let trimmed = out.trim();
    if trimmed.is_empty() { "document".to_owned() } else { trimmed.to_owned() }
}
