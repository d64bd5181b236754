//! `application/vnd.amazon.eventstream` framing
//!
//! ```text
//! | total len u32 | headers len u32 | prelude crc u32 | headers | payload | message crc u32 |
//! ```
//!
//! Both CRCs are CRC-32 (IEEE). The prelude CRC covers the first 8 bytes,
//! the message CRC everything before it.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use indexmap::IndexMap;
use thiserror::Error;

const PRELUDE_LEN: usize = 12;
const CRC_LEN: usize = 4;
const MIN_FRAME_LEN: usize = PRELUDE_LEN + CRC_LEN;

/// Upper bound for a single frame
pub const MAX_FRAME_LEN: usize = 8 * 1024 * 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame length {0} exceeds the {MAX_FRAME_LEN} byte limit")]
    TooLarge(usize),

    #[error("frame length {total} cannot hold {headers} header bytes")]
    InvalidLength { total: usize, headers: usize },

    #[error("prelude checksum mismatch (expected {expected:#010x}, got {actual:#010x})")]
    PreludeChecksum { expected: u32, actual: u32 },

    #[error("message checksum mismatch (expected {expected:#010x}, got {actual:#010x})")]
    MessageChecksum { expected: u32, actual: u32 },

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("stream ended inside a frame ({0} bytes left)")]
    Truncated(usize),
}

/// Typed header value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderValue {
    Bool(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Bytes(Bytes),
    String(String),
    /// Milliseconds since the epoch
    Timestamp(i64),
    Uuid(uuid::Uuid),
}

/// One decoded frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub headers: IndexMap<String, HeaderValue>,
    pub payload: Bytes,
}

impl Message {
    pub fn header_str(&self, name: &str) -> Option<&str> {
        match self.headers.get(name) {
            Some(HeaderValue::String(value)) => Some(value),
            _ => None,
        }
    }

    /// `event`, `exception` or `error`
    pub fn message_type(&self) -> Option<&str> {
        self.header_str(":message-type")
    }

    pub fn event_type(&self) -> Option<&str> {
        self.header_str(":event-type")
    }

    pub fn exception_type(&self) -> Option<&str> {
        self.header_str(":exception-type")
    }

    /// Anything other than a normal event ends the stream
    pub fn is_event(&self) -> bool {
        self.message_type().is_none_or(|kind| kind == "event")
    }
}

/// Incremental frame splitter over a byte stream
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: BytesMut,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Complain about leftover bytes once the body has ended
    pub fn finish(&self) -> Result<(), FrameError> {
        match self.buffer.len() {
            0 => Ok(()),
            left => Err(FrameError::Truncated(left)),
        }
    }

    /// Next complete frame, or `None` until more bytes arrive
    pub fn next_frame(&mut self) -> Result<Option<Message>, FrameError> {
        if self.buffer.len() < PRELUDE_LEN {
            return Ok(None);
        }

        let total = read_u32(&self.buffer[0..4]);
        let headers_len = read_u32(&self.buffer[4..8]);

        if total > MAX_FRAME_LEN {
            return Err(FrameError::TooLarge(total));
        }
        if total < MIN_FRAME_LEN.saturating_add(headers_len) {
            return Err(FrameError::InvalidLength {
                total,
                headers: headers_len,
            });
        }

        let expected = u32::from_be_bytes([self.buffer[8], self.buffer[9], self.buffer[10], self.buffer[11]]);
        let actual = crc32fast::hash(&self.buffer[0..8]);
        if expected != actual {
            return Err(FrameError::PreludeChecksum { expected, actual });
        }

        if self.buffer.len() < total {
            return Ok(None);
        }

        let frame = self.buffer.split_to(total).freeze();
        let payload_end = total - CRC_LEN;

        let expected = u32::from_be_bytes([
            frame[payload_end],
            frame[payload_end + 1],
            frame[payload_end + 2],
            frame[payload_end + 3],
        ]);
        let actual = crc32fast::hash(&frame[..payload_end]);
        if expected != actual {
            return Err(FrameError::MessageChecksum { expected, actual });
        }

        let headers_end = PRELUDE_LEN + headers_len;
        let headers = parse_headers(frame.slice(PRELUDE_LEN..headers_end))?;
        let payload = frame.slice(headers_end..payload_end);

        Ok(Some(Message { headers, payload }))
    }
}

fn read_u32(bytes: &[u8]) -> usize {
    let value = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    usize::try_from(value).unwrap_or(usize::MAX)
}

fn need(buf: &Bytes, len: usize, what: &str) -> Result<(), FrameError> {
    if buf.remaining() < len {
        return Err(FrameError::InvalidHeader(format!("{what} runs past the header block")));
    }
    Ok(())
}

fn parse_headers(mut buf: Bytes) -> Result<IndexMap<String, HeaderValue>, FrameError> {
    let mut headers = IndexMap::new();

    while buf.has_remaining() {
        let name_len = usize::from(buf.get_u8());
        need(&buf, name_len + 1, "header name")?;
        let name = String::from_utf8(buf.split_to(name_len).to_vec())
            .map_err(|e| FrameError::InvalidHeader(format!("header name is not UTF-8: {e}")))?;

        let value = match buf.get_u8() {
            0 => HeaderValue::Bool(true),
            1 => HeaderValue::Bool(false),
            2 => {
                need(&buf, 1, &name)?;
                HeaderValue::Byte(buf.get_i8())
            }
            3 => {
                need(&buf, 2, &name)?;
                HeaderValue::Short(buf.get_i16())
            }
            4 => {
                need(&buf, 4, &name)?;
                HeaderValue::Int(buf.get_i32())
            }
            5 => {
                need(&buf, 8, &name)?;
                HeaderValue::Long(buf.get_i64())
            }
            kind @ (6 | 7) => {
                need(&buf, 2, &name)?;
                let len = usize::from(buf.get_u16());
                need(&buf, len, &name)?;
                let raw = buf.split_to(len);
                if kind == 6 {
                    HeaderValue::Bytes(raw)
                } else {
                    let value = String::from_utf8(raw.to_vec())
                        .map_err(|e| FrameError::InvalidHeader(format!("{name} is not UTF-8: {e}")))?;
                    HeaderValue::String(value)
                }
            }
            8 => {
                need(&buf, 8, &name)?;
                HeaderValue::Timestamp(buf.get_i64())
            }
            9 => {
                need(&buf, 16, &name)?;
                HeaderValue::Uuid(uuid::Uuid::from_u128(buf.get_u128()))
            }
            other => return Err(FrameError::InvalidHeader(format!("{name} has unknown type {other}"))),
        };

        headers.insert(name, value);
    }

    Ok(headers)
}

/// Build a frame with string headers
pub fn encode(headers: &[(&str, &str)], payload: &[u8]) -> Bytes {
    let mut header_block = BytesMut::new();
    for (name, value) in headers {
        header_block.put_u8(u8::try_from(name.len()).unwrap_or(u8::MAX));
        header_block.put_slice(&name.as_bytes()[..name.len().min(usize::from(u8::MAX))]);
        header_block.put_u8(7);
        let value = &value.as_bytes()[..value.len().min(usize::from(u16::MAX))];
        header_block.put_u16(u16::try_from(value.len()).unwrap_or(u16::MAX));
        header_block.put_slice(value);
    }

    let total = MIN_FRAME_LEN + header_block.len() + payload.len();
    let mut frame = BytesMut::with_capacity(total);
    frame.put_u32(u32::try_from(total).unwrap_or(u32::MAX));
    frame.put_u32(u32::try_from(header_block.len()).unwrap_or(u32::MAX));
    let prelude_crc = crc32fast::hash(&frame[..8]);
    frame.put_u32(prelude_crc);
    frame.put_slice(&header_block);
    frame.put_slice(payload);
    let message_crc = crc32fast::hash(&frame);
    frame.put_u32(message_crc);

    frame.freeze()
}

/// Frame carrying one Bedrock stream event
pub fn event(event_type: &str, payload: &[u8]) -> Bytes {
    encode(
        &[
            (":event-type", event_type),
            (":content-type", "application/json"),
            (":message-type", "event"),
        ],
        payload,
    )
}

/// Frame carrying a Bedrock stream exception
pub fn exception(exception_type: &str, payload: &[u8]) -> Bytes {
    encode(
        &[
            (":exception-type", exception_type),
            (":content-type", "application/json"),
            (":message-type", "exception"),
        ],
        payload,
    )
}
