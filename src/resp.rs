//! Redis Serialization Protocol (RESP) codec.
//!
//! Requests arrive as arrays of bulk strings and are decoded incrementally: the
//! connection keeps one `BytesMut` per peer, appends whatever the socket hands
//! over and asks [`decode_command`] for the next frame. A frame is only consumed
//! once it has been verified to be complete, so a request split across several
//! reads or several pipelined requests in a single read both decode correctly.
//! A [`CommandDecoder`] remembers how far it got into a partial frame, so each
//! read only scans the bytes that arrived since the last one.
//!
//! Replies are modelled by [`RespValue`] and written with [`RespValue::encode`].

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

const CRLF: &[u8] = b"\r\n";

/// Largest bulk string accepted from a peer (same limit Redis applies).
pub const MAX_BULK_LENGTH: i64 = 512 * 1024 * 1024;
/// Largest number of elements accepted in one request array.
pub const MAX_ARRAY_LENGTH: i64 = 1024 * 1024;
/// A length line longer than this can never hold a valid decimal length.
const MAX_LENGTH_LINE: usize = 32;
/// Deepest array nesting accepted in a reply.
pub const MAX_NESTING_DEPTH: usize = 128;

/// Errors produced while decoding RESP frames.
#[derive(Error, Debug, PartialEq, Clone)]
pub enum RespError {
    #[error("expected '*', got '{0}'")]
    ExpectedArray(char),
    #[error("expected '$', got '{0}'")]
    ExpectedBulkString(char),
    #[error("unknown RESP type '{0}'")]
    UnknownRespType(char),
    #[error("invalid multibulk length")]
    InvalidMultibulkLength,
    #[error("invalid bulk length")]
    InvalidBulkLength,
    #[error("bulk string is not terminated by CRLF")]
    UnterminatedBulkString,
    #[error("failed to parse integer")]
    FailedToParseInteger,
    #[error("invalid UTF-8 sequence")]
    InvalidUtf8,
    #[error("frame is truncated")]
    Truncated,
    #[error("reply nests arrays too deeply")]
    NestingTooDeep,
}

impl RespError {
    /// The error reply sent to a client whose request could not be decoded.
    pub fn as_resp(&self) -> RespValue {
        RespValue::Error(format!("ERR Protocol error: {}", self))
    }
}

/// A single RESP value.
#[derive(Debug, Clone, PartialEq)]
pub enum RespValue {
    SimpleString(String),
    Error(String),
    Integer(i64),
    BulkString(Bytes),
    NullBulkString,
    Array(Vec<RespValue>),
}

impl RespValue {
    /// Builds the array-of-bulk-strings form used to send a command to a peer.
    pub fn command(parts: &[&str]) -> Self {
        RespValue::Array(
            parts
                .iter()
                .map(|part| RespValue::BulkString(Bytes::copy_from_slice(part.as_bytes())))
                .collect(),
        )
    }

    pub fn encode(&self) -> Bytes {
        let mut dst = BytesMut::new();
        self.encode_into(&mut dst);
        dst.freeze()
    }

    pub fn encode_into(&self, dst: &mut BytesMut) {
        match self {
            RespValue::SimpleString(text) => {
                dst.put_u8(b'+');
                dst.extend_from_slice(text.as_bytes());
                dst.extend_from_slice(CRLF);
            }
            RespValue::Error(text) => {
                dst.put_u8(b'-');
                dst.extend_from_slice(text.as_bytes());
                dst.extend_from_slice(CRLF);
            }
            RespValue::Integer(value) => {
                dst.put_u8(b':');
                dst.extend_from_slice(value.to_string().as_bytes());
                dst.extend_from_slice(CRLF);
            }
            RespValue::BulkString(data) => {
                dst.put_u8(b'$');
                dst.extend_from_slice(data.len().to_string().as_bytes());
                dst.extend_from_slice(CRLF);
                dst.extend_from_slice(data);
                dst.extend_from_slice(CRLF);
            }
            RespValue::NullBulkString => dst.extend_from_slice(b"$-1\r\n"),
            RespValue::Array(elements) => {
                dst.put_u8(b'*');
                dst.extend_from_slice(elements.len().to_string().as_bytes());
                dst.extend_from_slice(CRLF);
                for element in elements {
                    element.encode_into(dst);
                }
            }
        }
    }

    /// Decodes one reply of any RESP type from the front of `buffer`.
    ///
    /// Returns `Ok(None)` without touching the buffer when the reply is not
    /// complete yet.
    pub fn decode(buffer: &mut BytesMut) -> Result<Option<RespValue>, RespError> {
        match parse_value(buffer, 0, 0)? {
            Some((value, consumed)) => {
                buffer.advance(consumed);
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }
}

/// Incremental request decoder for one connection.
///
/// Between calls the decoder keeps the position reached in a partial frame.
/// The buffer passed to [`CommandDecoder::decode`] must only grow at the end
/// until a frame is returned; after anything else consumes or clears it, call
/// [`CommandDecoder::reset`].
#[derive(Debug, Default)]
pub struct CommandDecoder {
    progress: Option<ScanProgress>,
}

/// Bulk strings still missing from the frame being scanned, and where the next
/// one starts.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ScanProgress {
    remaining: usize,
    position: usize,
}

impl CommandDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes one request frame from the front of `buffer`.
    ///
    /// * `Ok(Some(arguments))` - exactly one frame was consumed; anything after
    ///   it stays buffered for the next call.
    /// * `Ok(None)` - more bytes are needed, the buffer is left untouched.
    /// * `Err(_)` - the bytes can never form a valid request. The decoder is
    ///   reset.
    ///
    /// The arguments share the buffer's allocation, nothing is copied.
    pub fn decode(&mut self, buffer: &mut BytesMut) -> Result<Option<Vec<Bytes>>, RespError> {
        let frame_length = match scan_command(buffer, &mut self.progress) {
            Ok(Some(frame_length)) => frame_length,
            Ok(None) => return Ok(None),
            Err(err) => {
                self.reset();
                return Err(err);
            }
        };

        let frame = buffer.split_to(frame_length).freeze();
        split_command(&frame).map(Some)
    }

    /// Forgets any partially scanned frame.
    pub fn reset(&mut self) {
        self.progress = None;
    }
}

/// Decodes one request frame from the front of `buffer`, scanning it from the
/// start. See [`CommandDecoder::decode`].
pub fn decode_command(buffer: &mut BytesMut) -> Result<Option<Vec<Bytes>>, RespError> {
    CommandDecoder::new().decode(buffer)
}

/// One-shot variant of [`decode_command`] for a self-contained input slice.
///
/// A frame that ends early is reported as [`RespError::Truncated`]; bytes
/// after the first frame are ignored.
pub fn parse_command(input: &[u8]) -> Result<Vec<Bytes>, RespError> {
    let mut buffer = BytesMut::from(input);
    decode_command(&mut buffer)?.ok_or(RespError::Truncated)
}

/// Decodes the snapshot body that follows `+FULLRESYNC`.
///
/// The body is framed like a bulk string but carries no trailing CRLF.
pub fn decode_snapshot(buffer: &mut BytesMut) -> Result<Option<Bytes>, RespError> {
    let Some(&marker) = buffer.first() else {
        return Ok(None);
    };

    if marker != b'$' {
        return Err(RespError::ExpectedBulkString(marker as char));
    }

    let Some((length, start)) = read_length(buffer, 1, RespError::InvalidBulkLength)? else {
        return Ok(None);
    };

    if !(0..=MAX_BULK_LENGTH).contains(&length) {
        return Err(RespError::InvalidBulkLength);
    }

    let end = start + length as usize;
    if buffer.len() < end {
        return Ok(None);
    }

    buffer.advance(start);
    Ok(Some(buffer.split_to(end - start).freeze()))
}

/// Writes a snapshot body in the framing read by [`decode_snapshot`].
pub fn encode_snapshot(payload: &[u8], dst: &mut BytesMut) {
    dst.put_u8(b'$');
    dst.extend_from_slice(payload.len().to_string().as_bytes());
    dst.extend_from_slice(CRLF);
    dst.extend_from_slice(payload);
}

/// Verifies that `buffer` starts with a complete request frame and returns its
/// length in bytes. Nothing is allocated.
///
/// Scanning resumes from `progress` and leaves it pointing at the first
/// incomplete bulk string when the frame is still partial.
fn scan_command(
    buffer: &[u8],
    progress: &mut Option<ScanProgress>,
) -> Result<Option<usize>, RespError> {
    let mut scan = match *progress {
        Some(scan) => scan,
        None => {
            let Some(&marker) = buffer.first() else {
                return Ok(None);
            };

            if marker != b'*' {
                return Err(RespError::ExpectedArray(marker as char));
            }

            let Some((count, position)) =
                read_length(buffer, 1, RespError::InvalidMultibulkLength)?
            else {
                return Ok(None);
            };

            ScanProgress {
                remaining: array_length(count)?,
                position,
            }
        }
    };

    while scan.remaining > 0 {
        let Some((_, end)) = scan_bulk(buffer, scan.position)? else {
            *progress = Some(scan);
            return Ok(None);
        };
        scan.position = end + CRLF.len();
        scan.remaining -= 1;
    }

    *progress = None;
    Ok(Some(scan.position))
}

/// Splits a frame already verified by [`scan_command`] into its arguments.
fn split_command(frame: &Bytes) -> Result<Vec<Bytes>, RespError> {
    let (count, mut position) =
        read_length(frame, 1, RespError::InvalidMultibulkLength)?.ok_or(RespError::Truncated)?;
    let count = array_length(count)?;
    let mut arguments = Vec::with_capacity(count);

    for _ in 0..count {
        let (start, end) = scan_bulk(frame, position)?.ok_or(RespError::Truncated)?;
        arguments.push(frame.slice(start..end));
        position = end + CRLF.len();
    }

    Ok(arguments)
}

/// Returns the payload range of the request bulk string starting at
/// `position`, once the payload and its CRLF are fully buffered.
fn scan_bulk(buffer: &[u8], position: usize) -> Result<Option<(usize, usize)>, RespError> {
    match buffer.get(position) {
        None => return Ok(None),
        Some(b'$') => {}
        Some(&other) => return Err(RespError::ExpectedBulkString(other as char)),
    }

    let Some((length, start)) = read_length(buffer, position + 1, RespError::InvalidBulkLength)?
    else {
        return Ok(None);
    };

    if !(0..=MAX_BULK_LENGTH).contains(&length) {
        return Err(RespError::InvalidBulkLength);
    }

    let end = start + length as usize;
    match buffer.get(end..end + CRLF.len()) {
        None => {
            // The CR may already be there while the LF is still in flight.
            if buffer.len() > end && buffer[end] != b'\r' {
                return Err(RespError::UnterminatedBulkString);
            }
            Ok(None)
        }
        Some(terminator) if terminator == CRLF => Ok(Some((start, end))),
        Some(_) => Err(RespError::UnterminatedBulkString),
    }
}

/// `*-1` is a null array and carries no arguments.
fn array_length(count: i64) -> Result<usize, RespError> {
    match count {
        -1 => Ok(0),
        0..=MAX_ARRAY_LENGTH => Ok(count as usize),
        _ => Err(RespError::InvalidMultibulkLength),
    }
}

/// Reads a CRLF-terminated decimal starting at `start`, returning it with the
/// position right after the CRLF.
fn read_length(
    buffer: &[u8],
    start: usize,
    error: RespError,
) -> Result<Option<(i64, usize)>, RespError> {
    let Some((line, next)) = read_line(buffer, start) else {
        if buffer.len().saturating_sub(start) > MAX_LENGTH_LINE {
            return Err(error);
        }
        return Ok(None);
    };

    let value = parse_decimal(line).map_err(|_| error)?;
    Ok(Some((value, next)))
}

fn read_line(buffer: &[u8], start: usize) -> Option<(&[u8], usize)> {
    let rest = buffer.get(start..)?;
    let end = rest.windows(2).position(|window| window == CRLF)?;
    Some((&rest[..end], start + end + CRLF.len()))
}

fn parse_decimal(digits: &[u8]) -> Result<i64, RespError> {
    let (negative, digits) = match digits.split_first() {
        Some((b'-', rest)) => (true, rest),
        _ => (false, digits),
    };

    if digits.is_empty() {
        return Err(RespError::FailedToParseInteger);
    }

    let mut value: i64 = 0;
    for &digit in digits {
        if !digit.is_ascii_digit() {
            return Err(RespError::FailedToParseInteger);
        }
        value = value
            .checked_mul(10)
            .and_then(|value| value.checked_add(i64::from(digit - b'0')))
            .ok_or(RespError::FailedToParseInteger)?;
    }

    Ok(if negative { -value } else { value })
}

fn parse_text(line: &[u8]) -> Result<String, RespError> {
    std::str::from_utf8(line)
        .map(str::to_string)
        .map_err(|_| RespError::InvalidUtf8)
}

/// Parses one reply of any type at `position`, returning it with the number of
/// bytes it spans from the start of the buffer. `depth` counts the arrays
/// enclosing the reply.
fn parse_value(
    buffer: &[u8],
    position: usize,
    depth: usize,
) -> Result<Option<(RespValue, usize)>, RespError> {
    let Some(&marker) = buffer.get(position) else {
        return Ok(None);
    };

    match marker {
        b'+' | b'-' | b':' => {
            let Some((line, next)) = read_line(buffer, position + 1) else {
                return Ok(None);
            };

            let value = match marker {
                b'+' => RespValue::SimpleString(parse_text(line)?),
                b'-' => RespValue::Error(parse_text(line)?),
                _ => RespValue::Integer(parse_decimal(line)?),
            };

            Ok(Some((value, next)))
        }
        b'$' => {
            let Some((length, start)) =
                read_length(buffer, position + 1, RespError::InvalidBulkLength)?
            else {
                return Ok(None);
            };

            if length == -1 {
                return Ok(Some((RespValue::NullBulkString, start)));
            }

            if !(0..=MAX_BULK_LENGTH).contains(&length) {
                return Err(RespError::InvalidBulkLength);
            }

            let end = start + length as usize;
            match buffer.get(end..end + CRLF.len()) {
                None => Ok(None),
                Some(terminator) if terminator == CRLF => Ok(Some((
                    RespValue::BulkString(Bytes::copy_from_slice(&buffer[start..end])),
                    end + CRLF.len(),
                ))),
                Some(_) => Err(RespError::UnterminatedBulkString),
            }
        }
        b'*' => {
            if depth >= MAX_NESTING_DEPTH {
                return Err(RespError::NestingTooDeep);
            }

            let Some((count, mut next)) =
                read_length(buffer, position + 1, RespError::InvalidMultibulkLength)?
            else {
                return Ok(None);
            };

            let count = array_length(count)?;
            let mut elements = Vec::with_capacity(count.min(64));

            for _ in 0..count {
                let Some((element, after)) = parse_value(buffer, next, depth + 1)? else {
                    return Ok(None);
                };
                elements.push(element);
                next = after;
            }

            Ok(Some((RespValue::Array(elements), next)))
        }
        other => Err(RespError::UnknownRespType(other as char)),
    }
}
