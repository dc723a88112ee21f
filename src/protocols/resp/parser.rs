//! RESP (Redis Serialization Protocol) decoder.
//!
//! Decodes exactly one top-level RESP2 frame from the start of a buffer and
//! reports how many bytes it used. A buffer that holds only a prefix of a
//! valid frame yields [`ParseError::Incomplete`], which is the only
//! retryable error; everything else is a protocol violation.

use super::frame::Frame;
use bytes::Bytes;
use thiserror::Error;

/// Default maximum array nesting depth
pub const DEFAULT_MAX_DEPTH: usize = 128;

/// Default maximum bulk string length (512 MiB, the Redis server limit)
pub const DEFAULT_MAX_BULK_LEN: usize = 512 * 1024 * 1024;

/// Decoder errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Nothing to decode
    #[error("empty input")]
    EmptyInput,
    /// The buffer holds a valid prefix; more bytes are needed
    #[error("incomplete frame")]
    Incomplete,
    /// An integer reply that is not a signed 64-bit integer
    #[error("malformed integer: {0:?}")]
    MalformedInteger(String),
    /// A bad length or count header, or a bulk payload without its CRLF
    #[error("malformed header: {0}")]
    MalformedHeader(String),
    /// Unrecognised type tag
    #[error("unknown frame type: {:?}", char::from(*.0))]
    UnknownType(u8),
    /// Simple string or error text that is not UTF-8
    #[error("invalid UTF-8 in {0}")]
    InvalidUtf8(&'static str),
    /// Arrays nested beyond the configured limit
    #[error("arrays nested deeper than {limit}")]
    TooDeep { limit: usize },
    /// Bulk string longer than the configured limit
    #[error("bulk string of {len} bytes exceeds limit of {limit}")]
    BulkTooLarge { len: usize, limit: usize },
}

impl ParseError {
    /// True when reading more bytes may turn this into a successful decode.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ParseError::Incomplete)
    }
}

/// Resource limits applied while decoding untrusted input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_depth: usize,
    pub max_bulk_len: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_bulk_len: DEFAULT_MAX_BULK_LEN,
        }
    }
}

/// Decode one frame from the start of `buffer` using default limits.
///
/// Returns the frame and the number of bytes consumed. Bytes past that
/// point are left for the caller.
pub fn decode(buffer: &[u8]) -> Result<(Frame, usize), ParseError> {
    decode_with(buffer, &Limits::default())
}

/// Decode one frame from the start of `buffer`.
pub fn decode_with(buffer: &[u8], limits: &Limits) -> Result<(Frame, usize), ParseError> {
    let mut resume_at = 0;
    decode_resumable(buffer, limits, &mut resume_at)
}

/// Decode one frame, recording where a retry can next make progress.
///
/// On [`ParseError::Incomplete`], `resume_at` is the buffer length that
/// must be reached before decoding again can give a different answer. It
/// is non-zero only while a bulk payload is still arriving; otherwise any
/// new byte may complete the frame or prove it malformed.
pub fn decode_resumable(
    buffer: &[u8],
    limits: &Limits,
    resume_at: &mut usize,
) -> Result<(Frame, usize), ParseError> {
    *resume_at = 0;
    if buffer.is_empty() {
        return Err(ParseError::EmptyInput);
    }
    parse_value(buffer, 0, 0, limits, resume_at)
}

/// Parse the frame starting at `pos`, returning it and the offset just past it.
fn parse_value(
    buffer: &[u8],
    pos: usize,
    depth: usize,
    limits: &Limits,
    resume_at: &mut usize,
) -> Result<(Frame, usize), ParseError> {
    let Some(&tag) = buffer.get(pos) else {
        return Err(ParseError::Incomplete);
    };

    match tag {
        b'+' => parse_simple_string(buffer, pos),
        b'-' => parse_error(buffer, pos),
        b':' => parse_integer(buffer, pos),
        b'$' => parse_bulk_string(buffer, pos, limits, resume_at),
        b'*' => parse_array(buffer, pos, depth, limits, resume_at),
        other => Err(ParseError::UnknownType(other)),
    }
}

/// Find CRLF at or after `start`, return position of \r
fn find_crlf(buffer: &[u8], start: usize) -> Option<usize> {
    buffer
        .get(start..)?
        .windows(2)
        .position(|w| w == b"\r\n")
        .map(|i| start + i)
}

/// Return the line after the tag byte at `pos` and the offset past its CRLF.
fn read_line(buffer: &[u8], pos: usize) -> Result<(&[u8], usize), ParseError> {
    let end = find_crlf(buffer, pos + 1).ok_or(ParseError::Incomplete)?;
    Ok((&buffer[pos + 1..end], end + 2))
}

/// Parse a length or count header; -1 means null
fn parse_length(line: &[u8], what: &str) -> Result<Option<usize>, ParseError> {
    let text = String::from_utf8_lossy(line);
    let n: i64 = text
        .parse()
        .map_err(|_| ParseError::MalformedHeader(format!("invalid {what}: {text:?}")))?;
    match n {
        -1 => Ok(None),
        n if n < -1 => Err(ParseError::MalformedHeader(format!(
            "negative {what}: {n}"
        ))),
        n => usize::try_from(n)
            .map(Some)
            .map_err(|_| ParseError::MalformedHeader(format!("{what} out of range: {n}"))),
    }
}

/// Parse a simple string: +OK\r\n
fn parse_simple_string(buffer: &[u8], pos: usize) -> Result<(Frame, usize), ParseError> {
    let (line, next) = read_line(buffer, pos)?;
    let s = std::str::from_utf8(line).map_err(|_| ParseError::InvalidUtf8("simple string"))?;
    Ok((Frame::Simple(s.to_string()), next))
}

/// Parse an error: -ERR message\r\n
fn parse_error(buffer: &[u8], pos: usize) -> Result<(Frame, usize), ParseError> {
    let (line, next) = read_line(buffer, pos)?;
    let s = std::str::from_utf8(line).map_err(|_| ParseError::InvalidUtf8("error"))?;
    Ok((Frame::Error(s.to_string()), next))
}

/// Parse an integer: :1000\r\n
fn parse_integer(buffer: &[u8], pos: usize) -> Result<(Frame, usize), ParseError> {
    let (line, next) = read_line(buffer, pos)?;
    let text = String::from_utf8_lossy(line);
    match text.parse::<i64>() {
        Ok(n) => Ok((Frame::Integer(n), next)),
        Err(_) => Err(ParseError::MalformedInteger(text.into_owned())),
    }
}

/// Parse a bulk string: $5\r\nhello\r\n or $-1\r\n
fn parse_bulk_string(
    buffer: &[u8],
    pos: usize,
    limits: &Limits,
    resume_at: &mut usize,
) -> Result<(Frame, usize), ParseError> {
    let (line, data_start) = read_line(buffer, pos)?;
    let Some(len) = parse_length(line, "bulk string length")? else {
        return Ok((Frame::Bulk(None), data_start));
    };

    if len > limits.max_bulk_len {
        return Err(ParseError::BulkTooLarge {
            len,
            limit: limits.max_bulk_len,
        });
    }

    let data_end = data_start.saturating_add(len);
    if buffer.len() <= data_end {
        *resume_at = data_end.saturating_add(1);
        return Err(ParseError::Incomplete);
    }

    // Check the trailer byte by byte so a bad one fails before it is complete.
    let total = data_end + 2;
    let trailer = &buffer[data_end..buffer.len().min(total)];
    if !b"\r\n".starts_with(trailer) {
        return Err(ParseError::MalformedHeader(
            "bulk string missing trailing CRLF".to_string(),
        ));
    }
    if trailer.len() < 2 {
        return Err(ParseError::Incomplete);
    }

    let data = Bytes::copy_from_slice(&buffer[data_start..data_end]);
    Ok((Frame::Bulk(Some(data)), total))
}

/// Parse an array: *2\r\n$3\r\nfoo\r\n$3\r\nbar\r\n or *-1\r\n
fn parse_array(
    buffer: &[u8],
    pos: usize,
    depth: usize,
    limits: &Limits,
    resume_at: &mut usize,
) -> Result<(Frame, usize), ParseError> {
    let (line, mut offset) = read_line(buffer, pos)?;
    let Some(count) = parse_length(line, "array length")? else {
        return Ok((Frame::Array(None), offset));
    };

    if depth >= limits.max_depth {
        return Err(ParseError::TooDeep {
            limit: limits.max_depth,
        });
    }

    // Every element takes at least three bytes, so the buffer bounds
    // how much is worth reserving up front.
    let mut frames = Vec::with_capacity(count.min((buffer.len() - offset) / 3));

    for _ in 0..count {
        let (frame, next) = parse_value(buffer, offset, depth + 1, limits, resume_at)?;
        frames.push(frame);
        offset = next;
    }

    Ok((Frame::Array(Some(frames)), offset))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocols::resp::frame::{encode, encode_command};

    #[test]
    fn test_parse_simple_string() {
        assert_eq!(decode(b"+OK\r\n"), Ok((Frame::simple("OK"), 5)));
        assert_eq!(
            decode(b"+hello world\r\n"),
            Ok((Frame::simple("hello world"), 14))
        );
    }

    #[test]
    fn test_parse_error() {
        let (frame, consumed) = decode(b"-ERR bad\r\n").unwrap();
        assert_eq!(frame, Frame::error("ERR bad"));
        assert!(frame.is_error());
        assert_eq!(consumed, 10);
    }

    #[test]
    fn test_parse_integer() {
        assert_eq!(decode(b":1000\r\n"), Ok((Frame::integer(1000), 7)));
        assert_eq!(decode(b":-5\r\n"), Ok((Frame::integer(-5), 5)));
        assert_eq!(decode(b":0\r\n"), Ok((Frame::integer(0), 4)));
        assert_eq!(
            decode(b":9223372036854775807\r\n").unwrap().0,
            Frame::integer(i64::MAX)
        );
        assert_eq!(
            decode(b":-9223372036854775808\r\n").unwrap().0,
            Frame::integer(i64::MIN)
        );
    }

    #[test]
    fn test_parse_malformed_integer() {
        assert_eq!(
            decode(b":abc\r\n"),
            Err(ParseError::MalformedInteger("abc".to_string()))
        );
        assert!(matches!(
            decode(b":\r\n"),
            Err(ParseError::MalformedInteger(_))
        ));
        assert!(matches!(
            decode(b":9223372036854775808\r\n"),
            Err(ParseError::MalformedInteger(_))
        ));
    }

    #[test]
    fn test_parse_bulk_string() {
        assert_eq!(decode(b"$5\r\nvalue\r\n"), Ok((Frame::bulk("value"), 11)));
    }

    #[test]
    fn test_parse_bulk_string_is_binary_safe() {
        let (frame, _) = decode(b"$4\r\n\r\n\xff\x00\r\n").unwrap();
        assert_eq!(frame, Frame::bulk(&b"\r\n\xff\x00"[..]));
    }

    #[test]
    fn test_parse_null_and_empty_bulk_string() {
        assert_eq!(decode(b"$-1\r\n"), Ok((Frame::null(), 5)));
        assert_eq!(decode(b"$0\r\n\r\n"), Ok((Frame::bulk(""), 6)));
    }

    #[test]
    fn test_parse_bulk_string_missing_crlf() {
        assert!(matches!(
            decode(b"$3\r\nfooXY"),
            Err(ParseError::MalformedHeader(_))
        ));
    }

    #[test]
    fn test_parse_bad_trailer_before_complete() {
        assert!(matches!(
            decode(b"$3\r\nfooX"),
            Err(ParseError::MalformedHeader(_))
        ));
        assert!(matches!(
            decode(b"$3\r\nfoo\rX"),
            Err(ParseError::MalformedHeader(_))
        ));
        assert_eq!(decode(b"$3\r\nfoo\r"), Err(ParseError::Incomplete));
    }

    #[test]
    fn test_resume_at_while_bulk_arrives() {
        let limits = Limits::default();
        let mut resume_at = 0;
        assert_eq!(
            decode_resumable(b"*2\r\n:1\r\n$10\r\nabc", &limits, &mut resume_at),
            Err(ParseError::Incomplete)
        );
        // Payload ends at offset 23; its first trailer byte is at 23.
        assert_eq!(resume_at, 24);

        assert_eq!(
            decode_resumable(b"*2\r\n:1\r\n", &limits, &mut resume_at),
            Err(ParseError::Incomplete)
        );
        assert_eq!(resume_at, 0);

        assert_eq!(
            decode_resumable(b"$5\r\nhel", &limits, &mut resume_at),
            Err(ParseError::Incomplete)
        );
        assert_eq!(resume_at, 10);
        assert!(decode_resumable(b"$5\r\nhello\r\n", &limits, &mut resume_at).is_ok());
    }

    #[test]
    fn test_parse_bad_headers() {
        assert!(matches!(
            decode(b"$abc\r\n"),
            Err(ParseError::MalformedHeader(_))
        ));
        assert!(matches!(
            decode(b"$-2\r\n"),
            Err(ParseError::MalformedHeader(_))
        ));
        assert!(matches!(
            decode(b"*x\r\n"),
            Err(ParseError::MalformedHeader(_))
        ));
        assert!(matches!(
            decode(b"*-7\r\n"),
            Err(ParseError::MalformedHeader(_))
        ));
    }

    #[test]
    fn test_parse_array() {
        let (frame, consumed) = decode(b"*2\r\n$4\r\necho\r\n$11\r\nhello world\r\n").unwrap();
        assert_eq!(frame, Frame::command(["echo", "hello world"]));
        assert_eq!(consumed, 32);
    }

    #[test]
    fn test_parse_null_and_empty_array() {
        assert_eq!(decode(b"*-1\r\n"), Ok((Frame::null_array(), 5)));
        assert_eq!(decode(b"*0\r\n"), Ok((Frame::array(vec![]), 4)));
    }

    #[test]
    fn test_parse_mixed_array_in_order() {
        let buffer = b"*5\r\n$-1\r\n:42\r\n+OK\r\n-ERR x\r\n*2\r\n$1\r\na\r\n*-1\r\n";
        let (frame, consumed) = decode(buffer).unwrap();
        assert_eq!(consumed, buffer.len());
        assert_eq!(
            frame,
            Frame::array(vec![
                Frame::null(),
                Frame::integer(42),
                Frame::simple("OK"),
                Frame::error("ERR x"),
                Frame::array(vec![Frame::bulk("a"), Frame::null_array()]),
            ])
        );
    }

    #[test]
    fn test_parse_reports_consumed_with_trailing_bytes() {
        let (frame, consumed) = decode(b"+OK\r\n:1\r\n").unwrap();
        assert_eq!(frame, Frame::simple("OK"));
        assert_eq!(consumed, 5);
    }

    #[test]
    fn test_parse_empty_input() {
        assert_eq!(decode(b""), Err(ParseError::EmptyInput));
    }

    #[test]
    fn test_parse_unknown_type() {
        assert_eq!(decode(b"~"), Err(ParseError::UnknownType(b'~')));
        assert_eq!(
            decode(b"~NotValid\r\n"),
            Err(ParseError::UnknownType(b'~'))
        );
        assert!(!ParseError::UnknownType(b'~').is_retryable());
    }

    #[test]
    fn test_parse_unknown_type_nested() {
        assert_eq!(
            decode(b"*2\r\n:1\r\n%0\r\n"),
            Err(ParseError::UnknownType(b'%'))
        );
    }

    #[test]
    fn test_parse_incomplete() {
        for buffer in [
            &b"+OK"[..],
            &b"+OK\r"[..],
            &b"$5\r\nhel"[..],
            &b"$5\r\nhello\r"[..],
            &b"*2\r\n$3\r\nfoo\r\n"[..],
            &b"*2\r\n$3\r\nfoo\r\n$"[..],
        ] {
            assert_eq!(decode(buffer), Err(ParseError::Incomplete), "{buffer:?}");
        }
        assert!(ParseError::Incomplete.is_retryable());
    }

    #[test]
    fn test_every_prefix_is_incomplete() {
        let message = b"*4\r\n$3\r\nset\r\n*2\r\n:-12\r\n$-1\r\n+OK\r\n$0\r\n\r\n";
        for end in 1..message.len() {
            assert_eq!(
                decode(&message[..end]),
                Err(ParseError::Incomplete),
                "prefix of length {end}"
            );
        }
        assert_eq!(decode(message).unwrap().1, message.len());
    }

    #[test]
    fn test_roundtrip_commands() {
        let commands: Vec<Vec<&str>> = vec![
            vec![],
            vec![""],
            vec!["ping"],
            vec!["set", "key", "value"],
            vec!["set", "", "ünïcödé"],
        ];
        for tokens in commands {
            let bytes = encode_command(&tokens);
            assert_eq!(
                decode(&bytes),
                Ok((Frame::command(&tokens), bytes.len()))
            );
        }
    }

    #[test]
    fn test_roundtrip_nested() {
        let frame = Frame::array(vec![
            Frame::bulk("a"),
            Frame::null(),
            Frame::array(vec![Frame::array(vec![Frame::array(vec![Frame::bulk(
                "deep",
            )])])]),
        ]);
        let bytes = encode(&frame).unwrap();
        assert_eq!(decode(&bytes), Ok((frame, bytes.len())));
    }

    #[test]
    fn test_depth_limit() {
        let limits = Limits {
            max_depth: 3,
            ..Limits::default()
        };
        assert!(decode_with(b"*1\r\n*1\r\n*0\r\n", &limits).is_ok());
        assert_eq!(
            decode_with(b"*1\r\n*1\r\n*1\r\n*0\r\n", &limits),
            Err(ParseError::TooDeep { limit: 3 })
        );
    }

    #[test]
    fn test_depth_limit_ignores_null_and_partial_arrays() {
        let limits = Limits {
            max_depth: 1,
            ..Limits::default()
        };
        assert_eq!(
            decode_with(b"*1\r\n*-1\r\n", &limits),
            Ok((Frame::array(vec![Frame::null_array()]), 9))
        );
        assert_eq!(
            decode_with(b"*1\r\n*", &limits),
            Err(ParseError::Incomplete)
        );
        assert_eq!(
            decode_with(b"*1\r\n*2", &limits),
            Err(ParseError::Incomplete)
        );
    }

    #[test]
    fn test_deep_nesting_default_limit() {
        let buffer = b"*1\r\n".repeat(DEFAULT_MAX_DEPTH + 1);
        assert_eq!(
            decode(&buffer),
            Err(ParseError::TooDeep {
                limit: DEFAULT_MAX_DEPTH
            })
        );
    }

    #[test]
    fn test_bulk_limit() {
        let limits = Limits {
            max_bulk_len: 4,
            ..Limits::default()
        };
        assert!(decode_with(b"$4\r\nabcd\r\n", &limits).is_ok());
        assert_eq!(
            decode_with(b"$5\r\n", &limits),
            Err(ParseError::BulkTooLarge { len: 5, limit: 4 })
        );
    }

    #[test]
    fn test_huge_array_count_is_incomplete() {
        assert_eq!(
            decode(b"*4000000000\r\n:1\r\n"),
            Err(ParseError::Incomplete)
        );
    }

    #[test]
    fn test_invalid_utf8_simple_string() {
        assert_eq!(
            decode(b"+\xff\r\n"),
            Err(ParseError::InvalidUtf8("simple string"))
        );
    }
}
