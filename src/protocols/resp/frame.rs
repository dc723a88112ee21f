//! RESP value model and request encoder.
//!
//! A client only ever sends multibulk commands (an array of bulk strings),
//! so the encoder accepts arrays, bulk strings and nested nulls and rejects
//! every other shape instead of coercing it.

use bytes::{Bytes, BytesMut};
use thiserror::Error;

/// RESP2 frame types
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Simple string: +OK\r\n
    Simple(String),
    /// Error: -ERR message\r\n
    Error(String),
    /// Integer: :1000\r\n
    Integer(i64),
    /// Bulk string: $5\r\nhello\r\n or $-1\r\n (null)
    Bulk(Option<Bytes>),
    /// Array: *2\r\n... or *-1\r\n (null)
    Array(Option<Vec<Frame>>),
}

/// Encoding errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// The value has a shape that is never sent by a client.
    #[error("unsupported value for encoding: {0}")]
    UnsupportedValue(&'static str),
}

impl Frame {
    /// Create a simple string frame
    pub fn simple<S: Into<String>>(s: S) -> Frame {
        Frame::Simple(s.into())
    }

    /// Create an error frame
    pub fn error<S: Into<String>>(s: S) -> Frame {
        Frame::Error(s.into())
    }

    /// Create a null bulk string
    pub fn null() -> Frame {
        Frame::Bulk(None)
    }

    /// Create a null array
    pub fn null_array() -> Frame {
        Frame::Array(None)
    }

    /// Create a bulk string
    pub fn bulk<B: Into<Bytes>>(data: B) -> Frame {
        Frame::Bulk(Some(data.into()))
    }

    /// Create an integer frame
    pub fn integer(n: i64) -> Frame {
        Frame::Integer(n)
    }

    /// Create an array frame
    pub fn array(frames: Vec<Frame>) -> Frame {
        Frame::Array(Some(frames))
    }

    /// Build a multibulk command: one bulk string per token.
    pub fn command<I, T>(tokens: I) -> Frame
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        Frame::Array(Some(
            tokens
                .into_iter()
                .map(|t| Frame::Bulk(Some(Bytes::copy_from_slice(t.as_ref()))))
                .collect(),
        ))
    }

    /// True for a server-side error reply.
    ///
    /// An error reply is a successfully decoded value, not a decode failure.
    pub fn is_error(&self) -> bool {
        matches!(self, Frame::Error(_))
    }

    /// True for either null representation.
    pub fn is_null(&self) -> bool {
        matches!(self, Frame::Bulk(None) | Frame::Array(None))
    }

    /// Short name of the variant, used in error messages and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Frame::Simple(_) => "simple string",
            Frame::Error(_) => "error",
            Frame::Integer(_) => "integer",
            Frame::Bulk(Some(_)) => "bulk string",
            Frame::Bulk(None) => "null bulk string",
            Frame::Array(Some(_)) => "array",
            Frame::Array(None) => "null array",
        }
    }
}

/// Encode a value for sending.
///
/// A null bulk string is only accepted inside an array; at top level it is
/// rejected along with simple strings, errors, integers and null arrays.
pub fn encode(frame: &Frame) -> Result<BytesMut, EncodeError> {
    if let Frame::Bulk(None) = frame {
        return Err(EncodeError::UnsupportedValue(frame.kind()));
    }
    let mut buf = BytesMut::new();
    encode_into(frame, &mut buf)?;
    Ok(buf)
}

/// Encode a value into an existing buffer.
///
/// On error the buffer may hold a partial encoding and should be discarded.
pub fn encode_into(frame: &Frame, buf: &mut BytesMut) -> Result<(), EncodeError> {
    match frame {
        Frame::Bulk(None) => {
            buf.extend_from_slice(b"$-1\r\n");
        }
        Frame::Bulk(Some(data)) => {
            write_bulk(data, buf);
        }
        Frame::Array(Some(frames)) => {
            write_header(b'*', frames.len(), buf);
            for frame in frames {
                encode_into(frame, buf)?;
            }
        }
        Frame::Simple(_) | Frame::Error(_) | Frame::Integer(_) | Frame::Array(None) => {
            return Err(EncodeError::UnsupportedValue(frame.kind()));
        }
    }
    Ok(())
}

/// Encode command tokens as a multibulk request.
///
/// Infallible: every token becomes a bulk string.
pub fn encode_command<I, T>(tokens: I) -> BytesMut
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    let tokens: Vec<T> = tokens.into_iter().collect();
    let mut buf = BytesMut::new();
    write_header(b'*', tokens.len(), &mut buf);
    for token in &tokens {
        write_bulk(token.as_ref(), &mut buf);
    }
    buf
}

fn write_header(tag: u8, len: usize, buf: &mut BytesMut) {
    buf.extend_from_slice(&[tag]);
    buf.extend_from_slice(len.to_string().as_bytes());
    buf.extend_from_slice(b"\r\n");
}

fn write_bulk(data: &[u8], buf: &mut BytesMut) {
    write_header(b'$', data.len(), buf);
    buf.extend_from_slice(data);
    buf.extend_from_slice(b"\r\n");
}
