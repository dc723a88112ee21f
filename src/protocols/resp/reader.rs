//! Frame reader: turns a byte stream into complete RESP frames.
//!
//! Bytes are accumulated in a buffer that outlives a single call, so any
//! data received past the end of one frame (a pipelined reply, say) is
//! kept and returned by the next call instead of being dropped.

use super::frame::Frame;
use super::parser::{decode_resumable, Limits, ParseError};
use bytes::{Bytes, BytesMut};
use std::io::{self, Read};
use thiserror::Error;
use tracing::trace;

/// Default size of a single read from the source
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Errors from reading a frame off a stream
#[derive(Debug, Error)]
pub enum ReadError {
    /// The underlying source failed
    #[error("read failed: {0}")]
    Io(#[from] io::Error),
    /// The read timeout elapsed before a full frame arrived
    #[error("timed out waiting for a reply")]
    Timeout,
    /// The stream ended part way through a frame
    #[error("connection closed with {buffered} bytes of an incomplete frame buffered")]
    UnexpectedEof { buffered: usize },
    /// The peer sent bytes that can never form a valid frame
    #[error("protocol error: {0}")]
    Protocol(#[from] ParseError),
}

impl ReadError {
    /// Transport failures end the session; protocol errors do not.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ReadError::Protocol(_))
    }
}

/// Accumulates chunks from a [`Read`] source until a full frame decodes.
pub struct FrameReader<R> {
    source: R,
    buffer: BytesMut,
    chunk: Vec<u8>,
    limits: Limits,
    /// Set when the buffered bytes were last found to be an incomplete frame.
    pending: bool,
    /// Buffer length below which a pending frame cannot progress.
    resume_at: usize,
}

impl<R: Read> FrameReader<R> {
    /// Create a reader with the default chunk size and limits.
    pub fn new(source: R) -> Self {
        Self::with_options(source, DEFAULT_CHUNK_SIZE, Limits::default())
    }

    /// Create a reader with an explicit chunk size and decode limits.
    pub fn with_options(source: R, chunk_size: usize, limits: Limits) -> Self {
        Self {
            source,
            buffer: BytesMut::with_capacity(chunk_size),
            chunk: vec![0u8; chunk_size.max(1)],
            limits,
            pending: false,
            resume_at: 0,
        }
    }

    /// Bytes received but not yet returned as part of a frame.
    pub fn buffered(&self) -> &[u8] {
        &self.buffer
    }

    /// The underlying byte source.
    pub fn get_ref(&self) -> &R {
        &self.source
    }

    /// Read the next complete frame.
    ///
    /// Returns the decoded frame together with its exact wire bytes, or
    /// `None` when the stream ends cleanly between frames. Blocks on the
    /// source until a frame completes, the stream ends, or the source fails.
    pub fn read_message(&mut self) -> Result<Option<(Frame, Bytes)>, ReadError> {
        if !self.buffer.is_empty() && !self.pending {
            if let Some(message) = self.try_decode()? {
                return Ok(Some(message));
            }
        }

        loop {
            let n = match self.source.read(&mut self.chunk) {
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                    ) =>
                {
                    return Err(ReadError::Timeout);
                }
                Err(e) => return Err(ReadError::Io(e)),
            };

            if n == 0 {
                if self.buffer.is_empty() {
                    trace!("stream closed");
                    return Ok(None);
                }
                return Err(ReadError::UnexpectedEof {
                    buffered: self.buffer.len(),
                });
            }

            self.buffer.extend_from_slice(&self.chunk[..n]);
            trace!(bytes = n, buffered = self.buffer.len(), "read chunk");

            // Mid bulk payload: nothing decides the frame until its end arrives.
            if self.pending && self.buffer.len() < self.resume_at {
                continue;
            }

            if let Some(message) = self.try_decode()? {
                return Ok(Some(message));
            }
        }
    }

    fn try_decode(&mut self) -> Result<Option<(Frame, Bytes)>, ReadError> {
        match decode_resumable(&self.buffer, &self.limits, &mut self.resume_at) {
            Ok((frame, consumed)) => {
                self.pending = false;
                let raw = self.buffer.split_to(consumed).freeze();
                trace!(
                    kind = frame.kind(),
                    consumed,
                    remaining = self.buffer.len(),
                    "decoded frame"
                );
                Ok(Some((frame, raw)))
            }
            Err(e) if e.is_retryable() => {
                self.pending = true;
                Ok(None)
            }
            Err(e) => {
                // The stream position is lost; drop what is buffered.
                self.pending = false;
                self.buffer.clear();
                Err(ReadError::Protocol(e))
            }
        }
    }
}
