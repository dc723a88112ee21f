//! RESP (Redis Serialization Protocol) implementation.
//!
//! Client side of RESP2: multibulk request encoding, reply decoding, and
//! framing of replies read off a byte stream.

pub mod frame;
pub mod parser;
pub mod reader;

pub use frame::{encode, encode_command, EncodeError, Frame};
pub use parser::{decode, decode_with, Limits, ParseError};
pub use reader::{FrameReader, ReadError};
