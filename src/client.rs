//! Blocking RESP client connection.
//!
//! One request is in flight at a time: `send` writes a multibulk command
//! and then blocks in the frame reader until the reply has been decoded.

use crate::config::Config;
use crate::protocols::resp::{encode_command, Frame, FrameReader, ReadError};
use std::io::{self, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, trace};

/// Client errors
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("could not connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: io::Error,
    },
    #[error("write failed: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Read(#[from] ReadError),
    #[error("connection closed by server")]
    Closed,
}

impl ClientError {
    /// Whether the connection is unusable after this error.
    pub fn is_fatal(&self) -> bool {
        match self {
            ClientError::Read(e) => e.is_fatal(),
            _ => true,
        }
    }
}

/// A connection to a single server
pub struct Client {
    writer: TcpStream,
    reader: FrameReader<TcpStream>,
    address: String,
}

impl Client {
    /// Connect to the configured server, trying each resolved address in turn.
    pub fn connect(config: &Config) -> Result<Self, ClientError> {
        let address = config.address();
        let connect_err = |source: io::Error| ClientError::Connect {
            address: address.clone(),
            source,
        };

        let addrs = (config.host.as_str(), config.port)
            .to_socket_addrs()
            .map_err(connect_err)?;

        let mut last_err = io::Error::new(io::ErrorKind::NotFound, "no addresses resolved");
        let mut stream = None;
        for addr in addrs {
            match connect_socket(addr, config.connect_timeout) {
                Ok(s) => {
                    debug!(peer = %addr, "Connected");
                    stream = Some(s);
                    break;
                }
                Err(e) => {
                    debug!(peer = %addr, error = %e, "Connect attempt failed");
                    last_err = e;
                }
            }
        }
        let stream = stream.ok_or_else(|| connect_err(last_err))?;

        stream.set_read_timeout(config.read_timeout)?;
        let reader = FrameReader::with_options(
            stream.try_clone()?,
            config.read_chunk_size,
            config.limits,
        );

        Ok(Client {
            writer: stream,
            reader,
            address,
        })
    }

    /// `host:port` this client was configured with
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Send one command and wait for its reply.
    ///
    /// A server error reply comes back as `Ok(Frame::Error(..))`.
    pub fn send<I, T>(&mut self, tokens: I) -> Result<Frame, ClientError>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        let request = encode_command(tokens);
        trace!(bytes = request.len(), "Sending command");
        self.writer.write_all(&request)?;
        self.writer.flush()?;

        match self.reader.read_message()? {
            Some((frame, raw)) => {
                trace!(bytes = raw.len(), kind = frame.kind(), "Received reply");
                Ok(frame)
            }
            None => Err(ClientError::Closed),
        }
    }
}

fn connect_socket(addr: SocketAddr, timeout: Duration) -> io::Result<TcpStream> {
    let socket = socket2::Socket::new(
        match addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_nodelay(true)?;
    socket.set_keepalive(true)?;
    if timeout.is_zero() {
        socket.connect(&addr.into())?;
    } else {
        socket.connect_timeout(&addr.into(), timeout)?;
    }

    Ok(socket.into())
}
