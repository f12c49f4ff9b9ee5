//! Tag-multiplexed 9P2000 client and server engines.
//!
//! Both engines speak through any reliable, ordered, bidirectional byte
//! stream split into an [`AsyncRead`] half and an [`AsyncWrite`] half;
//! establishing the connection is the caller's business.  They share
//! one [`Handler`] contract: a server dispatches incoming requests to a
//! handler, and a [`Client`](client::Client) *implements* the handler so
//! callers drive the remote service through the same thirteen
//! operations.  Plugging a client into a server therefore yields a
//! transparent proxy.
//!
//! A connection is used like this: construct the engine from the two
//! stream halves, spawn its `run` future (the reader on a client, the
//! receive loop on a server), and issue operations from as many tasks as
//! you like.  Request/response correlation rides on the 16-bit tag; the
//! protocol imposes no ordering between concurrent requests.

pub mod client;
pub mod handler;
pub mod logger;
pub mod server;

mod frame;


use std::fmt;
use std::io;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;

pub use client::Client;
pub use handler::Handler;
pub use server::Server;
pub use styx_protocol as protocol;

use styx_protocol::{MessageType, ProtocolError, Tag};

/// Failure of an operation or of a whole connection.
///
/// `Transport` and `Protocol` are fatal to the connection that produced
/// them; the rest are scoped to one request.
#[derive(Debug)]
pub enum Error {
    /// The underlying stream failed or closed mid-frame.
    Transport(io::Error),
    /// The peer sent bytes that do not form a valid 9P2000 frame.
    Protocol(ProtocolError),
    /// A request was issued with a tag that is already in flight.
    TagInUse(Tag),
    /// The request was cancelled by a flush.
    Flushed,
    /// The server answered with Rerror; the payload is its error string,
    /// byte for byte.
    Remote(Vec<u8>),
    /// The response variant did not match the request.  This indicates a
    /// buggy peer and is worth treating as fatal.
    InvalidResponse {
        expected: MessageType,
        got: MessageType,
    },
    /// The connection went away while the request was pending, or the
    /// engine has been shut down.
    Closed,
}

impl Error {
    /// An application-level error carrying a message for the client,
    /// for handlers to return.
    pub fn remote<T: Into<Vec<u8>>>(msg: T) -> Error {
        Error::Remote(msg.into())
    }

    /// The string to place in an Rerror reply.
    ///
    /// Remote errors pass through verbatim so that proxied errors
    /// re-encode exactly as they arrived.
    pub fn to_ename(&self) -> Vec<u8> {
        match self {
            Self::Remote(e) => e.clone(),
            other => other.to_string().into_bytes(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "transport error: {}", e),
            Self::Protocol(e) => write!(f, "protocol error: {}", e),
            Self::TagInUse(t) => write!(f, "tag already in use: {}", t),
            Self::Flushed => write!(f, "request flushed"),
            Self::Remote(e) => write!(f, "{}", String::from_utf8_lossy(e)),
            Self::InvalidResponse { expected, got } => {
                write!(f, "invalid response: expected {:?}, got {:?}", expected, got)
            }
            Self::Closed => write!(f, "connection closed"),
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::Transport(e)
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Self::Protocol(e)
    }
}

/// Serve one connection: split the stream and run a server engine over
/// it until the peer goes away.
pub async fn serve<S, H>(stream: S, handler: H) -> Result<(), Error>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
    H: Handler + 'static,
{
    let (rd, wr) = tokio::io::split(stream);
    Server::new(rd, wr, Arc::new(handler)).run().await
}

/// Accept TCP connections forever, serving each with a handler from the
/// factory on its own task.
pub async fn serve_listener<H, F>(listener: TcpListener, mut factory: F) -> Result<(), Error>
where
    H: Handler + 'static,
    F: FnMut() -> H,
{
    loop {
        let (stream, _addr) = listener.accept().await?;
        let handler = factory();
        tokio::spawn(async move {
            let _ = serve(stream, handler).await;
        });
    }
}
