//! Wire codec and typed message model for the 9P2000 protocol.
//!
//! # Overview
//!
//! Every 9P message travels as a frame of `[size:u32][type:u8][body]`,
//! where `size` is the total frame length including the five header
//! bytes and all integers are little-endian.  Strings are prefixed with
//! a `u16` length, raw data with a `u32` length, and neither carries a
//! terminator or a declared encoding; this crate treats them as opaque
//! bytes throughout.
//!
//! The crate is deliberately transport-free: [`Message::encode`]
//! produces a complete frame as bytes and [`Message::decode`] consumes
//! the body of one, so any component that can deliver whole frames can
//! use it.  The asynchronous client and server engines live in the
//! `styx` crate.

pub mod codec;
pub mod messages;
pub mod wire;

use std::fmt;

pub use codec::{Message, MessageType};
pub use messages::{
    DontTouch, Fid, FileMode, OpenMode, Qid, QidType, Rattach, Rauth, Rclunk, Rcreate, Rerror,
    Rflush, Ropen, Rread, Rremove, Rstat, Rversion, Rwalk, Rwrite, Rwstat, Stat, Tag, Tattach,
    Tauth, Tclunk, Tcreate, Tflush, Topen, Tread, Tremove, Tstat, Tversion, Twalk, Twrite, Twstat,
};

/// Size of the `[size:u32][type:u8]` frame header.
pub const HEADER_SIZE: usize = 4 + 1;

/// The largest frame either engine will read or write.
///
/// This bounds decoder allocation before any msize has been negotiated.
pub const MAX_MESSAGE_SIZE: u32 = 1024 * 1024;

/// Tag reserved for version negotiation.
pub const NOTAG: Tag = Tag(0xffff);

/// Fid denoting "no fid", used for unauthenticated attaches.
pub const NOFID: Fid = Fid(0xffff_ffff);

/// The most path elements a single walk may carry.
pub const MAXWELEM: usize = 16;

/// Version string spoken by this implementation.
pub const VERSION_9P2000: &[u8] = b"9P2000";

/// A frame could not be encoded or decoded.
///
/// Any of these on a live connection is fatal: the stream can no longer
/// be trusted to be frame-aligned.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ProtocolError {
    /// The type byte does not name a 9P2000 message.
    UnknownMessageType(u8),
    /// The header's size field is below the header size or above
    /// [`MAX_MESSAGE_SIZE`].
    InvalidSize(u32),
    /// A message tried to read past the end of its frame body.
    Truncated,
    /// A message left bytes of its frame body unconsumed.
    TrailingBytes(usize),
    /// A string or counted field does not fit its length prefix.
    TooLong,
    /// A message of this type is not valid in this direction.
    UnexpectedMessage(MessageType),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownMessageType(t) => write!(f, "unknown message type {:#04x}", t),
            Self::InvalidSize(n) => write!(f, "invalid frame size {}", n),
            Self::Truncated => write!(f, "message truncated"),
            Self::TrailingBytes(n) => write!(f, "{} trailing bytes after message body", n),
            Self::TooLong => write!(f, "field exceeds its length prefix"),
            Self::UnexpectedMessage(mt) => write!(f, "unexpected message {:?}", mt),
        }
    }
}

impl std::error::Error for ProtocolError {}
