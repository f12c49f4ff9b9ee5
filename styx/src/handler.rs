//! The operation contract shared by servers and clients.

use async_trait::async_trait;

use styx_protocol::{
    Rattach, Rauth, Rclunk, Rcreate, Rflush, Ropen, Rread, Rremove, Rstat, Rversion, Rwalk,
    Rwrite, Rwstat, Tattach, Tauth, Tclunk, Tcreate, Tflush, Topen, Tread, Tremove, Tstat,
    Tversion, Twalk, Twrite, Twstat,
};

use crate::Error;

/// One method per 9P2000 request, each producing the matching response
/// or an error.
///
/// The contract is symmetric on purpose.  A server operates on anything
/// implementing it; the client implements it, so that calling a method
/// on a client performs the very same operation on the remote server.
/// It follows that a client handed to a server as its handler acts as a
/// transparent proxy.
///
/// Tag ownership: callers choose the request tag (which is how a
/// request can later be flushed), and a server echoes it on every
/// response, errors included.  The engines take care of the echo; a
/// handler may ignore tags entirely, except that `version` must be sent
/// under [`NOTAG`](styx_protocol::NOTAG).
///
/// A server invokes handler methods from concurrently running tasks, so
/// implementations must tolerate concurrent calls.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Negotiate the maximum message size and protocol version.
    ///
    /// Must be the first operation on a connection.  The reply's msize
    /// must not exceed the request's, and the version must be no newer
    /// than the one offered; a server unwilling to negotiate answers
    /// with version "unknown".
    async fn version(&self, req: Tversion) -> Result<Rversion, Error>;

    /// Establish a fid for an out-of-band authentication exchange.
    ///
    /// The returned qid names an authentication file which is read and
    /// written with the ordinary I/O operations; the protocol spoken
    /// over it is not part of 9P2000.  Services that require no
    /// authentication return an error and the client proceeds straight
    /// to attach.
    async fn auth(&self, req: Tauth) -> Result<Rauth, Error>;

    /// Bind a fid to the root of the requested service tree.
    async fn attach(&self, req: Tattach) -> Result<Rattach, Error>;

    /// Cancel the request pending under `oldtag`.
    ///
    /// Once a flush completes, the old tag is free for reuse.  A
    /// response to the old request may still arrive first and must be
    /// handled normally, since it can reflect a state change on the
    /// server.  When several flushes target one tag, only the last
    /// needs an answer.
    async fn flush(&self, req: Tflush) -> Result<Rflush, Error>;

    /// Resolve a sequence of path elements starting at `fid`, binding
    /// the destination to `newfid`.
    ///
    /// At most 16 names per walk; longer paths are walked in chunks.
    /// Zero names bind `newfid` to the same file as `fid`.  If an
    /// element part-way through is missing or not a directory, the
    /// reply carries qids only for the prefix that resolved and neither
    /// fid changes.
    async fn walk(&self, req: Twalk) -> Result<Rwalk, Error>;

    /// Open `fid` for I/O under the requested mode.
    ///
    /// The reply's iounit, when nonzero, is the largest transfer the
    /// server guarantees to perform without splitting.
    async fn open(&self, req: Topen) -> Result<Ropen, Error>;

    /// Create `name` in the directory of `fid` and open it; `fid` moves
    /// to the new file.  Setting `DMDIR` in the permissions creates a
    /// directory.
    async fn create(&self, req: Tcreate) -> Result<Rcreate, Error>;

    /// Read up to `count` bytes at `offset` from an open fid.
    ///
    /// Directory reads return whole encoded stat entries laid end to
    /// end, and must use offset 0 or continue exactly where the
    /// previous read stopped; any other offset is an error.
    async fn read(&self, req: Tread) -> Result<Rread, Error>;

    /// Write data at `offset` through an open fid.  Writing to a
    /// directory is illegal.
    async fn write(&self, req: Twrite) -> Result<Rwrite, Error>;

    /// Release `fid`.  The fid becomes reusable even when an error is
    /// returned.
    async fn clunk(&self, req: Tclunk) -> Result<Rclunk, Error>;

    /// Release `fid` and remove its file, permissions allowing; the fid
    /// is released regardless of whether the removal succeeded.
    async fn remove(&self, req: Tremove) -> Result<Rremove, Error>;

    /// Fetch the stat record of the file behind `fid`.
    async fn stat(&self, req: Tstat) -> Result<Rstat, Error>;

    /// Apply a stat record to the file behind `fid`.
    ///
    /// Either every non-sentinel field is applied or none is; partial
    /// application is forbidden.  A record with every field at its
    /// "don't touch" value asks the server to flush the file to stable
    /// storage.
    async fn wstat(&self, req: Twstat) -> Result<Rwstat, Error>;
}
