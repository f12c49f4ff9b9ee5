//! The client engine: many concurrent callers multiplexed over one
//! connection by tag.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::{oneshot, Mutex, RwLock};

use styx_protocol::{
    Message, MessageType, Rattach, Rauth, Rclunk, Rcreate, Rflush, Ropen, Rread, Rremove, Rstat,
    Rversion, Rwalk, Rwrite, Rwstat, Tag, Tattach, Tauth, Tclunk, Tcreate, Tflush, Topen, Tread,
    Tremove, Tstat, Tversion, Twalk, Twrite, Twstat, NOTAG,
};

use crate::frame;
use crate::handler::Handler;
use crate::logger::{Logger, NullLogger};
use crate::{trace, Error};

/// What a pending caller is woken with.
///
/// Delivery and cancellation are distinct outcomes, and a sender dropped
/// without either means the connection died underneath the request.
enum Completion {
    Delivered(Message),
    Flushed,
}

/// A 9P2000 client over one connection.
///
/// Operations come from the [`Handler`] impl: build a request, pass it
/// to the matching method, get the typed response or an [`Error`].
/// [`run`](Client::run) must be executing on some task for responses to
/// be delivered.
///
/// Callers pick their own tags ([`next_tag`](Client::next_tag) hands
/// out fresh ones) so that an in-flight request can be cancelled by
/// sending [`Tflush`] with its tag.  Issuing a tag that is already in
/// flight fails with [`Error::TagInUse`].
pub struct Client<R, W> {
    logger: Arc<dyn Logger + Send + Sync>,
    rd: Mutex<R>,
    wr: Mutex<W>,
    pending: Mutex<HashMap<u16, oneshot::Sender<Completion>>>,
    next_tag: Mutex<u16>,
    closing: RwLock<bool>,
}

impl<R, W> Client<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(rd: R, wr: W) -> Self {
        Self::with_logger(rd, wr, Arc::new(NullLogger))
    }

    pub fn with_logger(rd: R, wr: W, logger: Arc<dyn Logger + Send + Sync>) -> Self {
        Self {
            logger,
            rd: Mutex::new(rd),
            wr: Mutex::new(wr),
            pending: Mutex::new(HashMap::new()),
            next_tag: Mutex::new(0),
            closing: RwLock::new(false),
        }
    }

    /// Allocate a fresh tag.
    ///
    /// The counter wraps and skips `NOTAG`.  This is advisory only; a
    /// caller may use any tag, and a collision with a pending one is
    /// reported by the send path.
    pub async fn next_tag(&self) -> Tag {
        let mut g = self.next_tag.lock().await;
        let t = *g;
        *g = g.wrapping_add(1);
        if *g == NOTAG.0 {
            *g = g.wrapping_add(1);
        }
        Tag(t)
    }

    /// Run the reader for the life of the connection, routing each
    /// response to the caller waiting on its tag.
    ///
    /// Returns when the peer closes (cleanly at a frame boundary:
    /// `Ok(())`) or on the first transport or protocol failure.  Either
    /// way every still-pending caller is woken with [`Error::Closed`]
    /// and the write side is shut down.
    pub async fn run(&self) -> Result<(), Error> {
        let res = self.recv_loop().await;
        if let Err(e) = &res {
            trace!(self.logger, "9p client: reader terminating: {}", e);
        }
        {
            // Lock order is closing before pending, here and in send.
            let mut closing = self.closing.write().await;
            *closing = true;
            // Dropping the senders wakes the callers.
            self.pending.lock().await.clear();
        }
        let mut wr = self.wr.lock().await;
        let _ = wr.shutdown().await;
        res
    }

    async fn recv_loop(&self) -> Result<(), Error> {
        loop {
            let msg = {
                let mut rd = self.rd.lock().await;
                match frame::read_message(&mut *rd).await? {
                    Some(m) => m,
                    None => return Ok(()),
                }
            };
            let tag = msg.tag();
            trace!(
                self.logger,
                "9p client: received {:?} {}",
                msg.message_type(),
                tag
            );
            let slot = self.pending.lock().await.remove(&tag.0);
            match slot {
                Some(tx) => {
                    let _ = tx.send(Completion::Delivered(msg));
                }
                // Nobody waiting: dropped, most likely a late reply for
                // a tag that was flushed.
                None => trace!(self.logger, "9p client: nobody waiting on {}", tag),
            }
        }
    }

    /// Initiate shutdown: new sends fail, waiting callers are woken with
    /// [`Error::Closed`], and the write side is closed so the peer sees
    /// end of stream.
    pub async fn close(&self) {
        {
            let mut closing = self.closing.write().await;
            if *closing {
                return;
            }
            *closing = true;
            self.pending.lock().await.clear();
        }
        let mut wr = self.wr.lock().await;
        let _ = wr.shutdown().await;
    }

    async fn send(&self, m: Message) -> Result<Message, Error> {
        let tag = m.tag();
        let (tx, rx) = oneshot::channel();
        {
            // The closing guard is held across the insert so a slot can
            // never be parked after the teardown paths have drained the
            // table.
            let closing = self.closing.read().await;
            if *closing {
                return Err(Error::Closed);
            }
            let mut g = self.pending.lock().await;
            if g.contains_key(&tag.0) {
                return Err(Error::TagInUse(tag));
            }
            g.insert(tag.0, tx);
        }
        trace!(
            self.logger,
            "9p client: sending {:?} {}",
            m.message_type(),
            tag
        );
        let written = match m.encode() {
            Ok(data) => {
                trace!(self.logger, "9p client: frame {}", hex::encode(&data));
                let mut wr = self.wr.lock().await;
                frame::write_frame(&mut *wr, &data).await
            }
            Err(e) => Err(e.into()),
        };
        if let Err(e) = written {
            self.pending.lock().await.remove(&tag.0);
            return Err(e);
        }
        match rx.await {
            Ok(Completion::Delivered(Message::Rerror(r))) => Err(Error::Remote(r.ename)),
            Ok(Completion::Delivered(resp)) => Ok(resp),
            Ok(Completion::Flushed) => Err(Error::Flushed),
            Err(_) => Err(Error::Closed),
        }
    }

    /// Wake the caller pending under a just-flushed tag, if any.
    ///
    /// The tag may already be gone: its response can have raced the
    /// Rflush and been delivered normally, which the protocol allows.
    async fn finish_flush(&self, oldtag: Tag) {
        let slot = self.pending.lock().await.remove(&oldtag.0);
        if let Some(tx) = slot {
            let _ = tx.send(Completion::Flushed);
        }
    }
}

macro_rules! expect_response {
    ($resp:expr, $variant:ident) => {
        match $resp {
            Message::$variant(r) => Ok(r),
            m => Err(Error::InvalidResponse {
                expected: MessageType::$variant,
                got: m.message_type(),
            }),
        }
    };
}

#[async_trait]
impl<R, W> Handler for Client<R, W>
where
    R: AsyncRead + Unpin + Send + Sync,
    W: AsyncWrite + Unpin + Send + Sync,
{
    async fn version(&self, req: Tversion) -> Result<Rversion, Error> {
        expect_response!(self.send(Message::Tversion(req)).await?, Rversion)
    }

    async fn auth(&self, req: Tauth) -> Result<Rauth, Error> {
        expect_response!(self.send(Message::Tauth(req)).await?, Rauth)
    }

    async fn attach(&self, req: Tattach) -> Result<Rattach, Error> {
        expect_response!(self.send(Message::Tattach(req)).await?, Rattach)
    }

    async fn flush(&self, req: Tflush) -> Result<Rflush, Error> {
        let oldtag = req.oldtag;
        let resp = expect_response!(self.send(Message::Tflush(req)).await?, Rflush)?;
        self.finish_flush(oldtag).await;
        Ok(resp)
    }

    async fn walk(&self, req: Twalk) -> Result<Rwalk, Error> {
        expect_response!(self.send(Message::Twalk(req)).await?, Rwalk)
    }

    async fn open(&self, req: Topen) -> Result<Ropen, Error> {
        expect_response!(self.send(Message::Topen(req)).await?, Ropen)
    }

    async fn create(&self, req: Tcreate) -> Result<Rcreate, Error> {
        expect_response!(self.send(Message::Tcreate(req)).await?, Rcreate)
    }

    async fn read(&self, req: Tread) -> Result<Rread, Error> {
        expect_response!(self.send(Message::Tread(req)).await?, Rread)
    }

    async fn write(&self, req: Twrite) -> Result<Rwrite, Error> {
        expect_response!(self.send(Message::Twrite(req)).await?, Rwrite)
    }

    async fn clunk(&self, req: Tclunk) -> Result<Rclunk, Error> {
        expect_response!(self.send(Message::Tclunk(req)).await?, Rclunk)
    }

    async fn remove(&self, req: Tremove) -> Result<Rremove, Error> {
        expect_response!(self.send(Message::Tremove(req)).await?, Rremove)
    }

    async fn stat(&self, req: Tstat) -> Result<Rstat, Error> {
        expect_response!(self.send(Message::Tstat(req)).await?, Rstat)
    }

    async fn wstat(&self, req: Twstat) -> Result<Rwstat, Error> {
        expect_response!(self.send(Message::Twstat(req)).await?, Rwstat)
    }
}
