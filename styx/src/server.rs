//! The server engine: a receive loop fanning requests out to handler
//! tasks and serializing their replies.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex;

use styx_protocol::{Message, ProtocolError, Rerror, MAXWELEM};

use crate::frame;
use crate::handler::Handler;
use crate::logger::{Logger, NullLogger};
use crate::{trace, Error};

/// A 9P2000 server over one connection.
///
/// Each decoded request runs on its own task so a slow operation (a
/// blocking read, a sluggish filesystem) never stalls the requests
/// behind it; replies are serialized through the shared write half.
/// The handler sees concurrent invocations and must be safe for them.
pub struct Server<H, R, W> {
    handler: Arc<H>,
    rd: R,
    wr: Arc<Mutex<W>>,
    logger: Arc<dyn Logger + Send + Sync>,
}

impl<H, R, W> Server<H, R, W>
where
    H: Handler + 'static,
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(rd: R, wr: W, handler: Arc<H>) -> Self {
        Self::with_logger(rd, wr, handler, Arc::new(NullLogger))
    }

    pub fn with_logger(
        rd: R,
        wr: W,
        handler: Arc<H>,
        logger: Arc<dyn Logger + Send + Sync>,
    ) -> Self {
        Self {
            handler,
            rd,
            wr: Arc::new(Mutex::new(wr)),
            logger,
        }
    }

    /// Run the receive loop until the peer disconnects or sends
    /// something unparseable.
    ///
    /// Requests still being handled when the loop exits may complete
    /// and attempt their writes; those fail harmlessly once the
    /// transport is gone.
    pub async fn run(&mut self) -> Result<(), Error> {
        trace!(self.logger, "9p server: starting");
        loop {
            let msg = match frame::read_message(&mut self.rd).await? {
                Some(m) => m,
                None => {
                    trace!(self.logger, "9p server: peer closed");
                    return Ok(());
                }
            };
            let mt = msg.message_type();
            if !mt.is_request() {
                trace!(self.logger, "9p server: {:?} is not a request", mt);
                return Err(ProtocolError::UnexpectedMessage(mt).into());
            }
            trace!(self.logger, "9p server: message {:?} {}", mt, msg.tag());
            self.dispatch(msg);
        }
    }

    fn dispatch(&self, req: Message) {
        let handler = self.handler.clone();
        let wr = self.wr.clone();
        let logger = self.logger.clone();
        tokio::spawn(async move {
            let tag = req.tag();
            let mt = req.message_type();
            let reply = match handle_request(handler.as_ref(), req).await {
                Ok(mut resp) => {
                    resp.set_tag(tag);
                    resp
                }
                // The flush path owns the reply for this tag.
                Err(Error::Flushed) => {
                    trace!(logger, "9p server: {:?} {} was flushed", mt, tag);
                    return;
                }
                Err(e) => {
                    trace!(logger, "9p server: {:?} {} failed: {}", mt, tag, e);
                    Message::Rerror(Rerror {
                        tag,
                        ename: e.to_ename(),
                    })
                }
            };
            let encoded = match reply.encode() {
                Ok(data) => data,
                Err(e) => {
                    // The handler produced something unencodable, an
                    // oversized read for instance; the client still
                    // deserves an answer for this tag.
                    let fallback = Message::Rerror(Rerror {
                        tag,
                        ename: Error::from(e).to_ename(),
                    });
                    match fallback.encode() {
                        Ok(data) => data,
                        Err(_) => return,
                    }
                }
            };
            trace!(logger, "9p server: frame {}", hex::encode(&encoded));
            let mut g = wr.lock().await;
            if let Err(e) = frame::write_frame(&mut *g, &encoded).await {
                trace!(logger, "9p server: reply for {} not written: {}", tag, e);
            }
        });
    }
}

async fn handle_request<H: Handler>(h: &H, req: Message) -> Result<Message, Error> {
    match req {
        Message::Tversion(r) => h.version(r).await.map(Message::Rversion),
        Message::Tauth(r) => h.auth(r).await.map(Message::Rauth),
        Message::Tattach(r) => h.attach(r).await.map(Message::Rattach),
        Message::Tflush(r) => h.flush(r).await.map(Message::Rflush),
        Message::Twalk(r) => {
            if r.wname.len() > MAXWELEM {
                return Err(Error::remote("too many walk elements"));
            }
            h.walk(r).await.map(Message::Rwalk)
        }
        Message::Topen(r) => h.open(r).await.map(Message::Ropen),
        Message::Tcreate(r) => h.create(r).await.map(Message::Rcreate),
        Message::Tread(r) => h.read(r).await.map(Message::Rread),
        Message::Twrite(r) => h.write(r).await.map(Message::Rwrite),
        Message::Tclunk(r) => h.clunk(r).await.map(Message::Rclunk),
        Message::Tremove(r) => h.remove(r).await.map(Message::Rremove),
        Message::Tstat(r) => h.stat(r).await.map(Message::Rstat),
        Message::Twstat(r) => h.wstat(r).await.map(Message::Rwstat),
        // run() only dispatches T-messages.
        m => Err(Error::Protocol(ProtocolError::UnexpectedMessage(
            m.message_type(),
        ))),
    }
}
