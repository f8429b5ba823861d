//! Per-connection state.

use crate::{GroupId, UserId};
use causerie_tokens::{Buffer, ReplyBuffer};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Queue used by the state to push lines back to a connection.
///
/// The network task at the other end owns the socket and performs the
/// actual writes, one queue item at a time, which keeps every write to a
/// connection totally ordered.
pub type MessageQueue = mpsc::UnboundedSender<MessageQueueItem>;

/// A batch of outgoing lines, cheap to clone for fan-out.
#[derive(Clone, Debug)]
pub struct MessageQueueItem(Arc<str>);

impl From<String> for MessageQueueItem {
    fn from(s: String) -> Self {
        MessageQueueItem(Arc::from(s))
    }
}

impl From<Buffer> for MessageQueueItem {
    fn from(buf: Buffer) -> Self {
        buf.build().into()
    }
}

impl From<ReplyBuffer> for MessageQueueItem {
    fn from(rb: ReplyBuffer) -> Self {
        rb.build().into()
    }
}

impl AsRef<str> for MessageQueueItem {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl AsRef<[u8]> for MessageQueueItem {
    fn as_ref(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

/// The at-most-one chat a connection currently has open.
///
/// Governs whether an incoming message is pushed live or only recorded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatFocus {
    None,
    Pm(UserId),
    Gm(GroupId),
}

/// A connected peer.
pub struct Client {
    queue: MessageQueue,
    host: String,
    /// Token of the session bound to this connection, if any.
    session: Option<String>,
    focus: ChatFocus,
    /// Set when the server decided to close the connection after the
    /// pending replies are written.
    quitting: bool,
}

impl Client {
    pub fn new(queue: MessageQueue, host: String) -> Client {
        Client {
            queue,
            host,
            session: None,
            focus: ChatFocus::None,
            quitting: false,
        }
    }

    /// Queues lines to be written to the peer.
    pub fn send(&self, msg: MessageQueueItem) {
        let _ = self.queue.send(msg);
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn focus(&self) -> ChatFocus {
        self.focus
    }

    pub fn set_focus(&mut self, focus: ChatFocus) {
        self.focus = focus;
    }

    pub fn session_token(&self) -> Option<&str> {
        self.session.as_deref()
    }

    pub fn bind_session(&mut self, token: String) {
        self.session = Some(token);
    }

    pub fn clear_session(&mut self) {
        self.session = None;
    }

    pub fn set_quitting(&mut self) {
        self.quitting = true;
    }

    pub fn is_quitting(&self) -> bool {
        self.quitting
    }
}
