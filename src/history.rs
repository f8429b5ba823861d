//! Stored message records.
//!
//! Message contents are kept in their canonical base64 form: the decode on
//! `PM_SEND`/`GM_SEND` validates the transport encoding, and everything
//! that leaves the server (history replies, pushes) re-sends the encoded
//! form as-is.

use crate::UserId;
use serde::{Deserialize, Serialize};

/// Default number of messages returned by history commands.
pub const DEFAULT_LIMIT: usize = 50;
/// Hard cap on the `limit` key.
pub const MAX_LIMIT: usize = 1000;

/// Normalized key for the unordered pair of private chat participants.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct PairKey(pub UserId, pub UserId);

impl PairKey {
    pub fn new(a: UserId, b: UserId) -> PairKey {
        if a <= b {
            PairKey(a, b)
        } else {
            PairKey(b, a)
        }
    }
}

/// One private message.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PmRecord {
    pub msg_id: u64,
    pub from: UserId,
    pub to: UserId,
    /// Base64 of the message bytes.
    pub content: String,
    pub ts: i64,
}

/// One group message.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct GmRecord {
    pub msg_id: u64,
    pub from: UserId,
    /// Base64 of the message bytes.
    pub content: String,
    pub ts: i64,
}

/// All private messages between one pair of users, in both directions.
///
/// `msg_id`s are allocated from a single per-conversation counter, so the
/// merged two-way history is monotonic and each direction is strictly
/// monotonic on its own.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Conversation {
    next_msg_id: u64,
    pub messages: Vec<PmRecord>,
}

impl Conversation {
    /// Records a message and returns its id.
    pub fn append(&mut self, from: UserId, to: UserId, content: String, ts: i64) -> u64 {
        self.next_msg_id += 1;
        let msg_id = self.next_msg_id;
        self.messages.push(PmRecord {
            msg_id,
            from,
            to,
            content,
            ts,
        });
        msg_id
    }

    /// The last `limit` messages, oldest first.
    pub fn tail(&self, limit: usize) -> &[PmRecord] {
        let len = self.messages.len();
        &self.messages[len.saturating_sub(limit)..]
    }

    /// Timestamp of the most recent message.
    pub fn last_ts(&self) -> i64 {
        self.messages.last().map(|record| record.ts).unwrap_or(0)
    }
}
