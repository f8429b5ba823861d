//! Group data: ownership, membership and the live chat room.

use crate::history::GmRecord;
use crate::{ConnId, GroupId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A named group of users.
///
/// The owner is always a member.  Group messages are kept here next to the
/// membership because their ids are allocated per group.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub owner: UserId,

    /// Set of group members, by user id.
    pub members: HashSet<UserId>,

    /// Connections whose chat focus is this group right now.  Runtime-only:
    /// the room always starts empty after a restart.
    #[serde(skip)]
    pub room: HashSet<ConnId>,

    next_msg_id: u64,
    pub messages: Vec<GmRecord>,
}

impl Group {
    /// Creates a group owned by `owner`, who becomes its first member.
    pub fn new(id: GroupId, name: String, owner: UserId) -> Group {
        let mut members = HashSet::new();
        members.insert(owner);
        Group {
            id,
            name,
            owner,
            members,
            room: HashSet::new(),
            next_msg_id: 0,
            messages: Vec::new(),
        }
    }

    pub fn is_member(&self, user_id: UserId) -> bool {
        self.members.contains(&user_id)
    }

    /// Records a message and returns its id.
    pub fn append(&mut self, from: UserId, content: String, ts: i64) -> u64 {
        self.next_msg_id += 1;
        let msg_id = self.next_msg_id;
        self.messages.push(GmRecord {
            msg_id,
            from,
            content,
            ts,
        });
        msg_id
    }

    /// The last `limit` messages, oldest first.
    pub fn tail(&self, limit: usize) -> &[GmRecord] {
        let len = self.messages.len();
        &self.messages[len.saturating_sub(limit)..]
    }
}
