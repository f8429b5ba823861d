//! Handlers for group messaging.
//!
//! Every group keeps a live room: the set of connections whose chat focus
//! is that group.  Messages fan out to the room, never to the sender's own
//! connection; entering and leaving the room is announced to the others.

use super::pm::decode_content;
use super::{find_group, parse_group_id, parse_limit, require, CommandContext, HandlerResult, StateInner};
use crate::client::ChatFocus;
use crate::lines;
use crate::util;
use crate::GroupId;
use causerie_tokens::{code, Buffer, Message};

impl StateInner {
    pub fn cmd_gm_chat_start(&mut self, ctx: CommandContext<'_>, msg: &Message<'_>) -> HandlerResult {
        let me = ctx.user.unwrap();
        let group_id_raw = require(ctx.rb, msg, "group_id")?;
        let group_id = parse_group_id(ctx.rb, group_id_raw)?;
        let limit = parse_limit(ctx.rb, msg)?;
        self.check_membership(&mut *ctx.rb, ctx.id, group_id, me)?;

        if self.clients[ctx.id].focus() != ChatFocus::Gm(group_id) {
            self.leave_chat(ctx.id, me);
            self.groups.get_mut(&group_id).unwrap().room.insert(ctx.id);
            self.clients[ctx.id].set_focus(ChatFocus::Gm(group_id));

            let mut notice = Buffer::new();
            notice
                .push("GM_JOIN")
                .field("group_id", &group_id.to_string())
                .field("username", self.username(me));
            self.send_to_room(group_id, Some(ctx.id), notice.into());
        }

        let mut reply = ctx.rb.ok().field("group_id", &group_id.to_string());
        let out = reply.raw_field("messages");
        self.write_gm_entries(out, self.groups[&group_id].tail(limit));
        Ok(())
    }

    pub fn cmd_gm_chat_end(&mut self, ctx: CommandContext<'_>) -> HandlerResult {
        let me = ctx.user.unwrap();
        if let ChatFocus::Gm(_) = self.clients[ctx.id].focus() {
            self.leave_chat(ctx.id, me);
        }
        ctx.rb.ok().field("status", "ok");
        Ok(())
    }

    pub fn cmd_gm_send(&mut self, ctx: CommandContext<'_>, msg: &Message<'_>) -> HandlerResult {
        let me = ctx.user.unwrap();
        let group_id_raw = require(ctx.rb, msg, "group_id")?;
        let group_id = parse_group_id(ctx.rb, group_id_raw)?;
        let encoded = require(ctx.rb, msg, "content")?;
        self.check_membership(&mut *ctx.rb, ctx.id, group_id, me)?;
        let content = decode_content(ctx.rb, ctx.id, encoded)?;

        let ts = util::now_ts();
        let msg_id = self
            .groups
            .get_mut(&group_id)
            .unwrap()
            .append(me, content.clone(), ts);
        self.persist_groups();

        let mut push = Buffer::new();
        push.push("GM")
            .field("group_id", &group_id.to_string())
            .field("from", self.username(me))
            .field("content", &content)
            .field("msg_id", &msg_id.to_string())
            .field("ts", &ts.to_string());
        self.send_to_room(group_id, Some(ctx.id), push.into());

        ctx.rb.ok().field("msg_id", &msg_id.to_string());
        Ok(())
    }

    pub fn cmd_gm_history(&mut self, ctx: CommandContext<'_>, msg: &Message<'_>) -> HandlerResult {
        let me = ctx.user.unwrap();
        let group_id_raw = require(ctx.rb, msg, "group_id")?;
        let group_id = parse_group_id(ctx.rb, group_id_raw)?;
        let limit = parse_limit(ctx.rb, msg)?;
        self.check_membership(&mut *ctx.rb, ctx.id, group_id, me)?;

        let mut reply = ctx.rb.ok();
        let out = reply.raw_field("messages");
        self.write_gm_entries(out, self.groups[&group_id].tail(limit));
        Ok(())
    }

    /// Rejects non-members of the group with `403`, unknown groups with
    /// `404`.
    fn check_membership(
        &self,
        rb: &mut causerie_tokens::ReplyBuffer,
        id: crate::ConnId,
        group_id: GroupId,
        user_id: crate::UserId,
    ) -> Result<(), ()> {
        let group = find_group(rb, &self.groups, group_id)?;
        if !group.is_member(user_id) {
            log::debug!("{}:         not a member of group {}", id, group_id);
            rb.err(code::FORBIDDEN, lines::NOT_A_MEMBER);
            return Err(());
        }
        Ok(())
    }
}
