//! Handlers for the GROUP_* commands.
//!
//! Only the owner may change the membership.  Removing a member that has
//! the group chat open goes through the kick path: the member's connection
//! is pushed a `GM_KICKED` notice, dropped from the live room and loses its
//! chat focus.

use super::{find_group, find_user, parse_group_id, require, CommandContext, HandlerResult, StateInner};
use crate::client::ChatFocus;
use crate::lines;
use causerie_tokens::{code, Buffer, Message};

impl StateInner {
    pub fn cmd_group_create(&mut self, ctx: CommandContext<'_>, msg: &Message<'_>) -> HandlerResult {
        let me = ctx.user.unwrap();
        let name = require(ctx.rb, msg, "name")?;
        if !is_valid_group_name(name) {
            log::debug!("{}:         bad group name", ctx.id);
            ctx.rb.err(code::VALIDATION, lines::BAD_GROUP_NAME);
            return Err(());
        }

        let group_id = self.next_group_id;
        self.next_group_id += 1;
        self.groups
            .insert(group_id, crate::group::Group::new(group_id, name.to_owned(), me));
        self.persist_groups();

        log::info!("{}: {} created group {} ({})", ctx.id, self.username(me), name, group_id);
        ctx.rb.ok().field("group_id", &group_id.to_string());
        Ok(())
    }

    pub fn cmd_group_add(&mut self, ctx: CommandContext<'_>, msg: &Message<'_>) -> HandlerResult {
        let me = ctx.user.unwrap();
        let group_id_raw = require(ctx.rb, msg, "group_id")?;
        let group_id = parse_group_id(ctx.rb, group_id_raw)?;
        let name = require(ctx.rb, msg, "username")?;

        {
            let group = find_group(ctx.rb, &self.groups, group_id)?;
            if group.owner != me {
                log::debug!("{}:         not the owner", ctx.id);
                ctx.rb.err(code::FORBIDDEN, lines::NOT_OWNER);
                return Err(());
            }
        }
        let other = find_user(ctx.rb, &self.users_by_name, name)?;

        let group = self.groups.get_mut(&group_id).unwrap();
        if !group.members.insert(other) {
            ctx.rb.err(code::CONFLICT, lines::ALREADY_MEMBER);
            return Err(());
        }
        self.persist_groups();
        ctx.rb.ok().field("status", "added");
        Ok(())
    }

    pub fn cmd_group_remove(&mut self, ctx: CommandContext<'_>, msg: &Message<'_>) -> HandlerResult {
        let me = ctx.user.unwrap();
        let group_id_raw = require(ctx.rb, msg, "group_id")?;
        let group_id = parse_group_id(ctx.rb, group_id_raw)?;
        let name = require(ctx.rb, msg, "username")?;

        {
            let group = find_group(ctx.rb, &self.groups, group_id)?;
            if group.owner != me {
                log::debug!("{}:         not the owner", ctx.id);
                ctx.rb.err(code::FORBIDDEN, lines::NOT_OWNER);
                return Err(());
            }
        }
        let other = find_user(ctx.rb, &self.users_by_name, name)?;
        if other == me {
            // the owner stays a member for the group's whole lifetime
            ctx.rb.err(code::BAD_REQUEST, lines::CANNOT_REMOVE_OWNER);
            return Err(());
        }

        let group = self.groups.get_mut(&group_id).unwrap();
        if !group.members.remove(&other) {
            ctx.rb.err(code::NOT_FOUND, lines::NOT_A_MEMBER);
            return Err(());
        }
        self.persist_groups();
        self.kick_from_room(group_id, other);

        log::info!("group {}: {} removed", group_id, name);
        ctx.rb.ok().field("status", "removed");
        Ok(())
    }

    pub fn cmd_group_leave(&mut self, ctx: CommandContext<'_>, msg: &Message<'_>) -> HandlerResult {
        let me = ctx.user.unwrap();
        let group_id_raw = require(ctx.rb, msg, "group_id")?;
        let group_id = parse_group_id(ctx.rb, group_id_raw)?;

        {
            let group = find_group(ctx.rb, &self.groups, group_id)?;
            if group.owner == me {
                log::debug!("{}:         owner may not leave", ctx.id);
                ctx.rb.err(code::BAD_REQUEST, lines::OWNER_CANNOT_LEAVE);
                return Err(());
            }
        }
        if self.clients[ctx.id].focus() == ChatFocus::Gm(group_id) {
            self.leave_chat(ctx.id, me);
        }
        let group = self.groups.get_mut(&group_id).unwrap();
        if !group.members.remove(&me) {
            ctx.rb.err(code::FORBIDDEN, lines::NOT_A_MEMBER);
            return Err(());
        }
        self.persist_groups();
        ctx.rb.ok().field("status", "left");
        Ok(())
    }

    pub fn cmd_group_list(&mut self, ctx: CommandContext<'_>) -> HandlerResult {
        let me = ctx.user.unwrap();
        let mut groups: Vec<(crate::GroupId, &str)> = self
            .groups
            .values()
            .filter(|group| group.is_member(me))
            .map(|group| (group.id, group.name.as_str()))
            .collect();
        groups.sort_unstable_by_key(|&(group_id, _)| group_id);

        let mut reply = ctx.rb.ok();
        let out = reply.raw_field("groups");
        for (i, (group_id, name)) in groups.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_str(&group_id.to_string());
            out.push(':');
            out.push_str(name);
        }
        Ok(())
    }

    pub fn cmd_group_members(&mut self, ctx: CommandContext<'_>, msg: &Message<'_>) -> HandlerResult {
        let me = ctx.user.unwrap();
        let group_id_raw = require(ctx.rb, msg, "group_id")?;
        let group_id = parse_group_id(ctx.rb, group_id_raw)?;
        let group = find_group(ctx.rb, &self.groups, group_id)?;
        if !group.is_member(me) {
            log::debug!("{}:         not a member", ctx.id);
            ctx.rb.err(code::FORBIDDEN, lines::NOT_A_MEMBER);
            return Err(());
        }

        let mut names: Vec<&str> = group
            .members
            .iter()
            .map(|&member| self.username(member))
            .collect();
        names.sort_unstable();

        let mut reply = ctx.rb.ok();
        let out = reply.raw_field("members");
        for (i, name) in names.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_str(name);
        }
        Ok(())
    }

    /// The kick path: if `user_id` has the group chat open, its connection
    /// is notified, dropped from the live room and loses its focus.
    fn kick_from_room(&mut self, group_id: crate::GroupId, user_id: crate::UserId) {
        let conn = match self.sessions_by_user.get(&user_id) {
            Some(token) => self.sessions[token].conn,
            None => return,
        };
        let in_room = match self.groups.get_mut(&group_id) {
            Some(group) => group.room.remove(&conn),
            None => false,
        };
        if !in_room {
            return;
        }
        if let Some(client) = self.clients.get_mut(conn) {
            client.set_focus(ChatFocus::None);
        }
        let mut notice = Buffer::new();
        notice.push("GM_KICKED").field("group_id", &group_id.to_string());
        self.send(conn, notice.into());
    }
}

/// Whether a string is accepted as a group name.
///
/// Same alphabet as usernames (plus `-`) so that names survive the
/// `id:name` list encoding of GROUP_LIST.
fn is_valid_group_name(s: &str) -> bool {
    (1..=32).contains(&s.len())
        && s.bytes().all(|c| c.is_ascii_alphanumeric() || c == b'_' || c == b'-')
}

#[cfg(test)]
mod tests {
    use super::super::test::*;
    use super::*;

    #[test]
    fn test_is_valid_group_name() {
        assert!(is_valid_group_name("club"));
        assert!(is_valid_group_name("g1-test_2"));

        assert!(!is_valid_group_name(""));
        assert!(!is_valid_group_name(&"g".repeat(33)));
        assert!(!is_valid_group_name("no:colons"));
        assert!(!is_valid_group_name("no,commas"));
    }

    #[test]
    fn test_create_add_members() {
        let mut state = simple_state();
        let (ca, mut qa, ta) = add_logged_in(&mut state, "alice");
        let (_cb, _qb, _tb) = add_logged_in(&mut state, "bob");

        state.handle_line(ca, &format!("GROUP_CREATE 1 token={} name=club", ta));
        let rs = responses(&mut qa);
        let group_id = rs[0].kv["group_id"].clone();
        assert_eq!(group_id, "1");

        state.handle_line(ca, &format!("GROUP_ADD 2 token={} group_id={} username=bob", ta, group_id));
        state.handle_line(ca, &format!("GROUP_MEMBERS 3 token={} group_id={}", ta, group_id));
        let rs = responses(&mut qa);
        assert_eq!(rs[0].kv["status"], "added");
        assert_eq!(rs[1].kv["members"], "alice,bob");
    }

    #[test]
    fn test_add_requires_ownership() {
        let mut state = simple_state();
        let (ca, mut qa, ta) = add_logged_in(&mut state, "alice");
        let (cb, mut qb, tb) = add_logged_in(&mut state, "bob");

        state.handle_line(ca, &format!("GROUP_CREATE 1 token={} name=club", ta));
        state.handle_line(ca, &format!("GROUP_ADD 2 token={} group_id=1 username=bob", ta));
        flush(&mut qa);

        state.handle_line(cb, &format!("GROUP_ADD 3 token={} group_id=1 username=bob", tb));
        let rs = responses(&mut qb);
        assert_eq!((rs[0].kind.as_str(), rs[0].code), ("ERR", Some(403)));
    }

    #[test]
    fn test_add_errors() {
        let mut state = simple_state();
        let (ca, mut qa, ta) = add_logged_in(&mut state, "alice");
        let (_cb, _qb, _tb) = add_logged_in(&mut state, "bob");

        state.handle_line(ca, &format!("GROUP_CREATE 1 token={} name=club", ta));
        state.handle_line(ca, &format!("GROUP_ADD 2 token={} group_id=xyz username=bob", ta));
        state.handle_line(ca, &format!("GROUP_ADD 3 token={} group_id=99 username=bob", ta));
        state.handle_line(ca, &format!("GROUP_ADD 4 token={} group_id=1 username=ghost", ta));
        state.handle_line(ca, &format!("GROUP_ADD 5 token={} group_id=1 username=bob", ta));
        state.handle_line(ca, &format!("GROUP_ADD 6 token={} group_id=1 username=bob", ta));
        let rs = responses(&mut qa);
        assert_eq!((rs[1].kind.as_str(), rs[1].code), ("ERR", Some(400)));
        assert_eq!((rs[2].kind.as_str(), rs[2].code), ("ERR", Some(404)));
        assert_eq!((rs[3].kind.as_str(), rs[3].code), ("ERR", Some(404)));
        assert_eq!(rs[4].kind, "OK");
        assert_eq!((rs[5].kind.as_str(), rs[5].code), ("ERR", Some(409)));
    }

    #[test]
    fn test_owner_cannot_leave_or_remove_self() {
        let mut state = simple_state();
        let (ca, mut qa, ta) = add_logged_in(&mut state, "alice");

        state.handle_line(ca, &format!("GROUP_CREATE 1 token={} name=club", ta));
        state.handle_line(ca, &format!("GROUP_LEAVE 2 token={} group_id=1", ta));
        state.handle_line(ca, &format!("GROUP_REMOVE 3 token={} group_id=1 username=alice", ta));
        let rs = responses(&mut qa);
        assert_eq!((rs[1].kind.as_str(), rs[1].code), ("ERR", Some(400)));
        assert_eq!((rs[2].kind.as_str(), rs[2].code), ("ERR", Some(400)));

        // the invariant held
        assert!(state.groups[&1].is_member(state.users_by_name["alice"]));
    }

    #[test]
    fn test_member_leave() {
        let mut state = simple_state();
        let (ca, mut qa, ta) = add_logged_in(&mut state, "alice");
        let (cb, mut qb, tb) = add_logged_in(&mut state, "bob");

        state.handle_line(ca, &format!("GROUP_CREATE 1 token={} name=club", ta));
        state.handle_line(ca, &format!("GROUP_ADD 2 token={} group_id=1 username=bob", ta));
        flush(&mut qa);

        state.handle_line(cb, &format!("GROUP_LEAVE 3 token={} group_id=1", tb));
        state.handle_line(cb, &format!("GROUP_LIST 4 token={}", tb));
        let rs = responses(&mut qb);
        assert_eq!(rs[0].kv["status"], "left");
        assert_eq!(rs[1].kv["groups"], "");

        // leaving twice is forbidden, bob is not a member anymore
        state.handle_line(cb, &format!("GROUP_LEAVE 5 token={} group_id=1", tb));
        let rs = responses(&mut qb);
        assert_eq!((rs[0].kind.as_str(), rs[0].code), ("ERR", Some(403)));
    }

    #[test]
    fn test_group_list() {
        let mut state = simple_state();
        let (ca, mut qa, ta) = add_logged_in(&mut state, "alice");
        let (cb, mut qb, tb) = add_logged_in(&mut state, "bob");

        state.handle_line(ca, &format!("GROUP_CREATE 1 token={} name=first", ta));
        state.handle_line(ca, &format!("GROUP_CREATE 2 token={} name=second", ta));
        state.handle_line(ca, &format!("GROUP_ADD 3 token={} group_id=2 username=bob", ta));
        flush(&mut qa);

        state.handle_line(ca, &format!("GROUP_LIST 4 token={}", ta));
        let rs = responses(&mut qa);
        assert_eq!(rs[0].kv["groups"], "1:first,2:second");

        state.handle_line(cb, &format!("GROUP_LIST 5 token={}", tb));
        let rs = responses(&mut qb);
        assert_eq!(rs[0].kv["groups"], "2:second");
    }

    #[test]
    fn test_members_is_restricted_to_members() {
        let mut state = simple_state();
        let (ca, mut qa, ta) = add_logged_in(&mut state, "alice");
        let (cb, mut qb, tb) = add_logged_in(&mut state, "bob");

        state.handle_line(ca, &format!("GROUP_CREATE 1 token={} name=club", ta));
        flush(&mut qa);
        state.handle_line(cb, &format!("GROUP_MEMBERS 2 token={} group_id=1", tb));
        let rs = responses(&mut qb);
        assert_eq!((rs[0].kind.as_str(), rs[0].code), ("ERR", Some(403)));
    }

    #[test]
    fn test_leave_while_in_room_notifies_the_others() {
        let mut state = simple_state();
        let (ca, mut qa, ta) = add_logged_in(&mut state, "alice");
        let (cb, mut qb, tb) = add_logged_in(&mut state, "bob");

        state.handle_line(ca, &format!("GROUP_CREATE 1 token={} name=club", ta));
        state.handle_line(ca, &format!("GROUP_ADD 2 token={} group_id=1 username=bob", ta));
        state.handle_line(ca, &format!("GM_CHAT_START 3 token={} group_id=1", ta));
        state.handle_line(cb, &format!("GM_CHAT_START 4 token={} group_id=1", tb));
        flush(&mut qa);
        flush(&mut qb);

        state.handle_line(cb, &format!("GROUP_LEAVE 5 token={} group_id=1", tb));
        let rs = responses(&mut qa);
        assert_eq!(rs[0].subject, "GM_LEAVE");
        assert_eq!(rs[0].kv["username"], "bob");
        assert!(state.groups[&1].room.len() == 1);
        flush(&mut qb);
    }

    #[test]
    fn test_remove_member_not_in_room() {
        let mut state = simple_state();
        let (ca, mut qa, ta) = add_logged_in(&mut state, "alice");
        let (_cb, mut qb, _tb) = add_logged_in(&mut state, "bob");

        state.handle_line(ca, &format!("GROUP_CREATE 1 token={} name=club", ta));
        state.handle_line(ca, &format!("GROUP_ADD 2 token={} group_id=1 username=bob", ta));
        state.handle_line(ca, &format!("GROUP_REMOVE 3 token={} group_id=1 username=bob", ta));
        let rs = responses(&mut qa);
        assert_eq!(rs[2].kv["status"], "removed");
        // bob was not in the room, no GM_KICKED
        assert!(responses(&mut qb).is_empty());

        state.handle_line(ca, &format!("GROUP_REMOVE 4 token={} group_id=1 username=bob", ta));
        let rs = responses(&mut qa);
        assert_eq!((rs[0].kind.as_str(), rs[0].code), ("ERR", Some(404)));
    }
}
