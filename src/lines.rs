//! Reason tokens sent in `ERR` replies.
//!
//! Reasons are single snake_case tokens so that clients can keep parsing
//! replies as space-separated fields.

pub const MALFORMED_LINE: &str = "malformed_line";
pub const UNKNOWN_COMMAND: &str = "unknown_command";
pub const MISSING_KEY: &str = "missing_key";

pub const MISSING_TOKEN: &str = "missing_token";
pub const BAD_TOKEN: &str = "bad_token";
pub const BAD_CREDENTIALS: &str = "bad_credentials";
pub const ALREADY_LOGGED_IN: &str = "already_logged_in";

pub const BAD_USERNAME: &str = "bad_username";
pub const BAD_PASSWORD: &str = "bad_password";
pub const BAD_EMAIL: &str = "bad_email";
pub const USERNAME_TAKEN: &str = "username_taken";
pub const USER_NOT_FOUND: &str = "user_not_found";

pub const SELF_INVITE: &str = "self_invite";
pub const ALREADY_FRIENDS: &str = "already_friends";
pub const INVITE_PENDING: &str = "invite_pending";
pub const NO_INVITE: &str = "no_invite";
pub const NOT_FRIENDS: &str = "not_friends";

pub const BAD_GROUP_ID: &str = "bad_group_id";
pub const BAD_GROUP_NAME: &str = "bad_group_name";
pub const GROUP_NOT_FOUND: &str = "group_not_found";
pub const NOT_OWNER: &str = "not_owner";
pub const NOT_A_MEMBER: &str = "not_a_member";
pub const ALREADY_MEMBER: &str = "already_member";
pub const OWNER_CANNOT_LEAVE: &str = "owner_cannot_leave";
pub const CANNOT_REMOVE_OWNER: &str = "cannot_remove_owner";

pub const SELF_MESSAGE: &str = "self_message";
pub const BAD_BASE64: &str = "bad_base64";
pub const EMPTY_CONTENT: &str = "empty_content";
pub const BAD_LIMIT: &str = "bad_limit";
