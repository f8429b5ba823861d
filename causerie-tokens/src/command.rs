use std::fmt;

macro_rules! commands {
    ( $( $cmd:ident => $repr:literal, $auth:literal; )* ) => {
        /// The set of request verbs the server understands.
        #[derive(Clone, Copy, Debug, PartialEq, Eq)]
        pub enum Command {
            $( $cmd, )*
        }

        impl Command {
            /// From a verb token to the corresponding `Command`.
            pub fn parse(verb: &str) -> Option<Command> {
                match verb {
                    $( $repr => Some(Command::$cmd), )*
                    _ => None,
                }
            }

            /// The verb token of this command.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( Command::$cmd => $repr, )*
                }
            }

            /// Whether the command must carry a valid session token.
            pub fn requires_auth(&self) -> bool {
                match self {
                    $( Command::$cmd => $auth, )*
                }
            }
        }
    }
}

commands! {
    Ping            => "PING", false;
    Register        => "REGISTER", false;
    Login           => "LOGIN", false;
    Logout          => "LOGOUT", true;
    Whoami          => "WHOAMI", true;
    Disconnect      => "DISCONNECT", false;
    FriendInvite    => "FRIEND_INVITE", true;
    FriendAccept    => "FRIEND_ACCEPT", true;
    FriendReject    => "FRIEND_REJECT", true;
    FriendDelete    => "FRIEND_DELETE", true;
    FriendPending   => "FRIEND_PENDING", true;
    FriendList      => "FRIEND_LIST", true;
    GroupCreate     => "GROUP_CREATE", true;
    GroupAdd        => "GROUP_ADD", true;
    GroupRemove     => "GROUP_REMOVE", true;
    GroupLeave      => "GROUP_LEAVE", true;
    GroupList       => "GROUP_LIST", true;
    GroupMembers    => "GROUP_MEMBERS", true;
    PmChatStart     => "PM_CHAT_START", true;
    PmChatEnd       => "PM_CHAT_END", true;
    PmSend          => "PM_SEND", true;
    PmHistory       => "PM_HISTORY", true;
    PmConversations => "PM_CONVERSATIONS", true;
    GmChatStart     => "GM_CHAT_START", true;
    GmChatEnd       => "GM_CHAT_END", true;
    GmSend          => "GM_SEND", true;
    GmHistory       => "GM_HISTORY", true;
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
