pub mod events {

    pub const LOG_CAPACITY: usize = 100;

    /// Separator between channel and event name in an event log key.
    pub const KEY_SEPARATOR: char = ':';
}

pub mod channels {

    pub const USER_PREFIX: &str = "user-";

    pub const CONVERSATION_PREFIX: &str = "conversation-";

    pub const TYPING_PREFIX: &str = "typing-";

    pub const PRESENCE_PREFIX: &str = "presence-";
}

pub mod relay {

    pub const CONNECTION_ID_LEN: usize = 13;
}

pub mod limits {

    pub const MAX_CHANNEL_LEN: usize = 256;

    pub const MAX_EVENT_NAME_LEN: usize = 128;
}
