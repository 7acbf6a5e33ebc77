//! Frozen stanza/error condition names.

pub const WAIT: &str = "wait";
pub const ITEM_NOT_FOUND: &str = "item-not-found";
pub const UNEXPECTED_REQUEST: &str = "unexpected-request";
pub const REMOTE_SERVER_NOT_FOUND: &str = "remote-server-not-found";
