//! `Thing` and `Site` reference records.

use ikd_protocol::id_of;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thing {
    pub title: String,
    pub uri: String,
}

impl Thing {
    pub fn new(title: impl Into<String>, uri: impl Into<String>) -> Self {
        Thing {
            title: title.into(),
            uri: uri.into(),
        }
    }

    /// Trailing integer path segment of `uri`. A malformed URI yields
    /// `None`, with callers treating the resulting undefined node address
    /// as "not subscribable".
    pub fn id(&self) -> Option<i64> {
        id_of(&self.uri)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    pub title: String,
    pub uri: String,
}

impl Site {
    pub fn new(title: impl Into<String>, uri: impl Into<String>) -> Self {
        Site {
            title: title.into(),
            uri: uri.into(),
        }
    }

    pub fn id(&self) -> Option<i64> {
        id_of(&self.uri)
    }
}
