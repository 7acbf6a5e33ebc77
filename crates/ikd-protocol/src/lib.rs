//! Wire-level types shared between the notifier service and its tests.
//!
//! Mirrors the shape of a protocol crate in this workspace: small, mostly
//! derive-only structs with no behavior beyond encode/decode.

pub mod address;
pub mod error_codes;
pub mod notification;
pub mod pubsub;
pub mod twitter_wire;
pub mod xml;

pub use address::{host_of, id_of, pubsub_host_of, Address};
pub use notification::Notification;
pub use pubsub::{ItemsEvent, PubSubOutcome, PubSubRequest, StanzaCondition, StanzaError};
pub use twitter_wire::{Entities, MediaEntity, Status, StatusUser, StreamFilterArgs, UrlEntity};
pub use xml::Element;
