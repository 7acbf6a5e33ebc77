//! The Persistent Source Registry and formatter library.
//!
//! `model` holds the data shapes (Feed/Source/Subscription/Thing/Site),
//! `texts`/`formatter` turn payloads into [`Notification`]s, `store` is the
//! async registry gateway, and `image` is the pure side of the image-URL
//! extractor. The Dispatcher, Monitor, and aggregators that drive these
//! types live in `services/notifier` — this crate has no I/O of its own
//! beyond the injected [`image::ImageResolver`] boundary.

pub mod formatter;
pub mod image;
pub mod model;
pub mod store;
pub mod texts;

pub use ikd_protocol::Notification;
pub use store::{MemoryStore, Store, StoreError};
