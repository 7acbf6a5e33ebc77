//! Microblog support: the reconnecting stream consumer, the
//! union-filter dispatcher, and the oEmbed image resolver's HTTP side.

pub mod dispatcher;
pub mod image_resolver;
pub mod monitor;

pub use dispatcher::MicroblogDispatcher;
pub use image_resolver::OEmbedImageResolver;
pub use monitor::{Monitor, MonitorDelegate, TwitterCredentials};
