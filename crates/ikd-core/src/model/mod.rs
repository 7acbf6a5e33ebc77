pub mod feed;
pub mod source;
pub mod subscription;
pub mod thing;

pub use feed::{AggregatorRef, Feed, Language};
pub use source::{Source, SourceCommon, SourceKind};
pub use subscription::{Subscription, SubscriptionKey, SubscriptionState};
pub use thing::{Site, Thing};
