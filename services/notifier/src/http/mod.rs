pub mod admin;
pub mod response;

pub use admin::{AdminState, FilterRefreshHook, ResubscribeHook};
