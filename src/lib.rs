//! Workspace facade crate.
//!
//! The actual service lives in `services/notifier`; this crate is a thin
//! stand-in so the workspace root carries a `[lib]` target. The
//! cross-component integration suites under `tests/integration/` depend
//! directly on the `notifier`/`ikd-core`/`ikd-protocol`/`ikd-test-utils`
//! crates (declared as dev-dependencies here) rather than through this
//! facade.

pub const PACKAGE_NAME: &str = env!("CARGO_PKG_NAME");
