//! A generic registry guaranteeing exactly one live instance per type,
//! with thread-safe lazy initialization.
//!
//! The [`Registry`] maps a type key (the [`TypeId`](std::any::TypeId) of the
//! payload type) to that type's single instance. The first call to
//! [`Registry::get_or_create`] for a given type constructs the instance;
//! every later call, from any thread, returns a handle to that same
//! instance. Construction is raced safely: however many callers request a
//! fresh type concurrently, the builder runs at most once per successful
//! construction, and all callers observe the identical instance.
//!
//! The registry is an explicitly constructed value, not an ambient global.
//! Code that needs process-wide singletons creates one registry and passes
//! it (or an `Arc` of it) to the code that needs it; tests can create a
//! fresh registry per test case instead of sharing process-wide state.
//!
//! ```
//! use std::sync::Arc;
//! use once_registry::Registry;
//!
//! struct Logger;
//!
//! let registry = Registry::new();
//! let a: Arc<Logger> = registry.get_or_create(|| Logger).unwrap();
//! let b: Arc<Logger> = registry.get_or_create(|| Logger).unwrap();
//! assert!(Arc::ptr_eq(&a, &b));
//! ```

mod key;
mod local;
mod registry;
mod result;
mod tracing;

pub use self::registry::Registry;
pub use self::result::{Error, Result};
