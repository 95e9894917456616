//! cadence-store — entity storage and task coordination backends.
//!
//! The [`Store`] trait covers both concerns: typed CRUD over the four
//! entity kinds, and the lease/keepalive primitives the task coordinator
//! is built on. Two interchangeable backends:
//!
//! - [`LocalStore`] — in-process, one RwLock per entity kind. Single
//!   exporter instance only.
//! - [`RedisStore`] — shared Redis backend for horizontally-scaled
//!   deployments, with a fixed key layout for interoperability.
//!
//! Both are `Send + Sync` and used through `Arc<dyn Store>`.

pub mod error;
pub mod local;
pub mod redis;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use local::LocalStore;
pub use redis::RedisStore;
pub use store::Store;
