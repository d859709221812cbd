//! The service layer provides the fundamental storage abstraction for the server.
//!
//! A [`StorageService`] wraps exactly one backend, chosen at startup through [`StorageConfig`]:
//!
//! - **memory**: a bounded, volatile store with least-recently-used eviction and optional
//!   idle expiration.
//! - **donut**: a persistent store that mirrors every object across one or more directories.
//!
//! Objects are addressed by an [`ObjectPath`], a bucket plus a `/`-separated key.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod backend;
pub mod error;
mod path;
pub mod service;
pub mod stream;

pub use backend::common::{GetResponse, ObjectInfo};
pub use error::ServiceError;
pub use path::{InvalidPathError, ObjectPath};
pub use service::{StorageConfig, StorageService};
pub use stream::PayloadStream;
