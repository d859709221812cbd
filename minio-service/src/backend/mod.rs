//! Storage backends.
//!
//! Every backend implements [`Backend`](common::Backend). The service picks exactly one of them
//! at startup from its [`StorageConfig`](crate::StorageConfig).

pub mod common;
pub mod donut;
pub mod in_memory;
