//! The minio server component.
//!
//! This builds on top of [`minio_service`] and exposes the selected storage backend through an
//! object API. A second, storage-agnostic listener serves the management API. Both listeners are
//! started and stopped together by the [`bootstrap`] orchestrator.

pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod driver;
pub mod endpoints;
pub mod error;
mod extractors;
pub mod management;
pub mod observability;
pub mod process;
pub mod state;
pub mod transport;
pub mod units;
pub mod web;
