//! Test utilities for the minio server.
//!
//! This crate provides utilities to facilitate integration testing of the server. See the modules
//! for all available utilities.

pub mod server;
pub mod tracing;
