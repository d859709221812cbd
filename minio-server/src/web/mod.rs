//! The web servers of the object API and the management API.
//!
//! Both applications are implemented by [`App`], which sets up routing and middleware. To bind a
//! listener and serve an application, use [`serve()`].
//!
//! # Testing
//!
//! For end-to-end tests of the server, see the `minio-test` crate, which provides utilities to
//! start a test server in the background.

mod app;
mod middleware;
mod server;

pub use app::App;
pub use server::{listen, serve};
