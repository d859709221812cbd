//! The minio object storage server.
//!
//! Run `minio mode memory limit 64MB` for a volatile store or `minio mode donut [PATH ...]` to
//! persist objects on disk. See [`minio_server::cli`] for all options.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

fn main() -> anyhow::Result<()> {
    minio_server::cli::execute()
}
