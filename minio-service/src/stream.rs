//! Payload stream type and helpers to move between streams and buffers.

use bytes::{Bytes, BytesMut};
use bytesize::ByteSize;
use futures_util::stream::BoxStream;
use futures_util::{StreamExt, TryStreamExt};

use crate::error::{Result, ServiceError};

/// Type alias for data streams used in service APIs.
pub type PayloadStream = BoxStream<'static, std::io::Result<Bytes>>;

/// Creates a single-chunk [`PayloadStream`] from a buffer.
pub fn from_bytes(bytes: impl Into<Bytes>) -> PayloadStream {
    let bytes = bytes.into();
    tokio_stream::once(Ok(bytes)).boxed()
}

/// Drains a [`PayloadStream`] into one contiguous buffer.
pub async fn collect(stream: PayloadStream) -> std::io::Result<Bytes> {
    let buffer: BytesMut = stream.try_collect().await?;
    Ok(buffer.freeze())
}

/// Drains a [`PayloadStream`] into one buffer holding at most `limit` bytes.
///
/// Stops polling the stream as soon as the limit is exceeded, so an oversized payload is never
/// buffered in full.
pub async fn collect_bounded(mut stream: PayloadStream, limit: u64) -> Result<Bytes> {
    let mut buffer = BytesMut::new();
    while let Some(chunk) = stream.try_next().await? {
        let size = (buffer.len() + chunk.len()) as u64;
        if size > limit {
            return Err(ServiceError::TooLarge {
                size: ByteSize(size),
                capacity: ByteSize(limit),
            });
        }
        buffer.extend_from_slice(&chunk);
    }

    Ok(buffer.freeze())
}
