//! Stream types shared by the storage layer and its callers.

use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;

/// A boxed stream of bytes for streaming uploads.
pub type ByteStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>>;

/// Wrap an async reader as a [`ByteStream`] yielding chunks of at most `chunk_size` bytes.
pub fn reader_stream<R>(reader: R, chunk_size: usize) -> ByteStream
where
    R: AsyncRead + Send + 'static,
{
    Box::pin(ReaderStream::with_capacity(reader, chunk_size.max(1)))
}

/// A [`ByteStream`] over a single in-memory buffer.
pub fn bytes_stream(data: Bytes) -> ByteStream {
    Box::pin(futures::stream::once(async move { Ok(data) }))
}
