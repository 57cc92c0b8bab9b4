//! Streaming access to a request body.
//!
//! The connection hands its read half to a [`BodyStream`] for the duration of
//! one request. Body parsers pull chunks from it; once the pipeline is done
//! the connection takes the reader back with [`BodyStream::into_parts`].

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

const READ_CHUNK_SIZE: usize = 8192;

pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

pub struct BodyStream {
    reader: BoxedReader,
    /// Bytes already read from the transport but not yet yielded.
    buffered: BytesMut,
    /// Body bytes not yet yielded, counting those in `buffered`.
    remaining: u64,
    content_length: u64,
    aborted: bool,
}

/// What the connection gets back after a request has been processed.
pub struct BodyParts {
    pub reader: BoxedReader,
    /// Bytes read past the end of this request's body.
    pub leftover: BytesMut,
    /// Body bytes nobody read; they are still on the transport.
    pub unread: u64,
    pub aborted: bool,
}

impl BodyStream {
    /// Wraps a transport positioned just after the request head.
    ///
    /// `buffered` holds bytes already read past the head; it may contain more
    /// than this body if the client pipelined requests.
    pub fn new(reader: BoxedReader, buffered: BytesMut, content_length: u64) -> Self {
        Self {
            reader,
            buffered,
            remaining: content_length,
            content_length,
            aborted: false,
        }
    }

    /// A body fully held in memory, with no transport behind it.
    pub fn from_bytes(body: impl Into<Bytes>) -> Self {
        let body: Bytes = body.into();
        let len = body.len() as u64;
        Self::new(Box::new(tokio::io::empty()), BytesMut::from(&body[..]), len)
    }

    pub fn empty() -> Self {
        Self::from_bytes(Bytes::new())
    }

    /// Declared length of the body.
    pub fn content_length(&self) -> u64 {
        self.content_length
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Yields the next chunk of the body, or `None` once it is exhausted.
    ///
    /// Fails with `UnexpectedEof` if the peer closes the connection before the
    /// declared length has arrived.
    pub async fn chunk(&mut self) -> std::io::Result<Option<Bytes>> {
        if self.remaining == 0 || self.aborted {
            return Ok(None);
        }

        if !self.buffered.is_empty() {
            let take = (self.buffered.len() as u64).min(self.remaining) as usize;
            self.remaining -= take as u64;
            return Ok(Some(self.buffered.split_to(take).freeze()));
        }

        let want = self.remaining.min(READ_CHUNK_SIZE as u64) as usize;
        let mut chunk = BytesMut::zeroed(want);
        let n = self.reader.read(&mut chunk).await?;

        if n == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed before the request body was complete",
            ));
        }

        chunk.truncate(n);
        self.remaining -= n as u64;
        Ok(Some(chunk.freeze()))
    }

    /// Stops reading. The connection will be closed instead of reused.
    pub fn abort(&mut self) {
        self.aborted = true;
    }

    /// Reads and discards whatever is left of the body.
    pub async fn drain(&mut self) -> std::io::Result<()> {
        while self.chunk().await?.is_some() {}
        Ok(())
    }

    pub fn into_parts(self) -> BodyParts {
        let (leftover, unread) = if self.aborted {
            (BytesMut::new(), self.remaining)
        } else {
            let in_buffer = (self.buffered.len() as u64).min(self.remaining) as usize;
            let mut buffered = self.buffered;
            let _ = buffered.split_to(in_buffer);
            (buffered, self.remaining - in_buffer as u64)
        };

        BodyParts {
            reader: self.reader,
            leftover,
            unread,
            aborted: self.aborted,
        }
    }
}

impl std::fmt::Debug for BodyStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BodyStream")
            .field("content_length", &self.content_length)
            .field("remaining", &self.remaining)
            .field("aborted", &self.aborted)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn yields_buffered_then_transport_bytes() {
        let (mut client, server) = tokio::io::duplex(64);
        let mut stream = BodyStream::new(Box::new(server), BytesMut::from(&b"hel"[..]), 5);

        tokio::io::AsyncWriteExt::write_all(&mut client, b"lo").await.unwrap();

        assert_eq!(stream.chunk().await.unwrap().unwrap(), "hel");
        assert_eq!(stream.chunk().await.unwrap().unwrap(), "lo");
        assert!(stream.chunk().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn pipelined_bytes_are_left_over() {
        let buffered = BytesMut::from(&b"abcGET / HTTP/1.1\r\n"[..]);
        let mut stream = BodyStream::new(Box::new(tokio::io::empty()), buffered, 3);

        assert_eq!(stream.chunk().await.unwrap().unwrap(), "abc");
        assert!(stream.chunk().await.unwrap().is_none());

        let parts = stream.into_parts();
        assert_eq!(&parts.leftover[..], b"GET / HTTP/1.1\r\n");
        assert_eq!(parts.unread, 0);
    }

    #[tokio::test]
    async fn peer_close_mid_body_is_an_error() {
        let mut stream = BodyStream::new(Box::new(tokio::io::empty()), BytesMut::new(), 10);

        let err = stream.chunk().await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof);
    }
}
