/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::fmt;
use std::io;

use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt};
use thiserror::Error;

mod chunked_encoder;
pub use chunked_encoder::ChunkedEncodeTransfer;

mod decode;
pub use decode::HttpBodyDecodeReader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpBodyType {
    ContentLength(u64),
    Chunked,
    ReadUntilEnd,
}

#[derive(Debug, Error)]
pub enum BodyTransferError {
    #[error("read failed: {0:?}")]
    ReadFailed(io::Error),
    #[error("write failed: {0:?}")]
    WriteFailed(io::Error),
}

pub type BoxHttpBodyStream = Box<dyn Stream<Item = io::Result<Bytes>> + Send + Unpin>;

/// A message body. Buffered bodies are complete in-memory byte sequences
/// with a known length, streaming bodies are produced lazily and may be
/// unbounded. Dropping a streaming body releases whatever it owns, for
/// response bodies that is the underlying connection.
#[derive(Default)]
pub enum HttpBody {
    #[default]
    Empty,
    Buffered(Bytes),
    Streaming(BoxHttpBodyStream),
}

impl HttpBody {
    pub fn buffered<T: Into<Bytes>>(data: T) -> Self {
        HttpBody::Buffered(data.into())
    }

    pub fn streaming<S>(stream: S) -> Self
    where
        S: Stream<Item = io::Result<Bytes>> + Send + Unpin + 'static,
    {
        HttpBody::Streaming(Box::new(stream))
    }

    pub fn is_empty(&self) -> bool {
        match self {
            HttpBody::Empty => true,
            HttpBody::Buffered(data) => data.is_empty(),
            HttpBody::Streaming(_) => false,
        }
    }

    /// The known length of this body, None if it streams.
    pub fn buffered_len(&self) -> Option<u64> {
        match self {
            HttpBody::Empty => Some(0),
            HttpBody::Buffered(data) => Some(data.len() as u64),
            HttpBody::Streaming(_) => None,
        }
    }

    /// Accumulate the whole body into memory. A no-op for bodies that are
    /// already buffered. Dropping the returned future mid-read drops the
    /// stream and with it the connection it owns.
    pub async fn into_buffered(self) -> io::Result<Bytes> {
        match self {
            HttpBody::Empty => Ok(Bytes::new()),
            HttpBody::Buffered(data) => Ok(data),
            HttpBody::Streaming(mut stream) => {
                let mut buf = BytesMut::new();
                while let Some(chunk) = stream.next().await {
                    buf.extend_from_slice(&chunk?);
                }
                Ok(buf.freeze())
            }
        }
    }
}

impl fmt::Debug for HttpBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpBody::Empty => f.write_str("Empty"),
            HttpBody::Buffered(data) => write!(f, "Buffered({} bytes)", data.len()),
            HttpBody::Streaming(_) => f.write_str("Streaming"),
        }
    }
}

impl From<Bytes> for HttpBody {
    fn from(data: Bytes) -> Self {
        if data.is_empty() {
            HttpBody::Empty
        } else {
            HttpBody::Buffered(data)
        }
    }
}

impl From<&'static str> for HttpBody {
    fn from(data: &'static str) -> Self {
        HttpBody::from(Bytes::from_static(data.as_bytes()))
    }
}

impl From<Vec<u8>> for HttpBody {
    fn from(data: Vec<u8>) -> Self {
        HttpBody::from(Bytes::from(data))
    }
}
