/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::future::Future;
use std::io::Write;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use bytes::Bytes;
use futures_util::Stream;
use tokio::io::AsyncWrite;

use super::BodyTransferError;

struct ChunkedEncodeTransferInternal {
    yield_size: usize,
    static_header: Vec<u8>,
    static_offset: usize,
    this_chunk: Bytes,
    chunk_offset: usize,
    total_write: u64,
    read_finished: bool,
}

impl ChunkedEncodeTransferInternal {
    fn new(yield_size: usize) -> Self {
        ChunkedEncodeTransferInternal {
            yield_size,
            static_header: Vec::with_capacity(16),
            static_offset: 0,
            this_chunk: Bytes::new(),
            chunk_offset: 0,
            total_write: 0,
            read_finished: false,
        }
    }

    fn poll_encode<S, W>(
        &mut self,
        cx: &mut Context<'_>,
        mut stream: Pin<&mut S>,
        mut writer: Pin<&mut W>,
    ) -> Poll<Result<u64, BodyTransferError>>
    where
        S: Stream<Item = std::io::Result<Bytes>>,
        W: AsyncWrite,
    {
        let mut copy_this_round = 0usize;
        loop {
            if self.chunk_offset >= self.this_chunk.len()
                && self.static_offset >= self.static_header.len()
                && !self.read_finished
            {
                let data = loop {
                    match ready!(stream.as_mut().poll_next(cx)) {
                        Some(Ok(data)) => {
                            // an empty frame would terminate the body early
                            if !data.is_empty() {
                                break Some(data);
                            }
                        }
                        Some(Err(e)) => return Poll::Ready(Err(BodyTransferError::ReadFailed(e))),
                        None => break None,
                    }
                };
                self.static_header.clear();
                self.static_offset = 0;
                match data {
                    None => {
                        self.read_finished = true;
                        if self.total_write == 0 {
                            let _ = write!(&mut self.static_header, "0\r\n\r\n");
                        } else {
                            let _ = write!(&mut self.static_header, "\r\n0\r\n\r\n");
                        }
                        self.this_chunk = Bytes::new();
                    }
                    Some(data) => {
                        let chunk_size = data.len();
                        if self.total_write == 0 {
                            let _ = write!(&mut self.static_header, "{chunk_size:x}\r\n");
                        } else {
                            let _ = write!(&mut self.static_header, "\r\n{chunk_size:x}\r\n");
                        }
                        self.this_chunk = data;
                    }
                }
                self.chunk_offset = 0;
            }

            while self.static_offset < self.static_header.len() {
                let nw = ready!(
                    writer
                        .as_mut()
                        .poll_write(cx, &self.static_header[self.static_offset..])
                )
                .map_err(BodyTransferError::WriteFailed)?;
                self.static_offset += nw;
                self.total_write += nw as u64;
            }
            if self.read_finished {
                ready!(writer.as_mut().poll_flush(cx)).map_err(BodyTransferError::WriteFailed)?;
                return Poll::Ready(Ok(self.total_write));
            }

            while self.chunk_offset < self.this_chunk.len() {
                let nw = ready!(
                    writer
                        .as_mut()
                        .poll_write(cx, &self.this_chunk[self.chunk_offset..])
                )
                .map_err(BodyTransferError::WriteFailed)?;
                self.chunk_offset += nw;
                copy_this_round += nw;
                self.total_write += nw as u64;
            }

            if copy_this_round >= self.yield_size {
                cx.waker().wake_by_ref();
                return Poll::Pending;
            }
        }
    }

    #[inline]
    fn finished(&self) -> bool {
        self.read_finished && self.static_offset >= self.static_header.len()
    }
}

/// Re-emit a lazy chunk stream as HTTP chunked transfer-encoding frames
/// written into `writer`. Each non-empty upstream chunk becomes one
/// `<hex-len>\r\n<data>\r\n` frame, empty upstream chunks are skipped, and
/// upstream end-of-stream produces the terminating `0\r\n\r\n` frame. No
/// chunk extensions or trailers are ever produced. Nothing is buffered
/// beyond the current chunk and its frame header.
pub struct ChunkedEncodeTransfer<'a, S, W> {
    stream: &'a mut S,
    writer: &'a mut W,
    internal: ChunkedEncodeTransferInternal,
}

impl<'a, S, W> ChunkedEncodeTransfer<'a, S, W> {
    pub fn new(stream: &'a mut S, writer: &'a mut W, yield_size: usize) -> Self {
        ChunkedEncodeTransfer {
            stream,
            writer,
            internal: ChunkedEncodeTransferInternal::new(yield_size),
        }
    }

    pub fn finished(&self) -> bool {
        self.internal.finished()
    }
}

impl<S, W> Future for ChunkedEncodeTransfer<'_, S, W>
where
    S: Stream<Item = std::io::Result<Bytes>> + Unpin,
    W: AsyncWrite + Unpin,
{
    type Output = Result<u64, BodyTransferError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let me = &mut *self;

        me.internal
            .poll_encode(cx, Pin::new(&mut me.stream), Pin::new(&mut me.writer))
    }
}
