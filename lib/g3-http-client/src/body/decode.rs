/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use tokio::io::{AsyncBufRead, AsyncRead, ReadBuf};

use super::HttpBodyType;
use crate::parse::HttpChunkedLine;

enum NextReadType {
    UntilEnd,
    FixedLength,
    ChunkSize,
    ChunkEnd(u8),
    TrailerLine,
    EndOfFile,
}

/// Decode a message body out of `reader` according to its framing. The
/// reader is owned, so the decoded body can outlive the exchange that
/// produced it, and dropping the decoder drops the connection.
///
/// Chunk framing is removed, a trailer section after the last chunk is
/// consumed and discarded.
pub struct HttpBodyDecodeReader<R> {
    reader: R,
    body_type: HttpBodyType,
    next_read_type: NextReadType,
    body_line_max_len: usize,

    left_data_size: u64,
    line_buf: Vec<u8>,
    trailer_line_len: usize,

    finished: bool,
}

impl<R> HttpBodyDecodeReader<R>
where
    R: AsyncBufRead + Unpin,
{
    const DEFAULT_LINE_SIZE: usize = 64;

    pub fn new(reader: R, body_type: HttpBodyType, body_line_max_len: usize) -> Self {
        let mut left_data_size = 0u64;
        let next_read_type = match &body_type {
            HttpBodyType::ContentLength(0) => NextReadType::EndOfFile,
            HttpBodyType::ContentLength(size) => {
                left_data_size = *size;
                NextReadType::FixedLength
            }
            HttpBodyType::Chunked => NextReadType::ChunkSize,
            HttpBodyType::ReadUntilEnd => NextReadType::UntilEnd,
        };
        let finished = matches!(next_read_type, NextReadType::EndOfFile);
        HttpBodyDecodeReader {
            reader,
            body_type,
            next_read_type,
            body_line_max_len,
            left_data_size,
            line_buf: Vec::with_capacity(Self::DEFAULT_LINE_SIZE),
            trailer_line_len: 0,
            finished,
        }
    }

    pub fn finished(&self) -> bool {
        self.finished
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    fn poll_until_end(
        &mut self,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let old_remaining = buf.remaining();
        ready!(Pin::new(&mut self.reader).poll_read(cx, buf))?;
        if buf.remaining() == old_remaining {
            // io closed, which indicates the end of body
            self.finished = true;
            self.next_read_type = NextReadType::EndOfFile;
        }
        Poll::Ready(Ok(()))
    }

    fn poll_fixed(&mut self, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let to_read = usize::try_from(self.left_data_size)
            .unwrap_or(usize::MAX)
            .min(buf.remaining());
        let mut limited_buf = ReadBuf::new(buf.initialize_unfilled_to(to_read));
        ready!(Pin::new(&mut self.reader).poll_read(cx, &mut limited_buf))?;
        let nr = limited_buf.filled().len();
        if nr == 0 {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "reader closed while reading fixed length body",
            )));
        }
        buf.advance(nr);
        self.left_data_size -= nr as u64;

        if self.left_data_size == 0 {
            match self.body_type {
                HttpBodyType::ContentLength(_) => {
                    self.finished = true;
                    self.next_read_type = NextReadType::EndOfFile;
                }
                HttpBodyType::Chunked => self.next_read_type = NextReadType::ChunkEnd(b'\r'),
                HttpBodyType::ReadUntilEnd => unreachable!(),
            }
        }

        Poll::Ready(Ok(()))
    }

    fn poll_line(&mut self, cx: &mut Context<'_>, what: &str) -> Poll<io::Result<()>> {
        loop {
            let mut reader = Pin::new(&mut self.reader);
            let cache = ready!(reader.as_mut().poll_fill_buf(cx))?;
            if cache.is_empty() {
                return Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("reader closed while reading {what} line"),
                )));
            }

            match memchr::memchr(b'\n', cache) {
                Some(p) => {
                    self.line_buf.extend_from_slice(&cache[0..=p]);
                    reader.as_mut().consume(p + 1);
                    return Poll::Ready(Ok(()));
                }
                None => {
                    let len = cache.len();
                    if self.line_buf.len() + len > self.body_line_max_len {
                        return Poll::Ready(Err(io::Error::new(
                            io::ErrorKind::InvalidData,
                            format!("{what} line too long (> {})", self.body_line_max_len),
                        )));
                    }
                    self.line_buf.extend_from_slice(cache);
                    reader.as_mut().consume(len);
                }
            }
        }
    }

    fn poll_chunk_size(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        ready!(self.poll_line(cx, "chunk size"))?;

        let chunk = HttpChunkedLine::parse(&self.line_buf)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        self.line_buf.clear();
        if chunk.chunk_size == 0 {
            self.next_read_type = NextReadType::TrailerLine;
        } else {
            self.left_data_size = chunk.chunk_size;
            self.next_read_type = NextReadType::FixedLength;
        }
        Poll::Ready(Ok(()))
    }

    fn poll_chunk_end(&mut self, cx: &mut Context<'_>, char: u8) -> Poll<io::Result<()>> {
        let mut reader = Pin::new(&mut self.reader);
        let cache = ready!(reader.as_mut().poll_fill_buf(cx))?;
        if cache.is_empty() {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "reader closed while reading chunk end whitespace",
            )));
        }

        match cache[0] {
            b'\r' if char == b'\r' => {
                reader.as_mut().consume(1);
                self.next_read_type = NextReadType::ChunkEnd(b'\n');
            }
            b'\n' => {
                // accept a bare LF chunk ending
                reader.as_mut().consume(1);
                self.next_read_type = NextReadType::ChunkSize;
            }
            _ => {
                return Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "invalid chunk ending",
                )));
            }
        }
        Poll::Ready(Ok(()))
    }

    fn poll_trailer_line(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        ready!(self.poll_line(cx, "trailer"))?;

        let line: &[u8] = &self.line_buf;
        if line == b"\r\n" || line == b"\n" {
            // end of trailer section
            self.finished = true;
            self.next_read_type = NextReadType::EndOfFile;
        } else {
            self.trailer_line_len += line.len();
            if self.trailer_line_len > self.body_line_max_len {
                return Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "trailer section too long",
                )));
            }
        }
        self.line_buf.clear();
        Poll::Ready(Ok(()))
    }
}

impl<R> AsyncRead for HttpBodyDecodeReader<R>
where
    R: AsyncBufRead + Unpin,
{
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if buf.remaining() == 0 {
            return Poll::Ready(Ok(()));
        }

        let me = &mut *self;
        loop {
            match me.next_read_type {
                NextReadType::EndOfFile => return Poll::Ready(Ok(())),
                NextReadType::UntilEnd => return me.poll_until_end(cx, buf),
                NextReadType::FixedLength => return me.poll_fixed(cx, buf),
                NextReadType::ChunkSize => ready!(me.poll_chunk_size(cx))?,
                NextReadType::ChunkEnd(char) => ready!(me.poll_chunk_end(cx, char))?,
                NextReadType::TrailerLine => ready!(me.poll_trailer_line(cx))?,
            }
        }
    }
}
