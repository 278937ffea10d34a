/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use atoi::FromRadix16;

use super::HttpLineParseError;

/// A chunk-size line as found on the wire. Chunk extensions are accepted
/// and skipped, never interpreted.
pub struct HttpChunkedLine {
    pub chunk_size: u64,
}

impl HttpChunkedLine {
    pub fn parse(buf: &[u8]) -> Result<HttpChunkedLine, HttpLineParseError> {
        let (chunk_size, offset) = u64::from_radix_16(buf);
        if offset == 0 {
            return Err(HttpLineParseError::InvalidChunkSize);
        }

        if buf.len() == offset {
            return Err(HttpLineParseError::NotLongEnough);
        }

        match buf[offset] {
            b'\r' | b'\n' | b';' => Ok(HttpChunkedLine { chunk_size }),
            _ => Err(HttpLineParseError::InvalidChunkSize),
        }
    }
}
