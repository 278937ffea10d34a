/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

mod debug;
pub use debug::{HTTP_CLIENT_DEBUG_LOG_LEVEL, HTTP_CLIENT_DEBUG_LOG_TARGET};

mod error;
pub use error::HttpClientError;

mod io;
pub use io::{LimitedBufReadExt, LimitedWriteExt};

mod parse;
pub use parse::{HttpChunkedLine, HttpHeaderLine, HttpLineParseError, HttpStatusLine};

mod body;
pub use body::{
    BodyTransferError, BoxHttpBodyStream, ChunkedEncodeTransfer, HttpBody, HttpBodyDecodeReader,
    HttpBodyType,
};

pub mod client;
pub mod connect;
pub mod cookie;
pub mod transaction;

pub use client::HttpRequestSender;
pub use transaction::{HttpTransaction, HttpTransactionOptions, ResponseTimeout};
