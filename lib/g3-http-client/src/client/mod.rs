/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::time::Duration;

use futures_util::StreamExt;
use http::{Request, Response, StatusCode};
use tokio::io::{AsyncWriteExt, BufReader};
use tokio_util::io::ReaderStream;

use crate::HttpClientError;
use crate::body::{BodyTransferError, ChunkedEncodeTransfer, HttpBody, HttpBodyDecodeReader};
use crate::connect::HttpConnector;
use crate::io::LimitedWriteExt;
use crate::log_msg;
use crate::parse::HttpLineParseError;

mod error;
pub use error::HttpResponseParseError;

mod response;
pub use response::{HttpResponseHead, ReasonPhrase};

mod request;
use request::{RequestBodyWire, serialize_request_head};

const DEFAULT_MAX_HEADER_SIZE: usize = 64 * 1024;
const DEFAULT_BODY_LINE_MAX_LEN: usize = 2048;
const BODY_YIELD_SIZE: usize = 64 * 1024;

/// Perform exactly one physical request/response exchange per call. A
/// connection is opened through the injected connector, the request head
/// and body are written, and the call resolves as soon as the response
/// head is in. The response body stays on the connection, exposed as a
/// streaming body that owns it, so the caller decides whether to buffer.
pub struct HttpRequestSender<C> {
    connector: C,
    max_header_size: usize,
    body_line_max_len: usize,
}

impl<C> HttpRequestSender<C>
where
    C: HttpConnector,
{
    pub fn new(connector: C) -> Self {
        HttpRequestSender {
            connector,
            max_header_size: DEFAULT_MAX_HEADER_SIZE,
            body_line_max_len: DEFAULT_BODY_LINE_MAX_LEN,
        }
    }

    pub fn set_max_header_size(&mut self, max_header_size: usize) {
        self.max_header_size = max_header_size;
    }

    /// Send `request` and resolve with the response once its head has
    /// been received. `head_timeout`, when set, bounds only the wait for
    /// the response head after the request has been fully written.
    ///
    /// Dropping the returned future before it resolves closes the
    /// connection it may have opened.
    pub async fn send(
        &self,
        request: Request<HttpBody>,
        head_timeout: Option<Duration>,
    ) -> Result<Response<HttpBody>, HttpClientError> {
        let (parts, body) = request.into_parts();

        // reject before any network activity
        let (head_buf, body_wire) = serialize_request_head(&parts, &body)?;

        let mut conn = self.connector.connect(&parts.uri).await?;

        conn.write_all_flush(&head_buf)
            .await
            .map_err(HttpClientError::WriteFailed)?;

        match body_wire {
            RequestBodyWire::None => {}
            RequestBodyWire::AsIs => match body {
                HttpBody::Empty => {}
                HttpBody::Buffered(data) => {
                    conn.write_all_flush(&data)
                        .await
                        .map_err(HttpClientError::WriteFailed)?;
                }
                HttpBody::Streaming(mut stream) => {
                    while let Some(chunk) = stream.next().await {
                        let chunk = chunk.map_err(|e| {
                            HttpClientError::RequestBodyTransferFailed(
                                BodyTransferError::ReadFailed(e),
                            )
                        })?;
                        conn.write_all(&chunk)
                            .await
                            .map_err(HttpClientError::WriteFailed)?;
                    }
                    conn.flush().await.map_err(HttpClientError::WriteFailed)?;
                }
            },
            RequestBodyWire::Chunked => {
                let HttpBody::Streaming(mut stream) = body else {
                    unreachable!("chunked transfer is only selected for streaming bodies");
                };
                ChunkedEncodeTransfer::new(&mut stream, &mut conn, BODY_YIELD_SIZE)
                    .await
                    .map_err(HttpClientError::RequestBodyTransferFailed)?;
            }
        }

        let mut reader = BufReader::new(conn);
        let head = match head_timeout {
            Some(timeout) => tokio::time::timeout(
                timeout,
                HttpResponseHead::parse(&mut reader, self.max_header_size),
            )
            .await
            .map_err(|_| HttpClientError::ResponseTimeout(timeout))??,
            None => HttpResponseHead::parse(&mut reader, self.max_header_size).await?,
        };
        log_msg!(
            "{} {} => {} {}",
            parts.method,
            parts.uri,
            head.code,
            head.reason
        );

        let rsp_body = match head.body_type(&parts.method) {
            None => {
                // no body follows, release the connection right away
                drop(reader);
                HttpBody::Empty
            }
            Some(body_type) => {
                let decoder = HttpBodyDecodeReader::new(reader, body_type, self.body_line_max_len);
                HttpBody::streaming(ReaderStream::new(decoder))
            }
        };

        let status = StatusCode::from_u16(head.code).map_err(|_| {
            HttpClientError::ReadFailed(HttpResponseParseError::InvalidStatusLine(
                HttpLineParseError::InvalidStatusCode,
            ))
        })?;
        let mut response = Response::new(rsp_body);
        *response.status_mut() = status;
        *response.version_mut() = head.version;
        *response.headers_mut() = head.headers;
        response
            .extensions_mut()
            .insert(ReasonPhrase::from(head.reason));
        Ok(response)
    }
}
