/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io;
use std::time::Duration;

use http::{Response, Version};
use thiserror::Error;

use crate::body::{BodyTransferError, HttpBody};
use crate::client::HttpResponseParseError;
use crate::connect::ConnectError;
use crate::cookie::CookieError;

/// Everything a transaction can settle with besides a response. Except
/// for the implicit redirect chain nothing is ever retried, and any
/// connection or timer involved is released before one of these
/// surfaces.
#[derive(Debug, Error)]
pub enum HttpClientError {
    /// the request uri misses a scheme or host, nothing was sent
    #[error("invalid request uri: {0}")]
    InvalidRequestUri(&'static str),
    #[error("unsupported protocol version {0:?}")]
    UnsupportedVersion(Version),
    /// the connector failed, its error passed through unwrapped
    #[error("connect failed: {0}")]
    ConnectFailed(#[from] ConnectError),
    #[error("failed to send request: {0:?}")]
    WriteFailed(io::Error),
    #[error("failed to send request body: {0}")]
    RequestBodyTransferFailed(BodyTransferError),
    #[error("failed to read response: {0}")]
    ReadFailed(#[from] HttpResponseParseError),
    /// a complete exchange whose status the policy rejects, response
    /// attached for inspection
    #[error("unexpected status code {}", .0.status())]
    UnexpectedStatus(Response<HttpBody>),
    #[error("timeout after {0:?} while waiting for response")]
    ResponseTimeout(Duration),
    #[error("maximum number of redirects ({0}) exceeded")]
    TooManyRedirects(usize),
    #[error("invalid redirect location: {0}")]
    InvalidRedirectLocation(&'static str),
    #[error("request cancelled")]
    Canceled,
    #[error("cookie store error: {0}")]
    Cookie(#[from] CookieError),
}

impl HttpClientError {
    /// The response attached to a status error.
    pub fn response(&self) -> Option<&Response<HttpBody>> {
        match self {
            HttpClientError::UnexpectedStatus(response) => Some(response),
            _ => None,
        }
    }

    pub fn into_response(self) -> Option<Response<HttpBody>> {
        match self {
            HttpClientError::UnexpectedStatus(response) => Some(response),
            _ => None,
        }
    }
}
