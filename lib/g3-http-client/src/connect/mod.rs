/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io;

use async_trait::async_trait;
use http::Uri;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};

mod tcp;
pub use tcp::TcpConnector;

#[cfg(unix)]
mod unix;
#[cfg(unix)]
pub use unix::UnixConnector;

mod fixed;
pub use fixed::FixedUriConnector;

pub trait HttpConnection: AsyncRead + AsyncWrite {}
impl<T: AsyncRead + AsyncWrite> HttpConnection for T {}

pub type BoxHttpConnection = Box<dyn HttpConnection + Send + Unpin>;

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("unsupported scheme in target uri")]
    UnsupportedScheme,
    #[error("no host in target uri")]
    MissingHost,
    #[error("connect failed: {0:?}")]
    ConnectFailed(io::Error),
}

/// Open a duplex byte stream to the origin a request uri points at.
/// Implementations own the transport decision, plain TCP, TLS, a unix
/// socket, so the sender stays transport agnostic.
#[async_trait]
pub trait HttpConnector {
    async fn connect(&self, uri: &Uri) -> Result<BoxHttpConnection, ConnectError>;
}

pub(crate) fn target_port(uri: &Uri) -> Result<u16, ConnectError> {
    if let Some(port) = uri.port_u16() {
        return Ok(port);
    }
    match uri.scheme_str() {
        Some("http") => Ok(80),
        Some("https") => Ok(443),
        _ => Err(ConnectError::UnsupportedScheme),
    }
}
