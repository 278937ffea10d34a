/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use async_trait::async_trait;
use http::Uri;
use tokio::net::TcpStream;

use super::{BoxHttpConnection, ConnectError, HttpConnector, target_port};

/// Plain TCP connector. TLS is deliberately not handled here, a secure
/// transport is expected to be provided as its own `HttpConnector`
/// implementation wrapping the handshake around the stream it returns.
#[derive(Debug, Default)]
pub struct TcpConnector {}

impl TcpConnector {
    pub fn new() -> Self {
        TcpConnector {}
    }
}

#[async_trait]
impl HttpConnector for TcpConnector {
    async fn connect(&self, uri: &Uri) -> Result<BoxHttpConnection, ConnectError> {
        let host = uri.host().ok_or(ConnectError::MissingHost)?;
        let port = target_port(uri)?;

        let stream = TcpStream::connect((host, port))
            .await
            .map_err(ConnectError::ConnectFailed)?;
        Ok(Box::new(stream))
    }
}
