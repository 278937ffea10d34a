/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::path::PathBuf;

use async_trait::async_trait;
use http::Uri;
use tokio::net::UnixStream;

use super::{BoxHttpConnection, ConnectError, HttpConnector};

/// Connect every request to the same unix domain socket, ignoring the
/// authority of the request uri.
#[derive(Debug)]
pub struct UnixConnector {
    path: PathBuf,
}

impl UnixConnector {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        UnixConnector { path: path.into() }
    }
}

#[async_trait]
impl HttpConnector for UnixConnector {
    async fn connect(&self, _uri: &Uri) -> Result<BoxHttpConnection, ConnectError> {
        let stream = UnixStream::connect(&self.path)
            .await
            .map_err(ConnectError::ConnectFailed)?;
        Ok(Box::new(stream))
    }
}
