/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use async_trait::async_trait;
use http::Uri;

use super::{BoxHttpConnection, ConnectError, HttpConnector};

/// Delegate every connect to `inner` with a fixed target uri, whatever
/// the request uri says. Useful to pin all traffic to one upstream, e.g.
/// a local proxy.
pub struct FixedUriConnector<C> {
    uri: Uri,
    inner: C,
}

impl<C> FixedUriConnector<C> {
    pub fn new(uri: Uri, inner: C) -> Self {
        FixedUriConnector { uri, inner }
    }
}

#[async_trait]
impl<C> HttpConnector for FixedUriConnector<C>
where
    C: HttpConnector + Send + Sync,
{
    async fn connect(&self, _uri: &Uri) -> Result<BoxHttpConnection, ConnectError> {
        self.inner.connect(&self.uri).await
    }
}
