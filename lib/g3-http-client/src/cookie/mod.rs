/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io;

use thiserror::Error;

mod set;
pub use set::CookieSet;

mod jar;
pub use jar::CookieJar;

#[derive(Debug, Error)]
pub enum CookieError {
    #[error("invalid cookie")]
    InvalidCookie,
    #[error("no backing file configured")]
    NoBackingFile,
    #[error("cookie file io failed: {0:?}")]
    Io(#[from] io::Error),
    #[error("invalid cookie file: {0}")]
    Decode(#[from] serde_json::Error),
}
