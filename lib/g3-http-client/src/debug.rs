/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use log::Level;

pub const HTTP_CLIENT_DEBUG_LOG_LEVEL: Level = Level::Debug;
pub const HTTP_CLIENT_DEBUG_LOG_TARGET: &str = "g3-http-client";

#[macro_export]
macro_rules! log_msg {
    ($s:literal, $($arg:tt)+) => (
        log::log!(
            target: $crate::HTTP_CLIENT_DEBUG_LOG_TARGET,
            $crate::HTTP_CLIENT_DEBUG_LOG_LEVEL,
            $s,
            $($arg)+
        )
    )
}
