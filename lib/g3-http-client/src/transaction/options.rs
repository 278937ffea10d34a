/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::time::Duration;

use once_cell::sync::Lazy;

const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(60);
const RESPONSE_TIMEOUT_ENV: &str = "G3_HTTP_CLIENT_RESPONSE_TIMEOUT";

/// Process-wide default for the response timeout: seconds taken from the
/// environment once, a negative value disabling it entirely.
static ENV_RESPONSE_TIMEOUT: Lazy<Option<Duration>> = Lazy::new(|| {
    let Ok(value) = std::env::var(RESPONSE_TIMEOUT_ENV) else {
        return Some(DEFAULT_RESPONSE_TIMEOUT);
    };
    let Ok(seconds) = value.parse::<f64>() else {
        return Some(DEFAULT_RESPONSE_TIMEOUT);
    };
    if seconds < 0.0 {
        None
    } else {
        Some(Duration::from_secs_f64(seconds))
    }
});

/// How long one attempt may wait for its response headers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResponseTimeout {
    /// use the process-wide default
    #[default]
    Default,
    Disabled,
    Fixed(Duration),
}

impl ResponseTimeout {
    pub(crate) fn resolve(&self) -> Option<Duration> {
        match self {
            ResponseTimeout::Default => *ENV_RESPONSE_TIMEOUT,
            ResponseTimeout::Disabled => None,
            ResponseTimeout::Fixed(timeout) => Some(*timeout),
        }
    }
}

/// The immutable policy of one transaction. Unset knobs keep the engine
/// defaults.
#[derive(Debug, Clone)]
pub struct HttpTransactionOptions {
    follow_redirects: bool,
    max_redirects: usize,
    obey_success_code: bool,
    streaming: bool,
    response_timeout: ResponseTimeout,
}

impl Default for HttpTransactionOptions {
    fn default() -> Self {
        HttpTransactionOptions {
            follow_redirects: true,
            max_redirects: 10,
            obey_success_code: true,
            streaming: false,
            response_timeout: ResponseTimeout::Default,
        }
    }
}

impl HttpTransactionOptions {
    /// Whether 3xx responses are followed automatically.
    pub fn set_follow_redirects(&mut self, follow: bool) {
        self.follow_redirects = follow;
    }

    pub fn follow_redirects(&self) -> bool {
        self.follow_redirects
    }

    pub fn set_max_redirects(&mut self, max: usize) {
        self.max_redirects = max;
    }

    pub fn max_redirects(&self) -> usize {
        self.max_redirects
    }

    /// Whether a status outside [200, 400) settles the transaction as an
    /// error carrying the full response.
    pub fn set_obey_success_code(&mut self, obey: bool) {
        self.obey_success_code = obey;
    }

    pub fn obey_success_code(&self) -> bool {
        self.obey_success_code
    }

    /// Whether the final response body is left streaming instead of being
    /// buffered into memory before settlement.
    pub fn set_streaming(&mut self, streaming: bool) {
        self.streaming = streaming;
    }

    pub fn streaming(&self) -> bool {
        self.streaming
    }

    pub fn set_response_timeout(&mut self, timeout: ResponseTimeout) {
        self.response_timeout = timeout;
    }

    pub fn response_timeout(&self) -> ResponseTimeout {
        self.response_timeout
    }
}
