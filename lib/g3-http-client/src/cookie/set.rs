/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

fn default_path() -> String {
    "/".to_string()
}

/// One cookie as received from a `Set-Cookie` header or re-hydrated from
/// the backing file. Identity for replacement purposes is
/// (name, domain, path).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieSet {
    name: String,
    value: String,
    #[serde(default)]
    domain: String,
    #[serde(default = "default_path")]
    path: String,
    /// absolute unix timestamp, None for a session cookie
    #[serde(default)]
    expires: Option<i64>,
    #[serde(default)]
    max_age: Option<i64>,
    #[serde(default)]
    secure: bool,
    #[serde(default)]
    discard: bool,
    #[serde(default)]
    http_only: bool,
}

impl CookieSet {
    pub fn new<N, V, D>(name: N, value: V, domain: D) -> Self
    where
        N: Into<String>,
        V: Into<String>,
        D: Into<String>,
    {
        CookieSet {
            name: name.into(),
            value: value.into(),
            domain: domain.into(),
            path: default_path(),
            expires: None,
            max_age: None,
            secure: false,
            discard: false,
            http_only: false,
        }
    }

    /// Parse a `Set-Cookie` header value. Unknown attributes are ignored,
    /// the result may still fail `is_valid` (e.g. empty name) and must be
    /// checked before storing.
    pub fn parse(header_value: &str) -> Self {
        let mut pieces = header_value.split(';');

        let (name, value) = match pieces.next().and_then(|s| s.split_once('=')) {
            Some((name, value)) => (name.trim().to_string(), value.trim().to_string()),
            None => (String::new(), String::new()),
        };
        let mut cookie = CookieSet::new(name, value, String::new());

        for piece in pieces {
            let (key, value) = match piece.split_once('=') {
                Some((k, v)) => (k.trim(), Some(v.trim())),
                None => (piece.trim(), None),
            };
            match key.to_ascii_lowercase().as_str() {
                "domain" => {
                    if let Some(v) = value {
                        cookie.domain = v.to_string();
                    }
                }
                "path" => {
                    if let Some(v) = value {
                        if !v.is_empty() {
                            cookie.path = v.to_string();
                        }
                    }
                }
                "max-age" => {
                    if let Some(Ok(seconds)) = value.map(|v| v.parse::<i64>()) {
                        cookie.max_age = Some(seconds);
                    }
                }
                "expires" => {
                    if let Some(ts) = value.and_then(parse_http_date) {
                        cookie.expires = Some(ts);
                    }
                }
                "secure" => cookie.secure = true,
                "discard" => cookie.discard = true,
                "httponly" => cookie.http_only = true,
                _ => {}
            }
        }

        // Max-Age takes precedence and is turned into an absolute time
        if let Some(seconds) = cookie.max_age {
            cookie.expires = Some(Utc::now().timestamp() + seconds);
        }

        cookie
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn set_domain<D: Into<String>>(&mut self, domain: D) {
        self.domain = domain.into();
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn set_path<P: Into<String>>(&mut self, path: P) {
        self.path = path.into();
    }

    pub fn set_expires(&mut self, timestamp: Option<i64>) {
        self.expires = timestamp;
    }

    pub fn expires(&self) -> Option<i64> {
        self.expires
    }

    pub fn secure(&self) -> bool {
        self.secure
    }

    pub fn set_secure(&mut self, secure: bool) {
        self.secure = secure;
    }

    pub fn http_only(&self) -> bool {
        self.http_only
    }

    pub fn is_expired(&self) -> bool {
        match self.expires {
            Some(ts) => ts < Utc::now().timestamp(),
            None => false,
        }
    }

    pub fn is_session_cookie(&self) -> bool {
        self.discard || self.expires.is_none()
    }

    /// name, value and domain must be non-empty and the name must not
    /// contain control or separator characters
    pub fn is_valid(&self) -> bool {
        if self.name.is_empty() || self.value.is_empty() || self.domain.is_empty() {
            return false;
        }
        self.name.bytes().all(cookie_name_byte_is_valid)
    }
}

fn cookie_name_byte_is_valid(b: u8) -> bool {
    !matches!(b,
        0x00..=0x20
        | 0x22        // "
        | 0x28 | 0x29 // ( )
        | 0x2c        // ,
        | 0x2f        // /
        | 0x3a..=0x40 // : ; < = > ? @
        | 0x5c        // \
        | 0x7b | 0x7d // { }
        | 0x7f
    )
}

fn parse_http_date(s: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.timestamp());
    }
    // obsolete rfc850 and asctime forms
    for fmt in ["%A, %d-%b-%y %H:%M:%S GMT", "%a %b %e %H:%M:%S %Y"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.and_utc().timestamp());
        }
    }
    None
}
