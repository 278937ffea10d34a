/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use http::{Request, Response, Uri, header};
use indexmap::IndexMap;

use super::{CookieError, CookieSet};
use crate::body::HttpBody;
use crate::log_msg;

/// Automatic cookie handling: a domain-ordered store of cookies with the
/// two hooks the transaction wires around every physical send, and
/// optional JSON file persistence.
///
/// One jar is shared by all transactions of a client. Both hooks are
/// synchronous and touch the store atomically, callers that run
/// transactions concurrently put the jar behind a mutex and never hold
/// the lock across a suspension point.
#[derive(Debug, Default)]
pub struct CookieJar {
    /// domain (without leading dot) => cookies for that domain
    cookies: BTreeMap<String, Vec<CookieSet>>,
    backing_file: Option<PathBuf>,
    strict: bool,
    persist_session_cookies: bool,
}

impl CookieJar {
    pub fn new() -> Self {
        CookieJar::default()
    }

    /// A jar persisted to `path`, re-hydrated from it if it exists.
    pub fn with_backing_file<P: Into<PathBuf>>(path: P) -> Result<Self, CookieError> {
        let path = path.into();
        let mut jar = CookieJar {
            backing_file: Some(path.clone()),
            ..Default::default()
        };
        if path.exists() {
            jar.load_from(&path)?;
        }
        Ok(jar)
    }

    /// In strict mode an invalid cookie is a hard error instead of a
    /// silent drop.
    pub fn set_strict(&mut self, strict: bool) {
        self.strict = strict;
    }

    pub fn set_persist_session_cookies(&mut self, persist: bool) {
        self.persist_session_cookies = persist;
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.values().all(|v| v.is_empty())
    }

    /// Store a cookie, replacing any existing one with the same name,
    /// domain and path.
    pub fn set_cookie(&mut self, cookie: CookieSet) -> Result<(), CookieError> {
        if !cookie.is_valid() {
            if self.strict {
                return Err(CookieError::InvalidCookie);
            }
            log_msg!("dropped invalid cookie {:?}", cookie.name());
            return Ok(());
        }

        let domain = cookie
            .domain()
            .trim_start_matches('.')
            .to_ascii_lowercase();
        let list = self.cookies.entry(domain).or_default();
        for slot in list.iter_mut() {
            if slot.name() == cookie.name() && slot.path() == cookie.path() {
                *slot = cookie;
                return Ok(());
            }
        }
        list.push(cookie);
        Ok(())
    }

    /// All cookies applying to `uri`: the request host is matched exactly
    /// and through its parent domains, the path per prefix rule, secure
    /// cookies only over https. Expired cookies found along the way are
    /// removed.
    pub fn cookies_for_uri(&mut self, uri: &Uri) -> Vec<CookieSet> {
        let Some(host) = uri.host() else {
            return Vec::new();
        };
        let host = host.trim_start_matches('.').to_ascii_lowercase();
        let path = uri.path();
        let https = uri.scheme_str() == Some("https");

        let mut matched = Vec::new();

        let mut domain = String::with_capacity(host.len());
        for part in host.rsplit('.') {
            if domain.is_empty() {
                domain.insert_str(0, part);
            } else {
                domain.insert(0, '.');
                domain.insert_str(0, part);
            }

            let Some(list) = self.cookies.get_mut(&domain) else {
                continue;
            };
            // expired cookies are removed lazily, right here
            list.retain(|c| !c.is_expired());
            for cookie in list.iter() {
                if cookie_path_matches(cookie.path(), path) && (!cookie.secure() || https) {
                    matched.push(cookie.clone());
                }
            }
        }
        matched
    }

    /// Inject matching stored cookies into an outgoing request. Values
    /// from an explicit `Cookie` header already on the request win on
    /// name collision; if neither the jar nor the request contribute
    /// anything the request passes through untouched.
    pub fn on_request(&mut self, mut request: Request<HttpBody>) -> Request<HttpBody> {
        let mut cookies: IndexMap<String, Option<String>> = IndexMap::new();
        for cookie in self.cookies_for_uri(request.uri()) {
            cookies.insert(cookie.name().to_string(), Some(cookie.value().to_string()));
        }
        if cookies.is_empty() {
            return request;
        }

        for header_value in request.headers().get_all(header::COOKIE) {
            let Ok(line) = header_value.to_str() else {
                continue;
            };
            for entry in line.split("; ") {
                match entry.split_once('=') {
                    Some((name, value)) => {
                        cookies.insert(name.to_string(), Some(value.to_string()));
                    }
                    None => {
                        // no '=', send the entry back as-is
                        cookies.insert(entry.to_string(), None);
                    }
                }
            }
        }

        let mut merged = String::new();
        for (name, value) in &cookies {
            if !merged.is_empty() {
                merged.push_str("; ");
            }
            merged.push_str(name);
            if let Some(value) = value {
                merged.push('=');
                merged.push_str(value);
            }
        }

        if let Ok(value) = header::HeaderValue::from_str(&merged) {
            let headers = request.headers_mut();
            headers.remove(header::COOKIE);
            headers.insert(header::COOKIE, value);
        }
        request
    }

    /// Harvest `Set-Cookie` headers from a response, defaulting absent
    /// cookie domains to the request host. The response itself is left
    /// untouched.
    pub fn on_response(
        &mut self,
        response: &Response<HttpBody>,
        request_uri: &Uri,
    ) -> Result<(), CookieError> {
        let default_domain = request_uri.host().unwrap_or_default();

        for header_value in response.headers().get_all(header::SET_COOKIE) {
            let Ok(line) = header_value.to_str() else {
                if self.strict {
                    return Err(CookieError::InvalidCookie);
                }
                continue;
            };
            let mut cookie = CookieSet::parse(line);
            if cookie.domain().is_empty() {
                cookie.set_domain(default_domain);
            }
            self.set_cookie(cookie)?;
        }
        Ok(())
    }

    /// Write all non-expired cookies to the backing file, leaving session
    /// cookies out unless configured otherwise.
    pub fn save(&self) -> Result<(), CookieError> {
        let Some(path) = &self.backing_file else {
            if self.strict {
                return Err(CookieError::NoBackingFile);
            }
            return Ok(());
        };

        let mut content = Vec::new();
        for list in self.cookies.values() {
            for cookie in list {
                if cookie.is_expired() {
                    continue;
                }
                if cookie.is_session_cookie() && !self.persist_session_cookies {
                    continue;
                }
                content.push(cookie);
            }
        }
        let data = serde_json::to_vec(&content)?;
        std::fs::write(path, data)?;
        Ok(())
    }

    /// Drop the current content and re-hydrate from the backing file.
    pub fn load(&mut self) -> Result<(), CookieError> {
        let Some(path) = self.backing_file.clone() else {
            return Err(CookieError::NoBackingFile);
        };
        self.load_from(&path)
    }

    fn load_from(&mut self, path: &Path) -> Result<(), CookieError> {
        let data = std::fs::read(path)?;
        self.cookies.clear();
        if data.is_empty() {
            return Ok(());
        }
        let cookies: Vec<CookieSet> = serde_json::from_slice(&data)?;
        for cookie in cookies {
            self.set_cookie(cookie)?;
        }
        Ok(())
    }
}

/// An exact match, or the cookie path is a `/`-bounded prefix of the
/// request path.
fn cookie_path_matches(cookie_path: &str, request_path: &str) -> bool {
    if cookie_path == "/" || cookie_path == request_path {
        return true;
    }
    let Some(rest) = request_path.strip_prefix(cookie_path) else {
        return false;
    };
    cookie_path.ends_with('/') || rest.starts_with('/')
}
