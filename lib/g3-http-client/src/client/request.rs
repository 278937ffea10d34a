/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io::Write;

use http::request::Parts;
use http::{Version, header};

use crate::HttpClientError;
use crate::body::HttpBody;

/// How the request body will be put on the wire after the head.
#[derive(Debug)]
pub(crate) enum RequestBodyWire {
    /// no body bytes follow
    None,
    /// body bytes follow unframed, the header already declares the length
    AsIs,
    /// body goes through the chunked encoder
    Chunked,
}

/// Serialize the request head, deciding the body framing along the way:
/// a buffered non-empty body without an explicit Content-Length gets one
/// set to its real length, a streaming body without one is switched to
/// chunked transfer-encoding. An explicit Content-Length always wins and
/// makes the body go out as-is.
pub(crate) fn serialize_request_head(
    parts: &Parts,
    body: &HttpBody,
) -> Result<(Vec<u8>, RequestBodyWire), HttpClientError> {
    if parts.uri.scheme().is_none() {
        return Err(HttpClientError::InvalidRequestUri("no scheme in uri"));
    }
    let Some(host) = parts.uri.host() else {
        return Err(HttpClientError::InvalidRequestUri("no host in uri"));
    };
    if host.is_empty() {
        return Err(HttpClientError::InvalidRequestUri("no host in uri"));
    }
    match parts.version {
        Version::HTTP_10 | Version::HTTP_11 => {}
        version => return Err(HttpClientError::UnsupportedVersion(version)),
    }

    let mut buf = Vec::<u8>::with_capacity(1024);

    let target = parts
        .uri
        .path_and_query()
        .map(|v| v.as_str())
        .unwrap_or("/");
    let _ = write!(buf, "{} {} {:?}\r\n", parts.method, target, parts.version);

    match parts.headers.get(header::HOST) {
        Some(v) => {
            buf.extend_from_slice(b"Host: ");
            buf.extend_from_slice(v.as_bytes());
            buf.extend_from_slice(b"\r\n");
        }
        None => {
            if let Some(port) = parts.uri.port_u16() {
                let _ = write!(buf, "Host: {host}:{port}\r\n");
            } else {
                let _ = write!(buf, "Host: {host}\r\n");
            }
        }
    }

    for name in parts.headers.keys() {
        if *name == header::HOST
            || *name == header::CONTENT_LENGTH
            || *name == header::TRANSFER_ENCODING
        {
            continue;
        }
        let _ = write!(buf, "{name}: ");
        for (i, value) in parts.headers.get_all(name).iter().enumerate() {
            if i > 0 {
                buf.extend_from_slice(b", ");
            }
            buf.extend_from_slice(value.as_bytes());
        }
        buf.extend_from_slice(b"\r\n");
    }

    let explicit_content_length = parts.headers.get(header::CONTENT_LENGTH);
    let body_wire = match body {
        HttpBody::Empty => {
            if let Some(v) = explicit_content_length {
                buf.extend_from_slice(b"Content-Length: ");
                buf.extend_from_slice(v.as_bytes());
                buf.extend_from_slice(b"\r\n");
            }
            RequestBodyWire::None
        }
        HttpBody::Buffered(data) => {
            if let Some(v) = explicit_content_length {
                buf.extend_from_slice(b"Content-Length: ");
                buf.extend_from_slice(v.as_bytes());
                buf.extend_from_slice(b"\r\n");
            } else if !data.is_empty() {
                let _ = write!(buf, "Content-Length: {}\r\n", data.len());
            }
            RequestBodyWire::AsIs
        }
        HttpBody::Streaming(_) => {
            if let Some(v) = explicit_content_length {
                buf.extend_from_slice(b"Content-Length: ");
                buf.extend_from_slice(v.as_bytes());
                buf.extend_from_slice(b"\r\n");
                RequestBodyWire::AsIs
            } else {
                buf.extend_from_slice(b"Transfer-Encoding: chunked\r\n");
                RequestBodyWire::Chunked
            }
        }
    };

    buf.extend_from_slice(b"\r\n");
    Ok((buf, body_wire))
}
