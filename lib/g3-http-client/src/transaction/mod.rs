/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::future::Future;
use std::sync::{Arc, Mutex};

use http::{HeaderMap, Method, Request, Response, Uri, Version, header};
use tokio_util::sync::CancellationToken;

use crate::body::HttpBody;
use crate::client::{HttpRequestSender, HttpResponseParseError};
use crate::connect::HttpConnector;
use crate::cookie::CookieJar;
use crate::HttpClientError;
use crate::log_msg;

mod options;
pub use options::{HttpTransactionOptions, ResponseTimeout};

/// The state machine driving one logical user request to settlement:
/// attempts are sent strictly in sequence through the cookie hooks and
/// the wire sender, redirects are followed up to the configured limit,
/// each attempt runs under its own response deadline, and the final body
/// is buffered unless the policy keeps it streaming.
///
/// A transaction lives exactly as long as the `run` future; dropping that
/// future releases whatever connection or timer is outstanding.
pub struct HttpTransaction<C> {
    sender: HttpRequestSender<C>,
    request: Request<HttpBody>,
    options: HttpTransactionOptions,
    cookie_jar: Option<Arc<Mutex<CookieJar>>>,
    cancel_token: Option<CancellationToken>,
}

impl<C> HttpTransaction<C>
where
    C: HttpConnector,
{
    pub fn new(
        request: Request<HttpBody>,
        sender: HttpRequestSender<C>,
        options: HttpTransactionOptions,
    ) -> Self {
        HttpTransaction {
            sender,
            request,
            options,
            cookie_jar: None,
            cancel_token: None,
        }
    }

    /// Install the shared cookie store of the owning client. Its hooks
    /// then run around every physical send of this transaction.
    pub fn with_cookie_jar(mut self, jar: Arc<Mutex<CookieJar>>) -> Self {
        self.cookie_jar = Some(jar);
        self
    }

    /// Observe `token` at every suspension point: once cancelled, the
    /// outstanding sub-operation is dropped, its connection closed, and
    /// the transaction settles with a cancellation error.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    /// Drive the transaction to settlement.
    pub async fn run(self) -> Result<Response<HttpBody>, HttpClientError> {
        let HttpTransaction {
            sender,
            mut request,
            options,
            cookie_jar,
            cancel_token,
        } = self;

        let mut num_redirects: usize = 0;

        loop {
            if let Some(jar) = &cookie_jar {
                request = jar.lock().unwrap().on_request(request);
            }

            let method = request.method().clone();
            let uri = request.uri().clone();
            let version = request.version();
            let headers = request.headers().clone();
            log_msg!("request {} {}", method, uri);

            let streaming_request_body = matches!(request.body(), HttpBody::Streaming(_));
            let timeout = options.response_timeout().resolve();

            let response = if streaming_request_body {
                // sending the body may legitimately outlast the response
                // budget, the deadline arms once the body has been written
                run_cancellable(cancel_token.as_ref(), sender.send(request, timeout)).await??
            } else {
                match timeout {
                    Some(duration) => {
                        let deadline =
                            tokio::time::timeout(duration, sender.send(request, None));
                        match run_cancellable(cancel_token.as_ref(), deadline).await? {
                            Ok(result) => result?,
                            Err(_) => return Err(HttpClientError::ResponseTimeout(duration)),
                        }
                    }
                    None => {
                        run_cancellable(cancel_token.as_ref(), sender.send(request, None)).await??
                    }
                }
            };

            if let Some(jar) = &cookie_jar {
                jar.lock().unwrap().on_response(&response, &uri)?;
            }

            let status = response.status().as_u16();

            if options.follow_redirects() && (300..400).contains(&status) {
                if let Some(location) = response.headers().get(header::LOCATION) {
                    let location = location.to_str().map_err(|_| {
                        HttpClientError::InvalidRedirectLocation("location is not valid utf-8")
                    })?;
                    let next_uri = resolve_location(&uri, location)?;
                    log_msg!("redirect {} => {}", uri, next_uri);

                    num_redirects += 1;
                    if num_redirects > options.max_redirects() {
                        return Err(HttpClientError::TooManyRedirects(options.max_redirects()));
                    }

                    // the redirect response is dropped here, closing its
                    // connection before the next attempt starts
                    drop(response);
                    request = make_redirect_request(&method, version, headers, &uri, next_uri);
                    continue;
                }
                // a redirect status without a Location header is terminal
                // and settles like any other response
            }

            // only status codes 200-399 are considered valid
            if options.obey_success_code() && !(200..400).contains(&status) {
                let response = if options.streaming() {
                    response
                } else {
                    buffer_response(response, cancel_token.as_ref()).await?
                };
                return Err(HttpClientError::UnexpectedStatus(response));
            }

            return if options.streaming() {
                Ok(response)
            } else {
                buffer_response(response, cancel_token.as_ref()).await
            };
        }
    }
}

/// Race `fut` against cancellation. On cancel the future is dropped,
/// which releases the connection or stream it owns.
async fn run_cancellable<F>(
    token: Option<&CancellationToken>,
    fut: F,
) -> Result<F::Output, HttpClientError>
where
    F: Future,
{
    match token {
        Some(token) => {
            tokio::select! {
                biased;
                _ = token.cancelled() => Err(HttpClientError::Canceled),
                r = fut => Ok(r),
            }
        }
        None => Ok(fut.await),
    }
}

async fn buffer_response(
    response: Response<HttpBody>,
    token: Option<&CancellationToken>,
) -> Result<Response<HttpBody>, HttpClientError> {
    let (parts, body) = response.into_parts();
    let data = run_cancellable(token, body.into_buffered())
        .await?
        .map_err(|e| HttpClientError::ReadFailed(HttpResponseParseError::IoFailed(e)))?;
    Ok(Response::from_parts(parts, HttpBody::from(data)))
}

/// Resolve a `Location` value against the uri of the request that got
/// redirected, with full RFC 3986 reference semantics.
fn resolve_location(base: &Uri, location: &str) -> Result<Uri, HttpClientError> {
    let base = url::Url::parse(&base.to_string())
        .map_err(|_| HttpClientError::InvalidRedirectLocation("base uri is not absolute"))?;
    let resolved = base
        .join(location)
        .map_err(|_| HttpClientError::InvalidRedirectLocation("malformed location"))?;
    Uri::try_from(resolved.as_str())
        .map_err(|_| HttpClientError::InvalidRedirectLocation("unrepresentable location"))
}

/// The follow-up request for a redirect: the method degrades to GET
/// unless it was HEAD, the body is dropped, message-specific headers are
/// stripped, and credentials are stripped when the host changes (ones
/// embedded in the new uri travel with it untouched).
fn make_redirect_request(
    method: &Method,
    version: Version,
    mut headers: HeaderMap,
    prev_uri: &Uri,
    next_uri: Uri,
) -> Request<HttpBody> {
    headers.remove(header::HOST);
    headers.remove(header::CONTENT_TYPE);
    headers.remove(header::CONTENT_LENGTH);

    let host_changed = !match (prev_uri.host(), next_uri.host()) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        _ => false,
    };
    if host_changed {
        headers.remove(header::AUTHORIZATION);
    }

    let method = if method.eq(&Method::HEAD) {
        Method::HEAD
    } else {
        Method::GET
    };

    let mut request = Request::new(HttpBody::Empty);
    *request.method_mut() = method;
    *request.uri_mut() = next_uri;
    *request.version_mut() = version;
    *request.headers_mut() = headers;
    request
}
