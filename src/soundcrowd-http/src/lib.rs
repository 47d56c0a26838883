//! `reqwest`-backed [`Transport`] shared by all plugins of a host.

use reqwest::blocking::Client;
use reqwest::header::COOKIE;
use reqwest::{redirect, Method};
use soundcrowd_core::config::HttpConfig;
use soundcrowd_core::redact::{redact_header, redact_secrets};
use soundcrowd_core::transport::{
    HttpMethod, HttpRequest, HttpResponse, Transport, TransportError, TransportResult,
};
use std::sync::RwLock;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpTransportError {
    #[error("failed to build http client: {0}")]
    Build(#[from] reqwest::Error),
}

/// Blocking HTTP client.
///
/// Redirects are never followed: a 3xx answer is handed back as is. The
/// cookie string, when set, rides along on every request.
pub struct HttpTransport {
    client: Client,
    cookies: RwLock<Option<String>>,
}

impl HttpTransport {
    pub fn new(config: &HttpConfig) -> Result<Self, HttpTransportError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .redirect(redirect::Policy::none())
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self {
            client,
            cookies: RwLock::new(config.cookies.clone().filter(|c| !c.is_empty())),
        })
    }

    /// Replaces the shared cookie string; `None` or empty stops sending it.
    pub fn set_cookies(&self, cookies: Option<String>) {
        let cookies = cookies.filter(|c| !c.is_empty());
        match self.cookies.write() {
            Ok(mut guard) => *guard = cookies,
            Err(poisoned) => *poisoned.into_inner() = cookies,
        }
    }

    pub fn cookies(&self) -> Option<String> {
        match self.cookies.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

fn method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Delete => Method::DELETE,
        HttpMethod::Head => Method::HEAD,
    }
}

fn io_error(err: reqwest::Error) -> TransportError {
    TransportError::Io {
        message: redact_secrets(&err.to_string()).into_owned(),
    }
}

impl Transport for HttpTransport {
    fn request(&self, request: &HttpRequest) -> TransportResult<HttpResponse> {
        let url = redact_secrets(&request.url);
        let mut builder = self.client.request(method(request.method), &request.url);
        for (name, value) in &request.headers {
            tracing::trace!(header = %name, value = %redact_header(name, value), "request header");
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(cookies) = self.cookies() {
            builder = builder.header(COOKIE, cookies);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        tracing::debug!(method = %request.method, %url, "http request");
        let response = builder.send().map_err(io_error)?;
        let status = response.status().as_u16();
        let body = response.bytes().map_err(io_error)?.to_vec();

        if status == 429 {
            tracing::warn!(%url, "rate limited by upstream");
        }
        if status >= 400 {
            tracing::debug!(status, %url, "http error status");
            return Err(TransportError::Http {
                status,
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        tracing::trace!(status, bytes = body.len(), "http response");
        Ok(HttpResponse::new(status, body))
    }
}
