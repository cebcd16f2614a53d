//! HTTP transport types and the transport seam.
//!
//! # Design
//! Requests and responses are described as plain data so the service proxy
//! can be exercised against any `HttpTransport`. `ReqwestTransport` is the
//! production implementation; tests substitute an in-memory transport or
//! point the reqwest transport at a mock server.
//!
//! Response bodies stay streaming until someone asks for the bytes, which lets
//! binary downloads be forwarded chunk by chunk.

use std::fmt;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{Stream, StreamExt, TryStreamExt};
use tracing::debug;

use crate::error::{ErrorCategory, PartnerError, PartnerException};

pub type BoxStream<T> = Pin<Box<dyn Stream<Item = T> + Send + 'static>>;

/// Byte stream returned by download operations.
pub type ByteStream = BoxStream<Result<Bytes, PartnerError>>;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An HTTP request described as plain data.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
}

impl HttpRequest {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

pub enum ResponseBody {
    Buffered(Bytes),
    Streaming(ByteStream),
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseBody::Buffered(bytes) => {
                f.debug_tuple("ResponseBody::Buffered").field(&bytes.len()).finish()
            }
            ResponseBody::Streaming(_) => write!(f, "ResponseBody::Streaming(..)"),
        }
    }
}

/// An HTTP response as returned by a transport.
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: ResponseBody,
}

impl HttpResponse {
    pub fn from_bytes(status: u16, headers: Vec<(String, String)>, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: ResponseBody::Buffered(body.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Canonical reason phrase for the status, if it has one.
    pub fn reason_phrase(&self) -> Option<&'static str> {
        reqwest::StatusCode::from_u16(self.status)
            .ok()
            .and_then(|status| status.canonical_reason())
    }

    /// Consume the response and buffer the entire body.
    pub async fn bytes(self) -> Result<Bytes, PartnerError> {
        match self.body {
            ResponseBody::Buffered(bytes) => Ok(bytes),
            ResponseBody::Streaming(mut stream) => {
                let mut buf = Vec::new();
                while let Some(chunk) = stream.next().await {
                    buf.extend_from_slice(&chunk?);
                }
                Ok(Bytes::from(buf))
            }
        }
    }

    pub fn into_stream(self) -> ByteStream {
        match self.body {
            ResponseBody::Buffered(bytes) => {
                Box::pin(futures::stream::once(async move { Ok(bytes) }))
            }
            ResponseBody::Streaming(stream) => stream,
        }
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

/// Executes one physical HTTP round trip.
///
/// Implementations return every response that arrived, whatever its status;
/// only failures to obtain a response are errors.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, PartnerError>;
}

/// `HttpTransport` backed by reqwest.
///
/// Requests sent from the blocking bridge go through their own client. A
/// pooled connection is driven by the runtime that opened it, so sharing one
/// pool would let a bridge task wait on a connection whose runtime is blocked
/// on that same task.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    bridge_client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, PartnerError> {
        Ok(Self {
            client: build_client(timeout)?,
            bridge_client: build_client(timeout)?,
        })
    }

    fn client(&self) -> &reqwest::Client {
        if crate::bridge::on_bridge() {
            &self.bridge_client
        } else {
            &self.client
        }
    }
}

fn build_client(timeout: Duration) -> Result<reqwest::Client, PartnerError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| PartnerError::Configuration(format!("cannot build HTTP client: {e}")))
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, PartnerError> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Head => reqwest::Method::HEAD,
        };

        let mut builder = self.client().request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(transport_error)?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        debug!(status, url = %request.url, "partner service responded");

        let stream = response.bytes_stream().map_err(transport_error);
        Ok(HttpResponse {
            status,
            headers,
            body: ResponseBody::Streaming(Box::pin(stream)),
        })
    }
}

fn transport_error(err: reqwest::Error) -> PartnerError {
    let category = if err.is_timeout() {
        ErrorCategory::RequestTimeout
    } else {
        ErrorCategory::ServerError
    };
    PartnerException::new(category, format!("partner service transport failure: {err}"))
        .with_source(err)
        .into()
}
