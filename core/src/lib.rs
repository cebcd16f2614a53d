//! Client core for the partner-management REST service.
//!
//! # Overview
//! Every resource operation (customers, carts, users, audit records, ...)
//! funnels through one generic pipeline: a typed `ServiceProxy` that builds a
//! URI from a configured path template plus ordered query parameters, attaches
//! the request context headers, sends JSON through an `HttpTransport`, and
//! turns failures into a `PartnerError` carrying an `ErrorCategory`.
//!
//! # Design
//! - `PartnerOperations` is the root handle: credentials, default
//!   `RequestContext`, injected `PartnerConfiguration`, transport and an
//!   optional default `RetryPolicy`. It is shared as `Arc` and never mutated.
//! - Resource operations are thin: format a path, add parameters, call a verb.
//! - Each async verb has a `*_blocking` twin running on a dedicated runtime
//!   (`bridge`), so blocking callers inside another runtime do not deadlock.
//! - `HttpRequest` / `HttpResponse` are plain data; the reqwest transport is
//!   one implementation of the seam and tests substitute their own.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod bridge;
pub mod classifier;
pub mod config;
pub mod context;
pub mod converter;
pub mod error;
pub mod http;
pub mod models;
pub mod operations;
pub mod proxy;
pub mod resources;
pub mod retry;

pub use bridge::synchronous_execute;
pub use config::{ApiEndpoint, HeaderNames, PartnerConfiguration};
pub use context::{RequestContext, RequestContextFactory};
pub use converter::{IdentityConverter, ItemsEnvelopeConverter, JsonConverter};
pub use error::{ApiFault, ErrorCategory, PartnerError, PartnerException};
pub use http::{ByteStream, HttpMethod, HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
pub use operations::{BasePartnerComponent, ComponentContext, PartnerCredentials, PartnerOperations};
pub use proxy::ServiceProxy;
pub use retry::{
    execute_with_retry, ExponentialBackOffRetryPolicy, LinearBackOffRetryPolicy, RetryPolicy,
};
