//! Error taxonomy for the partner service client.
//!
//! # Design
//! Every failure that reaches the partner service (or tried to) carries exactly
//! one `ErrorCategory`, derived from the HTTP status by the classifier, so
//! callers can decide programmatically whether to retry. Local failures
//! (argument validation, configuration, payload encoding) are separate
//! variants with no category: they never touch the network.

use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::context::RequestContext;

/// Category assigned to every classified partner service failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    NotSpecified,
    BadInput,
    Unauthorized,
    Forbidden,
    NotFound,
    UnsupportedDataFormat,
    AlreadyExists,
    InvalidOperation,
    ServerError,
    ServerBusy,
    RequestTimeout,
    GatewayTimeout,
    ResponseParsing,
    TooManyRequests,
}

impl ErrorCategory {
    /// Maps a failed HTTP status to its category.
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => ErrorCategory::BadInput,
            401 => ErrorCategory::Unauthorized,
            403 => ErrorCategory::Forbidden,
            404 => ErrorCategory::NotFound,
            405 => ErrorCategory::InvalidOperation,
            406 => ErrorCategory::UnsupportedDataFormat,
            408 => ErrorCategory::RequestTimeout,
            409 => ErrorCategory::AlreadyExists,
            429 => ErrorCategory::TooManyRequests,
            503 => ErrorCategory::ServerBusy,
            504 => ErrorCategory::GatewayTimeout,
            _ => ErrorCategory::ServerError,
        }
    }

    /// Transient categories that the retry executor may re-attempt.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorCategory::ServerBusy
                | ErrorCategory::TooManyRequests
                | ErrorCategory::RequestTimeout
                | ErrorCategory::GatewayTimeout
        )
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Structured fault payload returned by the partner service.
///
/// Accepts both the `ErrorCode`/`ErrorMessage`/`ErrorData` shape and the
/// lowercase `code`/`description`/`data` shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiFault {
    #[serde(rename = "ErrorCode", alias = "errorCode", alias = "code", default)]
    pub error_code: String,
    #[serde(
        rename = "ErrorMessage",
        alias = "errorMessage",
        alias = "description",
        default
    )]
    pub error_message: String,
    #[serde(rename = "ErrorData", alias = "errorData", alias = "data", default)]
    pub error_data: serde_json::Value,
}

impl ApiFault {
    /// True when the service populated at least one meaningful field.
    pub fn is_populated(&self) -> bool {
        let has_data = match &self.error_data {
            serde_json::Value::Null => false,
            serde_json::Value::Array(items) => !items.is_empty(),
            serde_json::Value::Object(map) => !map.is_empty(),
            serde_json::Value::String(s) => !s.trim().is_empty(),
            _ => true,
        };
        !self.error_code.trim().is_empty() || !self.error_message.trim().is_empty() || has_data
    }
}

type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// A classified failure of a partner service call.
#[derive(Debug)]
pub struct PartnerException {
    category: ErrorCategory,
    message: String,
    retry_after: Option<Duration>,
    service_error_payload: Option<ApiFault>,
    context: Option<RequestContext>,
    source: Option<BoxError>,
}

impl PartnerException {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            retry_after: None,
            service_error_payload: None,
            context: None,
            source: None,
        }
    }

    /// Builds an exception whose message is taken from the fault payload.
    pub fn from_fault(category: ErrorCategory, fault: ApiFault) -> Self {
        let mut exception = Self::new(category, fault.error_message.clone());
        exception.service_error_payload = Some(fault);
        exception
    }

    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }

    pub fn with_context(mut self, context: Option<RequestContext>) -> Self {
        self.context = context;
        self
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn category(&self) -> ErrorCategory {
        self.category
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }

    pub fn service_error_payload(&self) -> Option<&ApiFault> {
        self.service_error_payload.as_ref()
    }

    pub fn context(&self) -> Option<&RequestContext> {
        self.context.as_ref()
    }
}

impl fmt::Display for PartnerException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.category, self.message)?;
        if let Some(context) = &self.context {
            write!(
                f,
                " (correlation id {}, request id {})",
                context.correlation_id(),
                context.request_id()
            )?;
        }
        Ok(())
    }
}

impl StdError for PartnerException {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|source| source as &(dyn StdError + 'static))
    }
}

/// Errors returned by every partner client operation.
#[derive(Debug, thiserror::Error)]
pub enum PartnerError {
    /// The partner service (or the transport to it) reported a failure.
    #[error(transparent)]
    Service(Box<PartnerException>),

    /// A success response whose body could not be converted to the expected type.
    #[error("{exception}")]
    ResponseParse {
        exception: Box<PartnerException>,
        body: String,
    },

    /// A caller-supplied argument failed validation before any network activity.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    /// The request payload could not be serialized to JSON.
    #[error("request serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),

    #[error("operation cancelled")]
    Cancelled,

    /// The blocking bridge could not start its runtime.
    #[error("runtime unavailable: {0}")]
    Runtime(#[source] std::io::Error),
}

impl PartnerError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        PartnerError::InvalidArgument(message.into())
    }

    /// Category of a network-related failure; `None` for local errors.
    pub fn category(&self) -> Option<ErrorCategory> {
        match self {
            PartnerError::Service(exception) => Some(exception.category()),
            PartnerError::ResponseParse { .. } => Some(ErrorCategory::ResponseParsing),
            _ => None,
        }
    }

    /// The underlying exception for service and response-parse failures.
    pub fn exception(&self) -> Option<&PartnerException> {
        match self {
            PartnerError::Service(exception) => Some(exception),
            PartnerError::ResponseParse { exception, .. } => Some(exception),
            _ => None,
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        self.exception().and_then(PartnerException::retry_after)
    }

    pub fn is_retryable(&self) -> bool {
        self.category().is_some_and(ErrorCategory::is_retryable)
    }

    pub fn is_not_found(&self) -> bool {
        self.category() == Some(ErrorCategory::NotFound)
    }
}

impl From<PartnerException> for PartnerError {
    fn from(exception: PartnerException) -> Self {
        PartnerError::Service(Box::new(exception))
    }
}
