//! Correlation, request and locale information attached to every call.

use uuid::Uuid;

/// Immutable tracing context sent as headers on every partner service call.
///
/// A nil request id means "generate one per physical call": each attempt,
/// including retries, is then sent with a fresh id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    request_id: Uuid,
    correlation_id: Uuid,
    locale: String,
}

impl RequestContext {
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    /// The request id to send for one physical call.
    pub fn request_id_for_call(&self) -> Uuid {
        if self.request_id.is_nil() {
            Uuid::new_v4()
        } else {
            self.request_id
        }
    }

    /// A copy of this context pinned to the request id actually sent.
    pub(crate) fn for_call(&self, request_id: Uuid) -> Self {
        Self {
            request_id,
            correlation_id: self.correlation_id,
            locale: self.locale.clone(),
        }
    }
}

/// Creates request contexts using a configured default locale.
#[derive(Debug, Clone)]
pub struct RequestContextFactory {
    default_locale: String,
}

impl RequestContextFactory {
    pub fn new(default_locale: impl Into<String>) -> Self {
        Self {
            default_locale: default_locale.into(),
        }
    }

    pub fn default_locale(&self) -> &str {
        &self.default_locale
    }

    /// New correlation id, per-call request ids, default locale.
    pub fn create(&self) -> RequestContext {
        self.create_with_correlation_id(Uuid::new_v4())
    }

    pub fn create_with_correlation_id(&self, correlation_id: Uuid) -> RequestContext {
        self.create_with_ids(correlation_id, Uuid::nil())
    }

    pub fn create_with_ids(&self, correlation_id: Uuid, request_id: Uuid) -> RequestContext {
        RequestContext {
            request_id,
            correlation_id,
            locale: self.default_locale.clone(),
        }
    }

    pub fn create_with_locale(&self, locale: impl Into<String>) -> RequestContext {
        self.create_full(Uuid::new_v4(), Uuid::nil(), locale)
    }

    pub fn create_full(
        &self,
        correlation_id: Uuid,
        request_id: Uuid,
        locale: impl Into<String>,
    ) -> RequestContext {
        let locale = locale.into();
        RequestContext {
            request_id,
            correlation_id,
            locale: if locale.trim().is_empty() {
                self.default_locale.clone()
            } else {
                locale
            },
        }
    }
}

impl Default for RequestContextFactory {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_LOCALE)
    }
}
