//! The root partner handle and the base every resource operation builds on.

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::PartnerConfiguration;
use crate::context::{RequestContext, RequestContextFactory};
use crate::error::PartnerError;
use crate::http::{HttpTransport, ReqwestTransport};
use crate::proxy::ServiceProxy;
use crate::resources::{AuditRecordsOperations, CustomerCollectionOperations, InvoiceCollectionOperations};
use crate::retry::RetryPolicy;

/// Bearer credentials used to authorize partner service calls.
#[derive(Clone)]
pub struct PartnerCredentials {
    access_token: String,
}

impl PartnerCredentials {
    pub fn new(access_token: impl Into<String>) -> Result<Self, PartnerError> {
        let access_token = access_token.into();
        if access_token.trim().is_empty() {
            return Err(PartnerError::invalid_argument("access token must not be blank"));
        }
        Ok(Self { access_token })
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }
}

impl fmt::Debug for PartnerCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartnerCredentials")
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// Root handle: credentials, default request context, configuration,
/// transport and the default retry policy.
///
/// Cheap to clone; scoped copies are created with `with_context` and
/// `with_retry_policy`.
#[derive(Clone)]
pub struct PartnerOperations {
    credentials: PartnerCredentials,
    request_context: RequestContext,
    configuration: Arc<PartnerConfiguration>,
    transport: Arc<dyn HttpTransport>,
    retry_policy: Option<Arc<dyn RetryPolicy>>,
}

impl fmt::Debug for PartnerOperations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartnerOperations")
            .field("credentials", &self.credentials)
            .field("request_context", &self.request_context)
            .field("api_root", &self.configuration.api_root)
            .field("retry_policy", &self.retry_policy.is_some())
            .finish()
    }
}

impl PartnerOperations {
    /// Handle backed by a reqwest transport using the configured timeout.
    pub fn new(
        credentials: PartnerCredentials,
        configuration: PartnerConfiguration,
    ) -> Result<Arc<Self>, PartnerError> {
        let transport = ReqwestTransport::new(configuration.request_timeout())?;
        Ok(Self::with_transport(credentials, configuration, Arc::new(transport)))
    }

    pub fn with_transport(
        credentials: PartnerCredentials,
        configuration: PartnerConfiguration,
        transport: Arc<dyn HttpTransport>,
    ) -> Arc<Self> {
        let request_context = RequestContextFactory::new(configuration.default_locale.clone()).create();
        Arc::new(Self {
            credentials,
            request_context,
            configuration: Arc::new(configuration),
            transport,
            retry_policy: None,
        })
    }

    /// A handle identical to this one but sending `context`.
    pub fn with_context(&self, context: RequestContext) -> Arc<Self> {
        Arc::new(Self {
            request_context: context,
            ..self.clone()
        })
    }

    pub fn with_retry_policy(&self, policy: Arc<dyn RetryPolicy>) -> Arc<Self> {
        Arc::new(Self {
            retry_policy: Some(policy),
            ..self.clone()
        })
    }

    pub fn credentials(&self) -> &PartnerCredentials {
        &self.credentials
    }

    pub fn request_context(&self) -> &RequestContext {
        &self.request_context
    }

    pub fn configuration(&self) -> &PartnerConfiguration {
        &self.configuration
    }

    pub fn transport(&self) -> &Arc<dyn HttpTransport> {
        &self.transport
    }

    pub fn retry_policy(&self) -> Option<&dyn RetryPolicy> {
        self.retry_policy.as_deref()
    }

    pub fn request_context_factory(&self) -> RequestContextFactory {
        RequestContextFactory::new(self.configuration.default_locale.clone())
    }

    pub fn customers(self: &Arc<Self>) -> CustomerCollectionOperations {
        CustomerCollectionOperations::new(Arc::clone(self))
    }

    pub fn audit_records(self: &Arc<Self>) -> AuditRecordsOperations {
        AuditRecordsOperations::new(Arc::clone(self))
    }

    pub fn invoices(self: &Arc<Self>) -> InvoiceCollectionOperations {
        InvoiceCollectionOperations::new(Arc::clone(self))
    }
}

/// Value used to parameterize a resource operation's path.
pub trait ComponentContext: Clone + Send + Sync + 'static {
    fn validate(&self) -> Result<(), PartnerError>;
}

fn require_non_blank(value: &str, position: usize) -> Result<(), PartnerError> {
    if value.trim().is_empty() {
        return Err(PartnerError::invalid_argument(format!(
            "context value {position} must not be blank"
        )));
    }
    Ok(())
}

impl ComponentContext for () {
    fn validate(&self) -> Result<(), PartnerError> {
        Ok(())
    }
}

impl ComponentContext for String {
    fn validate(&self) -> Result<(), PartnerError> {
        require_non_blank(self, 0)
    }
}

impl ComponentContext for (String, String) {
    fn validate(&self) -> Result<(), PartnerError> {
        require_non_blank(&self.0, 0)?;
        require_non_blank(&self.1, 1)
    }
}

impl ComponentContext for (String, String, String) {
    fn validate(&self) -> Result<(), PartnerError> {
        require_non_blank(&self.0, 0)?;
        require_non_blank(&self.1, 1)?;
        require_non_blank(&self.2, 2)
    }
}

/// Common root of every resource operation: the partner handle plus an
/// optional validated context.
#[derive(Debug, Clone)]
pub struct BasePartnerComponent<C = ()> {
    partner: Arc<PartnerOperations>,
    context: C,
}

impl BasePartnerComponent<()> {
    pub fn unscoped(partner: Arc<PartnerOperations>) -> Self {
        Self {
            partner,
            context: (),
        }
    }
}

impl<C: ComponentContext> BasePartnerComponent<C> {
    pub fn new(partner: Arc<PartnerOperations>, context: C) -> Result<Self, PartnerError> {
        context.validate()?;
        Ok(Self { partner, context })
    }

    pub fn partner(&self) -> &Arc<PartnerOperations> {
        &self.partner
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    /// Proxy for the named endpoint with its placeholders filled from `args`.
    pub fn proxy<TRequest, TResponse>(
        &self,
        api: &str,
        args: &[&str],
    ) -> Result<ServiceProxy<TRequest, TResponse>, PartnerError>
    where
        TRequest: Serialize + Send + 'static,
        TResponse: DeserializeOwned + Send + 'static,
    {
        let path = self.partner.configuration().api(api)?.format(args)?;
        Ok(ServiceProxy::new(Arc::clone(&self.partner), path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::LinearBackOffRetryPolicy;

    fn partner() -> Arc<PartnerOperations> {
        PartnerOperations::new(
            PartnerCredentials::new("token").unwrap(),
            PartnerConfiguration::default(),
        )
        .unwrap()
    }

    #[test]
    fn blank_token_is_rejected() {
        assert!(matches!(
            PartnerCredentials::new("  "),
            Err(PartnerError::InvalidArgument(_))
        ));
    }

    #[test]
    fn debug_redacts_token() {
        let creds = PartnerCredentials::new("secret-token").unwrap();
        assert!(!format!("{creds:?}").contains("secret-token"));
    }

    #[test]
    fn default_context_uses_configured_locale() {
        let mut config = PartnerConfiguration::default();
        config.default_locale = "ja-JP".to_string();
        let partner = PartnerOperations::new(PartnerCredentials::new("t").unwrap(), config).unwrap();
        assert_eq!(partner.request_context().locale(), "ja-JP");
    }

    #[test]
    fn with_context_scopes_a_copy() {
        let root = partner();
        let ctx = root.request_context_factory().create_with_locale("it-IT");
        let scoped = root.with_context(ctx.clone());
        assert_eq!(scoped.request_context(), &ctx);
        assert_ne!(root.request_context(), &ctx);
        assert_eq!(scoped.credentials().access_token(), "token");
    }

    #[test]
    fn with_retry_policy_sets_default_policy() {
        let root = partner();
        assert!(root.retry_policy().is_none());
        let retrying = root.with_retry_policy(Arc::new(LinearBackOffRetryPolicy::default()));
        assert!(retrying.retry_policy().is_some());
    }

    #[test]
    fn component_context_validation() {
        let root = partner();
        assert!(BasePartnerComponent::new(root.clone(), ()).is_ok());
        assert!(BasePartnerComponent::new(root.clone(), "cust".to_string()).is_ok());
        assert!(BasePartnerComponent::new(root.clone(), String::new()).is_err());
        assert!(BasePartnerComponent::new(root.clone(), ("a".to_string(), " ".to_string())).is_err());
        assert!(BasePartnerComponent::new(
            root,
            ("a".to_string(), "b".to_string(), "".to_string())
        )
        .is_err());
    }
}
