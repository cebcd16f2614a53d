//! Injected client configuration: service root, header names and the table of
//! named API path templates.
//!
//! # Design
//! Path templates use positional `{0}`, `{1}` placeholders. Arguments are
//! percent-encoded as single path segments when substituted, so identifiers
//! containing `/` or spaces cannot change the shape of the path.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde::{Deserialize, Serialize};

use crate::error::PartnerError;

pub const DEFAULT_API_ROOT: &str = "https://api.partnercenter.microsoft.com";
pub const DEFAULT_LOCALE: &str = "en-US";

const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Names of the headers attached to every call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HeaderNames {
    pub request_id: String,
    pub correlation_id: String,
    pub locale: String,
    pub continuation_token: String,
    pub customer_user_upn: String,
    pub application_name: String,
}

impl Default for HeaderNames {
    fn default() -> Self {
        Self {
            request_id: "MS-RequestId".to_string(),
            correlation_id: "MS-CorrelationId".to_string(),
            locale: "X-Locale".to_string(),
            continuation_token: "MS-ContinuationToken".to_string(),
            customer_user_upn: "MS-CustomerUserUpn".to_string(),
            application_name: "MS-PartnerCenter-Application".to_string(),
        }
    }
}

/// One named operation: its path template and query parameter names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEndpoint {
    pub path: String,
    #[serde(default)]
    pub parameters: HashMap<String, String>,
}

impl ApiEndpoint {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            parameters: HashMap::new(),
        }
    }

    pub fn with_parameter(mut self, key: &str, name: &str) -> Self {
        self.parameters.insert(key.to_string(), name.to_string());
        self
    }

    /// Query parameter name registered under `key`, or `key` itself.
    pub fn parameter<'a>(&'a self, key: &'a str) -> &'a str {
        self.parameters.get(key).map(String::as_str).unwrap_or(key)
    }

    /// Substitute `{n}` placeholders with percent-encoded `args[n]`.
    pub fn format(&self, args: &[&str]) -> Result<String, PartnerError> {
        format_path(&self.path, args)
    }
}

pub fn format_path(template: &str, args: &[&str]) -> Result<String, PartnerError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after.find('}').ok_or_else(|| {
            PartnerError::Configuration(format!("unterminated placeholder in path {template:?}"))
        })?;
        let index: usize = after[..close].parse().map_err(|_| {
            PartnerError::Configuration(format!(
                "invalid placeholder {{{}}} in path {template:?}",
                &after[..close]
            ))
        })?;
        let arg = args.get(index).ok_or_else(|| {
            PartnerError::Configuration(format!(
                "path {template:?} needs argument {index}, got {}",
                args.len()
            ))
        })?;
        if arg.trim().is_empty() {
            return Err(PartnerError::invalid_argument(format!(
                "path argument {index} for {template:?} must not be blank"
            )));
        }
        out.extend(utf8_percent_encode(arg, PATH_SEGMENT));
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Configuration shared by every call made through a partner handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PartnerConfiguration {
    pub api_root: String,
    pub default_locale: String,
    pub application_name: String,
    pub request_timeout_secs: u64,
    pub headers: HeaderNames,
    pub apis: HashMap<String, ApiEndpoint>,
}

impl Default for PartnerConfiguration {
    fn default() -> Self {
        Self {
            api_root: DEFAULT_API_ROOT.to_string(),
            default_locale: DEFAULT_LOCALE.to_string(),
            application_name: concat!("partner-core/", env!("CARGO_PKG_VERSION")).to_string(),
            request_timeout_secs: 100,
            headers: HeaderNames::default(),
            apis: default_apis(),
        }
    }
}

impl PartnerConfiguration {
    /// Parse a JSON document. Missing fields take their defaults; endpoints
    /// listed in the document replace the built-in entry of the same name.
    pub fn from_json_str(json: &str) -> Result<Self, PartnerError> {
        let mut config: Self = serde_json::from_str(json)
            .map_err(|e| PartnerError::Configuration(format!("invalid configuration: {e}")))?;
        for (name, endpoint) in default_apis() {
            config.apis.entry(name).or_insert(endpoint);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, PartnerError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            PartnerError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&raw)
    }

    /// Defaults overridden by environment variables
    ///
    /// - `PARTNER_API_ROOT`
    /// - `PARTNER_DEFAULT_LOCALE`
    /// - `PARTNER_REQUEST_TIMEOUT_SECS`
    pub fn from_env() -> Result<Self, PartnerError> {
        let mut config = Self::default();
        if let Ok(root) = std::env::var("PARTNER_API_ROOT") {
            config.api_root = root;
        }
        if let Ok(locale) = std::env::var("PARTNER_DEFAULT_LOCALE") {
            config.default_locale = locale;
        }
        if let Ok(timeout) = std::env::var("PARTNER_REQUEST_TIMEOUT_SECS") {
            config.request_timeout_secs = timeout.parse().map_err(|_| {
                PartnerError::Configuration(format!(
                    "PARTNER_REQUEST_TIMEOUT_SECS must be a number of seconds, got {timeout:?}"
                ))
            })?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn with_api_root(mut self, api_root: impl Into<String>) -> Self {
        self.api_root = api_root.into();
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Look up a named endpoint.
    pub fn api(&self, name: &str) -> Result<&ApiEndpoint, PartnerError> {
        self.apis
            .get(name)
            .ok_or_else(|| PartnerError::Configuration(format!("no API endpoint named {name:?}")))
    }

    fn validate(&self) -> Result<(), PartnerError> {
        if !(self.api_root.starts_with("http://") || self.api_root.starts_with("https://")) {
            return Err(PartnerError::Configuration(format!(
                "api root must be an http(s) URL, got {:?}",
                self.api_root
            )));
        }
        if self.default_locale.trim().is_empty() {
            return Err(PartnerError::Configuration(
                "default locale must not be blank".to_string(),
            ));
        }
        Ok(())
    }
}

pub mod apis {
    pub const GET_CUSTOMER: &str = "GetCustomer";
    pub const DELETE_CUSTOMER: &str = "DeleteCustomer";
    pub const GET_CART: &str = "GetCart";
    pub const CREATE_CART: &str = "CreateCart";
    pub const UPDATE_CART: &str = "UpdateCart";
    pub const CHECKOUT_CART: &str = "CheckoutCart";
    pub const GET_CUSTOMER_USER: &str = "GetCustomerUser";
    pub const UPDATE_CUSTOMER_USER: &str = "UpdateCustomerUser";
    pub const GET_AUDIT_RECORDS: &str = "GetAuditRecordsRequest";
    pub const GET_INVOICE_STATEMENT: &str = "GetInvoiceStatement";
    pub const GET_ENTITLEMENTS: &str = "GetEntitlements";
}

fn default_apis() -> HashMap<String, ApiEndpoint> {
    [
        (apis::GET_CUSTOMER, ApiEndpoint::new("/v1/customers/{0}")),
        (apis::DELETE_CUSTOMER, ApiEndpoint::new("/v1/customers/{0}")),
        (apis::GET_CART, ApiEndpoint::new("/v1/customers/{0}/carts/{1}")),
        (apis::CREATE_CART, ApiEndpoint::new("/v1/customers/{0}/carts")),
        (apis::UPDATE_CART, ApiEndpoint::new("/v1/customers/{0}/carts/{1}")),
        (
            apis::CHECKOUT_CART,
            ApiEndpoint::new("/v1/customers/{0}/carts/{1}/checkout"),
        ),
        (
            apis::GET_CUSTOMER_USER,
            ApiEndpoint::new("/v1/customers/{0}/users/{1}"),
        ),
        (
            apis::UPDATE_CUSTOMER_USER,
            ApiEndpoint::new("/v1/customers/{0}/users/{1}"),
        ),
        (
            apis::GET_AUDIT_RECORDS,
            ApiEndpoint::new("/v1/auditrecords")
                .with_parameter("StartDate", "startDate")
                .with_parameter("EndDate", "endDate")
                .with_parameter("Size", "size")
                .with_parameter("Filter", "filter")
                .with_parameter("SeekOperation", "seekOperation"),
        ),
        (
            apis::GET_INVOICE_STATEMENT,
            ApiEndpoint::new("/v1/invoices/{0}/documents/statement"),
        ),
        (
            apis::GET_ENTITLEMENTS,
            ApiEndpoint::new("/v1/customers/{0}/entitlements")
                .with_parameter("EntitlementType", "entitlementType"),
        ),
    ]
    .into_iter()
    .map(|(name, endpoint)| (name.to_string(), endpoint))
    .collect()
}
