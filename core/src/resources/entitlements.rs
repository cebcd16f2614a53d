use std::sync::Arc;

use crate::config::apis;
use crate::converter::ItemsEnvelopeConverter;
use crate::error::PartnerError;
use crate::models::Entitlement;
use crate::operations::BasePartnerComponent;
use crate::proxy::ServiceProxy;

/// Entitlements of one customer.
#[derive(Debug, Clone)]
pub struct EntitlementCollectionOperations {
    base: BasePartnerComponent<String>,
}

impl EntitlementCollectionOperations {
    pub(crate) fn new(customer: BasePartnerComponent<String>) -> Self {
        Self { base: customer }
    }

    fn proxy(&self, entitlement_type: Option<&str>) -> Result<ServiceProxy<(), Vec<Entitlement>>, PartnerError> {
        let mut proxy = self
            .base
            .proxy::<(), Vec<Entitlement>>(apis::GET_ENTITLEMENTS, &[self.base.context().as_str()])?
            .with_json_converter(Arc::new(ItemsEnvelopeConverter));
        if let Some(kind) = entitlement_type {
            if kind.trim().is_empty() {
                return Err(PartnerError::invalid_argument("entitlement type must not be blank"));
            }
            let name = self
                .base
                .partner()
                .configuration()
                .api(apis::GET_ENTITLEMENTS)?
                .parameter("EntitlementType")
                .to_string();
            proxy.add_uri_parameter(name, kind);
        }
        Ok(proxy)
    }

    /// All entitlements, optionally restricted to one entitlement type.
    pub async fn get(&self, entitlement_type: Option<&str>) -> Result<Vec<Entitlement>, PartnerError> {
        self.proxy(entitlement_type)?.get().await
    }

    pub fn get_blocking(&self, entitlement_type: Option<&str>) -> Result<Vec<Entitlement>, PartnerError> {
        self.proxy(entitlement_type)?.get_blocking()
    }
}
