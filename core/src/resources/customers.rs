use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::apis;
use crate::error::PartnerError;
use crate::models::Customer;
use crate::operations::{BasePartnerComponent, PartnerOperations};
use crate::proxy::ServiceProxy;
use crate::resources::{CartCollectionOperations, CustomerUserOperations, EntitlementCollectionOperations};

/// Entry point for customer-scoped operations.
#[derive(Debug, Clone)]
pub struct CustomerCollectionOperations {
    base: BasePartnerComponent,
}

impl CustomerCollectionOperations {
    pub(crate) fn new(partner: Arc<PartnerOperations>) -> Self {
        Self {
            base: BasePartnerComponent::unscoped(partner),
        }
    }

    pub fn by_id(&self, customer_id: impl Into<String>) -> Result<CustomerOperations, PartnerError> {
        CustomerOperations::new(Arc::clone(self.base.partner()), customer_id.into())
    }
}

/// Operations on a single customer.
#[derive(Debug, Clone)]
pub struct CustomerOperations {
    base: BasePartnerComponent<String>,
}

impl CustomerOperations {
    pub fn new(partner: Arc<PartnerOperations>, customer_id: String) -> Result<Self, PartnerError> {
        Ok(Self {
            base: BasePartnerComponent::new(partner, customer_id)?,
        })
    }

    pub fn customer_id(&self) -> &str {
        self.base.context()
    }

    fn proxy<TReq, TResp>(&self, api: &str) -> Result<ServiceProxy<TReq, TResp>, PartnerError>
    where
        TReq: Serialize + Send + 'static,
        TResp: DeserializeOwned + Send + 'static,
    {
        self.base.proxy(api, &[self.customer_id()])
    }

    pub async fn get(&self) -> Result<Customer, PartnerError> {
        self.proxy::<(), Customer>(apis::GET_CUSTOMER)?.get().await
    }

    pub fn get_blocking(&self) -> Result<Customer, PartnerError> {
        self.proxy::<(), Customer>(apis::GET_CUSTOMER)?.get_blocking()
    }

    /// `false` when the service reports the customer as not found.
    pub async fn exists(&self) -> Result<bool, PartnerError> {
        self.proxy::<(), ()>(apis::GET_CUSTOMER)?.head().await
    }

    pub fn exists_blocking(&self) -> Result<bool, PartnerError> {
        self.proxy::<(), ()>(apis::GET_CUSTOMER)?.head_blocking()
    }

    pub async fn delete(&self) -> Result<(), PartnerError> {
        self.proxy::<(), ()>(apis::DELETE_CUSTOMER)?.delete().await
    }

    pub fn delete_blocking(&self) -> Result<(), PartnerError> {
        self.proxy::<(), ()>(apis::DELETE_CUSTOMER)?.delete_blocking()
    }

    pub fn carts(&self) -> CartCollectionOperations {
        CartCollectionOperations::new(self.base.clone())
    }

    pub fn user(&self, user_id: impl Into<String>) -> Result<CustomerUserOperations, PartnerError> {
        CustomerUserOperations::new(
            Arc::clone(self.base.partner()),
            (self.customer_id().to_string(), user_id.into()),
        )
    }

    pub fn entitlements(&self) -> EntitlementCollectionOperations {
        EntitlementCollectionOperations::new(self.base.clone())
    }
}
