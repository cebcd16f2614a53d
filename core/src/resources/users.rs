use std::sync::Arc;

use crate::config::apis;
use crate::error::PartnerError;
use crate::models::CustomerUser;
use crate::operations::{BasePartnerComponent, PartnerOperations};

/// A user of a customer tenant, keyed by customer id and user id.
#[derive(Debug, Clone)]
pub struct CustomerUserOperations {
    base: BasePartnerComponent<(String, String)>,
}

impl CustomerUserOperations {
    pub fn new(
        partner: Arc<PartnerOperations>,
        context: (String, String),
    ) -> Result<Self, PartnerError> {
        Ok(Self {
            base: BasePartnerComponent::new(partner, context)?,
        })
    }

    fn args(&self) -> [&str; 2] {
        let (customer_id, user_id) = self.base.context();
        [customer_id.as_str(), user_id.as_str()]
    }

    pub async fn get(&self) -> Result<CustomerUser, PartnerError> {
        self.base
            .proxy::<(), CustomerUser>(apis::GET_CUSTOMER_USER, &self.args())?
            .get()
            .await
    }

    pub fn get_blocking(&self) -> Result<CustomerUser, PartnerError> {
        self.base
            .proxy::<(), CustomerUser>(apis::GET_CUSTOMER_USER, &self.args())?
            .get_blocking()
    }

    /// Partial update; fields left `None` are not sent.
    pub async fn patch(&self, user: CustomerUser) -> Result<CustomerUser, PartnerError> {
        self.base
            .proxy::<CustomerUser, CustomerUser>(apis::UPDATE_CUSTOMER_USER, &self.args())?
            .patch(user)
            .await
    }

    pub fn patch_blocking(&self, user: CustomerUser) -> Result<CustomerUser, PartnerError> {
        self.base
            .proxy::<CustomerUser, CustomerUser>(apis::UPDATE_CUSTOMER_USER, &self.args())?
            .patch_blocking(user)
    }
}
