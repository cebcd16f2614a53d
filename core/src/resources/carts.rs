use std::sync::Arc;

use crate::config::apis;
use crate::error::PartnerError;
use crate::models::{Cart, CartCheckoutResult};
use crate::operations::BasePartnerComponent;

/// Carts of one customer.
#[derive(Debug, Clone)]
pub struct CartCollectionOperations {
    base: BasePartnerComponent<String>,
}

impl CartCollectionOperations {
    pub(crate) fn new(customer: BasePartnerComponent<String>) -> Self {
        Self { base: customer }
    }

    pub async fn create(&self, cart: Cart) -> Result<Cart, PartnerError> {
        self.base
            .proxy::<Cart, Cart>(apis::CREATE_CART, &[self.base.context().as_str()])?
            .post(cart)
            .await
    }

    pub fn create_blocking(&self, cart: Cart) -> Result<Cart, PartnerError> {
        self.base
            .proxy::<Cart, Cart>(apis::CREATE_CART, &[self.base.context().as_str()])?
            .post_blocking(cart)
    }

    pub fn by_id(&self, cart_id: impl Into<String>) -> Result<CartOperations, PartnerError> {
        let context = (self.base.context().clone(), cart_id.into());
        Ok(CartOperations {
            base: BasePartnerComponent::new(Arc::clone(self.base.partner()), context)?,
        })
    }
}

/// A single cart, keyed by customer id and cart id.
#[derive(Debug, Clone)]
pub struct CartOperations {
    base: BasePartnerComponent<(String, String)>,
}

impl CartOperations {
    pub fn customer_id(&self) -> &str {
        &self.base.context().0
    }

    pub fn cart_id(&self) -> &str {
        &self.base.context().1
    }

    fn args(&self) -> [&str; 2] {
        [self.customer_id(), self.cart_id()]
    }

    pub async fn get(&self) -> Result<Cart, PartnerError> {
        self.base.proxy::<(), Cart>(apis::GET_CART, &self.args())?.get().await
    }

    pub fn get_blocking(&self) -> Result<Cart, PartnerError> {
        self.base.proxy::<(), Cart>(apis::GET_CART, &self.args())?.get_blocking()
    }

    pub async fn put(&self, cart: Cart) -> Result<Cart, PartnerError> {
        self.base.proxy::<Cart, Cart>(apis::UPDATE_CART, &self.args())?.put(cart).await
    }

    pub fn put_blocking(&self, cart: Cart) -> Result<Cart, PartnerError> {
        self.base.proxy::<Cart, Cart>(apis::UPDATE_CART, &self.args())?.put_blocking(cart)
    }

    /// Submits the cart; the service answers with the orders it placed.
    pub async fn checkout(&self) -> Result<CartCheckoutResult, PartnerError> {
        self.base
            .proxy::<(), CartCheckoutResult>(apis::CHECKOUT_CART, &self.args())?
            .post(())
            .await
    }

    pub fn checkout_blocking(&self) -> Result<CartCheckoutResult, PartnerError> {
        self.base
            .proxy::<(), CartCheckoutResult>(apis::CHECKOUT_CART, &self.args())?
            .post_blocking(())
    }
}
