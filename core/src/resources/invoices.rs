use std::sync::Arc;

use bytes::Bytes;

use crate::config::apis;
use crate::error::PartnerError;
use crate::http::ByteStream;
use crate::operations::{BasePartnerComponent, PartnerOperations};

#[derive(Debug, Clone)]
pub struct InvoiceCollectionOperations {
    base: BasePartnerComponent,
}

impl InvoiceCollectionOperations {
    pub(crate) fn new(partner: Arc<PartnerOperations>) -> Self {
        Self {
            base: BasePartnerComponent::unscoped(partner),
        }
    }

    pub fn by_id(&self, invoice_id: impl Into<String>) -> Result<InvoiceOperations, PartnerError> {
        Ok(InvoiceOperations {
            base: BasePartnerComponent::new(Arc::clone(self.base.partner()), invoice_id.into())?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct InvoiceOperations {
    base: BasePartnerComponent<String>,
}

impl InvoiceOperations {
    pub fn invoice_id(&self) -> &str {
        self.base.context()
    }

    /// Streams the invoice statement PDF.
    pub async fn statement(&self) -> Result<ByteStream, PartnerError> {
        self.base
            .proxy::<(), ()>(apis::GET_INVOICE_STATEMENT, &[self.invoice_id()])?
            .download()
            .await
    }

    pub fn statement_blocking(&self) -> Result<Bytes, PartnerError> {
        self.base
            .proxy::<(), ()>(apis::GET_INVOICE_STATEMENT, &[self.invoice_id()])?
            .download_blocking()
    }
}
