use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::config::apis;
use crate::error::PartnerError;
use crate::models::{AuditRecord, SeekBasedResourceCollection};
use crate::operations::{BasePartnerComponent, PartnerOperations};
use crate::proxy::ServiceProxy;

pub type AuditRecordsPage = SeekBasedResourceCollection<AuditRecord>;

/// Filters for an audit record query. Only `start_date` is required.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditRecordsQuery {
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub size: Option<u32>,
    pub filter: Option<String>,
}

impl AuditRecordsQuery {
    pub fn since(start_date: DateTime<Utc>) -> Self {
        Self {
            start_date,
            end_date: None,
            size: None,
            filter: None,
        }
    }

    pub fn until(mut self, end_date: DateTime<Utc>) -> Self {
        self.end_date = Some(end_date);
        self
    }

    pub fn with_size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    fn validate(&self) -> Result<(), PartnerError> {
        if let Some(end) = self.end_date {
            if end < self.start_date {
                return Err(PartnerError::invalid_argument(
                    "audit query end date precedes its start date",
                ));
            }
        }
        if self.size == Some(0) {
            return Err(PartnerError::invalid_argument("audit query size must be positive"));
        }
        Ok(())
    }
}

fn timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Partner-wide audit records, read with seek-based paging.
#[derive(Debug, Clone)]
pub struct AuditRecordsOperations {
    base: BasePartnerComponent,
}

impl AuditRecordsOperations {
    pub(crate) fn new(partner: Arc<PartnerOperations>) -> Self {
        Self {
            base: BasePartnerComponent::unscoped(partner),
        }
    }

    fn proxy(&self) -> Result<(ServiceProxy<(), AuditRecordsPage>, ParameterNames), PartnerError> {
        let endpoint = self.base.partner().configuration().api(apis::GET_AUDIT_RECORDS)?;
        let names = ParameterNames {
            start_date: endpoint.parameter("StartDate").to_string(),
            end_date: endpoint.parameter("EndDate").to_string(),
            size: endpoint.parameter("Size").to_string(),
            filter: endpoint.parameter("Filter").to_string(),
            seek_operation: endpoint.parameter("SeekOperation").to_string(),
        };
        Ok((self.base.proxy(apis::GET_AUDIT_RECORDS, &[])?, names))
    }

    fn query_proxy(&self, query: &AuditRecordsQuery) -> Result<ServiceProxy<(), AuditRecordsPage>, PartnerError> {
        query.validate()?;
        let (mut proxy, names) = self.proxy()?;
        proxy.add_uri_parameter(names.start_date, timestamp(&query.start_date));
        if let Some(end) = &query.end_date {
            proxy.add_uri_parameter(names.end_date, timestamp(end));
        }
        if let Some(size) = query.size {
            proxy.add_uri_parameter(names.size, size.to_string());
        }
        if let Some(filter) = &query.filter {
            proxy.add_uri_parameter(names.filter, filter.as_str());
        }
        Ok(proxy)
    }

    fn next_page_proxy(
        &self,
        page: &AuditRecordsPage,
    ) -> Result<Option<ServiceProxy<(), AuditRecordsPage>>, PartnerError> {
        let Some(token) = page.continuation_token.as_deref().filter(|t| !t.trim().is_empty()) else {
            return Ok(None);
        };
        let (mut proxy, names) = self.proxy()?;
        let header = self.base.partner().configuration().headers.continuation_token.clone();
        proxy
            .add_uri_parameter(names.seek_operation, "Next")
            .add_request_header(header, token);
        Ok(Some(proxy))
    }

    /// First page of records matching `query`.
    pub async fn query(&self, query: &AuditRecordsQuery) -> Result<AuditRecordsPage, PartnerError> {
        self.query_proxy(query)?.get().await
    }

    pub fn query_blocking(&self, query: &AuditRecordsQuery) -> Result<AuditRecordsPage, PartnerError> {
        self.query_proxy(query)?.get_blocking()
    }

    /// The page following `page`, or `None` once the service stops handing
    /// out continuation tokens.
    pub async fn next_page(&self, page: &AuditRecordsPage) -> Result<Option<AuditRecordsPage>, PartnerError> {
        match self.next_page_proxy(page)? {
            Some(proxy) => proxy.get().await.map(Some),
            None => Ok(None),
        }
    }

    pub fn next_page_blocking(&self, page: &AuditRecordsPage) -> Result<Option<AuditRecordsPage>, PartnerError> {
        match self.next_page_proxy(page)? {
            Some(proxy) => proxy.get_blocking().map(Some),
            None => Ok(None),
        }
    }
}

struct ParameterNames {
    start_date: String,
    end_date: String,
    size: String,
    filter: String,
    seek_operation: String,
}
