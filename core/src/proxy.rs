//! Generic request executor every resource operation funnels through.
//!
//! # Design
//! A `ServiceProxy` is built fresh for one logical operation and consumed by
//! the verb that executes it. It turns the resource path, ordered query
//! parameters and headers into an `HttpRequest`, sends it through the
//! partner handle's transport (re-attempting transient failures when a retry
//! policy is configured), and converts the outcome:
//!
//! - success: body converted into `TResponse`, or a `ResponseParse` error
//!   carrying the raw body;
//! - failure status: whatever the classifier produced, unchanged.
//!
//! Each verb has a `*_blocking` twin that runs the async form through the
//! blocking bridge.

use std::marker::PhantomData;
use std::sync::Arc;

use bytes::Bytes;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::bridge::synchronous_execute;
use crate::classifier::handle_failed_response;
use crate::context::RequestContext;
use crate::converter::JsonConverter;
use crate::error::{ErrorCategory, PartnerError, PartnerException};
use crate::http::{ByteStream, HttpMethod, HttpRequest, HttpResponse};
use crate::operations::PartnerOperations;
use crate::retry::{execute_with_retry, RetryPolicy};

const JSON: &str = "application/json";
const ANY: &str = "*/*";

pub struct ServiceProxy<TRequest, TResponse> {
    partner: Arc<PartnerOperations>,
    resource_path: String,
    uri_parameters: Vec<(String, String)>,
    additional_request_headers: Vec<(String, String)>,
    json_converter: Option<Arc<dyn JsonConverter>>,
    customer_user_upn: Option<String>,
    retry_policy: Option<Arc<dyn RetryPolicy>>,
    cancellation: Option<CancellationToken>,
    _payload: PhantomData<fn(TRequest) -> TResponse>,
}

impl<TRequest, TResponse> ServiceProxy<TRequest, TResponse>
where
    TRequest: Serialize + Send + 'static,
    TResponse: DeserializeOwned + Send + 'static,
{
    /// `resource_path` is relative to the configured api root and already has
    /// its identifiers substituted.
    pub fn new(partner: Arc<PartnerOperations>, resource_path: impl Into<String>) -> Self {
        Self {
            partner,
            resource_path: resource_path.into(),
            uri_parameters: Vec::new(),
            additional_request_headers: Vec::new(),
            json_converter: None,
            customer_user_upn: None,
            retry_policy: None,
            cancellation: None,
            _payload: PhantomData,
        }
    }

    pub fn with_json_converter(mut self, converter: Arc<dyn JsonConverter>) -> Self {
        self.json_converter = Some(converter);
        self
    }

    /// Overrides the partner handle's default retry policy for this call.
    pub fn with_retry_policy(mut self, policy: Arc<dyn RetryPolicy>) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Appended to the query string in insertion order.
    pub fn add_uri_parameter(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.uri_parameters.push((key.into(), value.into()));
        self
    }

    pub fn add_request_header(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.additional_request_headers.push((name.into(), value.into()));
        self
    }

    pub fn set_customer_user_upn(&mut self, upn: impl Into<String>) -> &mut Self {
        self.customer_user_upn = Some(upn.into());
        self
    }

    pub fn resource_path(&self) -> &str {
        &self.resource_path
    }

    pub fn uri_parameters(&self) -> &[(String, String)] {
        &self.uri_parameters
    }

    pub fn additional_request_headers(&self) -> &[(String, String)] {
        &self.additional_request_headers
    }

    /// Absolute URI: api root, resource path, then the query parameters.
    pub fn build_uri(&self) -> Result<String, PartnerError> {
        let root = self.partner.configuration().api_root.trim_end_matches('/');
        let path = self.resource_path.trim_start_matches('/');
        let mut url = Url::parse(&format!("{root}/{path}")).map_err(|e| {
            PartnerError::Configuration(format!("invalid request URI for {path:?}: {e}"))
        })?;
        if !self.uri_parameters.is_empty() {
            let mut query = url.query_pairs_mut();
            for (key, value) in &self.uri_parameters {
                query.append_pair(key, value);
            }
        }
        Ok(url.into())
    }

    /// The request sent for one physical call made under `context`.
    pub fn build_request(
        &self,
        method: HttpMethod,
        body: Option<Bytes>,
        context: &RequestContext,
        accept: &str,
    ) -> Result<HttpRequest, PartnerError> {
        let config = self.partner.configuration();
        let names = &config.headers;

        let mut headers = vec![
            (
                "Authorization".to_string(),
                format!("Bearer {}", self.partner.credentials().access_token()),
            ),
            ("Accept".to_string(), accept.to_string()),
            (names.request_id.clone(), context.request_id().to_string()),
            (names.correlation_id.clone(), context.correlation_id().to_string()),
            (names.locale.clone(), context.locale().to_string()),
            (names.application_name.clone(), config.application_name.clone()),
        ];
        if body.is_some() {
            headers.push(("Content-Type".to_string(), JSON.to_string()));
        }
        if let Some(upn) = &self.customer_user_upn {
            headers.push((names.customer_user_upn.clone(), upn.clone()));
        }
        headers.extend(self.additional_request_headers.iter().cloned());

        Ok(HttpRequest {
            method,
            url: self.build_uri()?,
            headers,
            body,
        })
    }

    pub async fn get(self) -> Result<TResponse, PartnerError> {
        self.send_json(HttpMethod::Get, None).await
    }

    pub async fn post(self, payload: TRequest) -> Result<TResponse, PartnerError> {
        let body = self.serialize(&payload)?;
        self.send_json(HttpMethod::Post, Some(body)).await
    }

    pub async fn put(self, payload: TRequest) -> Result<TResponse, PartnerError> {
        let body = self.serialize(&payload)?;
        self.send_json(HttpMethod::Put, Some(body)).await
    }

    pub async fn patch(self, payload: TRequest) -> Result<TResponse, PartnerError> {
        let body = self.serialize(&payload)?;
        self.send_json(HttpMethod::Patch, Some(body)).await
    }

    pub async fn delete(self) -> Result<(), PartnerError> {
        self.execute(HttpMethod::Delete, None, JSON).await.map(drop)
    }

    /// Existence check: `false` on a NotFound failure, every other failure
    /// is returned unchanged.
    pub async fn head(self) -> Result<bool, PartnerError> {
        match self.execute(HttpMethod::Head, None, JSON).await {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Raw body stream for binary payloads.
    pub async fn download(self) -> Result<ByteStream, PartnerError> {
        let (response, _) = self.execute(HttpMethod::Get, None, ANY).await?;
        Ok(response.into_stream())
    }

    pub fn get_blocking(self) -> Result<TResponse, PartnerError> {
        synchronous_execute(self.get())
    }

    pub fn post_blocking(self, payload: TRequest) -> Result<TResponse, PartnerError> {
        synchronous_execute(self.post(payload))
    }

    pub fn put_blocking(self, payload: TRequest) -> Result<TResponse, PartnerError> {
        synchronous_execute(self.put(payload))
    }

    pub fn patch_blocking(self, payload: TRequest) -> Result<TResponse, PartnerError> {
        synchronous_execute(self.patch(payload))
    }

    pub fn delete_blocking(self) -> Result<(), PartnerError> {
        synchronous_execute(self.delete())
    }

    pub fn head_blocking(self) -> Result<bool, PartnerError> {
        synchronous_execute(self.head())
    }

    /// Blocking download; the body is buffered before returning.
    pub fn download_blocking(self) -> Result<Bytes, PartnerError> {
        synchronous_execute(async move {
            let (response, _) = self.execute(HttpMethod::Get, None, ANY).await?;
            response.bytes().await
        })
    }

    fn serialize(&self, payload: &TRequest) -> Result<Bytes, PartnerError> {
        let mut value = serde_json::to_value(payload).map_err(PartnerError::Serialization)?;
        if let Some(converter) = &self.json_converter {
            value = converter.to_wire(value).map_err(PartnerError::Serialization)?;
        }
        serde_json::to_vec(&value)
            .map(Bytes::from)
            .map_err(PartnerError::Serialization)
    }

    async fn send_json(self, method: HttpMethod, body: Option<Bytes>) -> Result<TResponse, PartnerError> {
        let (response, call_context) = self.execute(method, body, JSON).await?;
        let bytes = response.bytes().await?;
        self.deserialize(&bytes, call_context)
    }

    /// `context` is the one the response was received under, so a parse
    /// failure names the request id that was actually sent.
    fn deserialize(&self, bytes: &[u8], context: RequestContext) -> Result<TResponse, PartnerError> {
        let text = String::from_utf8_lossy(bytes);
        let parsed = if text.trim().is_empty() {
            Ok(serde_json::Value::Null)
        } else {
            serde_json::from_str::<serde_json::Value>(&text)
        };
        let converted = parsed.and_then(|value| match &self.json_converter {
            Some(converter) => converter.from_wire(value),
            None => Ok(value),
        });

        converted
            .and_then(serde_json::from_value::<TResponse>)
            .map_err(|err| {
                let exception = PartnerException::new(
                    ErrorCategory::ResponseParsing,
                    format!("could not parse partner service response: {err}"),
                )
                .with_context(Some(context))
                .with_source(err);
                PartnerError::ResponseParse {
                    exception: Box::new(exception),
                    body: text.into_owned(),
                }
            })
    }

    async fn execute(
        &self,
        method: HttpMethod,
        body: Option<Bytes>,
        accept: &str,
    ) -> Result<(HttpResponse, RequestContext), PartnerError> {
        let policy = self
            .retry_policy
            .as_deref()
            .or_else(|| self.partner.retry_policy());
        execute_with_retry(policy, self.cancellation.as_ref(), || {
            self.send_once(method, body.clone(), accept)
        })
        .await
    }

    async fn send_once(
        &self,
        method: HttpMethod,
        body: Option<Bytes>,
        accept: &str,
    ) -> Result<(HttpResponse, RequestContext), PartnerError> {
        let context = self.partner.request_context();
        let call_context = context.for_call(context.request_id_for_call());
        let request = self.build_request(method, body, &call_context, accept)?;
        debug!(
            %method,
            url = %request.url,
            request_id = %call_context.request_id(),
            correlation_id = %call_context.correlation_id(),
            "sending partner service request"
        );

        let transport = self.partner.transport();
        let sent = match &self.cancellation {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => return Err(PartnerError::Cancelled),
                sent = transport.send(request) => sent,
            },
            None => transport.send(request).await,
        };
        let response = sent.map_err(|err| attach_context(err, &call_context))?;

        if response.is_success() {
            Ok((response, call_context))
        } else {
            Err(handle_failed_response(response, Some(&call_context)).await)
        }
    }
}

fn attach_context(err: PartnerError, context: &RequestContext) -> PartnerError {
    match err {
        PartnerError::Service(exception) if exception.context().is_none() => {
            (*exception).with_context(Some(context.clone())).into()
        }
        other => other,
    }
}
