//! Failure classification and retry behaviour over real HTTP.
//!
//! Each test stands up an `httpmock` server scripted with the failure under
//! test and drives a resource operation against it.

use std::error::Error as _;
use std::sync::Arc;
use std::time::Duration;

use httpmock::prelude::*;
use httpmock::Method::HEAD;
use partner_core::models::Customer;
use partner_core::{
    ErrorCategory, LinearBackOffRetryPolicy, PartnerConfiguration, PartnerCredentials,
    PartnerError, PartnerOperations, ServiceProxy,
};
use serde_json::json;

fn partner_for(server: &MockServer) -> Arc<PartnerOperations> {
    PartnerOperations::new(
        PartnerCredentials::new("test-token").unwrap(),
        PartnerConfiguration::default().with_api_root(server.base_url()),
    )
    .unwrap()
}

fn quick_retries(max_retries: i64) -> Arc<LinearBackOffRetryPolicy> {
    Arc::new(LinearBackOffRetryPolicy::new(max_retries, Duration::from_millis(10)).unwrap())
}

async fn get_customer(partner: &Arc<PartnerOperations>, id: &str) -> Result<Customer, PartnerError> {
    partner.customers().by_id(id).unwrap().get().await
}

#[tokio::test]
async fn every_mapped_status_yields_its_category() {
    let server = MockServer::start();
    let partner = partner_for(&server);
    let table = [
        (400, ErrorCategory::BadInput),
        (401, ErrorCategory::Unauthorized),
        (403, ErrorCategory::Forbidden),
        (404, ErrorCategory::NotFound),
        (405, ErrorCategory::InvalidOperation),
        (406, ErrorCategory::UnsupportedDataFormat),
        (408, ErrorCategory::RequestTimeout),
        (409, ErrorCategory::AlreadyExists),
        (429, ErrorCategory::TooManyRequests),
        (500, ErrorCategory::ServerError),
        (502, ErrorCategory::ServerError),
        (503, ErrorCategory::ServerBusy),
        (504, ErrorCategory::GatewayTimeout),
    ];
    for (status, expected) in table {
        let id = format!("status-{status}");
        server.mock(|when, then| {
            when.method(GET).path(format!("/v1/customers/{id}"));
            then.status(status);
        });
        let err = get_customer(&partner, &id).await.unwrap_err();
        assert_eq!(err.category(), Some(expected), "status {status}");
        assert!(matches!(err, PartnerError::Service(_)), "status {status}");
    }
}

#[tokio::test]
async fn empty_body_falls_back_to_reason_phrase() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/v1/customers/gone");
        then.status(404);
    });
    let err = get_customer(&partner_for(&server), "gone").await.unwrap_err();
    assert_eq!(err.exception().unwrap().message(), "Not Found");
    assert!(err.exception().unwrap().service_error_payload().is_none());
}

#[tokio::test]
async fn fault_payload_drives_the_message() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/v1/customers/dup");
        then.status(409)
            .header("Content-Type", "application/json")
            .json_body(json!({
                "ErrorCode": "800002",
                "ErrorMessage": "Customer already exists",
                "ErrorData": ["dup"]
            }));
    });
    let err = get_customer(&partner_for(&server), "dup").await.unwrap_err();
    let exception = err.exception().unwrap();
    assert_eq!(exception.category(), ErrorCategory::AlreadyExists);
    assert_eq!(exception.message(), "Customer already exists");
    assert_eq!(exception.service_error_payload().unwrap().error_code, "800002");
}

#[tokio::test]
async fn non_fault_body_is_used_verbatim() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/v1/customers/html");
        then.status(502).body("<html>bad gateway</html>");
    });
    let err = get_customer(&partner_for(&server), "html").await.unwrap_err();
    assert_eq!(err.category(), Some(ErrorCategory::ServerError));
    assert_eq!(err.exception().unwrap().message(), "<html>bad gateway</html>");
}

#[tokio::test]
async fn throttling_surfaces_retry_after() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/v1/customers/busy");
        then.status(429).header("Retry-After", "120").body("slow down");
    });
    let err = get_customer(&partner_for(&server), "busy").await.unwrap_err();
    assert_eq!(err.category(), Some(ErrorCategory::TooManyRequests));
    assert_eq!(err.retry_after(), Some(Duration::from_secs(120)));
}

#[tokio::test]
async fn malformed_success_body_is_a_parse_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/v1/customers/broken");
        then.status(200).body("{\"id\": ");
    });
    let err = get_customer(&partner_for(&server), "broken").await.unwrap_err();
    assert_eq!(err.category(), Some(ErrorCategory::ResponseParsing));
    match err {
        PartnerError::ResponseParse { body, .. } => assert_eq!(body, "{\"id\": "),
        other => panic!("expected parse error, got {other:?}"),
    }
}

#[tokio::test]
async fn standard_headers_are_sent() {
    let server = MockServer::start();
    let partner = partner_for(&server);
    let correlation = partner.request_context().correlation_id().to_string();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/v1/customers/c1")
            .header("Authorization", "Bearer test-token")
            .header("Accept", "application/json")
            .header("MS-CorrelationId", correlation.as_str())
            .header("X-Locale", "en-US")
            .header_exists("MS-RequestId")
            .header_exists("MS-PartnerCenter-Application");
        then.status(200).json_body(json!({"id": "c1"}));
    });

    let customer = get_customer(&partner, "c1").await.unwrap();
    assert_eq!(customer.id, "c1");
    mock.assert();
}

#[tokio::test]
async fn transient_failures_are_retried_until_exhausted() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/v1/customers/flaky");
        then.status(503);
    });
    let partner = partner_for(&server).with_retry_policy(quick_retries(2));

    let err = get_customer(&partner, "flaky").await.unwrap_err();
    assert_eq!(err.category(), Some(ErrorCategory::ServerBusy));
    mock.assert_hits(3);
}

#[tokio::test]
async fn retry_after_zero_is_honoured_without_policy_delay() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/v1/customers/throttled");
        then.status(429).header("Retry-After", "0");
    });
    let slow = Arc::new(LinearBackOffRetryPolicy::new(1, Duration::from_secs(60)).unwrap());
    let partner = partner_for(&server).with_retry_policy(slow);

    let started = std::time::Instant::now();
    let err = get_customer(&partner, "throttled").await.unwrap_err();
    assert_eq!(err.category(), Some(ErrorCategory::TooManyRequests));
    assert!(started.elapsed() < Duration::from_secs(30));
    mock.assert_hits(2);
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/v1/customers/bad");
        then.status(400);
    });
    let partner = partner_for(&server).with_retry_policy(quick_retries(5));

    let err = get_customer(&partner, "bad").await.unwrap_err();
    assert_eq!(err.category(), Some(ErrorCategory::BadInput));
    mock.assert_hits(1);
}

#[tokio::test]
async fn proxy_policy_overrides_partner_default() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/v1/widgets");
        then.status(504);
    });
    let partner = partner_for(&server).with_retry_policy(quick_retries(5));

    let err = ServiceProxy::<(), serde_json::Value>::new(partner, "/v1/widgets")
        .with_retry_policy(quick_retries(1))
        .get()
        .await
        .unwrap_err();
    assert_eq!(err.category(), Some(ErrorCategory::GatewayTimeout));
    mock.assert_hits(2);
}

#[tokio::test]
async fn head_maps_not_found_to_false() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(HEAD).path("/v1/customers/present");
        then.status(200);
    });
    server.mock(|when, then| {
        when.method(HEAD).path("/v1/customers/absent");
        then.status(404);
    });
    server.mock(|when, then| {
        when.method(HEAD).path("/v1/customers/forbidden");
        then.status(403);
    });
    let customers = partner_for(&server).customers();

    assert!(customers.by_id("present").unwrap().exists().await.unwrap());
    assert!(!customers.by_id("absent").unwrap().exists().await.unwrap());
    let err = customers.by_id("forbidden").unwrap().exists().await.unwrap_err();
    assert_eq!(err.category(), Some(ErrorCategory::Forbidden));
}

#[tokio::test]
async fn unreachable_service_is_a_server_error_with_source() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let partner = PartnerOperations::new(
        PartnerCredentials::new("t").unwrap(),
        PartnerConfiguration::default().with_api_root(format!("http://{addr}")),
    )
    .unwrap();
    let err = get_customer(&partner, "c1").await.unwrap_err();
    assert_eq!(err.category(), Some(ErrorCategory::ServerError));
    assert!(err.exception().unwrap().source().is_some());
}

#[tokio::test]
async fn slow_service_times_out() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/v1/customers/slow");
        then.status(200)
            .delay(Duration::from_secs(3))
            .json_body(json!({"id": "slow"}));
    });
    let mut config = PartnerConfiguration::default().with_api_root(server.base_url());
    config.request_timeout_secs = 1;
    let partner = PartnerOperations::new(PartnerCredentials::new("t").unwrap(), config).unwrap();

    let err = get_customer(&partner, "slow").await.unwrap_err();
    assert_eq!(err.category(), Some(ErrorCategory::RequestTimeout));
}
