//! Turns failed partner service responses into classified errors.

use std::time::Duration;

use tracing::{debug, warn};

use crate::context::RequestContext;
use crate::error::{ApiFault, ErrorCategory, PartnerError, PartnerException};
use crate::http::HttpResponse;

/// Classify a non-success response.
///
/// Passing a success response is a caller bug and yields `InvalidArgument`
/// without reading the body.
pub async fn handle_failed_response(
    response: HttpResponse,
    context: Option<&RequestContext>,
) -> PartnerError {
    if response.is_success() {
        return PartnerError::invalid_argument(format!(
            "cannot classify successful response with status {}",
            response.status
        ));
    }

    let status = response.status;
    let reason = response.reason_phrase();
    let retry_after = response.header("retry-after").map(str::to_owned);
    let body = match response.bytes().await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(err) => {
            debug!(status, error = %err, "failed to read error response body");
            String::new()
        }
    };

    classify(status, reason, retry_after.as_deref(), &body, context)
}

/// Classify a failed status with an already-buffered body.
pub fn classify(
    status: u16,
    reason_phrase: Option<&str>,
    retry_after: Option<&str>,
    body: &str,
    context: Option<&RequestContext>,
) -> PartnerError {
    warn!(
        status,
        correlation_id = ?context.map(RequestContext::correlation_id),
        request_id = ?context.map(RequestContext::request_id),
        payload = %body,
        "partner service call failed"
    );

    let category = ErrorCategory::from_status(status);
    let fault = parse_fault(body);

    let exception = match fault {
        Some(fault) if fault.is_populated() => PartnerException::from_fault(category, fault),
        _ => {
            let message = if body.trim().is_empty() {
                reason_phrase
                    .map(str::to_owned)
                    .unwrap_or_else(|| format!("HTTP {status}"))
            } else {
                body.to_owned()
            };
            let mut exception = PartnerException::new(category, message);
            if status == 429 {
                if let Some(delay) = retry_after.and_then(parse_retry_after) {
                    exception = exception.with_retry_after(delay);
                }
            }
            exception
        }
    };

    exception.with_context(context.cloned()).into()
}

fn parse_fault(body: &str) -> Option<ApiFault> {
    if body.trim().is_empty() {
        return None;
    }
    match serde_json::from_str::<ApiFault>(body) {
        Ok(fault) => Some(fault),
        Err(err) => {
            debug!(error = %err, "error response body is not an API fault");
            None
        }
    }
}

/// Delta-seconds form of `Retry-After`.
fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::context::RequestContextFactory;

    fn classify_status(status: u16, body: &str) -> PartnerError {
        classify(status, None, None, body, None)
    }

    #[test]
    fn maps_every_table_status() {
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
            (503, ErrorCategory::ServerBusy),
            (504, ErrorCategory::GatewayTimeout),
            (500, ErrorCategory::ServerError),
            (502, ErrorCategory::ServerError),
        ];
        for (status, expected) in table {
            assert_eq!(classify_status(status, "").category(), Some(expected), "{status}");
        }
    }

    #[test]
    fn fault_message_is_used() {
        let err = classify_status(
            409,
            r#"{"code":"800002","description":"Customer already exists","data":[]}"#,
        );
        let exception = err.exception().unwrap();
        assert_eq!(exception.category(), ErrorCategory::AlreadyExists);
        assert_eq!(exception.message(), "Customer already exists");
        assert_eq!(exception.service_error_payload().unwrap().error_code, "800002");
    }

    #[test]
    fn malformed_fault_falls_back_to_raw_text() {
        for body in ["<html>oops</html>", "{not json", "[1,2,3]", r#"{"code": 5}"#] {
            let err = classify_status(500, body);
            let exception = err.exception().unwrap();
            assert_eq!(exception.category(), ErrorCategory::ServerError);
            assert_eq!(exception.message(), body);
            assert!(exception.service_error_payload().is_none());
        }
    }

    #[test]
    fn blank_body_uses_reason_phrase() {
        let err = classify(404, Some("Not Found"), None, "  ", None);
        assert_eq!(err.exception().unwrap().message(), "Not Found");
        let err = classify(599, None, None, "", None);
        assert_eq!(err.exception().unwrap().message(), "HTTP 599");
    }

    #[test]
    fn too_many_requests_carries_retry_after() {
        let err = classify(429, None, Some("120"), "", None);
        assert_eq!(err.retry_after(), Some(Duration::from_secs(120)));
    }

    #[test]
    fn retry_after_ignored_for_other_statuses_and_bad_values() {
        assert_eq!(classify(503, None, Some("10"), "", None).retry_after(), None);
        assert_eq!(classify(429, None, Some("soon"), "", None).retry_after(), None);
    }

    #[test]
    fn context_is_attached() {
        let ctx = RequestContextFactory::default().create();
        let err = classify(403, None, None, "", Some(&ctx));
        assert_eq!(err.exception().unwrap().context(), Some(&ctx));
    }

    #[tokio::test]
    async fn success_response_is_a_misuse() {
        let response = HttpResponse::from_bytes(200, Vec::new(), Bytes::from_static(b"{}"));
        let err = handle_failed_response(response, None).await;
        assert!(matches!(err, PartnerError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn reads_headers_and_body_from_response() {
        let response = HttpResponse::from_bytes(
            429,
            vec![("Retry-After".to_string(), "120".to_string())],
            Bytes::from_static(b"throttled"),
        );
        let err = handle_failed_response(response, None).await;
        assert_eq!(err.category(), Some(ErrorCategory::TooManyRequests));
        assert_eq!(err.retry_after(), Some(Duration::from_secs(120)));
        assert_eq!(err.exception().unwrap().message(), "throttled");
    }
}
