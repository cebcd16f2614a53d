//! Resource lifecycles against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then exercises the resource
//! operations over real HTTP through the reqwest transport. Async tests use
//! the async surface; plain `#[test]`s drive the `*_blocking` twins. Each test
//! gets its own server so seeded state never leaks between tests.

use std::sync::{mpsc, Arc};
use std::time::Duration;

use futures::TryStreamExt;
use mock_server::{SEED_CUSTOMER_ID, SEED_INVOICE_ID, SEED_USER_ID, STATEMENT_BYTES};
use partner_core::models::{Artifact, Cart, CartLineItem, CustomerUser};
use partner_core::resources::AuditRecordsQuery;
use partner_core::{
    synchronous_execute, ErrorCategory, PartnerConfiguration, PartnerCredentials, PartnerError,
    PartnerOperations,
};

fn start_server() -> String {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    format!("http://{addr}")
}

fn partner(api_root: &str) -> Arc<PartnerOperations> {
    PartnerOperations::new(
        PartnerCredentials::new("integration-token").unwrap(),
        PartnerConfiguration::default().with_api_root(api_root),
    )
    .unwrap()
}

fn cart_with_quantity(quantity: i32) -> Cart {
    Cart {
        line_items: vec![CartLineItem {
            id: 0,
            catalog_item_id: "DZH318Z0BQ3Q:0001".to_string(),
            quantity,
            billing_cycle: Some("monthly".to_string()),
            ..CartLineItem::default()
        }],
        ..Cart::default()
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn cart_lifecycle() {
    let root = partner(&start_server());
    let customer = root.customers().by_id(SEED_CUSTOMER_ID).unwrap();

    let created = customer.carts().create(cart_with_quantity(2)).await.unwrap();
    let cart_id = created.id.clone().expect("service assigns cart ids");
    assert_eq!(created.status.as_deref(), Some("Active"));

    let cart = customer.carts().by_id(&cart_id).unwrap();
    let fetched = cart.get().await.unwrap();
    assert_eq!(fetched.id.as_deref(), Some(cart_id.as_str()));
    assert_eq!(fetched.line_items[0].quantity, 2);

    let updated = cart.put(cart_with_quantity(7)).await.unwrap();
    assert_eq!(updated.line_items[0].quantity, 7);

    let result = cart.checkout().await.unwrap();
    assert_eq!(result.orders.len(), 1);
    assert_eq!(
        result.orders[0].reference_customer_id.as_deref(),
        Some(SEED_CUSTOMER_ID)
    );
    assert!(result.order_errors.is_empty());

    let again = cart.checkout().await.unwrap_err();
    assert_eq!(again.category(), Some(ErrorCategory::AlreadyExists));
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_cart_is_not_found_with_service_fault() {
    let root = partner(&start_server());
    let err = root
        .customers()
        .by_id(SEED_CUSTOMER_ID)
        .unwrap()
        .carts()
        .by_id("no-such-cart")
        .unwrap()
        .get()
        .await
        .unwrap_err();

    assert!(err.is_not_found());
    let exception = err.exception().unwrap();
    assert_eq!(exception.message(), "cart no-such-cart was not found");
    assert_eq!(exception.service_error_payload().unwrap().error_code, "600002");
    assert_eq!(
        exception.context().unwrap().correlation_id(),
        root.request_context().correlation_id()
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn bad_payload_is_classified_as_bad_request() {
    let root = partner(&start_server());
    let err = root
        .customers()
        .by_id(SEED_CUSTOMER_ID)
        .unwrap()
        .carts()
        .create(Cart::default())
        .await
        .unwrap_err();
    assert_eq!(err.category(), Some(ErrorCategory::BadInput));
}

#[tokio::test(flavor = "multi_thread")]
async fn customer_exists_then_deleted() {
    let root = partner(&start_server());
    let customer = root.customers().by_id(SEED_CUSTOMER_ID).unwrap();

    assert_eq!(customer.get().await.unwrap().id, SEED_CUSTOMER_ID);
    assert!(customer.exists().await.unwrap());

    customer.delete().await.unwrap();
    assert!(!customer.exists().await.unwrap());
    assert!(customer.get().await.unwrap_err().is_not_found());
}

#[tokio::test(flavor = "multi_thread")]
async fn user_patch_merges_fields() {
    let root = partner(&start_server());
    let user = root
        .customers()
        .by_id(SEED_CUSTOMER_ID)
        .unwrap()
        .user(SEED_USER_ID)
        .unwrap();

    let patched = user
        .patch(CustomerUser {
            display_name: Some("Adele V.".to_string()),
            ..CustomerUser::default()
        })
        .await
        .unwrap();
    assert_eq!(patched.display_name.as_deref(), Some("Adele V."));
    assert_eq!(patched.first_name.as_deref(), Some("Adele"));
    assert_eq!(user.get().await.unwrap().display_name.as_deref(), Some("Adele V."));
}

#[tokio::test(flavor = "multi_thread")]
async fn entitlements_unwrap_items_envelope() {
    let root = partner(&start_server());
    let entitlements = root
        .customers()
        .by_id(SEED_CUSTOMER_ID)
        .unwrap()
        .entitlements();

    let all = entitlements.get(None).await.unwrap();
    assert_eq!(all.len(), 2);

    let software = entitlements.get(Some("software")).await.unwrap();
    assert_eq!(software.len(), 1);
    assert!(matches!(
        software[0].entitled_artifacts[0],
        Artifact::Software(_)
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn audit_records_follow_continuation_tokens() {
    let root = partner(&start_server());
    let audit = root.audit_records();
    let start = "2024-03-02T00:00:00Z".parse().unwrap();

    let mut page = audit
        .query(&AuditRecordsQuery::since(start).with_size(2))
        .await
        .unwrap();
    assert_eq!(page.total_count, 4);

    let mut ids: Vec<String> = page.items.iter().map(|r| r.id.clone()).collect();
    while let Some(next) = audit.next_page(&page).await.unwrap() {
        ids.extend(next.items.iter().map(|r| r.id.clone()));
        page = next;
    }
    assert_eq!(ids, ["audit-2", "audit-3", "audit-4", "audit-5"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn statement_streams_bytes() {
    let root = partner(&start_server());
    let stream = root
        .invoices()
        .by_id(SEED_INVOICE_ID)
        .unwrap()
        .statement()
        .await
        .unwrap();
    let chunks: Vec<bytes::Bytes> = stream.try_collect().await.unwrap();
    assert_eq!(chunks.concat(), STATEMENT_BYTES);
}

// ---------------------------------------------------------------------------
// Blocking surface
// ---------------------------------------------------------------------------

#[test]
fn blocking_cart_lifecycle() {
    let root = partner(&start_server());
    let customer = root.customers().by_id(SEED_CUSTOMER_ID).unwrap();

    let created = customer.carts().create_blocking(cart_with_quantity(1)).unwrap();
    let cart = customer.carts().by_id(created.id.unwrap()).unwrap();
    assert_eq!(cart.get_blocking().unwrap().line_items[0].quantity, 1);
    assert_eq!(
        cart.put_blocking(cart_with_quantity(3)).unwrap().line_items[0].quantity,
        3
    );
    assert_eq!(cart.checkout_blocking().unwrap().orders.len(), 1);
}

#[test]
fn blocking_errors_keep_their_category() {
    let root = partner(&start_server());
    let err = root
        .customers()
        .by_id("fabrikam")
        .unwrap()
        .get_blocking()
        .unwrap_err();
    assert!(matches!(err, PartnerError::Service(_)));
    assert_eq!(err.category(), Some(ErrorCategory::NotFound));
}

#[test]
fn blocking_statement_download() {
    let root = partner(&start_server());
    let bytes = root
        .invoices()
        .by_id(SEED_INVOICE_ID)
        .unwrap()
        .statement_blocking()
        .unwrap();
    assert_eq!(bytes.as_ref(), STATEMENT_BYTES);
}

#[test]
fn blocking_audit_paging() {
    let root = partner(&start_server());
    let audit = root.audit_records();
    let start = "2024-03-01T00:00:00Z".parse().unwrap();
    let first = audit
        .query_blocking(&AuditRecordsQuery::since(start).with_size(3))
        .unwrap();
    assert_eq!(first.items.len(), 3);
    let second = audit.next_page_blocking(&first).unwrap().unwrap();
    assert_eq!(second.items.len(), 2);
    assert!(audit.next_page_blocking(&second).unwrap().is_none());
}

#[test]
fn blocking_call_inside_async_runtime_does_not_deadlock() {
    let base = start_server();
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let exists = rt.block_on(async move {
        let root = partner(&base);
        root.customers()
            .by_id(SEED_CUSTOMER_ID)
            .unwrap()
            .exists_blocking()
    });
    assert!(exists.unwrap());
}

/// Runs `f` on its own thread and fails the test instead of hanging when it
/// does not return in time.
fn within_deadline<T: Send + 'static>(f: impl FnOnce() -> T + Send + 'static) -> T {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let _ = tx.send(f());
    });
    rx.recv_timeout(Duration::from_secs(20))
        .expect("blocking call did not complete")
}

#[test]
fn blocking_after_async_on_a_single_threaded_runtime() {
    let base = start_server();
    let (async_id, blocking_id) = within_deadline(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async move {
            let root = partner(&base);
            let customer = root.customers().by_id(SEED_CUSTOMER_ID).unwrap();
            let fetched = customer.get().await.unwrap();
            let again = customer.get_blocking().unwrap();
            let exists = customer.exists().await.unwrap();
            assert!(exists);
            (fetched.id, again.id)
        })
    });
    assert_eq!(async_id, SEED_CUSTOMER_ID);
    assert_eq!(blocking_id, SEED_CUSTOMER_ID);
}

#[test]
fn blocking_after_async_on_a_multi_threaded_runtime() {
    let base = start_server();
    let count = within_deadline(move || {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async move {
            let root = partner(&base);
            let entitlements = root
                .customers()
                .by_id(SEED_CUSTOMER_ID)
                .unwrap()
                .entitlements();
            let first = entitlements.get(None).await.unwrap();
            let handle = tokio::spawn(async move { entitlements.get_blocking(None) });
            let second = handle.await.unwrap().unwrap();
            first.len() + second.len()
        })
    });
    assert_eq!(count, 4);
}

#[test]
fn nested_blocking_calls_complete() {
    let base = start_server();
    let ids = within_deadline(move || {
        let root = partner(&base);
        synchronous_execute(async move {
            let customer = root.customers().by_id(SEED_CUSTOMER_ID).unwrap();
            let mut handles = Vec::new();
            for _ in 0..4 {
                let customer = customer.clone();
                handles.push(tokio::spawn(async move { customer.get_blocking() }));
            }
            let mut ids = vec![customer.get().await?.id];
            for handle in handles {
                ids.push(handle.await.map_err(|_| PartnerError::Cancelled)??.id);
            }
            Ok::<_, PartnerError>(ids)
        })
        .unwrap()
    });
    assert_eq!(ids.len(), 5);
    assert!(ids.iter().all(|id| id == SEED_CUSTOMER_ID));
}
