use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, Query, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{debug, info};
use uuid::Uuid;

pub const CONTINUATION_TOKEN_HEADER: &str = "MS-ContinuationToken";
pub const REQUEST_ID_HEADER: &str = "MS-RequestId";
pub const CORRELATION_ID_HEADER: &str = "MS-CorrelationId";

pub const SEED_CUSTOMER_ID: &str = "contoso";
pub const SEED_USER_ID: &str = "user-1";
pub const SEED_INVOICE_ID: &str = "D0300000AB";
pub const STATEMENT_BYTES: &[u8] = b"%PDF-1.4\n% mock invoice statement\n";

const DEFAULT_PAGE_SIZE: usize = 100;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyProfile {
    pub tenant_id: String,
    pub domain: String,
    pub company_name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: String,
    pub company_profile: CompanyProfile,
    pub relationship_to_partner: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    #[serde(default)]
    pub id: i32,
    pub catalog_item_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub friendly_name: Option<String>,
    pub quantity: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_cycle: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_principal_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_location: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub id: String,
    pub partner_id: String,
    pub customer_id: String,
    pub resource_type: String,
    pub operation_type: String,
    pub operation_status: String,
    pub operation_date: String,
}

/// A page of a seek-paginated listing.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub total_count: usize,
    pub items: Vec<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continuation_token: Option<String>,
}

#[derive(Default)]
pub struct Store {
    customers: HashMap<String, Customer>,
    carts: HashMap<(String, String), Cart>,
    users: HashMap<(String, String), User>,
    audit_records: Vec<AuditRecord>,
    entitlements: HashMap<String, Vec<Value>>,
    statements: HashMap<String, Vec<u8>>,
}

pub type Db = Arc<RwLock<Store>>;

impl Store {
    /// One customer with a user, entitlements, an invoice statement and
    /// five audit records spread over 2024-03-01..05.
    pub fn seeded() -> Self {
        let mut store = Store::default();
        store.customers.insert(
            SEED_CUSTOMER_ID.to_string(),
            Customer {
                id: SEED_CUSTOMER_ID.to_string(),
                company_profile: CompanyProfile {
                    tenant_id: SEED_CUSTOMER_ID.to_string(),
                    domain: "contoso.onmicrosoft.com".to_string(),
                    company_name: "Contoso".to_string(),
                },
                relationship_to_partner: "reseller".to_string(),
            },
        );
        store.users.insert(
            (SEED_CUSTOMER_ID.to_string(), SEED_USER_ID.to_string()),
            User {
                id: Some(SEED_USER_ID.to_string()),
                user_principal_name: Some("adele@contoso.onmicrosoft.com".to_string()),
                first_name: Some("Adele".to_string()),
                last_name: Some("Vance".to_string()),
                display_name: Some("Adele Vance".to_string()),
                usage_location: Some("US".to_string()),
            },
        );
        store.entitlements.insert(
            SEED_CUSTOMER_ID.to_string(),
            vec![
                json!({
                    "productId": "DZH318Z0BQ3Q",
                    "skuId": "0001",
                    "quantity": 1,
                    "entitlementType": "reservedInstance",
                    "entitledArtifacts": [
                        {"artifactType": "reservedinstance", "resourceId": "ri-1", "resourceType": "virtualmachine"}
                    ]
                }),
                json!({
                    "productId": "DG7GMGF0FKZV",
                    "skuId": "0002",
                    "quantity": 3,
                    "entitlementType": "software",
                    "entitledArtifacts": [
                        {"artifactType": "software", "link": "https://download.test/office"}
                    ]
                }),
            ],
        );
        store
            .statements
            .insert(SEED_INVOICE_ID.to_string(), STATEMENT_BYTES.to_vec());
        store.audit_records = (1..=5)
            .map(|day| AuditRecord {
                id: format!("audit-{day}"),
                partner_id: "partner-1".to_string(),
                customer_id: SEED_CUSTOMER_ID.to_string(),
                resource_type: "cart".to_string(),
                operation_type: "create_cart".to_string(),
                operation_status: "succeeded".to_string(),
                operation_date: format!("2024-03-0{day}T12:00:00Z"),
            })
            .collect();
        store
    }
}

/// Error body in the service's fault shape.
#[derive(Debug)]
pub struct Fault {
    status: StatusCode,
    code: &'static str,
    description: String,
}

impl Fault {
    fn new(status: StatusCode, code: &'static str, description: impl Into<String>) -> Self {
        Self {
            status,
            code,
            description: description.into(),
        }
    }

    fn not_found(what: &str, id: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, "600002", format!("{what} {id} was not found"))
    }

    fn bad_request(description: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "400001", description)
    }
}

impl IntoResponse for Fault {
    fn into_response(self) -> Response {
        let body = json!({"code": self.code, "description": self.description, "data": []});
        (self.status, Json(body)).into_response()
    }
}

pub fn app() -> Router {
    app_with_store(Store::seeded())
}

pub fn app_with_store(store: Store) -> Router {
    let db: Db = Arc::new(RwLock::new(store));
    Router::new()
        .route(
            "/v1/customers/{customer_id}",
            get(get_customer).delete(delete_customer),
        )
        .route("/v1/customers/{customer_id}/carts", post(create_cart))
        .route(
            "/v1/customers/{customer_id}/carts/{cart_id}",
            get(get_cart).put(update_cart),
        )
        .route(
            "/v1/customers/{customer_id}/carts/{cart_id}/checkout",
            post(checkout_cart),
        )
        .route(
            "/v1/customers/{customer_id}/users/{user_id}",
            get(get_user).patch(update_user),
        )
        .route(
            "/v1/customers/{customer_id}/entitlements",
            get(list_entitlements),
        )
        .route("/v1/auditrecords", get(query_audit_records))
        .route(
            "/v1/invoices/{invoice_id}/documents/statement",
            get(get_statement),
        )
        .route_layer(middleware::from_fn(require_bearer))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn require_bearer(request: Request, next: Next) -> Response {
    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| !token.trim().is_empty());
    if !authorized {
        return Fault::new(StatusCode::UNAUTHORIZED, "401000", "missing bearer token").into_response();
    }
    debug!(
        method = %request.method(),
        uri = %request.uri(),
        request_id = header_str(request.headers(), REQUEST_ID_HEADER).unwrap_or("-"),
        correlation_id = header_str(request.headers(), CORRELATION_ID_HEADER).unwrap_or("-"),
        "partner request"
    );
    next.run(request).await
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

async fn get_customer(
    State(db): State<Db>,
    Path(customer_id): Path<String>,
) -> Result<Json<Customer>, Fault> {
    let store = db.read().await;
    store
        .customers
        .get(&customer_id)
        .cloned()
        .map(Json)
        .ok_or_else(|| Fault::not_found("customer", &customer_id))
}

async fn delete_customer(
    State(db): State<Db>,
    Path(customer_id): Path<String>,
) -> Result<StatusCode, Fault> {
    let mut store = db.write().await;
    store
        .customers
        .remove(&customer_id)
        .ok_or_else(|| Fault::not_found("customer", &customer_id))?;
    store.carts.retain(|(owner, _), _| owner != &customer_id);
    store.users.retain(|(owner, _), _| owner != &customer_id);
    info!(%customer_id, "customer deleted");
    Ok(StatusCode::NO_CONTENT)
}

fn require_customer(store: &Store, customer_id: &str) -> Result<(), Fault> {
    if store.customers.contains_key(customer_id) {
        Ok(())
    } else {
        Err(Fault::not_found("customer", customer_id))
    }
}

fn validate_line_items(items: &mut [LineItem]) -> Result<(), Fault> {
    if items.is_empty() {
        return Err(Fault::bad_request("a cart needs at least one line item"));
    }
    for (index, item) in items.iter_mut().enumerate() {
        if item.quantity <= 0 {
            return Err(Fault::bad_request(format!(
                "line item {index} has non-positive quantity {}",
                item.quantity
            )));
        }
        item.id = index as i32;
    }
    Ok(())
}

async fn create_cart(
    State(db): State<Db>,
    Path(customer_id): Path<String>,
    Json(mut cart): Json<Cart>,
) -> Result<(StatusCode, Json<Cart>), Fault> {
    let mut store = db.write().await;
    require_customer(&store, &customer_id)?;
    validate_line_items(&mut cart.line_items)?;
    let cart_id = Uuid::new_v4().to_string();
    cart.id = Some(cart_id.clone());
    cart.status = Some("Active".to_string());
    store.carts.insert((customer_id, cart_id), cart.clone());
    Ok((StatusCode::CREATED, Json(cart)))
}

async fn get_cart(
    State(db): State<Db>,
    Path((customer_id, cart_id)): Path<(String, String)>,
) -> Result<Json<Cart>, Fault> {
    let store = db.read().await;
    store
        .carts
        .get(&(customer_id, cart_id.clone()))
        .cloned()
        .map(Json)
        .ok_or_else(|| Fault::not_found("cart", &cart_id))
}

async fn update_cart(
    State(db): State<Db>,
    Path((customer_id, cart_id)): Path<(String, String)>,
    Json(mut input): Json<Cart>,
) -> Result<Json<Cart>, Fault> {
    let mut store = db.write().await;
    let cart = store
        .carts
        .get_mut(&(customer_id, cart_id.clone()))
        .ok_or_else(|| Fault::not_found("cart", &cart_id))?;
    if cart.status.as_deref() == Some("Ordered") {
        return Err(Fault::new(
            StatusCode::CONFLICT,
            "800001",
            format!("cart {cart_id} was already checked out"),
        ));
    }
    validate_line_items(&mut input.line_items)?;
    cart.line_items = input.line_items;
    Ok(Json(cart.clone()))
}

async fn checkout_cart(
    State(db): State<Db>,
    Path((customer_id, cart_id)): Path<(String, String)>,
) -> Result<Json<Value>, Fault> {
    let mut store = db.write().await;
    let cart = store
        .carts
        .get_mut(&(customer_id.clone(), cart_id.clone()))
        .ok_or_else(|| Fault::not_found("cart", &cart_id))?;
    if cart.status.as_deref() == Some("Ordered") {
        return Err(Fault::new(
            StatusCode::CONFLICT,
            "800001",
            format!("cart {cart_id} was already checked out"),
        ));
    }
    cart.status = Some("Ordered".to_string());
    let billing_cycle = cart
        .line_items
        .first()
        .and_then(|item| item.billing_cycle.clone())
        .unwrap_or_else(|| "monthly".to_string());
    Ok(Json(json!({
        "orders": [{
            "id": Uuid::new_v4().to_string(),
            "referenceCustomerId": customer_id,
            "billingCycle": billing_cycle,
            "status": "completed"
        }],
        "orderErrors": []
    })))
}

async fn get_user(
    State(db): State<Db>,
    Path((customer_id, user_id)): Path<(String, String)>,
) -> Result<Json<User>, Fault> {
    let store = db.read().await;
    store
        .users
        .get(&(customer_id, user_id.clone()))
        .cloned()
        .map(Json)
        .ok_or_else(|| Fault::not_found("user", &user_id))
}

async fn update_user(
    State(db): State<Db>,
    Path((customer_id, user_id)): Path<(String, String)>,
    Json(input): Json<User>,
) -> Result<Json<User>, Fault> {
    let mut store = db.write().await;
    let user = store
        .users
        .get_mut(&(customer_id, user_id.clone()))
        .ok_or_else(|| Fault::not_found("user", &user_id))?;
    if let Some(first_name) = input.first_name {
        user.first_name = Some(first_name);
    }
    if let Some(last_name) = input.last_name {
        user.last_name = Some(last_name);
    }
    if let Some(display_name) = input.display_name {
        user.display_name = Some(display_name);
    }
    if let Some(usage_location) = input.usage_location {
        user.usage_location = Some(usage_location);
    }
    Ok(Json(user.clone()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitlementQuery {
    pub entitlement_type: Option<String>,
}

async fn list_entitlements(
    State(db): State<Db>,
    Path(customer_id): Path<String>,
    Query(query): Query<EntitlementQuery>,
) -> Result<Json<Page<Value>>, Fault> {
    let store = db.read().await;
    require_customer(&store, &customer_id)?;
    let items: Vec<Value> = store
        .entitlements
        .get(&customer_id)
        .into_iter()
        .flatten()
        .filter(|e| match &query.entitlement_type {
            Some(kind) => e["entitlementType"]
                .as_str()
                .is_some_and(|t| t.eq_ignore_ascii_case(kind)),
            None => true,
        })
        .cloned()
        .collect();
    Ok(Json(Page {
        total_count: items.len(),
        items,
        continuation_token: None,
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub size: Option<usize>,
    pub filter: Option<String>,
    pub seek_operation: Option<String>,
}

/// Cursor handed out as the continuation token: `offset|size|start|end`.
#[derive(Debug, PartialEq)]
struct Cursor {
    offset: usize,
    size: usize,
    start: String,
    end: String,
}

impl Cursor {
    fn encode(&self) -> String {
        format!("{}|{}|{}|{}", self.offset, self.size, self.start, self.end)
    }

    fn decode(token: &str) -> Option<Self> {
        let mut parts = token.splitn(4, '|');
        Some(Self {
            offset: parts.next()?.parse().ok()?,
            size: parts.next()?.parse().ok()?,
            start: parts.next()?.to_string(),
            end: parts.next()?.to_string(),
        })
    }
}

async fn query_audit_records(
    State(db): State<Db>,
    Query(query): Query<AuditQuery>,
    headers: HeaderMap,
) -> Result<Json<Page<AuditRecord>>, Fault> {
    let cursor = if query
        .seek_operation
        .as_deref()
        .is_some_and(|op| op.eq_ignore_ascii_case("next"))
    {
        let token = header_str(&headers, CONTINUATION_TOKEN_HEADER)
            .ok_or_else(|| Fault::bad_request("seekOperation=Next requires a continuation token"))?;
        Cursor::decode(token).ok_or_else(|| Fault::bad_request("malformed continuation token"))?
    } else {
        let start = query
            .start_date
            .ok_or_else(|| Fault::bad_request("startDate is required"))?;
        let size = query.size.unwrap_or(DEFAULT_PAGE_SIZE);
        if size == 0 {
            return Err(Fault::bad_request("size must be positive"));
        }
        Cursor {
            offset: 0,
            size,
            start,
            end: query.end_date.unwrap_or_default(),
        }
    };

    // Timestamps share one RFC 3339 shape, so string order is time order.
    let store = db.read().await;
    let matching: Vec<&AuditRecord> = store
        .audit_records
        .iter()
        .filter(|r| r.operation_date >= cursor.start)
        .filter(|r| cursor.end.is_empty() || r.operation_date <= cursor.end)
        .collect();

    let items: Vec<AuditRecord> = matching
        .iter()
        .skip(cursor.offset)
        .take(cursor.size)
        .map(|r| (*r).clone())
        .collect();
    let next_offset = cursor.offset + items.len();
    let continuation_token = (next_offset < matching.len()).then(|| {
        Cursor {
            offset: next_offset,
            ..cursor
        }
        .encode()
    });

    Ok(Json(Page {
        total_count: matching.len(),
        items,
        continuation_token,
    }))
}

async fn get_statement(
    State(db): State<Db>,
    Path(invoice_id): Path<String>,
) -> Result<Response, Fault> {
    let store = db.read().await;
    let bytes = store
        .statements
        .get(&invoice_id)
        .cloned()
        .ok_or_else(|| Fault::not_found("invoice", &invoice_id))?;
    Ok(([(header::CONTENT_TYPE, "application/pdf")], bytes).into_response())
}
