//! Resource operations bundled with the client.
//!
//! Each operation is a thin caller of `ServiceProxy`: it formats its path from
//! the configured endpoint and its validated context, attaches parameters, and
//! exposes an async method plus a `*_blocking` twin. Sub-collections are
//! constructed on demand by accessor methods.

mod audit_records;
mod carts;
mod customers;
mod entitlements;
mod invoices;
mod users;

pub use audit_records::{AuditRecordsOperations, AuditRecordsPage, AuditRecordsQuery};
pub use carts::{CartCollectionOperations, CartOperations};
pub use customers::{CustomerCollectionOperations, CustomerOperations};
pub use entitlements::EntitlementCollectionOperations;
pub use invoices::{InvoiceCollectionOperations, InvoiceOperations};
pub use users::CustomerUserOperations;
