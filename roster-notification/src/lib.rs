//! Per-user notifications, company broadcast and web push delivery.

pub mod models;
pub mod push;
pub mod routes;
pub mod schema;
pub mod services;
pub mod store;

#[cfg(any(test, feature = "testing"))]
pub mod memory;

pub use push::{DeliveryReport, PushDelivery, PushFailure, PushTransport};
pub use services::{BroadcastReport, NotificationService};
