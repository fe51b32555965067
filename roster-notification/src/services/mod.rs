pub mod broadcast;
pub mod notification_service;

pub use broadcast::BroadcastReport;
pub use notification_service::NotificationService;
