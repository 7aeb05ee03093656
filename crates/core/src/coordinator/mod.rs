//! Analytics coordinator facade.

mod service;

pub use service::AnalyticsCoordinator;
