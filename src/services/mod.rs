pub mod auth_service;
pub mod chat_service;
pub mod dashboard_service;
pub mod map_service;
pub mod report_service;
pub mod sensor_service;
pub mod water_quality;

pub use water_quality::{classify, Assessment, MetricIssue};
