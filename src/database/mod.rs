pub mod memory;
pub mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoDB;

use crate::models::{
    ApiUsage, ChatMessage, Report, ReportFilter, Sensor, SensorOrder, Station, User,
};
use crate::utils::error::AppError;
use async_trait::async_trait;

pub const USERS: &str = "users";
pub const SENSORS: &str = "sensors";
pub const ORDERS: &str = "orders";
pub const STATIONS: &str = "stations";
pub const REPORTS: &str = "reports";
pub const CHAT_MESSAGES: &str = "chat_messages";

/// Storage seam used by services and middleware.
/// `MongoDB` is the production backend; `MemoryStore` serves development runs
/// without a database and the test suite.
#[async_trait]
pub trait Repository: Send + Sync {
    /// "mongodb" or "memory"
    fn backend(&self) -> &'static str;

    async fn ping(&self) -> Result<(), AppError>;

    // ==================== USERS ====================
    async fn insert_user(&self, user: &User) -> Result<(), AppError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;
    async fn find_user_by_id(&self, user_id: &str) -> Result<Option<User>, AppError>;
    /// Writes every field except `api_usage`, which only `save_api_usage` touches
    async fn save_user(&self, user: &User) -> Result<(), AppError>;
    /// Stores `usage` only while the stored `total_requests` still equals `seen_total`.
    /// Returns false when another request got there first.
    async fn save_api_usage(&self, user_id: &str, seen_total: u64, usage: &ApiUsage) -> Result<bool, AppError>;
    async fn delete_user(&self, user_id: &str) -> Result<bool, AppError>;

    // ==================== SENSORS & ORDERS ====================
    async fn insert_sensor(&self, sensor: &Sensor) -> Result<(), AppError>;
    async fn list_sensors(&self) -> Result<Vec<Sensor>, AppError>;
    async fn find_sensor(&self, sensor_id: &str) -> Result<Option<Sensor>, AppError>;
    /// Decrements stock only when enough is available; false otherwise
    async fn reserve_stock(&self, sensor_id: &str, quantity: u32) -> Result<bool, AppError>;
    async fn release_stock(&self, sensor_id: &str, quantity: u32) -> Result<(), AppError>;
    async fn insert_order(&self, order: &SensorOrder) -> Result<(), AppError>;
    /// Newest first
    async fn list_orders(&self, user_id: &str) -> Result<Vec<SensorOrder>, AppError>;
    async fn delete_orders_for_user(&self, user_id: &str) -> Result<u64, AppError>;

    // ==================== STATIONS ====================
    async fn insert_station(&self, station: &Station) -> Result<(), AppError>;
    async fn list_stations(&self) -> Result<Vec<Station>, AppError>;
    async fn find_station(&self, station_id: &str) -> Result<Option<Station>, AppError>;
    async fn save_station(&self, station: &Station) -> Result<(), AppError>;

    // ==================== REPORTS ====================
    async fn insert_report(&self, report: &Report) -> Result<(), AppError>;
    /// Newest first; returns the page and the total match count
    async fn list_reports(
        &self,
        filter: &ReportFilter,
        skip: u64,
        limit: Option<i64>,
    ) -> Result<(Vec<Report>, u64), AppError>;
    async fn find_report(&self, report_id: &str) -> Result<Option<Report>, AppError>;
    async fn save_report(&self, report: &Report) -> Result<(), AppError>;
    async fn anonymize_reports(&self, user_id: &str) -> Result<u64, AppError>;

    // ==================== CHAT ====================
    async fn insert_chat_message(&self, message: &ChatMessage) -> Result<(), AppError>;
    /// The most recent `limit` messages, oldest first
    async fn chat_history(&self, user_id: &str, limit: usize) -> Result<Vec<ChatMessage>, AppError>;
    async fn clear_chat_history(&self, user_id: &str) -> Result<u64, AppError>;
}
