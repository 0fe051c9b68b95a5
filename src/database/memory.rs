use super::Repository;
use crate::models::{
    ApiUsage, ChatMessage, Report, ReportFilter, Sensor, SensorOrder, Station, User,
};
use crate::utils::error::AppError;
use async_trait::async_trait;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct MemoryData {
    users: Vec<User>,
    sensors: Vec<Sensor>,
    orders: Vec<SensorOrder>,
    stations: Vec<Station>,
    reports: Vec<Report>,
    chat_messages: Vec<ChatMessage>,
}

/// Process-local store used when no MONGODB_URI is configured (development) and in tests.
/// Contents are lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<MemoryData>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, MemoryData> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, MemoryData> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Repository for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn insert_user(&self, user: &User) -> Result<(), AppError> {
        let mut data = self.write();
        if data.users.iter().any(|u| u.email == user.email) {
            return Err(AppError::Conflict("Email is already registered".to_string()));
        }
        data.users.push(user.clone());
        Ok(())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self.read().users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_id(&self, user_id: &str) -> Result<Option<User>, AppError> {
        Ok(self.read().users.iter().find(|u| u.user_id == user_id).cloned())
    }

    async fn save_user(&self, user: &User) -> Result<(), AppError> {
        let mut data = self.write();
        let existing = data
            .users
            .iter_mut()
            .find(|u| u.user_id == user.user_id)
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
        let api_usage = std::mem::take(&mut existing.api_usage);
        *existing = User { api_usage, ..user.clone() };
        Ok(())
    }

    async fn save_api_usage(&self, user_id: &str, seen_total: u64, usage: &ApiUsage) -> Result<bool, AppError> {
        match self.write().users.iter_mut().find(|u| u.user_id == user_id) {
            Some(user) if user.api_usage.total_requests == seen_total => {
                user.api_usage = usage.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_user(&self, user_id: &str) -> Result<bool, AppError> {
        let mut data = self.write();
        let before = data.users.len();
        data.users.retain(|u| u.user_id != user_id);
        Ok(data.users.len() < before)
    }

    async fn insert_sensor(&self, sensor: &Sensor) -> Result<(), AppError> {
        self.write().sensors.push(sensor.clone());
        Ok(())
    }

    async fn list_sensors(&self) -> Result<Vec<Sensor>, AppError> {
        Ok(self.read().sensors.clone())
    }

    async fn find_sensor(&self, sensor_id: &str) -> Result<Option<Sensor>, AppError> {
        Ok(self.read().sensors.iter().find(|s| s.sensor_id == sensor_id).cloned())
    }

    async fn reserve_stock(&self, sensor_id: &str, quantity: u32) -> Result<bool, AppError> {
        let mut data = self.write();
        match data.sensors.iter_mut().find(|s| s.sensor_id == sensor_id) {
            Some(sensor) if sensor.stock >= quantity => {
                sensor.stock -= quantity;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_stock(&self, sensor_id: &str, quantity: u32) -> Result<(), AppError> {
        if let Some(sensor) = self.write().sensors.iter_mut().find(|s| s.sensor_id == sensor_id) {
            sensor.stock += quantity;
        }
        Ok(())
    }

    async fn insert_order(&self, order: &SensorOrder) -> Result<(), AppError> {
        self.write().orders.push(order.clone());
        Ok(())
    }

    async fn list_orders(&self, user_id: &str) -> Result<Vec<SensorOrder>, AppError> {
        let mut orders: Vec<SensorOrder> = self
            .read()
            .orders
            .iter()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn delete_orders_for_user(&self, user_id: &str) -> Result<u64, AppError> {
        let mut data = self.write();
        let before = data.orders.len();
        data.orders.retain(|o| o.user_id != user_id);
        Ok((before - data.orders.len()) as u64)
    }

    async fn insert_station(&self, station: &Station) -> Result<(), AppError> {
        self.write().stations.push(station.clone());
        Ok(())
    }

    async fn list_stations(&self) -> Result<Vec<Station>, AppError> {
        let mut stations = self.read().stations.clone();
        stations.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(stations)
    }

    async fn find_station(&self, station_id: &str) -> Result<Option<Station>, AppError> {
        Ok(self.read().stations.iter().find(|s| s.station_id == station_id).cloned())
    }

    async fn save_station(&self, station: &Station) -> Result<(), AppError> {
        let mut data = self.write();
        match data.stations.iter_mut().find(|s| s.station_id == station.station_id) {
            Some(existing) => *existing = station.clone(),
            None => data.stations.push(station.clone()),
        }
        Ok(())
    }

    async fn insert_report(&self, report: &Report) -> Result<(), AppError> {
        self.write().reports.push(report.clone());
        Ok(())
    }

    async fn list_reports(
        &self,
        filter: &ReportFilter,
        skip: u64,
        limit: Option<i64>,
    ) -> Result<(Vec<Report>, u64), AppError> {
        let data = self.read();
        let mut matching: Vec<&Report> = data.reports.iter().filter(|r| filter.matches(r)).collect();
        // Stable sort keeps insertion order for equal timestamps; reverse it so later inserts come first
        matching.reverse();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matching.len() as u64;
        let take = limit.map(|l| l.max(0) as usize).unwrap_or(usize::MAX);
        let page = matching
            .into_iter()
            .skip(skip as usize)
            .take(take)
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn find_report(&self, report_id: &str) -> Result<Option<Report>, AppError> {
        Ok(self.read().reports.iter().find(|r| r.report_id == report_id).cloned())
    }

    async fn save_report(&self, report: &Report) -> Result<(), AppError> {
        let mut data = self.write();
        let existing = data
            .reports
            .iter_mut()
            .find(|r| r.report_id == report.report_id)
            .ok_or_else(|| AppError::NotFound("Report not found".to_string()))?;
        *existing = report.clone();
        Ok(())
    }

    async fn anonymize_reports(&self, user_id: &str) -> Result<u64, AppError> {
        let mut count = 0;
        for report in self
            .write()
            .reports
            .iter_mut()
            .filter(|r| r.reporter_id.as_deref() == Some(user_id))
        {
            report.reporter_id = None;
            report.reporter_name = None;
            report.allow_contact = false;
            count += 1;
        }
        Ok(count)
    }

    async fn insert_chat_message(&self, message: &ChatMessage) -> Result<(), AppError> {
        self.write().chat_messages.push(message.clone());
        Ok(())
    }

    async fn chat_history(&self, user_id: &str, limit: usize) -> Result<Vec<ChatMessage>, AppError> {
        let data = self.read();
        let mut mine: Vec<&ChatMessage> = data.chat_messages.iter().filter(|m| m.user_id == user_id).collect();
        mine.sort_by_key(|m| m.created_at);
        let start = mine.len().saturating_sub(limit);
        Ok(mine[start..].iter().map(|m| (*m).clone()).collect())
    }

    async fn clear_chat_history(&self, user_id: &str) -> Result<u64, AppError> {
        let mut data = self.write();
        let before = data.chat_messages.len();
        data.chat_messages.retain(|m| m.user_id != user_id);
        Ok((before - data.chat_messages.len()) as u64)
    }
}
