use super::{Repository, CHAT_MESSAGES, ORDERS, REPORTS, SENSORS, STATIONS, USERS};
use crate::models::{
    ApiUsage, ChatMessage, Report, ReportFilter, Sensor, SensorOrder, Station, User,
};
use crate::utils::error::AppError;
use async_trait::async_trait;
use futures::stream::TryStreamExt;
use mongodb::bson::{doc, to_bson, Bson, Document};
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, Database, IndexModel};
use serde::Serialize;
use std::time::Duration;

const DEFAULT_DB_NAME: &str = "aquawatch";

#[derive(Clone)]
pub struct MongoDB {
    db: Database,
}

impl MongoDB {
    pub async fn new(uri: &str) -> Result<Self, AppError> {
        let mut client_options = mongodb::options::ClientOptions::parse(uri).await?;

        // Connection pool
        client_options.max_pool_size = Some(20);
        client_options.min_pool_size = Some(5);
        client_options.max_idle_time = Some(Duration::from_secs(300));

        client_options.connect_timeout = Some(Duration::from_secs(5));
        client_options.server_selection_timeout = Some(Duration::from_secs(5));
        client_options.app_name = Some("aquawatch-service".to_string());

        let db_name = client_options
            .default_database
            .clone()
            .unwrap_or_else(|| DEFAULT_DB_NAME.to_string());

        let client = Client::with_options(client_options)?;
        let db = client.database(&db_name);

        // Test connection
        db.run_command(doc! { "ping": 1 }).await?;
        log::info!("📊 Using database: {}", db_name);

        let mongodb = Self { db };
        mongodb.ensure_indexes().await?;

        Ok(mongodb)
    }

    /// Creates the indexes the queries below rely on
    async fn ensure_indexes(&self) -> Result<(), AppError> {
        log::info!("🔧 Creating database indexes...");

        let unique = || IndexOptions::builder().unique(true).build();
        let indexes: Vec<(&str, Document, Option<IndexOptions>)> = vec![
            (USERS, doc! { "email": 1 }, Some(unique())),
            (USERS, doc! { "user_id": 1 }, Some(unique())),
            (SENSORS, doc! { "sensor_id": 1 }, Some(unique())),
            (SENSORS, doc! { "category": 1 }, None),
            (ORDERS, doc! { "user_id": 1, "created_at": -1 }, None),
            (STATIONS, doc! { "station_id": 1 }, Some(unique())),
            (REPORTS, doc! { "report_id": 1 }, Some(unique())),
            (REPORTS, doc! { "created_at": -1 }, None),
            (REPORTS, doc! { "status": 1, "severity": 1 }, None),
            (CHAT_MESSAGES, doc! { "user_id": 1, "created_at": -1 }, None),
        ];

        for (collection, keys, options) in indexes {
            let description = format!("{}({:?})", collection, keys.keys().collect::<Vec<_>>());
            let model = IndexModel::builder().keys(keys).options(options).build();

            match self.collection::<Document>(collection).create_index(model).await {
                Ok(_) => log::info!("   ✅ Index created: {}", description),
                Err(e) => log::debug!("   ℹ️  Index already exists: {} - {}", description, e),
            }
        }

        log::info!("✅ Database indexes ready");
        Ok(())
    }

    pub fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        self.db.collection(name)
    }
}

fn bson_of<T: Serialize>(value: &T) -> Result<Bson, AppError> {
    to_bson(value).map_err(|e| AppError::Internal(format!("BSON serialization failed: {}", e)))
}

fn report_filter_document(filter: &ReportFilter) -> Result<Document, AppError> {
    let mut document = Document::new();
    if let Some(status) = &filter.status {
        document.insert("status", bson_of(status)?);
    }
    if let Some(incident_type) = &filter.incident_type {
        document.insert("incident_type", bson_of(incident_type)?);
    }
    if let Some(severity) = &filter.severity {
        document.insert("severity", bson_of(severity)?);
    }
    if let Some(reporter_id) = &filter.reporter_id {
        document.insert("reporter_id", reporter_id.as_str());
    }
    Ok(document)
}

#[async_trait]
impl Repository for MongoDB {
    fn backend(&self) -> &'static str {
        "mongodb"
    }

    async fn ping(&self) -> Result<(), AppError> {
        self.db.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }

    async fn insert_user(&self, user: &User) -> Result<(), AppError> {
        self.collection::<User>(USERS)
            .insert_one(user)
            .await
            .map_err(|e| {
                if crate::utils::error::is_duplicate_key(&e) {
                    AppError::Conflict("Email is already registered".to_string())
                } else {
                    AppError::from(e)
                }
            })?;
        Ok(())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self.collection::<User>(USERS).find_one(doc! { "email": email }).await?)
    }

    async fn find_user_by_id(&self, user_id: &str) -> Result<Option<User>, AppError> {
        Ok(self.collection::<User>(USERS).find_one(doc! { "user_id": user_id }).await?)
    }

    async fn save_user(&self, user: &User) -> Result<(), AppError> {
        let mut fields = mongodb::bson::to_document(user)
            .map_err(|e| AppError::Internal(format!("Failed to encode user: {}", e)))?;
        fields.remove("api_usage");
        let result = self
            .collection::<Document>(USERS)
            .update_one(doc! { "user_id": &user.user_id }, doc! { "$set": fields })
            .await?;
        if result.matched_count == 0 {
            return Err(AppError::NotFound("User not found".to_string()));
        }
        Ok(())
    }

    async fn save_api_usage(&self, user_id: &str, seen_total: u64, usage: &ApiUsage) -> Result<bool, AppError> {
        let seen_total = i64::try_from(seen_total)
            .map_err(|_| AppError::Internal("Request counter out of range".to_string()))?;
        let result = self
            .collection::<Document>(USERS)
            .update_one(
                doc! { "user_id": user_id, "api_usage.total_requests": seen_total },
                doc! { "$set": { "api_usage": bson_of(usage)? } },
            )
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn delete_user(&self, user_id: &str) -> Result<bool, AppError> {
        let result = self
            .collection::<Document>(USERS)
            .delete_one(doc! { "user_id": user_id })
            .await?;
        Ok(result.deleted_count > 0)
    }

    async fn insert_sensor(&self, sensor: &Sensor) -> Result<(), AppError> {
        self.collection::<Sensor>(SENSORS).insert_one(sensor).await?;
        Ok(())
    }

    async fn list_sensors(&self) -> Result<Vec<Sensor>, AppError> {
        let cursor = self.collection::<Sensor>(SENSORS).find(doc! {}).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn find_sensor(&self, sensor_id: &str) -> Result<Option<Sensor>, AppError> {
        Ok(self
            .collection::<Sensor>(SENSORS)
            .find_one(doc! { "sensor_id": sensor_id })
            .await?)
    }

    async fn reserve_stock(&self, sensor_id: &str, quantity: u32) -> Result<bool, AppError> {
        let quantity = i64::from(quantity);
        let result = self
            .collection::<Document>(SENSORS)
            .update_one(
                doc! { "sensor_id": sensor_id, "stock": { "$gte": quantity } },
                doc! { "$inc": { "stock": -quantity } },
            )
            .await?;
        Ok(result.modified_count == 1)
    }

    async fn release_stock(&self, sensor_id: &str, quantity: u32) -> Result<(), AppError> {
        self.collection::<Document>(SENSORS)
            .update_one(
                doc! { "sensor_id": sensor_id },
                doc! { "$inc": { "stock": i64::from(quantity) } },
            )
            .await?;
        Ok(())
    }

    async fn insert_order(&self, order: &SensorOrder) -> Result<(), AppError> {
        self.collection::<SensorOrder>(ORDERS).insert_one(order).await?;
        Ok(())
    }

    async fn list_orders(&self, user_id: &str) -> Result<Vec<SensorOrder>, AppError> {
        let cursor = self
            .collection::<SensorOrder>(ORDERS)
            .find(doc! { "user_id": user_id })
            .sort(doc! { "created_at": -1, "_id": -1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn delete_orders_for_user(&self, user_id: &str) -> Result<u64, AppError> {
        let result = self
            .collection::<Document>(ORDERS)
            .delete_many(doc! { "user_id": user_id })
            .await?;
        Ok(result.deleted_count)
    }

    async fn insert_station(&self, station: &Station) -> Result<(), AppError> {
        self.collection::<Station>(STATIONS).insert_one(station).await?;
        Ok(())
    }

    async fn list_stations(&self) -> Result<Vec<Station>, AppError> {
        let cursor = self
            .collection::<Station>(STATIONS)
            .find(doc! {})
            .sort(doc! { "name": 1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn find_station(&self, station_id: &str) -> Result<Option<Station>, AppError> {
        Ok(self
            .collection::<Station>(STATIONS)
            .find_one(doc! { "station_id": station_id })
            .await?)
    }

    async fn save_station(&self, station: &Station) -> Result<(), AppError> {
        self.collection::<Station>(STATIONS)
            .replace_one(doc! { "station_id": &station.station_id }, station)
            .await?;
        Ok(())
    }

    async fn insert_report(&self, report: &Report) -> Result<(), AppError> {
        self.collection::<Report>(REPORTS).insert_one(report).await?;
        Ok(())
    }

    async fn list_reports(
        &self,
        filter: &ReportFilter,
        skip: u64,
        limit: Option<i64>,
    ) -> Result<(Vec<Report>, u64), AppError> {
        let query = report_filter_document(filter)?;
        let collection = self.collection::<Report>(REPORTS);

        let total = collection.count_documents(query.clone()).await?;
        let mut find = collection.find(query).sort(doc! { "created_at": -1 }).skip(skip);
        if let Some(limit) = limit {
            find = find.limit(limit);
        }
        let reports = find.await?.try_collect().await?;

        Ok((reports, total))
    }

    async fn find_report(&self, report_id: &str) -> Result<Option<Report>, AppError> {
        Ok(self
            .collection::<Report>(REPORTS)
            .find_one(doc! { "report_id": report_id })
            .await?)
    }

    async fn save_report(&self, report: &Report) -> Result<(), AppError> {
        self.collection::<Report>(REPORTS)
            .replace_one(doc! { "report_id": &report.report_id }, report)
            .await?;
        Ok(())
    }

    async fn anonymize_reports(&self, user_id: &str) -> Result<u64, AppError> {
        let result = self
            .collection::<Document>(REPORTS)
            .update_many(
                doc! { "reporter_id": user_id },
                doc! { "$set": {
                    "reporter_id": Bson::Null,
                    "reporter_name": Bson::Null,
                    "allow_contact": false,
                } },
            )
            .await?;
        Ok(result.modified_count)
    }

    async fn insert_chat_message(&self, message: &ChatMessage) -> Result<(), AppError> {
        self.collection::<ChatMessage>(CHAT_MESSAGES).insert_one(message).await?;
        Ok(())
    }

    async fn chat_history(&self, user_id: &str, limit: usize) -> Result<Vec<ChatMessage>, AppError> {
        let cursor = self
            .collection::<ChatMessage>(CHAT_MESSAGES)
            .find(doc! { "user_id": user_id })
            .sort(doc! { "created_at": -1, "_id": -1 })
            .limit(limit as i64)
            .await?;
        let mut messages: Vec<ChatMessage> = cursor.try_collect().await?;
        messages.reverse();
        Ok(messages)
    }

    async fn clear_chat_history(&self, user_id: &str) -> Result<u64, AppError> {
        let result = self
            .collection::<Document>(CHAT_MESSAGES)
            .delete_many(doc! { "user_id": user_id })
            .await?;
        Ok(result.deleted_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ReportStatus, Severity};

    #[test]
    fn test_report_filter_document() {
        let filter = ReportFilter {
            status: Some(ReportStatus::Pending),
            severity: Some(Severity::Critical),
            ..Default::default()
        };
        let document = report_filter_document(&filter).unwrap();
        assert_eq!(document.get_str("status").unwrap(), "pending");
        assert_eq!(document.get_str("severity").unwrap(), "critical");
        assert!(document.get("incident_type").is_none());
    }

    #[tokio::test]
    #[ignore] // Requires MongoDB to be running
    async fn test_mongodb_connection() {
        dotenv::dotenv().ok();
        let uri = std::env::var("MONGODB_URI")
            .unwrap_or_else(|_| "mongodb://localhost:27017/aquawatch_test".to_string());

        let db = MongoDB::new(&uri).await;
        assert!(db.is_ok());
        assert!(db.unwrap().ping().await.is_ok());
    }
}
