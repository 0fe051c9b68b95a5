use crate::{
    database::Repository,
    models::{OrderItem, OrderStatus, Sensor, SensorCategory, SensorOrder, ShippingAddress},
    utils::error::AppError,
};
use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

pub const TAX_RATE: f64 = 0.08;
pub const FREE_SHIPPING_THRESHOLD: f64 = 200.0;
pub const FLAT_SHIPPING: f64 = 15.0;
pub const MAX_QUANTITY: u32 = 100;
pub const MAX_ORDER_LINES: usize = 20;

#[derive(Debug, Default, Deserialize)]
pub struct SensorQuery {
    pub category: Option<SensorCategory>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub search: Option<String>,
    pub in_stock: Option<bool>,
    pub sort: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SensorListResponse {
    pub success: bool,
    pub sensors: Vec<Sensor>,
    pub total: usize,
    pub page: u64,
    pub pages: u64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateSensorRequest {
    pub name: String,
    pub description: String,
    pub category: SensorCategory,
    pub manufacturer: String,
    pub price: f64,
    pub stock: u32,
    #[serde(default)]
    pub measures: Vec<String>,
    #[serde(default)]
    pub specifications: BTreeMap<String, String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct OrderLineRequest {
    pub sensor_id: String,
    pub quantity: u32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    pub items: Vec<OrderLineRequest>,
    pub shipping_address: Option<ShippingAddress>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrdersResponse {
    pub success: bool,
    pub orders: Vec<SensorOrder>,
    pub count: usize,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub async fn list_sensors(repo: &dyn Repository, query: &SensorQuery) -> Result<SensorListResponse, AppError> {
    if let (Some(min), Some(max)) = (query.min_price, query.max_price) {
        if min > max {
            return Err(AppError::Validation("min_price cannot exceed max_price".to_string()));
        }
    }

    let search = query
        .search
        .as_ref()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty());

    let mut sensors: Vec<Sensor> = repo
        .list_sensors()
        .await?
        .into_iter()
        .filter(|s| query.category.map_or(true, |c| s.category == c))
        .filter(|s| query.min_price.map_or(true, |min| s.price >= min))
        .filter(|s| query.max_price.map_or(true, |max| s.price <= max))
        .filter(|s| !query.in_stock.unwrap_or(false) || s.stock > 0)
        .filter(|s| {
            search.as_ref().map_or(true, |needle| {
                s.name.to_lowercase().contains(needle) || s.description.to_lowercase().contains(needle)
            })
        })
        .collect();

    match query.sort.as_deref().unwrap_or("name") {
        "price_asc" => sensors.sort_by(|a, b| a.price.total_cmp(&b.price)),
        "price_desc" => sensors.sort_by(|a, b| b.price.total_cmp(&a.price)),
        "rating" => sensors.sort_by(|a, b| {
            b.rating
                .total_cmp(&a.rating)
                .then(b.review_count.cmp(&a.review_count))
        }),
        "name" => sensors.sort_by(|a, b| a.name.cmp(&b.name)),
        other => {
            return Err(AppError::Validation(format!(
                "Invalid sort '{}'. Supported: price_asc, price_desc, rating, name",
                other
            )))
        }
    }

    let limit = query.limit.unwrap_or(12).clamp(1, 100);
    let page = query.page.unwrap_or(1).max(1);
    let total = sensors.len();
    let pages = (total as u64).div_ceil(limit);
    let skip = (page - 1)
        .checked_mul(limit)
        .and_then(|skip| usize::try_from(skip).ok())
        .ok_or_else(|| AppError::Validation(format!("Page {} is out of range", page)))?;

    let sensors = sensors
        .into_iter()
        .skip(skip)
        .take(limit as usize)
        .collect();

    Ok(SensorListResponse {
        success: true,
        sensors,
        total,
        page,
        pages,
    })
}

pub async fn get_sensor(repo: &dyn Repository, sensor_id: &str) -> Result<Sensor, AppError> {
    repo.find_sensor(sensor_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Sensor '{}' not found", sensor_id)))
}

pub async fn create_sensor(
    repo: &dyn Repository,
    request: CreateSensorRequest,
    now: DateTime<Utc>,
) -> Result<Sensor, AppError> {
    let name = request.name.trim();
    if !(3..=120).contains(&name.chars().count()) {
        return Err(AppError::Validation("Name must be between 3 and 120 characters".to_string()));
    }
    if request.description.trim().is_empty() {
        return Err(AppError::Validation("Description is required".to_string()));
    }
    if !request.price.is_finite() || request.price <= 0.0 {
        return Err(AppError::Validation("Price must be a positive number".to_string()));
    }

    let sensor = Sensor {
        sensor_id: ObjectId::new().to_hex(),
        name: name.to_string(),
        description: request.description.trim().to_string(),
        category: request.category,
        manufacturer: request.manufacturer.trim().to_string(),
        price: round2(request.price),
        stock: request.stock,
        rating: 0.0,
        review_count: 0,
        measures: request.measures,
        specifications: request.specifications,
        image_url: request.image_url,
        created_at: now.timestamp_millis(),
    };
    repo.insert_sensor(&sensor).await?;
    log::info!("🛒 Sensor listed: {} ({})", sensor.name, sensor.sensor_id);
    Ok(sensor)
}

/// Reserves stock line by line; on any failure the lines already reserved are released
pub async fn create_order(
    repo: &dyn Repository,
    user_id: &str,
    request: CreateOrderRequest,
    now: DateTime<Utc>,
) -> Result<SensorOrder, AppError> {
    if request.items.is_empty() {
        return Err(AppError::Validation("Order must contain at least one item".to_string()));
    }

    // Merge duplicate lines, keeping first-seen order
    let mut lines: Vec<(String, u32)> = Vec::new();
    for item in &request.items {
        if item.quantity == 0 || item.quantity > MAX_QUANTITY {
            return Err(AppError::Validation(format!(
                "Quantity for '{}' must be between 1 and {}",
                item.sensor_id, MAX_QUANTITY
            )));
        }
        match lines.iter_mut().find(|(id, _)| *id == item.sensor_id) {
            Some((_, quantity)) => *quantity += item.quantity,
            None => lines.push((item.sensor_id.clone(), item.quantity)),
        }
    }
    if lines.len() > MAX_ORDER_LINES {
        return Err(AppError::Validation(format!(
            "Order can contain at most {} different sensors",
            MAX_ORDER_LINES
        )));
    }
    if let Some((id, _)) = lines.iter().find(|(_, q)| *q > MAX_QUANTITY) {
        return Err(AppError::Validation(format!(
            "Quantity for '{}' must be between 1 and {}",
            id, MAX_QUANTITY
        )));
    }

    let mut reserved: Vec<(String, u32)> = Vec::new();
    let mut items = Vec::with_capacity(lines.len());

    for (sensor_id, quantity) in &lines {
        let outcome = reserve_line(repo, sensor_id, *quantity).await;
        match outcome {
            Ok(sensor) => {
                reserved.push((sensor_id.clone(), *quantity));
                items.push(OrderItem {
                    sensor_id: sensor.sensor_id,
                    name: sensor.name,
                    unit_price: sensor.price,
                    quantity: *quantity,
                    line_total: round2(sensor.price * f64::from(*quantity)),
                });
            }
            Err(e) => {
                release_all(repo, &reserved).await;
                return Err(e);
            }
        }
    }

    let subtotal = round2(items.iter().map(|i| i.line_total).sum());
    let tax = round2(subtotal * TAX_RATE);
    let shipping = if subtotal >= FREE_SHIPPING_THRESHOLD { 0.0 } else { FLAT_SHIPPING };

    let order = SensorOrder {
        order_id: ObjectId::new().to_hex(),
        user_id: user_id.to_string(),
        items,
        subtotal,
        tax,
        shipping,
        total: round2(subtotal + tax + shipping),
        status: OrderStatus::Pending,
        shipping_address: request.shipping_address,
        created_at: now.timestamp_millis(),
    };

    if let Err(e) = repo.insert_order(&order).await {
        release_all(repo, &reserved).await;
        return Err(e);
    }

    log::info!("📦 Order {} placed by {}: total {:.2}", order.order_id, user_id, order.total);
    Ok(order)
}

async fn reserve_line(repo: &dyn Repository, sensor_id: &str, quantity: u32) -> Result<Sensor, AppError> {
    let sensor = get_sensor(repo, sensor_id).await?;
    if !repo.reserve_stock(sensor_id, quantity).await? {
        return Err(AppError::Conflict(format!(
            "Insufficient stock for '{}' ({} requested)",
            sensor.name, quantity
        )));
    }
    Ok(sensor)
}

async fn release_all(repo: &dyn Repository, reserved: &[(String, u32)]) {
    for (sensor_id, quantity) in reserved {
        if let Err(e) = repo.release_stock(sensor_id, *quantity).await {
            log::error!("❌ Failed to release {} units of {}: {}", quantity, sensor_id, e);
        }
    }
}

pub async fn list_orders(repo: &dyn Repository, user_id: &str) -> Result<OrdersResponse, AppError> {
    let orders = repo.list_orders(user_id).await?;
    Ok(OrdersResponse {
        success: true,
        count: orders.len(),
        orders,
    })
}
