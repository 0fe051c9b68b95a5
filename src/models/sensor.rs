use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SensorCategory {
    Ph,
    Tds,
    Turbidity,
    Chlorine,
    Temperature,
    Conductivity,
    MultiParameter,
}

/// Marketplace listing
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Sensor {
    pub sensor_id: String,
    pub name: String,
    pub description: String,
    pub category: SensorCategory,
    pub manufacturer: String,
    pub price: f64,
    pub stock: u32,
    pub rating: f64,
    pub review_count: u32,
    #[serde(default)]
    pub measures: Vec<String>,
    #[serde(default)]
    pub specifications: BTreeMap<String, String>,
    pub image_url: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Paid,
    Shipped,
    Delivered,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    pub sensor_id: String,
    pub name: String,
    pub unit_price: f64,
    pub quantity: u32,
    pub line_total: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ShippingAddress {
    pub recipient: String,
    pub street: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SensorOrder {
    pub order_id: String,
    pub user_id: String,
    pub items: Vec<OrderItem>,
    pub subtotal: f64,
    pub tax: f64,
    pub shipping: f64,
    pub total: f64,
    pub status: OrderStatus,
    pub shipping_address: Option<ShippingAddress>,
    pub created_at: i64,
}
