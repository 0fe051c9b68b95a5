use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Keep at most this many readings per station (oldest dropped first)
pub const MAX_READINGS_PER_STATION: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SafetyStatus {
    Unknown,
    Safe,
    Caution,
    Unsafe,
}

impl SafetyStatus {
    pub fn heat_weight(self) -> f64 {
        match self {
            SafetyStatus::Unknown | SafetyStatus::Safe => 0.0,
            SafetyStatus::Caution => 0.5,
            SafetyStatus::Unsafe => 1.0,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "unknown" => Some(SafetyStatus::Unknown),
            "safe" => Some(SafetyStatus::Safe),
            "caution" => Some(SafetyStatus::Caution),
            "unsafe" => Some(SafetyStatus::Unsafe),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SafetyStatus::Unknown => "unknown",
            SafetyStatus::Safe => "safe",
            SafetyStatus::Caution => "caution",
            SafetyStatus::Unsafe => "unsafe",
        }
    }
}

/// One set of water measurements; every metric is optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct WaterMetrics {
    pub ph: Option<f64>,
    /// Total dissolved solids, mg/L
    pub tds: Option<f64>,
    /// NTU
    pub turbidity: Option<f64>,
    /// Free chlorine, mg/L
    pub chlorine: Option<f64>,
    /// mg/L
    pub lead: Option<f64>,
    /// °C
    pub temperature: Option<f64>,
}

impl WaterMetrics {
    pub fn is_empty(&self) -> bool {
        self.ph.is_none()
            && self.tds.is_none()
            && self.turbidity.is_none()
            && self.chlorine.is_none()
            && self.lead.is_none()
            && self.temperature.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Reading {
    pub metrics: WaterMetrics,
    pub recorded_at: i64,
    /// user_id of the submitter, or "sensor" for seeded/automatic readings
    pub submitted_by: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Station {
    pub station_id: String,
    pub name: String,
    pub water_body: String,
    pub region: String,
    pub location: GeoPoint,
    #[serde(default)]
    pub readings: Vec<Reading>,
    pub status: SafetyStatus,
    #[serde(default)]
    pub issues: Vec<String>,
    pub last_updated: Option<i64>,
    pub created_at: i64,
}

impl Station {
    pub fn latest_reading(&self) -> Option<&Reading> {
        self.readings.last()
    }
}

/// Station without its reading history, for list/map payloads
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StationSummary {
    pub station_id: String,
    pub name: String,
    pub water_body: String,
    pub region: String,
    pub location: GeoPoint,
    pub status: SafetyStatus,
    pub issues: Vec<String>,
    pub latest: Option<Reading>,
    pub reading_count: usize,
    pub last_updated: Option<i64>,
}

impl From<&Station> for StationSummary {
    fn from(station: &Station) -> Self {
        Self {
            station_id: station.station_id.clone(),
            name: station.name.clone(),
            water_body: station.water_body.clone(),
            region: station.region.clone(),
            location: station.location,
            status: station.status,
            issues: station.issues.clone(),
            latest: station.latest_reading().cloned(),
            reading_count: station.readings.len(),
            last_updated: station.last_updated,
        }
    }
}
