use crate::{
    database::Repository,
    models::{Reading, SafetyStatus, Station, StationSummary, WaterMetrics, MAX_READINGS_PER_STATION},
    services::water_quality::{self, Assessment},
    utils::error::AppError,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Default, Deserialize)]
pub struct StationQuery {
    pub min_lat: Option<f64>,
    pub max_lat: Option<f64>,
    pub min_lng: Option<f64>,
    pub max_lng: Option<f64>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl BoundingBox {
    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        (self.min_lat..=self.max_lat).contains(&lat) && (self.min_lng..=self.max_lng).contains(&lng)
    }
}

impl StationQuery {
    /// All four corners or none
    pub fn bounding_box(&self) -> Result<Option<BoundingBox>, AppError> {
        match (self.min_lat, self.max_lat, self.min_lng, self.max_lng) {
            (None, None, None, None) => Ok(None),
            (Some(min_lat), Some(max_lat), Some(min_lng), Some(max_lng)) => {
                if min_lat > max_lat || min_lng > max_lng {
                    return Err(AppError::Validation(
                        "Bounding box minimums must not exceed maximums".to_string(),
                    ));
                }
                Ok(Some(BoundingBox { min_lat, max_lat, min_lng, max_lng }))
            }
            _ => Err(AppError::Validation(
                "Bounding box requires min_lat, max_lat, min_lng and max_lng".to_string(),
            )),
        }
    }

    pub fn status_filter(&self) -> Result<Option<SafetyStatus>, AppError> {
        self.status
            .as_deref()
            .map(|s| {
                SafetyStatus::parse(s)
                    .ok_or_else(|| AppError::Validation(format!("Invalid status '{}'", s)))
            })
            .transpose()
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StationsResponse {
    pub success: bool,
    pub stations: Vec<StationSummary>,
    pub count: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HeatPoint {
    pub lat: f64,
    pub lng: f64,
    pub weight: f64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitReadingRequest {
    pub metrics: WaterMetrics,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SubmitReadingResponse {
    pub success: bool,
    pub station: StationSummary,
    pub assessment: Assessment,
}

fn validate_metrics(metrics: &WaterMetrics) -> Result<(), AppError> {
    if metrics.is_empty() {
        return Err(AppError::Validation("Reading must include at least one metric".to_string()));
    }
    let ranges: [(&str, Option<f64>, f64, f64); 6] = [
        ("ph", metrics.ph, 0.0, 14.0),
        ("tds", metrics.tds, 0.0, 100_000.0),
        ("turbidity", metrics.turbidity, 0.0, 10_000.0),
        ("chlorine", metrics.chlorine, 0.0, 100.0),
        ("lead", metrics.lead, 0.0, 100.0),
        ("temperature", metrics.temperature, -5.0, 100.0),
    ];
    for (name, value, min, max) in ranges {
        if let Some(v) = value {
            if !v.is_finite() || v < min || v > max {
                return Err(AppError::Validation(format!(
                    "{} must be between {} and {}",
                    name, min, max
                )));
            }
        }
    }
    Ok(())
}

/// Re-rates a station from its latest reading
pub fn refresh_status(station: &mut Station) -> Assessment {
    let assessment = station
        .latest_reading()
        .map(|r| water_quality::classify(&r.metrics))
        .unwrap_or(Assessment { status: SafetyStatus::Unknown, issues: Vec::new() });
    station.status = assessment.status;
    station.issues = assessment.issue_messages();
    assessment
}

pub async fn list_stations(repo: &dyn Repository, query: &StationQuery) -> Result<StationsResponse, AppError> {
    let bbox = query.bounding_box()?;
    let status = query.status_filter()?;

    let stations: Vec<StationSummary> = repo
        .list_stations()
        .await?
        .iter()
        .filter(|s| bbox.map_or(true, |b| b.contains(s.location.lat, s.location.lng)))
        .filter(|s| status.map_or(true, |st| s.status == st))
        .map(StationSummary::from)
        .collect();

    Ok(StationsResponse {
        success: true,
        count: stations.len(),
        stations,
    })
}

pub async fn get_station(repo: &dyn Repository, station_id: &str) -> Result<Station, AppError> {
    repo.find_station(station_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Station '{}' not found", station_id)))
}

pub async fn heatmap(repo: &dyn Repository) -> Result<Vec<HeatPoint>, AppError> {
    Ok(repo
        .list_stations()
        .await?
        .iter()
        .filter(|s| s.status != SafetyStatus::Unknown)
        .map(|s| HeatPoint {
            lat: s.location.lat,
            lng: s.location.lng,
            weight: s.status.heat_weight(),
        })
        .collect())
}

pub async fn submit_reading(
    repo: &dyn Repository,
    station_id: &str,
    submitted_by: &str,
    request: SubmitReadingRequest,
    now: DateTime<Utc>,
) -> Result<SubmitReadingResponse, AppError> {
    validate_metrics(&request.metrics)?;
    let mut station = get_station(repo, station_id).await?;

    station.readings.push(Reading {
        metrics: request.metrics,
        recorded_at: now.timestamp_millis(),
        submitted_by: submitted_by.to_string(),
    });
    if station.readings.len() > MAX_READINGS_PER_STATION {
        let excess = station.readings.len() - MAX_READINGS_PER_STATION;
        station.readings.drain(..excess);
    }

    let previous = station.status;
    let assessment = refresh_status(&mut station);
    station.last_updated = Some(now.timestamp_millis());
    repo.save_station(&station).await?;

    if assessment.status != previous {
        log::info!(
            "🗺️  Station {} status changed: {} -> {}",
            station.station_id,
            previous.as_str(),
            assessment.status.as_str()
        );
    }

    Ok(SubmitReadingResponse {
        success: true,
        station: StationSummary::from(&station),
        assessment,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use crate::seeds;

    #[test]
    fn test_bounding_box_must_be_complete() {
        let partial = StationQuery { min_lat: Some(1.0), ..Default::default() };
        assert!(partial.bounding_box().is_err());

        let inverted = StationQuery {
            min_lat: Some(10.0),
            max_lat: Some(0.0),
            min_lng: Some(0.0),
            max_lng: Some(1.0),
            status: None,
        };
        assert!(inverted.bounding_box().is_err());
        assert!(StationQuery::default().bounding_box().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reading_updates_status() {
        let repo = MemoryStore::new();
        seeds::seed_stations(&repo).await;
        let station = repo.list_stations().await.unwrap().remove(0);

        let request = SubmitReadingRequest {
            metrics: WaterMetrics { lead: Some(0.05), ph: Some(7.0), ..Default::default() },
        };
        let response = submit_reading(&repo, &station.station_id, "u1", request, Utc::now())
            .await
            .unwrap();
        assert_eq!(response.assessment.status, SafetyStatus::Unsafe);

        let stored = repo.find_station(&station.station_id).await.unwrap().unwrap();
        assert_eq!(stored.status, SafetyStatus::Unsafe);
        assert_eq!(stored.readings.last().unwrap().submitted_by, "u1");

        let unsafe_only = StationQuery { status: Some("unsafe".into()), ..Default::default() };
        let listed = list_stations(&repo, &unsafe_only).await.unwrap();
        assert!(listed.stations.iter().any(|s| s.station_id == station.station_id));
    }

    #[tokio::test]
    async fn test_reading_history_is_capped() {
        let repo = MemoryStore::new();
        seeds::seed_stations(&repo).await;
        let station_id = repo.list_stations().await.unwrap()[0].station_id.clone();

        for i in 0..(MAX_READINGS_PER_STATION + 5) {
            let request = SubmitReadingRequest {
                metrics: WaterMetrics { temperature: Some(10.0 + (i % 10) as f64), ..Default::default() },
            };
            submit_reading(&repo, &station_id, "sensor", request, Utc::now()).await.unwrap();
        }
        let stored = repo.find_station(&station_id).await.unwrap().unwrap();
        assert_eq!(stored.readings.len(), MAX_READINGS_PER_STATION);
    }

    #[tokio::test]
    async fn test_out_of_range_reading_rejected() {
        let repo = MemoryStore::new();
        seeds::seed_stations(&repo).await;
        let station_id = repo.list_stations().await.unwrap()[0].station_id.clone();

        let request = SubmitReadingRequest { metrics: WaterMetrics { ph: Some(15.0), ..Default::default() } };
        let result = submit_reading(&repo, &station_id, "u1", request, Utc::now()).await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let empty = SubmitReadingRequest { metrics: WaterMetrics::default() };
        assert!(submit_reading(&repo, &station_id, "u1", empty, Utc::now()).await.is_err());
    }
}
