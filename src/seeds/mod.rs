use crate::database::Repository;
use crate::models::{GeoPoint, Reading, SafetyStatus, Sensor, SensorCategory, Station, WaterMetrics};
use crate::services::map_service;
use chrono::{Duration, Utc};
use mongodb::bson::oid::ObjectId;
use std::collections::BTreeMap;

/// Seeds the sensor catalog and monitoring stations on an empty store
pub async fn seed_all(repo: &dyn Repository) {
    seed_sensor_catalog(repo).await;
    seed_stations(repo).await;
}

/// Inserts the default marketplace listings when no sensor exists yet
pub async fn seed_sensor_catalog(repo: &dyn Repository) {
    match repo.list_sensors().await {
        Ok(existing) if !existing.is_empty() => {
            log::info!("🛒 Sensor catalog: {} listings already present, skipping seed", existing.len());
            return;
        }
        Ok(_) => {}
        Err(e) => {
            log::error!("❌ Sensor catalog: could not check existing listings: {}", e);
            return;
        }
    }

    let now = Utc::now().timestamp_millis();
    let sensors = build_default_sensors(now);
    log::info!("🛒 Sensor catalog: seeding {} default listings...", sensors.len());

    let mut inserted = 0;
    for sensor in &sensors {
        match repo.insert_sensor(sensor).await {
            Ok(()) => inserted += 1,
            Err(e) => log::error!("   ❌ Failed to seed sensor {}: {}", sensor.name, e),
        }
    }
    log::info!("   ✅ Inserted {} sensors", inserted);
}

fn specs(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

#[allow(clippy::too_many_arguments)]
fn sensor(
    name: &str,
    description: &str,
    category: SensorCategory,
    manufacturer: &str,
    price: f64,
    stock: u32,
    rating: f64,
    review_count: u32,
    measures: &[&str],
    specifications: BTreeMap<String, String>,
    now: i64,
) -> Sensor {
    Sensor {
        sensor_id: ObjectId::new().to_hex(),
        name: name.into(),
        description: description.into(),
        category,
        manufacturer: manufacturer.into(),
        price,
        stock,
        rating,
        review_count,
        measures: measures.iter().map(|m| m.to_string()).collect(),
        specifications,
        image_url: None,
        created_at: now,
    }
}

fn build_default_sensors(now: i64) -> Vec<Sensor> {
    vec![
        sensor(
            "AquaPro pH Meter",
            "Waterproof digital pH meter with automatic temperature compensation",
            SensorCategory::Ph,
            "AquaPro",
            49.99,
            42,
            4.6,
            128,
            &["ph", "temperature"],
            specs(&[("range", "0.00-14.00 pH"), ("accuracy", "±0.01 pH"), ("battery", "AAA x2")]),
            now,
        ),
        sensor(
            "PureSense TDS Pen",
            "Pocket TDS and conductivity tester for drinking water checks",
            SensorCategory::Tds,
            "PureSense",
            19.99,
            85,
            4.3,
            342,
            &["tds"],
            specs(&[("range", "0-9990 ppm"), ("accuracy", "±2%")]),
            now,
        ),
        sensor(
            "ClearView Turbidimeter",
            "Portable nephelometric turbidity meter for field sampling",
            SensorCategory::Turbidity,
            "ClearView",
            389.00,
            12,
            4.8,
            57,
            &["turbidity"],
            specs(&[("range", "0-1000 NTU"), ("light_source", "infrared LED")]),
            now,
        ),
        sensor(
            "ChlorCheck Photometer",
            "Free and total chlorine photometer with reagent tablets included",
            SensorCategory::Chlorine,
            "HydroLab",
            129.50,
            30,
            4.4,
            89,
            &["chlorine"],
            specs(&[("range", "0.00-5.00 mg/L"), ("method", "DPD")]),
            now,
        ),
        sensor(
            "ThermoProbe Inline",
            "Stainless steel inline temperature probe with 3 m cable",
            SensorCategory::Temperature,
            "HydroLab",
            34.00,
            150,
            4.1,
            64,
            &["temperature"],
            specs(&[("range", "-10 to 100 °C"), ("output", "4-20 mA")]),
            now,
        ),
        sensor(
            "EC Guardian",
            "Continuous conductivity monitor for wells and cisterns",
            SensorCategory::Conductivity,
            "PureSense",
            159.00,
            0,
            3.9,
            21,
            &["conductivity", "tds"],
            specs(&[("range", "0-20 mS/cm"), ("connectivity", "Wi-Fi")]),
            now,
        ),
        sensor(
            "AquaWatch Station Kit",
            "Solar-powered multi-parameter buoy measuring pH, TDS, turbidity and temperature",
            SensorCategory::MultiParameter,
            "AquaWatch",
            1249.00,
            5,
            4.9,
            16,
            &["ph", "tds", "turbidity", "temperature"],
            specs(&[("power", "solar + Li-ion"), ("uplink", "LoRaWAN"), ("interval", "15 min")]),
            now,
        ),
    ]
}

/// Inserts the reference monitoring stations when none exist yet
pub async fn seed_stations(repo: &dyn Repository) {
    match repo.list_stations().await {
        Ok(existing) if !existing.is_empty() => {
            log::info!("🗺️  Stations: {} already present, skipping seed", existing.len());
            return;
        }
        Ok(_) => {}
        Err(e) => {
            log::error!("❌ Stations: could not check existing stations: {}", e);
            return;
        }
    }

    let stations = build_default_stations(Utc::now());
    log::info!("🗺️  Stations: seeding {} monitoring stations...", stations.len());

    for station in &stations {
        if let Err(e) = repo.insert_station(station).await {
            log::error!("   ❌ Failed to seed station {}: {}", station.name, e);
        }
    }
    let flagged = stations.iter().filter(|s| s.status >= SafetyStatus::Caution).count();
    log::info!("   ✅ Stations seeded ({} flagged caution or unsafe)", flagged);
}

fn build_default_stations(now: chrono::DateTime<Utc>) -> Vec<Station> {
    let sites: [(&str, &str, &str, f64, f64, [WaterMetrics; 2]); 5] = [
        (
            "Hudson River - Pier 26",
            "Hudson River",
            "New York",
            40.7222,
            -74.0134,
            [
                WaterMetrics { ph: Some(7.4), tds: Some(310.0), turbidity: Some(0.8), temperature: Some(18.5), ..Default::default() },
                WaterMetrics { ph: Some(7.2), tds: Some(330.0), turbidity: Some(0.9), temperature: Some(19.0), ..Default::default() },
            ],
        ),
        (
            "Central Park Reservoir",
            "Jacqueline Kennedy Onassis Reservoir",
            "New York",
            40.7851,
            -73.9627,
            [
                WaterMetrics { ph: Some(7.8), chlorine: Some(1.2), turbidity: Some(0.4), ..Default::default() },
                WaterMetrics { ph: Some(7.9), chlorine: Some(1.1), turbidity: Some(0.5), ..Default::default() },
            ],
        ),
        (
            "Newtown Creek Outfall",
            "Newtown Creek",
            "New York",
            40.7365,
            -73.9490,
            [
                WaterMetrics { ph: Some(6.9), turbidity: Some(3.2), tds: Some(720.0), ..Default::default() },
                WaterMetrics { ph: Some(6.8), turbidity: Some(4.1), tds: Some(810.0), temperature: Some(22.0), ..Default::default() },
            ],
        ),
        (
            "Passaic River - Newark",
            "Passaic River",
            "New Jersey",
            40.7357,
            -74.1724,
            [
                WaterMetrics { ph: Some(6.4), lead: Some(0.008), turbidity: Some(2.0), ..Default::default() },
                WaterMetrics { ph: Some(5.8), lead: Some(0.018), turbidity: Some(6.5), ..Default::default() },
            ],
        ),
        (
            "Croton Reservoir Intake",
            "New Croton Reservoir",
            "New York",
            41.2262,
            -73.8568,
            [
                WaterMetrics { ph: Some(7.1), tds: Some(120.0), temperature: Some(12.0), ..Default::default() },
                WaterMetrics { ph: Some(7.0), tds: Some(125.0), temperature: Some(12.5), chlorine: Some(0.9), ..Default::default() },
            ],
        ),
    ];

    sites
        .into_iter()
        .map(|(name, water_body, region, lat, lng, metrics)| {
            let readings = metrics
                .into_iter()
                .enumerate()
                .map(|(i, metrics)| Reading {
                    metrics,
                    recorded_at: (now - Duration::hours(6 * (2 - i as i64))).timestamp_millis(),
                    submitted_by: "sensor".to_string(),
                })
                .collect::<Vec<_>>();
            let last_updated = readings.last().map(|r| r.recorded_at);

            let mut station = Station {
                station_id: ObjectId::new().to_hex(),
                name: name.to_string(),
                water_body: water_body.to_string(),
                region: region.to_string(),
                location: GeoPoint { lat, lng },
                readings,
                status: SafetyStatus::Unknown,
                issues: Vec::new(),
                last_updated,
                created_at: now.timestamp_millis(),
            };
            map_service::refresh_status(&mut station);
            station
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let repo = MemoryStore::new();
        seed_all(&repo).await;
        seed_all(&repo).await;

        let sensors = repo.list_sensors().await.unwrap();
        assert_eq!(sensors.len(), build_default_sensors(0).len());
        assert_eq!(repo.list_stations().await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_seeded_stations_are_rated() {
        let repo = MemoryStore::new();
        seed_stations(&repo).await;
        let stations = repo.list_stations().await.unwrap();

        let passaic = stations.iter().find(|s| s.water_body == "Passaic River").unwrap();
        assert_eq!(passaic.status, SafetyStatus::Unsafe);
        assert!(!passaic.issues.is_empty());

        let newtown = stations.iter().find(|s| s.water_body == "Newtown Creek").unwrap();
        assert_eq!(newtown.status, SafetyStatus::Caution);
        assert!(stations.iter().any(|s| s.status == SafetyStatus::Safe));
    }
}
