use crate::{
    database::Repository,
    models::{ReportFilter, ReportStatus, ReportView, SafetyStatus, Severity, Station, WaterMetrics},
    utils::error::AppError,
};
use serde::Serialize;
use std::collections::BTreeMap;
use utoipa::ToSchema;

const RECENT_REPORTS: usize = 5;

#[derive(Debug, Default, Serialize, ToSchema)]
pub struct StationCounts {
    pub total: usize,
    pub safe: usize,
    pub caution: usize,
    pub unsafe_count: usize,
    pub unknown: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReportCounts {
    pub total: u64,
    pub by_status: BTreeMap<String, u64>,
    pub by_severity: BTreeMap<String, u64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardOverview {
    pub success: bool,
    pub stations: StationCounts,
    /// Averages over each station's latest reading
    pub average_metrics: WaterMetrics,
    pub reports: ReportCounts,
    pub recent_reports: Vec<ReportView>,
    pub order_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AlertSource {
    Station,
    Report,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Alert {
    pub source: AlertSource,
    pub id: String,
    pub title: String,
    pub severity: Severity,
    pub details: Vec<String>,
    pub lat: f64,
    pub lng: f64,
    pub at: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AlertsResponse {
    pub success: bool,
    pub alerts: Vec<Alert>,
    pub count: usize,
}

fn count_stations(stations: &[Station]) -> StationCounts {
    let mut counts = StationCounts { total: stations.len(), ..Default::default() };
    for station in stations {
        match station.status {
            SafetyStatus::Safe => counts.safe += 1,
            SafetyStatus::Caution => counts.caution += 1,
            SafetyStatus::Unsafe => counts.unsafe_count += 1,
            SafetyStatus::Unknown => counts.unknown += 1,
        }
    }
    counts
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0u32), |(sum, n), v| (sum + v, n + 1));
    (n > 0).then(|| (sum / n as f64 * 100.0).round() / 100.0)
}

pub fn average_latest_metrics(stations: &[Station]) -> WaterMetrics {
    let latest: Vec<&WaterMetrics> = stations
        .iter()
        .filter_map(|s| s.latest_reading())
        .map(|r| &r.metrics)
        .collect();

    WaterMetrics {
        ph: mean(latest.iter().filter_map(|m| m.ph)),
        tds: mean(latest.iter().filter_map(|m| m.tds)),
        turbidity: mean(latest.iter().filter_map(|m| m.turbidity)),
        chlorine: mean(latest.iter().filter_map(|m| m.chlorine)),
        lead: mean(latest.iter().filter_map(|m| m.lead)),
        temperature: mean(latest.iter().filter_map(|m| m.temperature)),
    }
}

fn label<T: Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}

pub async fn overview(repo: &dyn Repository, user_id: &str) -> Result<DashboardOverview, AppError> {
    let stations = repo.list_stations().await?;
    let (reports, total) = repo.list_reports(&ReportFilter::default(), 0, None).await?;

    let mut by_status = BTreeMap::new();
    let mut by_severity = BTreeMap::new();
    for report in &reports {
        *by_status.entry(label(&report.status)).or_insert(0u64) += 1;
        *by_severity.entry(label(&report.severity)).or_insert(0u64) += 1;
    }

    let recent_reports = reports
        .into_iter()
        .take(RECENT_REPORTS)
        .map(ReportView::from)
        .collect();
    let order_count = repo.list_orders(user_id).await?.len();

    Ok(DashboardOverview {
        success: true,
        stations: count_stations(&stations),
        average_metrics: average_latest_metrics(&stations),
        reports: ReportCounts { total, by_status, by_severity },
        recent_reports,
        order_count,
    })
}

pub async fn alerts(repo: &dyn Repository) -> Result<AlertsResponse, AppError> {
    let mut alerts: Vec<Alert> = repo
        .list_stations()
        .await?
        .into_iter()
        .filter_map(|station| {
            let severity = match station.status {
                SafetyStatus::Unsafe => Severity::Critical,
                SafetyStatus::Caution => Severity::Medium,
                _ => return None,
            };
            Some(Alert {
                source: AlertSource::Station,
                title: format!("{} is {}", station.name, station.status.as_str()),
                severity,
                details: station.issues,
                lat: station.location.lat,
                lng: station.location.lng,
                at: station.last_updated.unwrap_or(station.created_at),
                id: station.station_id,
            })
        })
        .collect();

    let (reports, _) = repo.list_reports(&ReportFilter::default(), 0, None).await?;
    alerts.extend(
        reports
            .into_iter()
            .filter(|r| r.status.is_open() && r.severity >= Severity::High)
            .map(|report| Alert {
                source: AlertSource::Report,
                id: report.report_id,
                title: report.title,
                severity: report.severity,
                details: vec![format!(
                    "Report {}",
                    if report.status == ReportStatus::Pending { "awaiting review" } else { "under investigation" }
                )],
                lat: report.location.lat,
                lng: report.location.lng,
                at: report.created_at,
            }),
    );

    alerts.sort_by(|a, b| b.severity.cmp(&a.severity).then(b.at.cmp(&a.at)));

    Ok(AlertsResponse {
        success: true,
        count: alerts.len(),
        alerts,
    })
}
