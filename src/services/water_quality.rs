// Water quality classification against drinking-water guideline ranges.
// Each metric is rated on its own; the overall status is the worst rating.

use crate::models::{SafetyStatus, WaterMetrics};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MetricIssue {
    pub metric: String,
    pub value: f64,
    pub level: SafetyStatus,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Assessment {
    pub status: SafetyStatus,
    pub issues: Vec<MetricIssue>,
}

impl Assessment {
    pub fn issue_messages(&self) -> Vec<String> {
        self.issues.iter().map(|i| i.message.clone()).collect()
    }
}

pub fn rate_ph(ph: f64) -> SafetyStatus {
    if (6.5..=8.5).contains(&ph) {
        SafetyStatus::Safe
    } else if (6.0..6.5).contains(&ph) || (ph > 8.5 && ph < 9.0) {
        SafetyStatus::Caution
    } else {
        SafetyStatus::Unsafe
    }
}

pub fn rate_tds(tds: f64) -> SafetyStatus {
    upper_bound(tds, 500.0, 1000.0)
}

pub fn rate_turbidity(ntu: f64) -> SafetyStatus {
    upper_bound(ntu, 1.0, 5.0)
}

pub fn rate_chlorine(mg_l: f64) -> SafetyStatus {
    if (0.2..=4.0).contains(&mg_l) {
        SafetyStatus::Safe
    } else if mg_l < 0.2 || mg_l <= 5.0 {
        SafetyStatus::Caution
    } else {
        SafetyStatus::Unsafe
    }
}

pub fn rate_lead(mg_l: f64) -> SafetyStatus {
    if mg_l <= 0.01 {
        SafetyStatus::Safe
    } else {
        SafetyStatus::Unsafe
    }
}

pub fn rate_temperature(celsius: f64) -> SafetyStatus {
    upper_bound(celsius, 25.0, 30.0)
}

fn upper_bound(value: f64, safe_max: f64, caution_max: f64) -> SafetyStatus {
    if value <= safe_max {
        SafetyStatus::Safe
    } else if value <= caution_max {
        SafetyStatus::Caution
    } else {
        SafetyStatus::Unsafe
    }
}

pub fn classify(metrics: &WaterMetrics) -> Assessment {
    let rated: [(&str, Option<f64>, fn(f64) -> SafetyStatus, &str); 6] = [
        ("ph", metrics.ph, rate_ph, "outside the 6.5-8.5 range"),
        ("tds", metrics.tds, rate_tds, "mg/L dissolved solids (guideline 500)"),
        ("turbidity", metrics.turbidity, rate_turbidity, "NTU turbidity (guideline 1)"),
        ("chlorine", metrics.chlorine, rate_chlorine, "mg/L free chlorine (guideline 0.2-4.0)"),
        ("lead", metrics.lead, rate_lead, "mg/L lead (guideline 0.01)"),
        ("temperature", metrics.temperature, rate_temperature, "°C water temperature (guideline 25)"),
    ];

    let mut status = SafetyStatus::Unknown;
    let mut issues = Vec::new();

    for (metric, value, rate, detail) in rated {
        let Some(value) = value else { continue };
        let level = rate(value);
        status = status.max(level);

        if level > SafetyStatus::Safe {
            let message = if metric == "ph" {
                format!("pH {} is {}", value, detail)
            } else {
                format!("{} {}", value, detail)
            };
            issues.push(MetricIssue {
                metric: metric.to_string(),
                value,
                level,
                message,
            });
        }
    }

    Assessment { status, issues }
}
