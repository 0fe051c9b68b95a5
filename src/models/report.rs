use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum IncidentType {
    Contamination,
    Odor,
    Discoloration,
    Taste,
    Illness,
    Infrastructure,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Pending,
    Investigating,
    Resolved,
    Dismissed,
}

impl ReportStatus {
    pub fn can_transition_to(self, next: ReportStatus) -> bool {
        use ReportStatus::*;
        matches!(
            (self, next),
            (Pending, Investigating) | (Pending, Dismissed) | (Investigating, Resolved) | (Investigating, Dismissed)
        )
    }

    pub fn is_open(self) -> bool {
        matches!(self, ReportStatus::Pending | ReportStatus::Investigating)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReportLocation {
    pub lat: f64,
    pub lng: f64,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StatusNote {
    pub status: ReportStatus,
    pub note: Option<String>,
    pub changed_by: String,
    pub changed_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub report_id: String,
    pub title: String,
    pub description: String,
    pub incident_type: IncidentType,
    pub severity: Severity,
    pub status: ReportStatus,
    pub location: ReportLocation,
    /// None once the author deleted their account
    pub reporter_id: Option<String>,
    pub reporter_name: Option<String>,
    #[serde(default)]
    pub allow_contact: bool,
    #[serde(default)]
    pub upvotes: Vec<String>,
    #[serde(default)]
    pub history: Vec<StatusNote>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Public shape of a report; upvoter ids stay server-side
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReportView {
    pub report_id: String,
    pub title: String,
    pub description: String,
    pub incident_type: IncidentType,
    pub severity: Severity,
    pub status: ReportStatus,
    pub location: ReportLocation,
    pub reporter_name: Option<String>,
    pub upvote_count: usize,
    pub history: Vec<StatusNote>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<Report> for ReportView {
    fn from(report: Report) -> Self {
        Self {
            upvote_count: report.upvotes.len(),
            report_id: report.report_id,
            title: report.title,
            description: report.description,
            incident_type: report.incident_type,
            severity: report.severity,
            status: report.status,
            location: report.location,
            reporter_name: report.reporter_name,
            history: report.history,
            created_at: report.created_at,
            updated_at: report.updated_at,
        }
    }
}

/// Listing filter shared by both storage backends
#[derive(Debug, Clone, Default)]
pub struct ReportFilter {
    pub status: Option<ReportStatus>,
    pub incident_type: Option<IncidentType>,
    pub severity: Option<Severity>,
    pub reporter_id: Option<String>,
}

impl ReportFilter {
    pub fn matches(&self, report: &Report) -> bool {
        self.status.map_or(true, |s| report.status == s)
            && self.incident_type.map_or(true, |t| report.incident_type == t)
            && self.severity.map_or(true, |s| report.severity == s)
            && self
                .reporter_id
                .as_ref()
                .map_or(true, |id| report.reporter_id.as_ref() == Some(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions() {
        use ReportStatus::*;
        assert!(Pending.can_transition_to(Investigating));
        assert!(Pending.can_transition_to(Dismissed));
        assert!(Investigating.can_transition_to(Resolved));
        assert!(!Pending.can_transition_to(Resolved));
        assert!(!Resolved.can_transition_to(Investigating));
        assert!(!Dismissed.can_transition_to(Pending));
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::Medium > Severity::Low);
    }
}
