use crate::{
    database::Repository,
    models::{
        IncidentType, Report, ReportFilter, ReportLocation, ReportStatus, ReportView, Severity,
        StatusNote, User,
    },
    utils::error::AppError,
};
use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateReportRequest {
    pub title: String,
    pub description: String,
    pub incident_type: IncidentType,
    pub severity: Severity,
    pub location: ReportLocation,
    #[serde(default)]
    pub allow_contact: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReportQuery {
    pub status: Option<ReportStatus>,
    pub incident_type: Option<IncidentType>,
    pub severity: Option<Severity>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReportListResponse {
    pub success: bool,
    pub reports: Vec<ReportView>,
    pub total: u64,
    pub page: u64,
    pub pages: u64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateStatusRequest {
    pub status: ReportStatus,
    pub note: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UpvoteResponse {
    pub success: bool,
    pub upvote_count: usize,
    /// false when this user had already upvoted
    pub counted: bool,
}

fn validate_length(value: &str, field: &str, min: usize, max: usize) -> Result<String, AppError> {
    let trimmed = value.trim();
    let length = trimmed.chars().count();
    if length < min || length > max {
        return Err(AppError::Validation(format!(
            "{} must be between {} and {} characters",
            field, min, max
        )));
    }
    Ok(trimmed.to_string())
}

fn validate_location(location: &ReportLocation) -> Result<(), AppError> {
    if !location.lat.is_finite() || !(-90.0..=90.0).contains(&location.lat) {
        return Err(AppError::Validation("Latitude must be between -90 and 90".to_string()));
    }
    if !location.lng.is_finite() || !(-180.0..=180.0).contains(&location.lng) {
        return Err(AppError::Validation("Longitude must be between -180 and 180".to_string()));
    }
    if let Some(address) = &location.address {
        if address.chars().count() > 300 {
            return Err(AppError::Validation("Address must be at most 300 characters".to_string()));
        }
    }
    Ok(())
}

pub async fn create_report(
    repo: &dyn Repository,
    reporter: &User,
    request: CreateReportRequest,
    now: DateTime<Utc>,
) -> Result<ReportView, AppError> {
    let title = validate_length(&request.title, "Title", 5, 200)?;
    let description = validate_length(&request.description, "Description", 10, 5000)?;
    validate_location(&request.location)?;

    let at = now.timestamp_millis();
    let report = Report {
        report_id: ObjectId::new().to_hex(),
        title,
        description,
        incident_type: request.incident_type,
        severity: request.severity,
        status: ReportStatus::Pending,
        location: request.location,
        reporter_id: Some(reporter.user_id.clone()),
        reporter_name: Some(reporter.name.clone()),
        allow_contact: request.allow_contact,
        upvotes: Vec::new(),
        history: vec![StatusNote {
            status: ReportStatus::Pending,
            note: None,
            changed_by: reporter.user_id.clone(),
            changed_at: at,
        }],
        created_at: at,
        updated_at: at,
    };

    repo.insert_report(&report).await?;
    log::info!(
        "🚨 Report {} filed by {} ({:?}, {:?})",
        report.report_id,
        reporter.user_id,
        report.incident_type,
        report.severity
    );
    Ok(ReportView::from(report))
}

pub async fn list_reports(repo: &dyn Repository, query: &ReportQuery) -> Result<ReportListResponse, AppError> {
    let filter = ReportFilter {
        status: query.status,
        incident_type: query.incident_type,
        severity: query.severity,
        reporter_id: None,
    };
    let limit = query.limit.unwrap_or(20).clamp(1, 100);
    let page = query.page.unwrap_or(1).max(1);
    let skip = (page - 1)
        .checked_mul(limit)
        .filter(|skip| i64::try_from(*skip).is_ok())
        .ok_or_else(|| AppError::Validation(format!("Page {} is out of range", page)))?;

    let (reports, total) = repo
        .list_reports(&filter, skip, Some(limit as i64))
        .await?;

    Ok(ReportListResponse {
        success: true,
        reports: reports.into_iter().map(ReportView::from).collect(),
        total,
        page,
        pages: total.div_ceil(limit),
    })
}

pub async fn get_report(repo: &dyn Repository, report_id: &str) -> Result<Report, AppError> {
    repo.find_report(report_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Report '{}' not found", report_id)))
}

pub async fn update_status(
    repo: &dyn Repository,
    report_id: &str,
    moderator_id: &str,
    request: UpdateStatusRequest,
    now: DateTime<Utc>,
) -> Result<ReportView, AppError> {
    let mut report = get_report(repo, report_id).await?;

    if !report.status.can_transition_to(request.status) {
        return Err(AppError::Validation(format!(
            "Cannot change report status from {:?} to {:?}",
            report.status, request.status
        )));
    }

    let note = match request.note {
        Some(note) => Some(validate_length(&note, "Note", 1, 1000)?),
        None => None,
    };

    let at = now.timestamp_millis();
    report.status = request.status;
    report.history.push(StatusNote {
        status: request.status,
        note,
        changed_by: moderator_id.to_string(),
        changed_at: at,
    });
    report.updated_at = at;
    repo.save_report(&report).await?;

    log::info!("📝 Report {} moved to {:?} by {}", report_id, report.status, moderator_id);
    Ok(ReportView::from(report))
}

pub async fn upvote(
    repo: &dyn Repository,
    report_id: &str,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<UpvoteResponse, AppError> {
    let mut report = get_report(repo, report_id).await?;

    let counted = !report.upvotes.iter().any(|id| id == user_id);
    if counted {
        report.upvotes.push(user_id.to_string());
        report.updated_at = now.timestamp_millis();
        repo.save_report(&report).await?;
    }

    Ok(UpvoteResponse {
        success: true,
        upvote_count: report.upvotes.len(),
        counted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use crate::database::MemoryStore;

    fn reporter() -> User {
        User::new("u1".into(), "r@example.com".into(), "h".into(), "Rita".into(), 0)
    }

    fn request(title: &str, severity: Severity) -> CreateReportRequest {
        CreateReportRequest {
            title: title.to_string(),
            description: "Brown water coming out of every tap since this morning".to_string(),
            incident_type: IncidentType::Discoloration,
            severity,
            location: ReportLocation { lat: 40.7, lng: -74.0, address: None },
            allow_contact: false,
        }
    }

    #[tokio::test]
    async fn test_create_and_list_newest_first() {
        let repo = MemoryStore::new();
        let now = Utc::now();
        create_report(&repo, &reporter(), request("Brown tap water", Severity::Medium), now)
            .await
            .unwrap();
        create_report(&repo, &reporter(), request("Oily film on river", Severity::High), now + Duration::seconds(5))
            .await
            .unwrap();

        let listed = list_reports(&repo, &ReportQuery::default()).await.unwrap();
        assert_eq!(listed.total, 2);
        assert_eq!(listed.reports[0].title, "Oily film on river");
        assert_eq!(listed.reports[0].status, ReportStatus::Pending);

        let high = ReportQuery { severity: Some(Severity::High), ..Default::default() };
        assert_eq!(list_reports(&repo, &high).await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn test_validation() {
        let repo = MemoryStore::new();
        let short = create_report(&repo, &reporter(), request("Hi", Severity::Low), Utc::now()).await;
        assert!(matches!(short, Err(AppError::Validation(_))));

        let mut bad_location = request("Valid title", Severity::Low);
        bad_location.location.lat = 91.0;
        let result = create_report(&repo, &reporter(), bad_location, Utc::now()).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_status_workflow() {
        let repo = MemoryStore::new();
        let now = Utc::now();
        let report = create_report(&repo, &reporter(), request("Chemical smell", Severity::High), now)
            .await
            .unwrap();

        let skip_ahead = UpdateStatusRequest { status: ReportStatus::Resolved, note: None };
        assert!(update_status(&repo, &report.report_id, "mod", skip_ahead, now).await.is_err());

        let investigate = UpdateStatusRequest { status: ReportStatus::Investigating, note: Some("Crew sent".into()) };
        let updated = update_status(&repo, &report.report_id, "mod", investigate, now).await.unwrap();
        assert_eq!(updated.status, ReportStatus::Investigating);
        assert_eq!(updated.history.len(), 2);
        assert_eq!(updated.history[1].note.as_deref(), Some("Crew sent"));
    }

    #[tokio::test]
    async fn test_upvote_is_idempotent() {
        let repo = MemoryStore::new();
        let now = Utc::now();
        let report = create_report(&repo, &reporter(), request("Dead fish upstream", Severity::Critical), now)
            .await
            .unwrap();

        let first = upvote(&repo, &report.report_id, "u2", now).await.unwrap();
        let again = upvote(&repo, &report.report_id, "u2", now).await.unwrap();
        let other = upvote(&repo, &report.report_id, "u3", now).await.unwrap();
        assert!(first.counted);
        assert!(!again.counted);
        assert_eq!(again.upvote_count, 1);
        assert_eq!(other.upvote_count, 2);
    }
}
