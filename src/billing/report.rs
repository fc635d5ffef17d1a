//! Incident reports filed by homeowners

use chrono::Utc;
use tracing::info;

use crate::traits::*;
use crate::types::*;
use crate::utils::validation::validate_report_text;

/// Parameters for filing an incident report
#[derive(Debug, Clone)]
pub struct NewReport {
    pub user_id: String,
    pub title: String,
    pub description: String,
    pub image_url: Option<String>,
    pub report_type: Option<String>,
}

pub struct ReportManager<S: BillingStorage> {
    storage: S,
}

impl<S: BillingStorage> ReportManager<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// File a new open report
    pub async fn file_report(&self, report: NewReport) -> BillingResult<IncidentReport> {
        validate_report_text(&report.title, &report.description)?;

        if self.storage.find_user(&report.user_id).await?.is_none() {
            return Err(BillingError::not_found(EntityKind::User, &report.user_id));
        }

        let report = IncidentReport {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: report.user_id,
            title: report.title.trim().to_string(),
            description: report.description.trim().to_string(),
            image_url: report.image_url.filter(|url| !url.trim().is_empty()),
            report_type: report.report_type,
            status: ReportStatus::Open,
            created_at: Utc::now(),
        };

        self.storage.save_report(&report).await?;

        info!(report_id = %report.id, user_id = %report.user_id, "Incident report filed");
        Ok(report)
    }

    /// Reports of one type (or all), newest first
    pub async fn list_reports(&self, report_type: Option<&str>) -> BillingResult<Vec<IncidentReport>> {
        let mut reports = self.storage.list_reports(report_type).await?;
        reports.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(reports)
    }

    /// Mark a report as handled
    pub async fn close_report(&self, report_id: &str) -> BillingResult<()> {
        self.storage
            .update_report_status(report_id, ReportStatus::Closed)
            .await
    }
}
