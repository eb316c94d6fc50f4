//! HTTP front end.
//!
//! - `POST /api/v1/discharge/verify` with `{"patient_id": "..."}` runs one
//!   discharge and answers with the outcome, alert counts by severity and
//!   escalation counts by department.
//! - `GET /api/v1/health` returns build metadata.
//!
//! Each request runs on the blocking pool through [`run_discharge`], exactly
//! as the CLI does. If the client goes away mid-run the run is cancelled.

use crate::config::{ConfigError, DischargeConfig};
use crate::engine::decision::{Outcome, RemediationItem};
use crate::engine::finding::{Severity, Source};
use crate::engine::runner::CancelFlag;
use crate::persist::escalation::Department;
use crate::persist::DecisionRecord;
use crate::version::BuildInfo;
use crate::{run_discharge, DischargeError};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

pub const VERIFY_PATH: &str = "/api/v1/discharge/verify";
pub const HEALTH_PATH: &str = "/api/v1/health";

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyRequest {
    pub patient_id: String,
}

/// Issues of a run by effective severity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AlertsCount {
    pub total: usize,
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

/// Issues of a run by the department they are escalated to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EscalationCounts {
    pub lab: usize,
    pub pharmacy: usize,
    pub billing: usize,
    pub transport: usize,
    pub insurance: usize,
    pub general: usize,
}

impl EscalationCounts {
    fn record(&mut self, department: Department) {
        let slot = match department {
            Department::LabPortal => &mut self.lab,
            Department::PharmacyPortal => &mut self.pharmacy,
            Department::BillingPortal => &mut self.billing,
            Department::TransportServices => &mut self.transport,
            Department::InsuranceDesk => &mut self.insurance,
            Department::GeneralOperations => &mut self.general,
        };
        *slot += 1;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifyDetails {
    pub approved_by: Vec<Source>,
    pub blocked_by: Vec<Source>,
    /// Remediation items the hospital systems can clear on their own
    pub suggested_auto_resolutions: Vec<RemediationItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifyResponse {
    pub patient_id: String,
    pub status: Outcome,
    pub approved: bool,
    pub timestamp: DateTime<Utc>,
    pub summary: String,
    pub alerts_count: AlertsCount,
    pub escalations: EscalationCounts,
    pub details: VerifyDetails,
}

impl VerifyResponse {
    pub fn from_record(record: &DecisionRecord) -> Self {
        let mut alerts_count = AlertsCount::default();
        let mut escalations = EscalationCounts::default();

        for issue in record.all_issues() {
            alerts_count.total += 1;
            match issue.severity {
                Severity::Critical => alerts_count.critical += 1,
                Severity::High => alerts_count.high += 1,
                Severity::Medium => alerts_count.medium += 1,
                Severity::Low => alerts_count.low += 1,
                Severity::None => {}
            }
            escalations.record(Department::for_code(&issue.code));
        }

        VerifyResponse {
            patient_id: record.patient_id.clone(),
            status: record.outcome,
            approved: record.approved,
            timestamp: record.decided_at,
            summary: record.summary.plain_text.clone(),
            alerts_count,
            escalations,
            details: VerifyDetails {
                approved_by: record.approved_by.clone(),
                blocked_by: record.blocked_by.clone(),
                suggested_auto_resolutions: record
                    .remediation_items
                    .iter()
                    .filter(|item| item.auto_resolvable)
                    .cloned()
                    .collect(),
            },
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Discharge(#[from] DischargeError),

    #[error("discharge worker failed: {0}")]
    Worker(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Discharge(DischargeError::InvalidPatientId(_)) => StatusCode::BAD_REQUEST,
            ApiError::Discharge(DischargeError::Cancelled { .. }) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Discharge(_) | ApiError::Worker(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Only client errors carry their message; the rest stay in the log.
        let message = if status.is_client_error() {
            self.to_string()
        } else {
            error!(error = %self, "discharge request failed");
            "discharge verification failed".to_string()
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone)]
pub struct AppState {
    config: Arc<DischargeConfig>,
}

/// Cancels the run when the request future is dropped.
struct CancelOnDrop(CancelFlag);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

pub fn router(config: DischargeConfig) -> Router {
    Router::new()
        .route(VERIFY_PATH, post(verify))
        .route(HEALTH_PATH, get(health))
        .with_state(AppState {
            config: Arc::new(config),
        })
}

pub async fn verify(
    State(state): State<AppState>,
    Json(request): Json<VerifyRequest>,
) -> Result<Json<VerifyResponse>, ApiError> {
    info!(patient_id = %request.patient_id, "discharge verification requested");

    let cancel = CancelFlag::new();
    let _guard = CancelOnDrop(cancel.clone());
    let config = Arc::clone(&state.config);

    let run = tokio::task::spawn_blocking(move || {
        run_discharge(&config, &request.patient_id, &cancel)
    })
    .await
    .map_err(|e| ApiError::Worker(e.to_string()))??;

    Ok(Json(VerifyResponse::from_record(&DecisionRecord::from_run(
        &run,
    ))))
}

pub async fn health() -> Json<BuildInfo> {
    Json(BuildInfo::current())
}

/// Serve on `config.listen` until the server fails.
pub async fn serve(config: DischargeConfig) -> Result<(), ServeError> {
    let addr = config.listen;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServeError::Bind { addr, source })?;
    serve_on(listener, config).await
}

/// Serve on an already bound listener.
pub async fn serve_on(listener: TcpListener, config: DischargeConfig) -> Result<(), ServeError> {
    config.validate()?;
    info!(
        addr = %listener.local_addr()?,
        version = %BuildInfo::current().short(),
        "discharge service listening"
    );
    axum::serve(listener, router(config)).await?;
    Ok(())
}
