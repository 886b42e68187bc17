//! Health & readiness handlers.
//!
//! - GET /healthz  -> simple liveness ("ok")
//! - GET /readyz   -> readiness that probes the datastore and the local store

use super::GatewayState;
use crate::services::diagnostics::{self, ProbeStatus};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::collections::HashMap;

/// `GET /healthz`
///
/// Very small liveness probe, always 200 OK. Performs no I/O.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
        }),
    )
}

/// `GET /readyz`
///
/// The gateway exists to front the datastore, so a disabled datastore is not
/// ready here even though it is healthy for `--diagnose`. HTTP 200 when all
/// checks pass, HTTP 503 otherwise.
pub async fn readyz(State(state): State<GatewayState>) -> impl IntoResponse {
    let report = diagnostics::run(&state.ctx).await;

    let mut checks = HashMap::new();
    checks.insert("datastore", CheckStatus::from(&report.remote));
    checks.insert("local", CheckStatus::from(&report.local));
    let overall_ok = checks.values().all(|check| check.ok);

    let body = ReadyResponse {
        status: if overall_ok {
            "ok".into()
        } else {
            "error".into()
        },
        checks,
    };

    let status = if overall_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    checks: HashMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}

impl From<&ProbeStatus> for CheckStatus {
    fn from(probe: &ProbeStatus) -> Self {
        match probe {
            ProbeStatus::Ok { .. } => CheckStatus {
                ok: true,
                error: None,
            },
            ProbeStatus::Disabled => CheckStatus {
                ok: false,
                error: Some("not configured".into()),
            },
            ProbeStatus::Failed { error } => CheckStatus {
                ok: false,
                error: Some(error.clone()),
            },
        }
    }
}
