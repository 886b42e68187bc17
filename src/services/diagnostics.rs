//! Backend probes for `--diagnose` and `/readyz`.

use super::AppContext;
use crate::{deployment::RemotePath, storage::StorageResult};
use serde::Serialize;
use std::{future::Future, time::Instant};

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProbeStatus {
    /// Not configured for this deployment.
    Disabled,
    Ok { latency_ms: u64 },
    Failed { error: String },
}

impl ProbeStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, ProbeStatus::Failed { .. })
    }
}

#[derive(Serialize, Clone, Debug)]
pub struct DiagnosticsReport {
    pub remote_path: RemotePath,
    pub remote: ProbeStatus,
    pub gateway: ProbeStatus,
    pub local: ProbeStatus,
}

impl DiagnosticsReport {
    /// Disabled backends don't count against health; the local store must work.
    pub fn healthy(&self) -> bool {
        !self.remote.is_failed()
            && !self.gateway.is_failed()
            && matches!(self.local, ProbeStatus::Ok { .. })
    }
}

async fn timed<F>(probe: F) -> ProbeStatus
where
    F: Future<Output = StorageResult<()>>,
{
    let start = Instant::now();
    match probe.await {
        Ok(()) => ProbeStatus::Ok {
            latency_ms: start.elapsed().as_millis() as u64,
        },
        Err(err) if err.is_disabled() => ProbeStatus::Disabled,
        Err(err) => ProbeStatus::Failed {
            error: err.to_string(),
        },
    }
}

pub async fn run(ctx: &AppContext) -> DiagnosticsReport {
    let remote = timed(ctx.direct("ping", |r| r.ping())).await;
    let gateway = timed(ctx.via_gateway("health", |g| g.health())).await;
    let local = timed(ctx.local.probe()).await;

    DiagnosticsReport {
        remote_path: ctx.remote_path,
        remote,
        gateway,
        local,
    }
}
