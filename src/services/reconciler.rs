//! Status reconciler
//!
//! Periodically recomputes each open project's status and writes back only
//! real divergences. The write is conditional on the stored status and on the
//! project not being cancelled, so a concurrent cancellation always wins. The
//! same loop sweeps anonymous signups whose confirmation token expired.

use std::sync::Arc;
use std::time::Duration;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use crate::database::VolunteerStore;
use crate::models::Project;
use crate::services::capacity::{CapacityLedger, ReleaseReason};
use crate::services::confirmation::ConfirmationService;
use crate::services::status::derive_project_status;
use crate::utils::errors::Result;
use crate::utils::logging::log_reconciliation;

/// What one reconciliation pass did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub examined: usize,
    pub updated: usize,
    pub skipped: usize,
    pub expired_signups: usize,
}

pub struct StatusReconciler {
    store: Arc<dyn VolunteerStore>,
    ledger: CapacityLedger,
    confirmation: ConfirmationService,
    interval: Duration,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl StatusReconciler {
    pub fn new(store: Arc<dyn VolunteerStore>, confirmation: ConfirmationService, interval: Duration) -> Self {
        Self {
            ledger: CapacityLedger::new(store.clone()),
            store,
            confirmation,
            interval,
            handle: None,
        }
    }

    fn worker(&self) -> Self {
        Self {
            store: self.store.clone(),
            ledger: self.ledger.clone(),
            confirmation: self.confirmation.clone(),
            interval: self.interval,
            handle: None,
        }
    }

    /// Write back the derived status of one project if it diverged.
    /// Returns whether a row changed.
    pub async fn reconcile_project(&self, project: &Project, now: DateTime<Utc>) -> Result<bool> {
        let derived = derive_project_status(project, now);
        if derived == project.status {
            return Ok(false);
        }

        let written = self.store.update_project_status(project.id, project.status, derived).await?;
        log_reconciliation(project.id, project.status.as_str(), derived.as_str(), written);
        Ok(written)
    }

    /// One pass over every project whose status can still move
    pub async fn reconcile_once(&self, now: DateTime<Utc>) -> Result<ReconcileReport> {
        let projects = self.store.list_reconcilable_projects().await?;
        let mut report = ReconcileReport {
            examined: projects.len(),
            ..ReconcileReport::default()
        };

        for project in &projects {
            match self.reconcile_project(project, now).await {
                Ok(true) => report.updated += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    warn!(project_id = %project.id, error = %e, "Failed to reconcile project");
                    report.skipped += 1;
                }
            }
        }

        debug!(examined = report.examined, updated = report.updated, "Reconciliation pass finished");
        Ok(report)
    }

    /// Delete unconfirmed anonymous signups whose token outlived its TTL
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let stale = self
            .store
            .list_stale_anonymous_signups(self.confirmation.expiry_cutoff(now))
            .await?;

        let mut expired = 0;
        for anonymous in stale {
            if self.ledger.release(anonymous.signup_id, ReleaseReason::Expired).await?.is_some() {
                info!(anonymous_signup_id = %anonymous.id, signup_id = %anonymous.signup_id, "Expired unconfirmed signup removed");
                expired += 1;
            }
        }

        Ok(expired)
    }

    /// Reconcile statuses and sweep expired tokens
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> Result<ReconcileReport> {
        let mut report = self.reconcile_once(now).await?;
        report.expired_signups = self.sweep_expired(now).await?;
        Ok(report)
    }

    /// Start the periodic reconciliation task
    pub fn start(&mut self) {
        if self.handle.is_some() {
            warn!("Reconciler task is already running");
            return;
        }

        let worker = self.worker();
        let interval = self.interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);

            loop {
                ticker.tick().await;

                match worker.run_cycle(Utc::now()).await {
                    Ok(report) => {
                        if report.updated > 0 || report.expired_signups > 0 {
                            info!(updated = report.updated, expired_signups = report.expired_signups, "Reconciler cycle applied changes");
                        }
                    }
                    Err(e) => {
                        error!("Reconciler cycle failed: {}", e);
                    }
                }
            }
        });

        self.handle = Some(handle);
        info!("Started reconciler task with interval {:?}", self.interval);
    }

    /// Stop the periodic reconciliation task
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            info!("Stopped reconciler task");
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }
}

impl Drop for StatusReconciler {
    fn drop(&mut self) {
        self.stop();
    }
}
