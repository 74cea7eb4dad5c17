use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{error, info, warn};

pub mod tasks;

/// Job scheduler for background tasks
pub struct JobScheduler {
    context: Arc<crate::context::AppContext>,
}

impl JobScheduler {
    pub fn new(context: Arc<crate::context::AppContext>) -> Self {
        Self { context }
    }

    /// Start all background jobs
    pub fn start(self: Arc<Self>) {
        info!("Starting background job scheduler");

        tokio::spawn(Self::expired_session_cleanup_job(Arc::clone(&self)));
        tokio::spawn(Self::household_audit_job(Arc::clone(&self)));
        tokio::spawn(Self::health_check_job(Arc::clone(&self)));

        info!("Background jobs started");
    }

    /// Cleanup expired sessions (runs every hour)
    async fn expired_session_cleanup_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(3600));

        loop {
            interval.tick().await;

            if let Err(e) = tasks::cleanup_expired_sessions(&scheduler.context).await {
                error!("Failed to cleanup expired sessions: {}", e);
            }
        }
    }

    /// Report households whose members drifted apart (runs every 6 hours)
    async fn household_audit_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(21600));

        loop {
            interval.tick().await;

            match tasks::audit_household_consistency(&scheduler.context).await {
                Ok(0) => info!("Household audit: all households consistent"),
                Ok(count) => warn!(count, "Household audit found inconsistent households"),
                Err(e) => error!("Household audit failed: {}", e),
            }
        }
    }

    /// Health check job (runs every 5 minutes)
    async fn health_check_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(300));

        loop {
            interval.tick().await;

            if let Err(e) = tasks::health_check(&scheduler.context).await {
                error!("Health check failed: {}", e);
            }
        }
    }
}
