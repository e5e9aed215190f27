use crate::error::EngineError;
use crate::notifier::{reset_notifications, Notifier};
use crate::reconciler::OrderReconciler;
use alerter::MessageSink;
use api_client::{RateCache, RateProvider, RateSnapshot, TabularSource};
use configuration::{JobKind, RateConfig};
use core_types::{NotifyResult, SyncResult};
use database::OrderStore;
use std::sync::Arc;

/// What a single job run produced.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    RateRefreshed(RateSnapshot),
    Synced(SyncResult),
    Notified(NotifyResult),
    Reset(u64),
}

/// Fetches the latest rate from `provider` into `rates` and logs it.
/// On failure the previously cached value is kept.
pub async fn refresh_rate(
    rates: &RateCache,
    provider: &dyn RateProvider,
    pair: &RateConfig,
) -> Result<RateSnapshot, EngineError> {
    let snapshot = rates.refresh(provider).await.map_err(EngineError::from_rate)?;
    tracing::info!(
        "current exchange rate: {} {} in 1 {}",
        snapshot.rate,
        pair.local_currency,
        pair.foreign_currency
    );
    Ok(snapshot)
}

/// Owns every collaborator the jobs need and runs any of them on demand.
///
/// Jobs share nothing but the store and the rate cache, so the runner can be
/// wrapped in an `Arc` and driven from several scheduler tasks at once.
pub struct JobRunner {
    reconciler: OrderReconciler,
    notifier: Notifier,
    rate_provider: Arc<dyn RateProvider>,
    rates: RateCache,
    store: Arc<dyn OrderStore>,
    sheet_name: String,
    pair: RateConfig,
}

impl JobRunner {
    pub fn new(
        store: Arc<dyn OrderStore>,
        source: Arc<dyn TabularSource>,
        rate_provider: Arc<dyn RateProvider>,
        sink: Arc<dyn MessageSink>,
        sheet_name: impl Into<String>,
        rate_config: &RateConfig,
    ) -> Self {
        let rates = RateCache::new();
        Self {
            reconciler: OrderReconciler::new(source, rates.clone(), store.clone()),
            notifier: Notifier::new(store.clone(), sink),
            rate_provider,
            rates,
            store,
            sheet_name: sheet_name.into(),
            pair: rate_config.clone(),
        }
    }

    /// Refreshes the cache the reconciler reads its rate snapshot from.
    pub async fn refresh_rate(&self) -> Result<RateSnapshot, EngineError> {
        refresh_rate(&self.rates, self.rate_provider.as_ref(), &self.pair).await
    }

    pub async fn run(&self, job: JobKind) -> Result<JobOutcome, EngineError> {
        match job {
            JobKind::RefreshRate => self.refresh_rate().await.map(JobOutcome::RateRefreshed),
            JobKind::Sync => self.reconciler.synchronize(&self.sheet_name).await.map(JobOutcome::Synced),
            JobKind::Notify => self.notifier.notify_expired().await.map(JobOutcome::Notified),
            JobKind::Reset => reset_notifications(self.store.as_ref()).await.map(JobOutcome::Reset),
        }
    }

    /// Runs `job` and logs its failure instead of returning it; the scheduler
    /// simply tries again on the next tick.
    pub async fn run_logged(&self, job: JobKind) -> Option<JobOutcome> {
        match self.run(job).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                tracing::error!(job = job.name(), error = %e, "Job failed.");
                None
            }
        }
    }
}
