use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::EngineError;
use crate::metrics::ANALYTICS_TASKS_TOTAL;
use crate::services::advice_service::AdviceService;
use crate::services::event_queue::{AnalyticsEvent, EventQueue};
use crate::services::statistics_service::StatisticsService;
use crate::utils::retry::{retry_async_with_config, RetryConfig};

/// Consumes analytics events. A failing event is retried, then logged and
/// dropped; it never stops the loop.
pub struct AnalyticsWorker {
    queue: Arc<dyn EventQueue>,
    advice: AdviceService,
    statistics: StatisticsService,
    retry: RetryConfig,
    idle_interval: Duration,
}

impl AnalyticsWorker {
    pub fn new(
        queue: Arc<dyn EventQueue>,
        advice: AdviceService,
        statistics: StatisticsService,
    ) -> Self {
        Self {
            queue,
            advice,
            statistics,
            retry: RetryConfig::default(),
            idle_interval: Duration::from_millis(500),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_idle_interval(mut self, idle_interval: Duration) -> Self {
        self.idle_interval = idle_interval;
        self
    }

    pub async fn run(&self) -> anyhow::Result<()> {
        info!(
            "Starting analytics worker loop (idle interval {}ms)",
            self.idle_interval.as_millis()
        );

        loop {
            match self.run_once().await {
                Ok(0) => sleep(self.idle_interval).await,
                Ok(processed) => {
                    info!(processed, "Analytics worker drained queue");
                }
                Err(err) => {
                    warn!(error = %err, "Analytics queue unavailable");
                    sleep(self.idle_interval).await;
                }
            }
        }
    }

    /// Handles every event currently queued and returns how many were taken.
    pub async fn run_once(&self) -> anyhow::Result<usize> {
        let mut processed = 0;
        while let Some(event) = self.queue.next().await? {
            self.handle(event).await;
            processed += 1;
        }
        Ok(processed)
    }

    async fn handle(&self, event: AnalyticsEvent) {
        let kind = event.kind();
        let result =
            retry_async_with_config(self.retry.clone(), kind, || self.dispatch(&event)).await;

        match result {
            Ok(()) => {
                ANALYTICS_TASKS_TOTAL
                    .with_label_values(&[kind, "success"])
                    .inc();
            }
            Err(err) => {
                ANALYTICS_TASKS_TOTAL
                    .with_label_values(&[kind, "failed"])
                    .inc();
                warn!(error = %err, event = ?event, "Analytics task failed");
            }
        }
    }

    async fn dispatch(&self, event: &AnalyticsEvent) -> Result<(), EngineError> {
        match event {
            AnalyticsEvent::GenerateAdvice { history_id, .. } => {
                self.advice.generate_for_history(history_id).await?;
            }
            AnalyticsEvent::UpdateStatistics { user_id } => {
                self.statistics.refresh(user_id).await?;
            }
        }
        Ok(())
    }
}
