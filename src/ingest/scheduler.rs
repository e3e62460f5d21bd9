// src/ingest/scheduler.rs
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use metrics::gauge;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::pipeline::{ensure_metrics_described, today_string, FetchPipeline};

const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// A background loop that calls `tick` every `interval`, first call immediate.
///
/// Dropping the handle without `stop()` leaves the loop running.
pub struct RecurringTask {
    name: &'static str,
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl RecurringTask {
    pub fn spawn<F, Fut>(name: &'static str, interval: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        ensure_metrics_described();
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let period = interval.max(MIN_INTERVAL);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // Closed channel: the handle was dropped without stop(), keep ticking.
            let mut stoppable = true;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        tick().await;
                        gauge!("scheduler_last_tick_ts", "task" => name)
                            .set(chrono::Utc::now().timestamp() as f64);
                    }
                    changed = stop_rx.changed(), if stoppable => {
                        match changed {
                            Ok(()) if *stop_rx.borrow() => break,
                            Ok(()) => {}
                            Err(_) => stoppable = false,
                        }
                    }
                }
            }
            tracing::info!(target: "pipeline", task = name, "recurring task stopped");
        });
        tracing::info!(target: "pipeline", task = name, every_secs = period.as_secs(), "recurring task started");
        Self {
            name,
            stop_tx,
            handle,
        }
    }

    /// Signal the loop to exit and wait for it. An in-flight tick finishes first.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        if let Err(e) = self.handle.await {
            tracing::warn!(target: "pipeline", task = self.name, error = %e, "recurring task ended abnormally");
        }
    }
}

/// Run the fetch cycle for today every `interval`.
///
/// The first, immediate run is skipped when today already has a digest.
pub fn spawn_news_scheduler(pipeline: Arc<FetchPipeline>, interval: Duration) -> RecurringTask {
    let mut initial = true;
    RecurringTask::spawn("news-fetch", interval, move || {
        let pipeline = Arc::clone(&pipeline);
        let first = std::mem::replace(&mut initial, false);
        async move {
            run_scheduled_cycle(&pipeline, first).await;
        }
    })
}

/// One scheduled invocation. Returns whether a cycle actually ran.
pub async fn run_scheduled_cycle(pipeline: &FetchPipeline, initial: bool) -> bool {
    let date = today_string();
    if initial {
        match pipeline.store().has_articles_for_date(&date).await {
            Ok(true) => {
                tracing::info!(target: "pipeline", date, "digest already present, skipping startup fetch");
                return false;
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(target: "pipeline", date, error = %e, "could not check stored digest, fetching anyway");
            }
        }
    }
    match pipeline.run_fetch_cycle(&date).await {
        Ok(report) => {
            tracing::info!(
                target: "pipeline",
                date,
                inserted = report.inserted,
                "scheduled fetch done"
            );
        }
        Err(e) => {
            tracing::warn!(target: "pipeline", date, error = %e, "scheduled fetch failed");
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn ticks_immediately_then_every_interval() {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let task = RecurringTask::spawn("test", Duration::from_secs(60), move || {
            let h = Arc::clone(&h);
            async move {
                h.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(125)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 3);

        task.stop().await;
        let after = hits.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(hits.load(Ordering::SeqCst), after);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_is_clamped() {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let task = RecurringTask::spawn("fast", Duration::ZERO, move || {
            let h = Arc::clone(&h);
            async move {
                h.fetch_add(1, Ordering::SeqCst);
            }
        });
        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        task.stop().await;
    }
}
