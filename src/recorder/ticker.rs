//! Cancellable periodic tasks
//!
//! Replaces a run-loop timer: the task is aborted by `cancel()` or on drop,
//! so no callback outlives its owner.

use std::ops::ControlFlow;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Shortest period a task runs at; `interval_at` rejects zero
pub const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);

/// A periodic callback running on the tokio runtime
#[derive(Debug)]
pub struct ScheduledTask {
    name: &'static str,
    handle: Option<JoinHandle<()>>,
}

impl ScheduledTask {
    /// Run `tick` every `period`, first firing one period from now.
    ///
    /// The callback receives the 1-based tick count and may return
    /// `ControlFlow::Break` to end the task. Periods below
    /// [`MIN_TICK_INTERVAL`] are raised to it.
    pub fn every<F>(name: &'static str, period: Duration, mut tick: F) -> Self
    where
        F: FnMut(u64) -> ControlFlow<()> + Send + 'static,
    {
        let period = period.max(MIN_TICK_INTERVAL);
        let handle = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            let mut count = 0u64;
            loop {
                interval.tick().await;
                count += 1;
                if tick(count).is_break() {
                    break;
                }
            }
            tracing::debug!("Scheduled task '{}' finished after {} ticks", name, count);
        });

        Self {
            name,
            handle: Some(handle),
        }
    }

    /// Stop the task; no further ticks are delivered
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            tracing::debug!("Cancelled scheduled task '{}'", self.name);
        }
    }

    /// Whether the task is still scheduled
    pub fn is_active(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_ticks_once_per_period() {
        let count = Arc::new(AtomicU64::new(0));
        let seen = count.clone();
        let _task = ScheduledTask::every("test", Duration::from_secs(1), move |n| {
            seen.store(n, Ordering::SeqCst);
            ControlFlow::Continue(())
        });

        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_ticks() {
        let count = Arc::new(AtomicU64::new(0));
        let seen = count.clone();
        let mut task = ScheduledTask::every("test", Duration::from_secs(1), move |n| {
            seen.store(n, Ordering::SeqCst);
            ControlFlow::Continue(())
        });

        tokio::time::sleep(Duration::from_millis(2500)).await;
        task.cancel();
        assert!(!task.is_active());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels() {
        let count = Arc::new(AtomicU64::new(0));
        let seen = count.clone();
        let task = ScheduledTask::every("test", Duration::from_secs(1), move |n| {
            seen.store(n, Ordering::SeqCst);
            ControlFlow::Continue(())
        });

        tokio::time::sleep(Duration::from_millis(1500)).await;
        drop(task);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_period_is_raised_to_minimum() {
        let count = Arc::new(AtomicU64::new(0));
        let seen = count.clone();
        let task = ScheduledTask::every("test", Duration::ZERO, move |n| {
            seen.store(n, Ordering::SeqCst);
            ControlFlow::Continue(())
        });

        tokio::time::sleep(Duration::from_micros(3500)).await;
        assert!(task.is_active());
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_break_ends_task() {
        let mut task = ScheduledTask::every("test", Duration::from_secs(1), |n| {
            if n >= 2 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(!task.is_active());
        task.cancel();
    }
}
