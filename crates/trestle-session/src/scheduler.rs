//! Cancellable scheduled tasks.
//!
//! Every timer the session uses (debounce, refresh poll, stopwatch tick) is
//! an owned [`TaskHandle`]; dropping the handle aborts the timer, so
//! cancellation-on-teardown follows from ownership instead of per-call
//! cleanup. A fired timer only ever sends a message into the session loop;
//! once the loop is gone the send fails and nothing runs.

use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant};

/// Handle to a scheduled task. Aborts the task on drop.
#[derive(Debug)]
pub struct TaskHandle {
    handle: JoinHandle<()>,
}

impl TaskHandle {
    pub fn cancel(&self) {
        self.handle.abort();
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Send `msg` once after `delay`.
pub fn schedule_once<M: Send + 'static>(
    delay: Duration,
    tx: UnboundedSender<M>,
    msg: M,
) -> TaskHandle {
    let handle = tokio::spawn(async move {
        sleep(delay).await;
        let _ = tx.send(msg);
    });
    TaskHandle { handle }
}

/// Send `make()` every `period`, starting one period from now.
pub fn schedule_interval<M, F>(period: Duration, tx: UnboundedSender<M>, make: F) -> TaskHandle
where
    M: Send + 'static,
    F: Fn() -> M + Send + 'static,
{
    let handle = tokio::spawn(async move {
        let mut ticks = interval_at(Instant::now() + period, period);
        loop {
            ticks.tick().await;
            if tx.send(make()).is_err() {
                break;
            }
        }
    });
    TaskHandle { handle }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test(start_paused = true)]
    async fn test_schedule_once_fires_after_delay() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _task = schedule_once(Duration::from_millis(500), tx, 42u32);

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(rx.try_recv(), Ok(42));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handle_cancels_pending_fire() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let task = schedule_once(Duration::from_millis(500), tx, 42u32);
        drop(task);

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_fires_repeatedly() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _task = schedule_interval(Duration::from_millis(100), tx, || ());

        tokio::time::sleep(Duration::from_millis(350)).await;
        let mut fired = 0;
        while rx.try_recv().is_ok() {
            fired += 1;
        }
        assert_eq!(fired, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_interval() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let task = schedule_interval(Duration::from_millis(100), tx, || ());

        tokio::time::sleep(Duration::from_millis(150)).await;
        task.cancel();
        while rx.try_recv().is_ok() {}

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(rx.try_recv().is_err());
    }
}
