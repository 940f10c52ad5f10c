use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

/// Run `pass` every `period` until `shutdown_rx` fires.
///
/// The first pass runs one full period after the call; callers do their
///  boot pass themselves. Shutdown is only observed between passes, so a
///  pass that has started always runs to completion.
pub async fn run_periodic<F, Fut>(
    name: &'static str,
    period: Duration,
    mut shutdown_rx: watch::Receiver<()>,
    mut pass: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // the first tick completes immediately
    interval.tick().await;

    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.changed() => {
                tracing::debug!(task = name, "periodic task shutting down");
                break;
            }
            _ = interval.tick() => {}
        }

        tracing::trace!(task = name, "periodic pass");
        pass().await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_runs_each_period_until_shutdown() {
        let (tx, rx) = watch::channel(());
        let count = Arc::new(AtomicUsize::new(0));

        let counter = count.clone();
        let task = tokio::spawn(run_periodic("test", Duration::from_secs(30), rx, move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }));

        tokio::time::sleep(Duration::from_secs(95)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);

        tx.send(()).unwrap();
        task.await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pass_in_flight_completes() {
        let (tx, rx) = watch::channel(());
        let finished = Arc::new(AtomicUsize::new(0));
        let (started_tx, mut started_rx) = tokio::sync::mpsc::channel::<()>(1);

        let done = finished.clone();
        let task = tokio::spawn(run_periodic("test", Duration::from_secs(1), rx, move || {
            let done = done.clone();
            let started_tx = started_tx.clone();
            async move {
                let _ = started_tx.send(()).await;
                tokio::time::sleep(Duration::from_secs(10)).await;
                done.fetch_add(1, Ordering::SeqCst);
            }
        }));

        started_rx.recv().await.unwrap();
        tx.send(()).unwrap();
        task.await.unwrap();
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }
}
