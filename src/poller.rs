use std::{future::Future, time::Duration};

use anyhow::Result;
use tokio::{
    sync::watch,
    time::{self, Instant, MissedTickBehavior},
};

use crate::{
    config::App,
    crawler::ticker::{self, Outcome},
    database::Repository,
    logging,
};

/// Polls the configured ticker every `poll.interval_sec` seconds and stores each sample,
/// until `shutdown` turns true.
pub async fn start<R: Repository>(app: App, repository: R, shutdown: watch::Receiver<bool>) {
    let period = Duration::from_secs(app.poll.interval_sec);
    let uri = app.poll.uri.as_str();
    let repository = &repository;

    run(period, shutdown, move || async move {
        match ticker::execute(uri, repository).await? {
            Outcome::Stored => {}
            Outcome::NotStored => {
                logging::warn_file_async(format!("Sample from {} not stored", uri))
            }
            Outcome::Unsuccessful => {
                logging::debug_file_async(format!("No sample from {} this time", uri))
            }
            Outcome::Malformed => {
                logging::warn_file_async(format!("Malformed sample from {} dropped", uri))
            }
        }

        Ok::<(), anyhow::Error>(())
    })
    .await;

    logging::info_file_async("Polling finished".to_string());
}

/// Runs `cycle` right away and then once per tick of a `period` timer.
///
/// Cycles never overlap: a cycle that overruns the period pushes the next
/// one back instead of triggering a burst of catch-up cycles. A failed cycle
/// is logged and does not stop the loop. The loop returns once `shutdown`
/// holds true (or its sender is gone), checked before every cycle and while
/// waiting for the next tick.
pub async fn run<F, Fut>(period: Duration, mut shutdown: watch::Receiver<bool>, mut cycle: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let mut task_interval = time::interval_at(Instant::now(), period);
    task_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // the first tick completes immediately
    task_interval.tick().await;

    loop {
        if *shutdown.borrow() {
            break;
        }

        if let Err(why) = cycle().await {
            logging::error_file_async(format!("Poll cycle failed because {:?}", why));
        }

        tokio::select! {
            _ = task_interval.tick() => {}
            _ = shutdown.wait_for(|stop| *stop) => break,
        }
    }
}
