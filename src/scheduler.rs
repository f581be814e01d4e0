use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use time::OffsetDateTime;

use crate::signal::Shutdown;

/// How often a periodic job runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cadence {
    /// Runs whenever the wall clock crosses a multiple of the period since the Unix epoch, so a
    /// ten minute cadence fires at the top of the hour, +10, +20 and so on.
    Aligned(Duration),
    /// Runs a fixed delay after the previous run finished.
    Every(Duration),
}

impl Cadence {
    /// Returns the delay until the next run.
    pub fn next_delay(&self) -> Duration {
        match *self {
            Cadence::Aligned(period) => delay_to_boundary(OffsetDateTime::now_utc(), period),
            Cadence::Every(period) => period,
        }
    }
}

fn delay_to_boundary(now: OffsetDateTime, period: Duration) -> Duration {
    let period_nanos = period.as_nanos() as i128;
    if period_nanos == 0 {
        return Duration::from_secs(0);
    }
    let elapsed = now.unix_timestamp_nanos().rem_euclid(period_nanos);
    Duration::from_nanos((period_nanos - elapsed) as u64)
}

/// Runs named jobs on their own threads until shut down.
///
/// The shutdown signal is checked between invocations only; a running job always completes.
pub struct Scheduler {
    shutdown: Arc<Shutdown>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(shutdown: Arc<Shutdown>) -> Self {
        Scheduler {
            shutdown,
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Starts a thread that runs `job` on `cadence`.
    pub fn schedule<F>(&self, name: &str, cadence: Cadence, mut job: F)
    where
        F: FnMut() + Send + 'static,
    {
        let shutdown = Arc::clone(&self.shutdown);
        let name = name.to_string();
        let handle = thread::spawn(move || {
            info!("Scheduler: started {} ({:?})", name, cadence);
            while !shutdown.wait_timeout(cadence.next_delay()) {
                debug!("Scheduler: running {}", name);
                job();
            }
            info!("Scheduler: stopped {}", name);
        });
        match self.handles.lock() {
            Ok(mut handles) => handles.push(handle),
            Err(poisoned) => poisoned.into_inner().push(handle),
        }
    }

    /// Signals every job to stop and waits for running invocations to finish.
    pub fn shutdown(&self) {
        self.shutdown.trigger();
        self.join();
    }

    /// Waits for every job thread to exit.
    pub fn join(&self) {
        let mut handles = match self.handles.lock() {
            Ok(handles) => handles,
            Err(poisoned) => poisoned.into_inner(),
        };
        let pending: Vec<JoinHandle<()>> = handles.drain(..).collect();
        drop(handles);
        for handle in pending {
            if handle.join().is_err() {
                error!("Scheduler: job thread panicked");
            }
        }
    }
}
