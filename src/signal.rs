use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

type Hook = Box<dyn Fn() + Send + Sync>;

/// A one-shot shutdown flag that sleeping threads can wait on.
///
/// Pacing and scheduling delays wait on the condition variable instead of sleeping, so that
/// `trigger` wakes them immediately. Threads blocked elsewhere are woken through `on_trigger`
/// hooks.
#[derive(Default)]
pub struct Shutdown {
    triggered: Mutex<bool>,
    condvar: Condvar,
    hooks: Mutex<Vec<Hook>>,
}

impl Shutdown {
    pub fn new() -> Self {
        Shutdown::default()
    }

    /// Registers `hook` to run once on `trigger`. Runs it right away if already triggered.
    pub fn on_trigger<F>(&self, hook: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut hooks = match self.hooks.lock() {
            Ok(hooks) => hooks,
            Err(poisoned) => poisoned.into_inner(),
        };
        if self.is_triggered() {
            drop(hooks);
            hook();
        } else {
            hooks.push(Box::new(hook));
        }
    }

    pub fn trigger(&self) {
        let mut hooks = match self.hooks.lock() {
            Ok(hooks) => hooks,
            Err(poisoned) => poisoned.into_inner(),
        };
        {
            let mut triggered = match self.triggered.lock() {
                Ok(triggered) => triggered,
                Err(poisoned) => poisoned.into_inner(),
            };
            *triggered = true;
            self.condvar.notify_all();
        }
        let pending: Vec<Hook> = hooks.drain(..).collect();
        drop(hooks);
        for hook in pending {
            hook();
        }
    }

    pub fn is_triggered(&self) -> bool {
        match self.triggered.lock() {
            Ok(triggered) => *triggered,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Waits up to `timeout`. Returns `true` if shutdown was triggered before or during the wait.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut triggered = match self.triggered.lock() {
            Ok(triggered) => triggered,
            Err(poisoned) => poisoned.into_inner(),
        };
        while !*triggered {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            triggered = match self.condvar.wait_timeout(triggered, deadline - now) {
                Ok((triggered, _)) => triggered,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    use super::Shutdown;

    #[test]
    fn test_wait_runs_full_timeout() {
        let shutdown = Shutdown::new();
        let start = Instant::now();
        assert!(!shutdown.wait_timeout(Duration::from_millis(30)));
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_trigger_wakes_waiter() {
        let shutdown = Arc::new(Shutdown::new());
        let waiter = Arc::clone(&shutdown);
        let start = Instant::now();
        let handle = thread::spawn(move || waiter.wait_timeout(Duration::from_secs(10)));
        thread::sleep(Duration::from_millis(20));
        shutdown.trigger();
        assert!(handle.join().unwrap());
        assert!(start.elapsed() < Duration::from_secs(2));
        assert!(shutdown.is_triggered());
    }

    #[test]
    fn test_hooks_run_once_on_trigger() {
        let shutdown = Shutdown::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        shutdown.on_trigger(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        shutdown.trigger();
        shutdown.trigger();
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        let counter = Arc::clone(&runs);
        shutdown.on_trigger(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_wait_after_trigger_returns_immediately() {
        let shutdown = Shutdown::new();
        shutdown.trigger();
        assert!(shutdown.wait_timeout(Duration::from_secs(10)));
    }
}
