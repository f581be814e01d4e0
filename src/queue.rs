use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Condvar, Mutex, MutexGuard};

use crate::error::{Error, Result};

/// A pending find_node destination.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AddressTask {
    pub addr: SocketAddr,
}

impl AddressTask {
    pub fn new(addr: SocketAddr) -> Self {
        AddressTask { addr }
    }
}

#[derive(Default)]
struct State {
    tasks: VecDeque<AddressTask>,
    closed: bool,
}

/// A bounded multi-producer, single-consumer queue of find_node destinations.
///
/// When the queue is full the oldest task is dropped to make room for the newest one, since
/// recently discovered addresses are more likely to still be reachable.
pub struct AddressQueue {
    state: Mutex<State>,
    not_empty: Condvar,
    capacity: usize,
}

impl AddressQueue {
    /// Constructs a new, empty `AddressQueue` holding at most `capacity` tasks.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::NonPositiveCapacity);
        }
        Ok(AddressQueue {
            state: Mutex::new(State::default()),
            not_empty: Condvar::new(),
            capacity,
        })
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Appends `task` at the tail if there is room. Returns `false` if the queue is full.
    fn offer(&self, task: AddressTask) -> bool {
        let mut state = self.lock();
        if state.tasks.len() >= self.capacity {
            return false;
        }
        state.tasks.push_back(task);
        drop(state);
        self.not_empty.notify_one();
        true
    }

    /// Removes the task at the head, if any.
    fn poll_oldest(&self) -> Option<AddressTask> {
        self.lock().tasks.pop_front()
    }

    /// Enqueues `addr`. If the queue is full the oldest task is discarded and the insert retried.
    /// Never blocks and never fails; a lost race against other producers is only logged, and
    /// reported by returning `false`.
    pub fn put(&self, addr: SocketAddr) -> bool {
        let task = AddressTask::new(addr);
        if self.offer(task) {
            return true;
        }
        if let Some(dropped) = self.poll_oldest() {
            debug!("AddressQueue: full, dropped {}", dropped.addr);
        }
        if !self.offer(task) {
            warn!("AddressQueue: still full after dropping the oldest task, lost {}", addr);
            return false;
        }
        true
    }

    /// Removes and returns the oldest task, blocking until one is available. Returns `None` once
    /// the queue has been closed.
    pub fn take(&self) -> Option<AddressTask> {
        let mut state = self.lock();
        loop {
            if state.closed {
                return None;
            }
            if let Some(task) = state.tasks.pop_front() {
                return Some(task);
            }
            // spurious wakeups fall through to another check
            state = match self.not_empty.wait(state) {
                Ok(state) => state,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
    }

    /// Wakes a blocked `take` and makes every later `take` return `None`.
    pub fn close(&self) {
        self.lock().closed = true;
        self.not_empty.notify_all();
    }

    pub fn size(&self) -> usize {
        self.lock().tasks.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    use super::{AddressQueue, AddressTask};
    use crate::QUEUE_CAPACITY;

    fn addr(n: u32) -> SocketAddr {
        SocketAddr::from(([10, (n >> 16) as u8, (n >> 8) as u8, n as u8], 6881))
    }

    #[test]
    fn test_zero_capacity_is_rejected() {
        assert!(AddressQueue::new(0).is_err());
    }

    #[test]
    fn test_capacity_bound() {
        let queue = AddressQueue::new(QUEUE_CAPACITY).unwrap();
        for n in 0..(QUEUE_CAPACITY as u32 + 500) {
            queue.put(addr(n));
            assert!(queue.size() <= QUEUE_CAPACITY);
        }
        assert_eq!(queue.size(), QUEUE_CAPACITY);
    }

    #[test]
    fn test_drops_oldest_when_full() {
        let queue = AddressQueue::new(3).unwrap();
        for n in 1..=4 {
            queue.put(addr(n));
        }
        assert_eq!(queue.size(), 3);
        let drained: Vec<SocketAddr> = (0..3).map(|_| queue.take().unwrap().addr).collect();
        assert_eq!(drained, vec![addr(2), addr(3), addr(4)]);
    }

    #[test]
    fn test_fifo_from_single_producer() {
        let queue = AddressQueue::new(100).unwrap();
        for n in 0..50 {
            queue.put(addr(n));
        }
        for n in 0..50 {
            assert_eq!(queue.take(), Some(AddressTask::new(addr(n))));
        }
        assert_eq!(queue.size(), 0);
    }

    #[test]
    fn test_take_blocks_until_put() {
        let queue = Arc::new(AddressQueue::new(4).unwrap());
        let producer = Arc::clone(&queue);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            producer.put(addr(7));
        });
        let start = Instant::now();
        assert_eq!(queue.take().map(|task| task.addr), Some(addr(7)));
        assert!(start.elapsed() >= Duration::from_millis(40));
        handle.join().unwrap();
    }

    #[test]
    fn test_close_wakes_take() {
        let queue = Arc::new(AddressQueue::new(4).unwrap());
        let consumer = Arc::clone(&queue);
        let handle = thread::spawn(move || consumer.take());
        thread::sleep(Duration::from_millis(20));
        queue.close();
        assert_eq!(handle.join().unwrap(), None);
    }

    #[test]
    fn test_concurrent_producers_respect_capacity() {
        let queue = Arc::new(AddressQueue::new(64).unwrap());
        let handles: Vec<_> = (0..8u32)
            .map(|t| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    for n in 0..1000 {
                        queue.put(addr(t * 1000 + n));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(queue.size() <= 64);
        assert!(queue.size() > 0);
    }

    #[test]
    fn test_racing_producers_on_single_slot() {
        let queue = Arc::new(AddressQueue::new(1).unwrap());
        queue.put(addr(0));
        let handles: Vec<_> = (0..4u32)
            .map(|t| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    let mut lost = 0;
                    for n in 0..5000 {
                        if !queue.put(addr(t * 5000 + n + 1)) {
                            lost += 1;
                        }
                        assert!(queue.size() <= 1);
                    }
                    lost
                })
            })
            .collect();
        let lost: usize = handles.into_iter().map(|handle| handle.join().unwrap()).sum();
        assert_eq!(queue.size(), 1);
        assert!(lost < 4 * 5000);
    }

    #[test]
    fn test_put_reports_stored() {
        let queue = AddressQueue::new(1).unwrap();
        assert!(queue.put(addr(1)));
        assert!(queue.put(addr(2)));
        assert_eq!(queue.take(), Some(AddressTask::new(addr(2))));
    }
}
