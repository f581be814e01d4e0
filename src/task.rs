use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::config::Config;
use crate::error::Result;
use crate::id::NodeId;
use crate::identity::IdentityRotator;
use crate::protocol::WireSink;
use crate::queue::AddressQueue;
use crate::routing::ClosestNodes;
use crate::scheduler::{Cadence, Scheduler};
use crate::signal::Shutdown;
use crate::{QUEUE_CAPACITY, REFILL_INTERVAL, TARGET_ROTATION_INTERVAL};

/// Keeps a paced stream of find_node queries flowing to newly learned addresses.
///
/// Addresses come from `put` and from the periodic routing table refill. A single dispatcher
/// thread takes them one at a time, sends a find_node for a random target attributed to the next
/// local identity, and then waits one pacing interval.
#[derive(Clone)]
pub struct FindNodeTask {
    queue: Arc<AddressQueue>,
    identities: IdentityRotator,
    pacing_interval: Duration,
    routing_tables: Arc<Vec<Arc<dyn ClosestNodes>>>,
    sink: Arc<dyn WireSink>,
    target_id: Arc<RwLock<NodeId>>,
    shutdown: Arc<Shutdown>,
    dispatcher: Arc<Mutex<Option<JoinHandle<()>>>>,
    is_started: Arc<AtomicBool>,
}

impl FindNodeTask {
    /// Constructs a new `FindNodeTask`. Fails if `config` has no node ids or a zero interval.
    pub fn new(
        config: &Config,
        routing_tables: Vec<Arc<dyn ClosestNodes>>,
        sink: Arc<dyn WireSink>,
    ) -> Result<Self> {
        FindNodeTask::with_capacity(config, routing_tables, sink, QUEUE_CAPACITY)
    }

    pub(crate) fn with_capacity(
        config: &Config,
        routing_tables: Vec<Arc<dyn ClosestNodes>>,
        sink: Arc<dyn WireSink>,
        capacity: usize,
    ) -> Result<Self> {
        config.validate()?;
        let queue = Arc::new(AddressQueue::new(capacity)?);
        let shutdown = Arc::new(Shutdown::new());
        // whoever triggers the signal also unblocks the dispatcher's take
        let closing = Arc::clone(&queue);
        shutdown.on_trigger(move || closing.close());
        Ok(FindNodeTask {
            queue,
            identities: IdentityRotator::new(config.node_ids.clone())?,
            pacing_interval: config.pacing_interval(),
            routing_tables: Arc::new(routing_tables),
            sink,
            target_id: Arc::new(RwLock::new(NodeId::rand())),
            shutdown,
            dispatcher: Arc::new(Mutex::new(None)),
            is_started: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Enqueues an address to send a find_node to. Never blocks; under pressure the oldest
    /// pending address is dropped instead.
    pub fn put(&self, addr: SocketAddr) {
        self.queue.put(addr);
    }

    /// Returns the number of pending addresses.
    pub fn size(&self) -> usize {
        self.queue.size()
    }

    /// Returns the current query target used by other parts of the crawler.
    pub fn target_id(&self) -> NodeId {
        match self.target_id.read() {
            Ok(target_id) => *target_id,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// The signal shared by the dispatcher and, through `schedule`, the periodic jobs.
    pub fn shutdown_signal(&self) -> Arc<Shutdown> {
        Arc::clone(&self.shutdown)
    }

    /// Starts the dispatcher thread. Returns `false`, and does nothing, if it was already started.
    pub fn start(&self) -> bool {
        if self
            .is_started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("FindNodeTask: dispatcher already started");
            return false;
        }

        let task = self.clone();
        let handle = thread::spawn(move || {
            info!(
                "FindNodeTask: dispatcher started with {} identities, {:?} interval",
                task.identities.len(),
                task.pacing_interval,
            );
            task.dispatch(task.identities.clone());
            info!("FindNodeTask: dispatcher stopped");
        });
        match self.dispatcher.lock() {
            Ok(mut dispatcher) => *dispatcher = Some(handle),
            Err(poisoned) => *poisoned.into_inner() = Some(handle),
        }
        true
    }

    /// The dispatcher loop. Only `take` and the pacing wait block; both wake on shutdown.
    fn dispatch(&self, mut identities: IdentityRotator) {
        while !self.shutdown.is_triggered() {
            let (local_id, slot) = identities.next();
            let task = match self.queue.take() {
                Some(task) => task,
                None => break,
            };
            if self.shutdown.is_triggered() {
                break;
            }

            let target = NodeId::rand();
            debug!(
                "FindNodeTask: find_node to {} from slot {} for {:?}",
                task.addr, slot, target,
            );
            if let Err(e) = self.sink.find_node(task.addr, &local_id, &target, slot) {
                error!("FindNodeTask: find_node to {} failed: {}", task.addr, e);
            }

            if self.shutdown.wait_timeout(self.pacing_interval) {
                break;
            }
        }
    }

    /// Asks every routing table for the nodes closest to a fresh random id and enqueues their
    /// addresses. A failing table does not stop the others. Returns the number of addresses
    /// enqueued.
    pub fn refill(&self) -> usize {
        let mut count = 0;
        for (index, routing_table) in self.routing_tables.iter().enumerate() {
            match routing_table.closest_eight(&NodeId::rand()) {
                Ok(nodes) => {
                    for node_data in nodes {
                        self.put(node_data.to_address());
                        count += 1;
                    }
                },
                Err(e) => info!("FindNodeTask: refill from routing table {} failed: {}", index, e),
            }
        }
        debug!("FindNodeTask: refill enqueued {} addresses, {} pending", count, self.size());
        count
    }

    /// Replaces the current query target with a fresh random id.
    pub fn rotate_target_id(&self) {
        let target_id = NodeId::rand();
        match self.target_id.write() {
            Ok(mut current) => *current = target_id,
            Err(poisoned) => *poisoned.into_inner() = target_id,
        }
        info!("FindNodeTask: updated target id to {:?}", target_id);
    }

    /// Registers the refill and target rotation jobs at their wall clock aligned cadences.
    pub fn schedule(&self, scheduler: &Scheduler) {
        self.schedule_with(
            scheduler,
            Cadence::Aligned(REFILL_INTERVAL),
            Cadence::Aligned(TARGET_ROTATION_INTERVAL),
        );
    }

    pub fn schedule_with(&self, scheduler: &Scheduler, refill: Cadence, rotation: Cadence) {
        let task = self.clone();
        scheduler.schedule("refill", refill, move || {
            task.refill();
        });
        let task = self.clone();
        scheduler.schedule("rotate target id", rotation, move || task.rotate_target_id());
    }

    /// Stops the dispatcher and waits for it to exit. A send in progress completes first.
    pub fn shutdown(&self) {
        self.shutdown.trigger();
        let handle = match self.dispatcher.lock() {
            Ok(mut dispatcher) => dispatcher.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("FindNodeTask: dispatcher thread panicked");
            }
        }
    }
}
