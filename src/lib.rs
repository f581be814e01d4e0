#[macro_use]
extern crate log;
#[macro_use]
extern crate serde_derive;

mod config;
mod error;
mod id;
mod identity;
mod node;
mod protocol;
mod queue;
mod routing;
mod scheduler;
mod signal;
mod task;


pub use self::config::{Config, KnownNode};
pub use self::error::{Error, Result};
pub use self::id::NodeId;
pub use self::identity::IdentityRotator;
pub use self::node::NodeData;
pub use self::protocol::{UdpWireSink, WireSink};
pub use self::queue::{AddressQueue, AddressTask};
pub use self::routing::{ClosestNodes, RoutingTable};
pub use self::scheduler::{Cadence, Scheduler};
pub use self::signal::Shutdown;
pub use self::task::FindNodeTask;

use std::time::Duration;

/// The number of bytes in a node id.
const ID_LENGTH: usize = 20;

/// The maximum number of k-buckets in the routing table.
const ROUTING_TABLE_SIZE: usize = ID_LENGTH * 8;

/// The maximum number of entries in a k-bucket, and the number of nodes returned by
/// `closest_eight`.
const REPLICATION_PARAM: usize = 8;

/// The maximum number of pending find_node targets.
const QUEUE_CAPACITY: usize = 10_240;

/// The identity cursor is reset to zero once it passes this value.
const CURSOR_RESET: usize = usize::MAX - 10_000;

/// The maximum length of an outgoing KRPC message in bytes.
const MESSAGE_LENGTH: usize = 1024;

/// Routing table refill cadence.
pub const REFILL_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Current query target rotation cadence.
pub const TARGET_ROTATION_INTERVAL: Duration = Duration::from_secs(3 * 60);
