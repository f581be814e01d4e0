use std::cmp::Ordering;
use std::fmt::{Debug, Formatter, Result};
use std::net::SocketAddr;

use crate::id::NodeId;

/// A remote DHT participant as known to a routing table.
#[derive(PartialEq, Eq, Hash, Clone, Copy)]
pub struct NodeData {
    pub addr: SocketAddr,
    pub id: NodeId,
}

impl NodeData {
    pub fn new(addr: SocketAddr, id: NodeId) -> Self {
        NodeData { addr, id }
    }

    /// Returns the UDP endpoint of the node.
    pub fn to_address(&self) -> SocketAddr {
        self.addr
    }
}

impl Debug for NodeData {
    fn fmt(&self, f: &mut Formatter) -> Result {
        write!(f, "{} - {:?}", self.addr, self.id)
    }
}

/// A node paired with its distance to some target. Ordered so that a `BinaryHeap` pops the
/// closest node first.
#[derive(Eq, Clone, Debug)]
pub struct NodeDataDistancePair(pub NodeData, pub NodeId);

impl PartialEq for NodeDataDistancePair {
    fn eq(&self, other: &NodeDataDistancePair) -> bool {
        self.0.eq(&other.0)
    }
}

impl PartialOrd for NodeDataDistancePair {
    fn partial_cmp(&self, other: &NodeDataDistancePair) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NodeDataDistancePair {
    fn cmp(&self, other: &NodeDataDistancePair) -> Ordering {
        other.1.cmp(&self.1)
    }
}
