use std::cmp;
use std::collections::BinaryHeap;
use std::sync::Mutex;

use crate::error::Result;
use crate::id::NodeId;
use crate::node::{NodeData, NodeDataDistancePair};
use crate::{REPLICATION_PARAM, ROUTING_TABLE_SIZE};

/// A read-only view of a routing table, as used by the refill job.
pub trait ClosestNodes: Send + Sync {
    /// Returns up to eight known nodes closest to `id` by XOR distance.
    fn closest_eight(&self, id: &NodeId) -> Result<Vec<NodeData>>;
}

/// A k-bucket in a node's routing table that has a maximum capacity of `REPLICATION_PARAM`.
///
/// The nodes in the k-bucket are sorted by the time of the most recent communication with those
/// which have been most recently communicated at the end of the list.
#[derive(Clone, Debug, Default)]
struct RoutingBucket {
    nodes: Vec<NodeData>,
}

impl RoutingBucket {
    /// Upserts a node in the routing bucket. If the node already exists in the routing bucket, the
    /// node will be moved to the end of the list. If the routing bucket is at capacity, it will
    /// remove the node least recently communicated with to create room for the new node.
    fn update_node(&mut self, node_data: NodeData) {
        if let Some(index) = self.nodes.iter().position(|data| *data == node_data) {
            self.nodes.remove(index);
        }
        self.nodes.push(node_data);
        if self.nodes.len() > REPLICATION_PARAM {
            self.nodes.remove(0);
        }
    }

    /// Returns `true` if the `node_data` exists in the routing bucket.
    fn contains(&self, node_data: &NodeData) -> bool {
        self.nodes.iter().any(|data| data == node_data)
    }

    /// Splits `self` by a particular index and returns the closer bucket.
    fn split(&mut self, id: &NodeId, index: usize) -> RoutingBucket {
        let (old_bucket, new_bucket) = self
            .nodes
            .drain(..)
            .partition(|node| node.id.xor(id).leading_zeros() == index);
        self.nodes = old_bucket;
        RoutingBucket { nodes: new_bucket }
    }

    fn get_nodes(&self) -> &[NodeData] {
        self.nodes.as_slice()
    }

    fn remove_node(&mut self, node_data: &NodeData) -> Option<NodeData> {
        let index = self.nodes.iter().position(|data| data == node_data)?;
        Some(self.nodes.remove(index))
    }

    fn size(&self) -> usize {
        self.nodes.len()
    }
}

/// A local identity's routing table.
///
/// `RoutingTable` is implemented using a growable vector of `RoutingBucket`. Only the bucket
/// holding the local id is ever split.
#[derive(Clone, Debug)]
pub struct RoutingTable {
    buckets: Vec<RoutingBucket>,
    id: NodeId,
}

impl RoutingTable {
    /// Constructs a new, empty `RoutingTable` owned by the local identity `id`.
    pub fn new(id: NodeId) -> Self {
        RoutingTable {
            buckets: vec![RoutingBucket::default()],
            id,
        }
    }

    /// Constructs a `RoutingTable` owned by `id` and upserts every node of `nodes` into it.
    pub fn seeded(id: NodeId, nodes: &[NodeData]) -> Self {
        let mut routing_table = RoutingTable::new(id);
        let accepted = nodes
            .iter()
            .filter(|node_data| routing_table.update_node(**node_data))
            .count();
        debug!("RoutingTable: seeded {:?} with {} of {} nodes", id, accepted, nodes.len());
        routing_table
    }

    fn bucket_index(&self, id: &NodeId) -> usize {
        cmp::min(self.id.xor(id).leading_zeros(), self.buckets.len() - 1)
    }

    /// Upserts a node into the routing table. It will continue to split the routing table until the
    /// routing table is full or until the node can be upserted. Returns `false` if the node's
    /// bucket is full and cannot be split.
    pub fn update_node(&mut self, node_data: NodeData) -> bool {
        if node_data.id == self.id {
            return false;
        }
        let distance = self.id.xor(&node_data.id).leading_zeros();
        let mut target_bucket = self.bucket_index(&node_data.id);

        if self.buckets[target_bucket].contains(&node_data) {
            self.buckets[target_bucket].update_node(node_data);
            return true;
        }

        loop {
            if self.buckets[target_bucket].size() < REPLICATION_PARAM {
                self.buckets[target_bucket].update_node(node_data);
                return true;
            }

            let is_last_bucket = target_bucket == self.buckets.len() - 1;
            let is_full = self.buckets.len() == ROUTING_TABLE_SIZE;

            // bucket cannot be split
            if !is_last_bucket || is_full {
                return false;
            }

            let new_bucket = self.buckets[target_bucket].split(&self.id, target_bucket);
            self.buckets.push(new_bucket);

            target_bucket = cmp::min(distance, self.buckets.len() - 1);
        }
    }

    /// Returns the closest `count` nodes to `id`, nearest first.
    pub fn get_closest_nodes(&self, id: &NodeId, count: usize) -> Vec<NodeData> {
        let index = self.bucket_index(id);
        let mut candidates = Vec::new();

        // the closest ids are guaranteed to be in the bucket which the id would reside
        candidates.extend_from_slice(self.buckets[index].get_nodes());

        if candidates.len() < count {
            // distance is not monotonic in (index, self.buckets.len()), so we must iterate
            for bucket in &self.buckets[index + 1..] {
                candidates.extend_from_slice(bucket.get_nodes());
            }
        }

        if candidates.len() < count {
            // distance in [0, index) is monotonically decreasing by bucket
            for bucket in self.buckets[..index].iter().rev() {
                candidates.extend_from_slice(bucket.get_nodes());
                if candidates.len() >= count {
                    break;
                }
            }
        }

        let mut heap: BinaryHeap<NodeDataDistancePair> = candidates
            .into_iter()
            .map(|node_data| NodeDataDistancePair(node_data, node_data.id.xor(id)))
            .collect();
        let mut ret = Vec::with_capacity(count);
        while ret.len() < count {
            match heap.pop() {
                Some(NodeDataDistancePair(node_data, _)) => ret.push(node_data),
                None => break,
            }
        }
        ret
    }

    /// Removes `node_data` from the routing table.
    pub fn remove_node(&mut self, node_data: &NodeData) -> Option<NodeData> {
        let index = self.bucket_index(&node_data.id);
        self.buckets[index].remove_node(node_data)
    }

    /// Returns the number of nodes in the routing table.
    pub fn len(&self) -> usize {
        self.buckets.iter().map(RoutingBucket::size).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn id(&self) -> NodeId {
        self.id
    }
}

impl ClosestNodes for Mutex<RoutingTable> {
    fn closest_eight(&self, id: &NodeId) -> Result<Vec<NodeData>> {
        let routing_table = match self.lock() {
            Ok(routing_table) => routing_table,
            Err(poisoned) => poisoned.into_inner(),
        };
        Ok(routing_table.get_closest_nodes(id, REPLICATION_PARAM))
    }
}

#[cfg(test)]
mod tests {
    use num_bigint::BigUint;
    use std::net::SocketAddr;
    use std::sync::Mutex;

    use super::{ClosestNodes, RoutingTable};
    use crate::id::NodeId;
    use crate::node::NodeData;
    use crate::{ID_LENGTH, REPLICATION_PARAM};

    fn node(port: u16) -> NodeData {
        let addr: SocketAddr = format!("10.0.0.1:{}", port).parse().unwrap();
        NodeData::new(addr, NodeId::rand())
    }

    fn distance(a: &NodeId, b: &NodeId) -> BigUint {
        BigUint::from_bytes_be(&a.xor(b).0)
    }

    #[test]
    fn test_closest_eight_is_sorted_by_distance() {
        let mut table = RoutingTable::new(NodeId::rand());
        for port in 0..200 {
            table.update_node(node(6000 + port));
        }
        assert!(table.len() > REPLICATION_PARAM);

        let target = NodeId::rand();
        let closest = Mutex::new(table.clone()).closest_eight(&target).unwrap();
        assert_eq!(closest.len(), REPLICATION_PARAM);
        for pair in closest.windows(2) {
            assert!(distance(&pair[0].id, &target) <= distance(&pair[1].id, &target));
        }
    }

    #[test]
    fn test_closest_eight_on_small_table() {
        let mut table = RoutingTable::new(NodeId::rand());
        table.update_node(node(1));
        table.update_node(node(2));
        let closest = Mutex::new(table).closest_eight(&NodeId::rand()).unwrap();
        assert_eq!(closest.len(), 2);
    }

    #[test]
    fn test_update_node_is_an_upsert() {
        let mut table = RoutingTable::new(NodeId::rand());
        let n = node(1);
        assert!(table.update_node(n));
        assert!(table.update_node(n));
        assert_eq!(table.len(), 1);
        assert_eq!(table.remove_node(&n), Some(n));
        assert!(table.is_empty());
    }

    #[test]
    fn test_seeded_table_answers_lookups() {
        let nodes: Vec<NodeData> = (1..=3).map(node).collect();
        let table = Mutex::new(RoutingTable::seeded(NodeId::rand(), &nodes));
        let mut closest = table.closest_eight(&NodeId::rand()).unwrap();
        closest.sort_by_key(|node_data| node_data.addr.port());
        assert_eq!(closest, nodes);
    }

    #[test]
    fn test_rejects_own_id() {
        let id = NodeId::rand();
        let mut table = RoutingTable::new(id);
        assert!(!table.update_node(NodeData::new("10.0.0.1:1".parse().unwrap(), id)));
    }

    #[test]
    fn test_far_bucket_fills_up() {
        let id = NodeId::new([0u8; ID_LENGTH]);
        let mut table = RoutingTable::new(id);
        let mut accepted = 0;
        for port in 0..(REPLICATION_PARAM as u16 * 2) {
            let mut bytes = NodeId::rand().0;
            bytes[0] |= 0x80;
            if table.update_node(NodeData::new(
                format!("10.0.0.2:{}", port).parse().unwrap(),
                NodeId::new(bytes),
            )) {
                accepted += 1;
            }
        }
        assert_eq!(accepted, REPLICATION_PARAM);
    }
}
