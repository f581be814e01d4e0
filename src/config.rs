use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

use log::LevelFilter;

use crate::error::{Error, Result};
use crate::id::NodeId;
use crate::node::NodeData;

/// A remote node with a known id, used to seed the routing tables at startup.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownNode {
    pub id: NodeId,
    pub addr: SocketAddr,
}

/// Crawler settings, read from a JSON file with camelCase keys.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Local identities, one per outgoing socket.
    pub node_ids: Vec<NodeId>,

    /// Minimum delay between two find_node sends, in milliseconds.
    pub find_node_task_interval_millisecond: u64,

    #[serde(default = "default_bind_ip")]
    pub bind_ip: IpAddr,

    /// UDP ports, one per entry in `node_ids`.
    #[serde(default)]
    pub ports: Vec<u16>,

    /// `host:port` strings enqueued once at startup.
    #[serde(default = "default_init_addresses")]
    pub init_addresses: Vec<String>,

    /// Nodes inserted into every routing table at startup.
    #[serde(default)]
    pub known_nodes: Vec<KnownNode>,

    #[serde(default = "default_log_level")]
    pub log_level: LevelFilter,
}

fn default_bind_ip() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_init_addresses() -> Vec<String> {
    vec![
        "router.bittorrent.com:6881".to_string(),
        "dht.transmissionbt.com:6881".to_string(),
        "router.utorrent.com:6881".to_string(),
    ]
}

fn default_log_level() -> LevelFilter {
    LevelFilter::Info
}

impl Config {
    /// Constructs a config with the given identities and pacing interval and defaults elsewhere.
    pub fn new(node_ids: Vec<NodeId>, find_node_task_interval_millisecond: u64) -> Self {
        Config {
            node_ids,
            find_node_task_interval_millisecond,
            bind_ip: default_bind_ip(),
            ports: Vec::new(),
            init_addresses: Vec::new(),
            known_nodes: Vec::new(),
            log_level: default_log_level(),
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Config::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the dispatcher cannot start with.
    pub fn validate(&self) -> Result<()> {
        if self.node_ids.is_empty() {
            return Err(Error::EmptyNodeIds);
        }
        if self.find_node_task_interval_millisecond == 0 {
            return Err(Error::NonPositiveInterval);
        }
        if !self.ports.is_empty() && self.ports.len() != self.node_ids.len() {
            return Err(Error::PortCount {
                expected: self.node_ids.len(),
                actual: self.ports.len(),
            });
        }
        Ok(())
    }

    pub fn pacing_interval(&self) -> Duration {
        Duration::from_millis(self.find_node_task_interval_millisecond)
    }

    pub fn known_node_data(&self) -> Vec<NodeData> {
        self.known_nodes
            .iter()
            .map(|node| NodeData::new(node.addr, node.id))
            .collect()
    }

    /// Resolves `init_addresses`. Entries that fail to resolve are skipped and logged.
    pub fn resolve_init_addresses(&self) -> Vec<SocketAddr> {
        let mut ret = Vec::new();
        for entry in &self.init_addresses {
            match entry.to_socket_addrs() {
                Ok(addrs) => ret.extend(addrs.filter(SocketAddr::is_ipv4)),
                Err(e) => warn!("Config: could not resolve {}: {}", entry, e),
            }
        }
        ret
    }
}
