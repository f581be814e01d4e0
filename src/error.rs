use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("config error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("at least one local node id is required")]
    EmptyNodeIds,

    #[error("find_node interval must be positive")]
    NonPositiveInterval,

    #[error("queue capacity must be positive")]
    NonPositiveCapacity,

    #[error("invalid node id: {0}")]
    InvalidNodeId(String),

    #[error("expected {expected} ports, got {actual}")]
    PortCount { expected: usize, actual: usize },

    #[error("no socket bound for slot {0}")]
    NoSocket(usize),

    #[error("message too long: {0} bytes")]
    MessageTooLong(usize),

    #[error("routing table unavailable: {0}")]
    RoutingTable(String),
}

pub type Result<T> = std::result::Result<T, Error>;
