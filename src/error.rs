//! Error types for the MPTT engine

use crate::types::NodeId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, MpttError>;

#[derive(Error, Debug)]
pub enum MpttError {
    #[error("Node not found: {0}")]
    NotFound(NodeId),

    #[error("Cannot place node {node} under {target}: target lies inside the node's own subtree")]
    CycleRejected { node: NodeId, target: NodeId },

    #[error("Store error: {0}")]
    Store(String),

    #[error("Lock error: {0}")]
    Lock(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Store is not connected")]
    NotConnected,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Data corruption: {0}")]
    Corruption(String),
}

impl From<bincode::Error> for MpttError {
    fn from(err: bincode::Error) -> Self {
        MpttError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for MpttError {
    fn from(err: serde_json::Error) -> Self {
        MpttError::Config(err.to_string())
    }
}
