use thiserror::Error;

use crate::types::NodeId;

/// Coarse classification used by transports to pick a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Caller-fixable input problem.
    Validation,
    /// The graph has no topological order.
    Graph,
    /// Anything unexpected during emission or assembly.
    Internal,
}

#[derive(Error, Debug)]
pub enum CompileError {
    #[error("Duplicate node id: {0}")]
    DuplicateNode(NodeId),

    #[error("Edge {from} -> {to} references unknown node {missing}")]
    UnknownEdgeEndpoint {
        from: NodeId,
        to: NodeId,
        missing: NodeId,
    },

    #[error("Invalid input shape '{text}' on node {node}")]
    InvalidShape { node: NodeId, text: String },

    #[error("Node {node} ({kind}) is missing attribute '{attribute}'")]
    MissingAttribute {
        node: NodeId,
        kind: String,
        attribute: String,
    },

    #[error("Node {node}: attribute '{attribute}' {reason}")]
    InvalidAttribute {
        node: NodeId,
        attribute: String,
        reason: String,
    },

    #[error("Node {node} ({kind}) takes a single input but has {count} predecessors")]
    TooManyInputs {
        node: NodeId,
        kind: String,
        count: usize,
    },

    #[error("Circular dependency detected: {0}")]
    CircularDependency(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),
}

impl CompileError {
    pub fn class(&self) -> ErrorClass {
        match self {
            CompileError::CircularDependency(_) => ErrorClass::Graph,
            CompileError::Internal(_) => ErrorClass::Internal,
            _ => ErrorClass::Validation,
        }
    }

    /// HTTP-style status for the request wrapper: 400 for anything the
    /// caller can fix, 500 otherwise.
    pub fn status_code(&self) -> u16 {
        match self.class() {
            ErrorClass::Validation | ErrorClass::Graph => 400,
            ErrorClass::Internal => 500,
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.status_code() == 400
    }
}

pub type Result<T> = std::result::Result<T, CompileError>;
