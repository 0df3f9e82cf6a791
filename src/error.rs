use thiserror::Error;

use crate::common::{NodeId, TaskId};

#[derive(Debug, Error, PartialEq)]
pub enum GraphError {
    #[error("distance matrix is empty")]
    Empty,

    #[error("row {row} has {len} entries, expected {expected}")]
    NotSquare {
        row: usize,
        len: usize,
        expected: usize,
    },

    #[error("negative distance {distance} on edge {from} -> {to}")]
    NegativeDistance {
        from: NodeId,
        to: NodeId,
        distance: f64,
    },

    #[error("buffer table has {len} rows for {node_count} nodes")]
    BufferTableSize { len: usize, node_count: usize },

    #[error("buffer node {node} lists unknown successor {successor}")]
    UnknownBufferSuccessor { node: NodeId, successor: NodeId },
}

#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error("node {node} is outside the registry ({node_count} nodes)")]
    UnknownNode { node: NodeId, node_count: usize },

    #[error("no free window on node {node} covers [{start}, {end})")]
    NoFreeWindow { node: NodeId, start: f64, end: f64 },

    #[error("windows on node {node} overlap or leave a gap at {at}")]
    Broken { node: NodeId, at: f64 },
}

#[derive(Debug, Error, PartialEq)]
pub enum RoutingError {
    #[error("no feasible path for task {task} from node {start} to node {target}")]
    NoPathFeasible {
        task: TaskId,
        start: NodeId,
        target: NodeId,
    },

    #[error("task {task} starts at unknown node {start}")]
    UnknownStart { task: TaskId, start: NodeId },

    #[error("task {task} cannot start at node {node} at {time}: the node is held by another vehicle")]
    StartUnavailable { task: TaskId, node: NodeId, time: f64 },

    #[error("registry covers {registry} nodes but the graph has {graph}")]
    NodeCountMismatch { registry: usize, graph: usize },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

#[derive(Debug, Error, PartialEq)]
pub enum TimelineError {
    #[error("{paths} paths but {offsets} elapsed-time offsets")]
    LengthMismatch { paths: usize, offsets: usize },

    #[error("AGV {agv} has an empty path")]
    EmptyPath { agv: usize },

    #[error("AGV {agv} path uses missing edge {from} -> {to}")]
    MissingEdge { agv: usize, from: NodeId, to: NodeId },

    #[error("AGV {agv} has already driven {elapsed} but the first edge only takes {travel}")]
    OffsetExceedsEdge { agv: usize, elapsed: f64, travel: f64 },

    #[error("conflict resolution did not settle within {sweeps} sweeps")]
    NotConverged { sweeps: usize },
}
