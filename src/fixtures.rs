//! Shared test floor: eleven nodes, two buffer lanes (9 hangs off 3, 10 hangs off 2).
//!
//! ```text
//!  10        9
//!   |1       |1
//!   2 --8--- 3 --8-- 4
//!   |6       |10     |10
//!   1        8 --8-- 5
//!   |6               |6
//!   0 --12-- 7 --6-- 6
//! ```
use crate::common::Constants;
use crate::graph::{BufferSet, Graph};

const EDGES: [(usize, usize, f64); 12] = [
    (0, 1, 6.0),
    (1, 2, 6.0),
    (2, 3, 8.0),
    (3, 4, 8.0),
    (3, 8, 10.0),
    (4, 5, 10.0),
    (8, 5, 8.0),
    (5, 6, 6.0),
    (6, 7, 6.0),
    (7, 0, 12.0),
    (2, 10, 1.0),
    (3, 9, 1.0),
];

pub(crate) const NO_EDGE: f64 = -1.0;
pub(crate) const NODE_COUNT: usize = 11;

pub(crate) fn factory_matrix() -> Vec<Vec<f64>> {
    let mut matrix = vec![vec![NO_EDGE; NODE_COUNT]; NODE_COUNT];
    for &(a, b, distance) in &EDGES {
        matrix[a][b] = distance;
        matrix[b][a] = distance;
    }
    matrix
}

pub(crate) fn factory_graph() -> Graph {
    Graph::new(factory_matrix(), NO_EDGE).unwrap()
}

pub(crate) fn factory_buffers(graph: &Graph) -> BufferSet {
    let mut successors = vec![Vec::new(); NODE_COUNT];
    successors[9] = vec![3];
    successors[10] = vec![2];
    BufferSet::new(successors, graph).unwrap()
}

/// speed 2, length 1, crossing 2: a transit blocks a node for 1.5, a departure for 0.5.
pub(crate) fn constants() -> Constants {
    Constants::default()
}

pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("trace")
        .with_test_writer()
        .try_init();
}
