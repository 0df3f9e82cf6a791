use crate::common::NodeId;
use crate::error::GraphError;

/// Road network as a square distance matrix.
#[derive(Debug, Clone)]
pub struct Graph {
    distances: Vec<Vec<f64>>,
    no_edge: f64,
    neighbors: Vec<Vec<NodeId>>, // Adjacent nodes, ascending
}

impl Graph {
    pub fn new(distances: Vec<Vec<f64>>, no_edge: f64) -> Result<Self, GraphError> {
        let node_count = distances.len();
        if node_count == 0 {
            return Err(GraphError::Empty);
        }

        for (row, line) in distances.iter().enumerate() {
            if line.len() != node_count {
                return Err(GraphError::NotSquare {
                    row,
                    len: line.len(),
                    expected: node_count,
                });
            }
            for (col, &distance) in line.iter().enumerate() {
                if distance != no_edge && distance < 0.0 {
                    return Err(GraphError::NegativeDistance {
                        from: row,
                        to: col,
                        distance,
                    });
                }
            }
        }

        let mut graph = Graph {
            distances,
            no_edge,
            neighbors: Vec::new(),
        };
        graph.initialize_neighbors();
        Ok(graph)
    }

    fn initialize_neighbors(&mut self) {
        self.neighbors = (0..self.node_count())
            .map(|from| {
                (0..self.node_count())
                    .filter(|&to| self.raw_distance(from, to).is_some())
                    .collect()
            })
            .collect();
    }

    pub fn node_count(&self) -> usize {
        self.distances.len()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        node < self.node_count()
    }

    pub fn neighbors(&self, node: NodeId) -> &[NodeId] {
        &self.neighbors[node]
    }

    /// Matrix entry for an existing edge; `None` for the sentinel, the diagonal
    /// and out-of-range nodes.
    pub fn raw_distance(&self, from: NodeId, to: NodeId) -> Option<f64> {
        if from == to || !self.contains(from) || !self.contains(to) {
            return None;
        }
        let distance = self.distances[from][to];
        (distance != self.no_edge).then_some(distance)
    }

    /// Edge length between two adjacent nodes, never shorter than `min_distance`.
    pub fn driving_distance(&self, from: NodeId, to: NodeId, min_distance: f64) -> Option<f64> {
        self.raw_distance(from, to)
            .map(|distance| distance.max(min_distance))
    }
}

/// Successor restrictions for pickup/drop buffer lanes.
#[derive(Debug, Clone)]
pub struct BufferSet {
    successors: Vec<Vec<NodeId>>,
}

impl BufferSet {
    pub fn new(successors: Vec<Vec<NodeId>>, graph: &Graph) -> Result<Self, GraphError> {
        if successors.len() != graph.node_count() {
            return Err(GraphError::BufferTableSize {
                len: successors.len(),
                node_count: graph.node_count(),
            });
        }
        for (node, list) in successors.iter().enumerate() {
            if let Some(&successor) = list.iter().find(|&&s| !graph.contains(s)) {
                return Err(GraphError::UnknownBufferSuccessor { node, successor });
            }
        }
        Ok(BufferSet { successors })
    }

    /// No buffer lanes at all.
    pub fn unrestricted(graph: &Graph) -> Self {
        BufferSet {
            successors: vec![Vec::new(); graph.node_count()],
        }
    }

    pub fn is_buffer(&self, node: NodeId) -> bool {
        !self.successors[node].is_empty()
    }

    pub fn successors(&self, node: NodeId) -> &[NodeId] {
        &self.successors[node]
    }

    /// Whether a vehicle standing on `at`, having come from `previous`, may drive on to `next`.
    /// Buffer lanes only lead to their listed successors, which may include the node the
    /// vehicle came from. Everywhere else an immediate turnaround is illegal.
    pub fn allows_turn(&self, at: NodeId, previous: Option<NodeId>, next: NodeId) -> bool {
        if self.is_buffer(at) {
            return self.successors[at].contains(&next);
        }
        previous != Some(next)
    }
}
