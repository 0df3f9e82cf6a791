use anyhow::{anyhow, Context, Result};
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufReader, Write};
use tracing::info;

use crate::common::{NodeId, Task};
use crate::graph::{BufferSet, Graph};

fn default_no_edge() -> f64 {
    -1.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FloorGraph {
    /// Square distance matrix; `no_edge` marks missing edges.
    pub distances: Vec<Vec<f64>>,
    #[serde(default = "default_no_edge")]
    pub no_edge: f64,
}

/// A batch of AGVs given directly as node paths, for the conflict pass alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixedBatch {
    pub paths: Vec<Vec<NodeId>>,
    /// Time each AGV has already spent on its first edge. Missing entries mean the AGV
    /// stands on its first node.
    #[serde(default)]
    pub elapsed: Vec<Option<f64>>,
}

impl FixedBatch {
    pub fn elapsed(&self) -> Vec<Option<f64>> {
        let mut elapsed = self.elapsed.clone();
        elapsed.resize(self.paths.len(), None);
        elapsed
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub graph: FloorGraph,
    /// Successor list per node; non-empty lists mark buffer lanes.
    #[serde(default)]
    pub buffers: Vec<Vec<NodeId>>,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub batch: Option<FixedBatch>,
}

impl Scenario {
    pub fn load_from_file(path: &str) -> Result<Scenario> {
        let file = File::open(path).with_context(|| format!("cannot open scenario {path}"))?;
        let reader = BufReader::new(file);
        let scenario = serde_yaml::from_reader(reader)
            .with_context(|| format!("malformed scenario {path}"))?;
        Ok(scenario)
    }

    pub fn build_graph(&self) -> Result<(Graph, BufferSet)> {
        let graph = Graph::new(self.graph.distances.clone(), self.graph.no_edge)?;
        let buffers = if self.buffers.is_empty() {
            BufferSet::unrestricted(&graph)
        } else {
            BufferSet::new(self.buffers.clone(), &graph)?
        };
        Ok((graph, buffers))
    }

    /// Random tasks at time zero with pairwise distinct start nodes and a target
    /// different from the start.
    pub fn generate_tasks_randomly<R: Rng + ?Sized>(
        &self,
        num_tasks: usize,
        rng: &mut R,
    ) -> Result<Vec<Task>> {
        let node_count = self.graph.distances.len();
        if node_count < 2 {
            return Err(anyhow!("Need at least two nodes to generate tasks"));
        }
        if num_tasks > node_count {
            return Err(anyhow!(
                "Not enough nodes ({node_count}) for {num_tasks} distinct start nodes"
            ));
        }

        let mut starts: Vec<NodeId> = (0..node_count).collect();
        starts.shuffle(rng);

        let tasks: Vec<Task> = starts
            .into_iter()
            .take(num_tasks)
            .enumerate()
            .map(|(id, start)| {
                // Draw from the other nodes, skipping over the start.
                let mut target = rng.gen_range(0..node_count - 1);
                if target >= start {
                    target += 1;
                }
                Task {
                    id,
                    start,
                    start_time: 0.0,
                    target,
                }
            })
            .collect();

        info!("Generate tasks: {tasks:?}");
        Ok(tasks)
    }

    pub fn load_tasks_from_yaml(path: &str) -> Result<Vec<Task>> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let tasks = serde_yaml::from_reader(reader)?;
        Ok(tasks)
    }

    pub fn write_tasks_to_yaml(path: &str, tasks: &[Task]) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = io::BufWriter::new(file);
        let yaml_data = serde_yaml::to_string(&tasks)?;
        writer.write_all(yaml_data.as_bytes())?;

        Ok(())
    }
}
