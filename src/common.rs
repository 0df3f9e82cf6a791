use serde::{Deserialize, Serialize};

pub type NodeId = usize;
pub type TaskId = usize;

/// One transport order: bring the AGV standing at `start` to `target`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub start: NodeId,
    #[serde(default)]
    pub start_time: f64,
    pub target: NodeId,
}

/// Vehicle and floor constants shared by routing and timeline generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Constants {
    /// Distance per time unit.
    pub speed: f64,
    pub agv_length: f64,
    /// Distance a vehicle needs to get through a crossing before the node is clear.
    pub crossing_distance: f64,
    /// Floor applied to degenerate edge lengths.
    pub min_distance: f64,
    pub infinite: f64,
}

impl Default for Constants {
    fn default() -> Self {
        Constants {
            speed: 2.0,
            agv_length: 1.0,
            crossing_distance: 2.0,
            min_distance: 0.5,
            infinite: f64::INFINITY,
        }
    }
}

impl Constants {
    pub fn travel_time(&self, distance: f64) -> f64 {
        distance / self.speed
    }

    /// How long a vehicle blocks a node it drives through.
    pub fn transit_hold(&self) -> f64 {
        (self.crossing_distance + self.agv_length) / self.speed
    }

    /// How long a vehicle blocks the node it starts from once it pulls away.
    pub fn departure_hold(&self) -> f64 {
        self.agv_length / self.speed
    }

    pub fn is_infinite(&self, time: f64) -> bool {
        time >= self.infinite
    }
}
