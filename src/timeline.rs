use serde::Serialize;
use tracing::debug;

use crate::common::{Constants, NodeId};
use crate::error::TimelineError;
use crate::graph::Graph;
use crate::ordering::sort_times;

/// The moment an AGV reaches one step of its path.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TimeNode {
    pub time: f64,
    pub node: NodeId,
    pub step: usize,
}

impl TimeNode {
    pub fn new(time: f64, node: NodeId, step: usize) -> Self {
        TimeNode { time, node, step }
    }
}

// Two observations collide when they are on the same node at exactly the same time.
impl PartialEq for TimeNode {
    fn eq(&self, other: &Self) -> bool {
        self.node == other.node && self.time == other.time
    }
}

/// Consecutive observations of one AGV around a point in time. `to` is `None` once
/// the AGV has reached the end of its path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bracket {
    pub agv: usize,
    pub from: TimeNode,
    pub to: Option<TimeNode>,
}

/// Arrival times of a batch of AGVs, one sequence per AGV. Static AGVs have none.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Timeline {
    sequences: Vec<Option<Vec<TimeNode>>>,
}

impl Timeline {
    pub fn from_sequences(sequences: Vec<Option<Vec<TimeNode>>>) -> Self {
        Timeline { sequences }
    }

    /// Builds arrival sequences from node paths. `elapsed[agv]` is `None` for an AGV
    /// standing on `path[0]`, or how long it has already been driving along the first edge.
    pub fn generate_time_window(
        paths: &[Vec<NodeId>],
        elapsed: &[Option<f64>],
        graph: &Graph,
        constants: &Constants,
    ) -> Result<Self, TimelineError> {
        if paths.len() != elapsed.len() {
            return Err(TimelineError::LengthMismatch {
                paths: paths.len(),
                offsets: elapsed.len(),
            });
        }

        let mut sequences = Vec::with_capacity(paths.len());
        for (agv, (path, offset)) in paths.iter().zip(elapsed).enumerate() {
            if path.is_empty() {
                return Err(TimelineError::EmptyPath { agv });
            }
            if path.len() == 1 {
                sequences.push(None);
                continue;
            }

            let mut travel_times = Vec::with_capacity(path.len() - 1);
            for pair in path.windows(2) {
                let distance = graph
                    .driving_distance(pair[0], pair[1], constants.min_distance)
                    .ok_or(TimelineError::MissingEdge {
                        agv,
                        from: pair[0],
                        to: pair[1],
                    })?;
                travel_times.push(constants.travel_time(distance));
            }

            let mut sequence = Vec::with_capacity(path.len());
            match *offset {
                None => {
                    sequence.push(TimeNode::new(0.0, path[0], 0));
                    sequence.push(TimeNode::new(travel_times[0], path[1], 1));
                }
                Some(elapsed) => {
                    if elapsed >= travel_times[0] {
                        return Err(TimelineError::OffsetExceedsEdge {
                            agv,
                            elapsed,
                            travel: travel_times[0],
                        });
                    }
                    // Step 0 is already behind the AGV.
                    sequence.push(TimeNode::new(travel_times[0] - elapsed, path[1], 1));
                }
            }
            for step in 2..path.len() {
                let previous = sequence[sequence.len() - 1].time;
                sequence.push(TimeNode::new(
                    previous + travel_times[step - 1],
                    path[step],
                    step,
                ));
            }
            sequences.push(Some(sequence));
        }

        Ok(Timeline { sequences })
    }

    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    pub fn sequence(&self, agv: usize) -> Option<&[TimeNode]> {
        self.sequences[agv].as_deref()
    }

    pub fn sequences(&self) -> &[Option<Vec<TimeNode>>] {
        &self.sequences
    }

    /// Index within `stop_agv`'s sequence of the first observation AGVs `i` and `j`
    /// share, if any.
    pub fn contains_same_time_node(&self, i: usize, j: usize, stop_agv: usize) -> Option<usize> {
        assert!(stop_agv == i || stop_agv == j, "AGV {stop_agv} is not part of the pair");
        let (Some(first), Some(second)) = (self.sequence(i), self.sequence(j)) else {
            return None;
        };

        for (index_i, node_i) in first.iter().enumerate() {
            for (index_j, node_j) in second.iter().enumerate() {
                if node_i == node_j {
                    return Some(if stop_agv == i { index_i } else { index_j });
                }
            }
        }
        None
    }

    /// Holds `agv` back by `wait` from observation `from` onwards.
    pub fn delay(&mut self, agv: usize, wait: f64, from: usize) {
        if let Some(sequence) = self.sequences[agv].as_mut() {
            for time_node in sequence.iter_mut().skip(from) {
                time_node.time += wait;
            }
        }
    }

    /// Path step of an observation.
    pub fn step(&self, agv: usize, index: usize) -> Option<usize> {
        self.sequence(agv)
            .and_then(|sequence| sequence.get(index))
            .map(|time_node| time_node.step)
    }

    /// Earliest time among the observations the pointers point at. AGVs without a
    /// sequence or with an exhausted pointer are skipped.
    pub fn minimum_time(&self, pointers: &[usize]) -> Option<f64> {
        let mut times: Vec<f64> = self
            .sequences
            .iter()
            .zip(pointers)
            .filter_map(|(sequence, &pointer)| {
                sequence
                    .as_ref()
                    .and_then(|sequence| sequence.get(pointer))
                    .map(|time_node| time_node.time)
            })
            .collect();
        sort_times(&mut times);
        times.first().copied()
    }

    /// Where every AGV is at `end_time`: the pair of observations with
    /// `from.time <= end_time < to.time`. Pointers move past the bracket. An AGV whose
    /// last observation is due by `end_time` yields a closing bracket and its pointer
    /// runs off the end of its sequence.
    pub fn find_current_time_windows_set(
        &self,
        end_time: f64,
        pointers: &mut [usize],
    ) -> Vec<Bracket> {
        let mut brackets = Vec::new();
        for (agv, (sequence, pointer)) in self.sequences.iter().zip(pointers.iter_mut()).enumerate()
        {
            let Some(sequence) = sequence else {
                continue;
            };
            if *pointer >= sequence.len() {
                continue;
            }

            let begin = pointer.saturating_sub(1);
            let found = (begin..sequence.len() - 1).find(|&index| {
                sequence[index].time <= end_time && sequence[index + 1].time > end_time
            });
            match found {
                Some(index) => {
                    brackets.push(Bracket {
                        agv,
                        from: sequence[index],
                        to: Some(sequence[index + 1]),
                    });
                    *pointer = (*pointer).max(index + 1);
                }
                None => {
                    let last = sequence[sequence.len() - 1];
                    if sequence[*pointer].time <= end_time && last.time <= end_time {
                        brackets.push(Bracket {
                            agv,
                            from: last,
                            to: None,
                        });
                        *pointer = sequence.len();
                    }
                }
            }
        }
        debug!("brackets at {end_time}: {brackets:?}");
        brackets
    }
}
