use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

use tracing::{debug, instrument, trace};

use crate::common::{Constants, Task};
use crate::error::RoutingError;
use crate::graph::{BufferSet, Graph};
use crate::ordering::TimeKey;
use crate::registry::{Claim, IntervalRegistry};
use crate::stat::Stats;
use crate::window::{Heading, TimeWindow, WindowId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OpenEntry {
    arrival: TimeKey,
    order: usize,
    window: WindowId,
}

// Earliest arrival pops first; equal arrivals pop in insertion order.
impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .arrival
            .cmp(&self.arrival)
            .then_with(|| other.order.cmp(&self.order))
    }
}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// When a vehicle leaves a window it entered at `least` and when it reaches the next
/// window, which opens at `opens`. Arriving early means waiting before departure.
fn schedule(least: f64, travel: f64, opens: f64) -> (f64, f64) {
    if least + travel >= opens {
        (least, least + travel)
    } else {
        (opens - travel, opens)
    }
}

/// One routing session: searches a path for a single task over a snapshot of the
/// registry's free windows and commits it back into the registry.
pub struct Routing<'a> {
    registry: &'a mut IntervalRegistry,
    graph: &'a Graph,
    buffers: &'a BufferSet,
    constants: &'a Constants,
    task: Task,
    windows: Vec<TimeWindow>,
    windows_at: Vec<Vec<WindowId>>,
    departures: Vec<f64>, // When the vehicle left the predecessor of each reached window
    origin: WindowId,
    current: WindowId,
}

impl<'a> Routing<'a> {
    pub fn new(
        registry: &'a mut IntervalRegistry,
        graph: &'a Graph,
        buffers: &'a BufferSet,
        constants: &'a Constants,
        task: &Task,
    ) -> Result<Self, RoutingError> {
        if registry.node_count() != graph.node_count() {
            return Err(RoutingError::NodeCountMismatch {
                registry: registry.node_count(),
                graph: graph.node_count(),
            });
        }
        if !graph.contains(task.start) {
            return Err(RoutingError::UnknownStart {
                task: task.id,
                start: task.start,
            });
        }
        let origin_end = registry
            .available_until(task.start, task.start_time)
            .ok_or(RoutingError::StartUnavailable {
                task: task.id,
                node: task.start,
                time: task.start_time,
            })?;

        let mut windows = Vec::new();
        let mut windows_at = vec![Vec::new(); graph.node_count()];
        for (node, ids) in windows_at.iter_mut().enumerate() {
            for window in registry.free(node) {
                ids.push(windows.len());
                windows.push(TimeWindow::free(
                    node,
                    window.start,
                    window.end,
                    constants.infinite,
                ));
            }
        }
        let origin = windows.len();
        windows.push(TimeWindow::origin(task.start, task.start_time, origin_end));
        let departures = vec![constants.infinite; windows.len()];

        Ok(Routing {
            registry,
            graph,
            buffers,
            constants,
            task: task.clone(),
            windows,
            windows_at,
            departures,
            origin,
            current: origin,
        })
    }

    pub fn origin(&self) -> WindowId {
        self.origin
    }

    pub fn window(&self, id: WindowId) -> &TimeWindow {
        &self.windows[id]
    }

    /// Search records of the free windows on `node`, in time order.
    pub fn windows_at(&self, node: usize) -> &[WindowId] {
        &self.windows_at[node]
    }

    /// Time to reach the next node from `window`. Leaving the start only covers the
    /// edge; from any other node the vehicle first clears the crossing it stands on.
    fn travel(&self, window: &TimeWindow, distance: f64) -> f64 {
        if window.first_step {
            self.constants.travel_time(distance)
        } else {
            self.constants
                .travel_time(distance + self.constants.crossing_distance)
        }
    }

    fn hold(&self, window: &TimeWindow) -> f64 {
        if window.first_step {
            self.constants.departure_hold()
        } else {
            self.constants.transit_hold()
        }
    }

    /// Relaxes `candidate` from the current frontier window. Reached candidates get
    /// their arrival, predecessor and heading set and are appended to `result`; any
    /// other candidate is left as it was.
    pub fn find_possible_next_time_window(
        &mut self,
        candidate: WindowId,
        occupied: &mut HashSet<WindowId>,
        result: &mut Vec<WindowId>,
    ) {
        if occupied.contains(&candidate) {
            return;
        }

        let current = &self.windows[self.current];
        let next = &self.windows[candidate];
        let Some(distance) =
            self.graph
                .driving_distance(current.node, next.node, self.constants.min_distance)
        else {
            return;
        };
        if !self
            .buffers
            .allows_turn(current.node, current.heading.previous(), next.node)
        {
            return;
        }

        let travel = self.travel(current, distance);
        let (departure, arrival) = schedule(current.least_time_reach_here, travel, next.start);
        // The current node has to be clear before its window closes, and the vehicle
        // has to be able to clear the next one before that window closes.
        if departure + self.hold(current) > current.end {
            return;
        }
        if arrival + self.constants.transit_hold() > next.end {
            return;
        }

        let from = current.node;
        let predecessor = self.current;
        let next = &mut self.windows[candidate];
        next.least_time_reach_here = arrival;
        next.last_time_window = Some(predecessor);
        next.heading = Heading::Arrived {
            from,
            via: next.node,
        };
        trace!("reach node {} at {arrival} from node {from}", next.node);

        self.departures[candidate] = departure;
        occupied.insert(candidate);
        result.push(candidate);
    }

    /// Earliest-arrival path to the task's target, committed into the registry.
    #[instrument(skip_all, name = "get_route", fields(task = self.task.id, start = self.task.start, target = self.task.target), level = "debug")]
    pub fn get_route(&mut self, stats: &mut Stats) -> Result<Vec<TimeWindow>, RoutingError> {
        let graph = self.graph;
        let mut open = BinaryHeap::new();
        let mut occupied = HashSet::from([self.origin]);
        let mut reached = Vec::new();
        let mut order = 0;

        open.push(OpenEntry {
            arrival: TimeKey(self.windows[self.origin].least_time_reach_here),
            order,
            window: self.origin,
        });

        while let Some(entry) = open.pop() {
            self.current = entry.window;
            stats.expanded_windows += 1;

            let (node, end) = {
                let window = &self.windows[entry.window];
                (window.node, window.end)
            };
            trace!("expand window {} on node {node}", entry.window);

            // The vehicle parks at its target, so only an open-ended window will do.
            if node == self.task.target && self.constants.is_infinite(end) {
                let path = self.trace_back(entry.window);
                let claims = self.claims(&path);
                self.registry.commit(&claims)?;
                stats.committed_claims += claims.len();

                let route: Vec<TimeWindow> =
                    path.iter().map(|&id| self.windows[id].clone()).collect();
                debug!(
                    "route: {:?}",
                    route
                        .iter()
                        .map(|w| (w.node, w.least_time_reach_here))
                        .collect::<Vec<_>>()
                );
                return Ok(route);
            }

            for &neighbor in graph.neighbors(node) {
                for index in 0..self.windows_at[neighbor].len() {
                    let candidate = self.windows_at[neighbor][index];
                    self.find_possible_next_time_window(candidate, &mut occupied, &mut reached);
                }
            }
            for window in reached.drain(..) {
                order += 1;
                open.push(OpenEntry {
                    arrival: TimeKey(self.windows[window].least_time_reach_here),
                    order,
                    window,
                });
            }
        }

        debug!("cannot find solution");
        Err(RoutingError::NoPathFeasible {
            task: self.task.id,
            start: self.task.start,
            target: self.task.target,
        })
    }

    /// Walks the predecessor chain back from `last` and tags every window with the
    /// node the vehicle heads to next.
    fn trace_back(&mut self, last: WindowId) -> Vec<WindowId> {
        let mut path = vec![last];
        let mut current = last;
        while let Some(previous) = self.windows[current].last_time_window {
            path.push(previous);
            current = previous;
        }
        path.reverse();

        for pair in path.windows(2) {
            let next_node = self.windows[pair[1]].node;
            self.windows[pair[0]].next_node = Some(next_node);
        }
        path
    }

    fn claims(&self, path: &[WindowId]) -> Vec<Claim> {
        let mut claims = Vec::with_capacity(path.len());
        for pair in path.windows(2) {
            let here = &self.windows[pair[0]];
            claims.push(Claim {
                node: here.node,
                start: here.least_time_reach_here,
                end: self.departures[pair[1]] + self.hold(here),
                next_node: here.next_node,
                leaves_parking: here.first_step,
            });
        }
        if path.len() > 1 {
            if let Some(&last) = path.last() {
                let target = &self.windows[last];
                claims.push(Claim {
                    node: target.node,
                    start: target.least_time_reach_here,
                    end: self.constants.infinite,
                    next_node: None,
                    leaves_parking: false,
                });
            }
        }
        claims
    }
}
