use std::time::Instant;

use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::common::{Constants, NodeId, Task, TaskId};
use crate::error::{RegistryError, RoutingError};
use crate::graph::{BufferSet, Graph};
use crate::registry::IntervalRegistry;
use crate::routing::Routing;
use crate::stat::Stats;
use crate::timeline::{TimeNode, Timeline};
use crate::window::TimeWindow;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedStep {
    pub node: NodeId,
    pub arrival: f64,
    pub next_node: Option<NodeId>,
}

impl From<&TimeWindow> for PlannedStep {
    fn from(window: &TimeWindow) -> Self {
        PlannedStep {
            node: window.node,
            arrival: window.least_time_reach_here,
            next_node: window.next_node,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Plan {
    pub task: TaskId,
    pub steps: Vec<PlannedStep>,
}

impl Plan {
    pub fn nodes(&self) -> Vec<NodeId> {
        self.steps.iter().map(|step| step.node).collect()
    }

    /// Arrival sequence as planned, waits and late starts included. A vehicle that
    /// never leaves its start has none.
    pub fn time_nodes(&self) -> Option<Vec<TimeNode>> {
        if self.steps.len() < 2 {
            return None;
        }
        Some(
            self.steps
                .iter()
                .enumerate()
                .map(|(index, step)| TimeNode::new(step.arrival, step.node, index))
                .collect(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Failure {
    pub task: TaskId,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PlanReport {
    pub plans: Vec<Plan>,
    pub failures: Vec<Failure>,
}

/// Routes tasks one after another against a shared interval registry. Every task
/// sees the reservations of the tasks planned before it.
pub struct Planner {
    graph: Graph,
    buffers: BufferSet,
    constants: Constants,
    registry: IntervalRegistry,
}

impl Planner {
    pub fn new(graph: Graph, buffers: BufferSet, constants: Constants) -> Self {
        let registry = IntervalRegistry::fully_free(graph.node_count(), constants.infinite);
        Planner {
            graph,
            buffers,
            constants,
            registry,
        }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn constants(&self) -> &Constants {
        &self.constants
    }

    pub fn registry(&self) -> &IntervalRegistry {
        &self.registry
    }

    /// Reserves every task's start node from its start time on, so vehicles that
    /// have not moved yet block the floor.
    pub fn park(&mut self, tasks: &[Task]) -> Result<(), RegistryError> {
        for task in tasks {
            self.registry.park(task.start, task.start_time)?;
        }
        Ok(())
    }

    pub fn plan(&mut self, task: &Task, stats: &mut Stats) -> Result<Plan, RoutingError> {
        let route = Routing::new(
            &mut self.registry,
            &self.graph,
            &self.buffers,
            &self.constants,
            task,
        )?
        .get_route(stats)?;

        Ok(Plan {
            task: task.id,
            steps: route.iter().map(PlannedStep::from).collect(),
        })
    }

    /// Plans tasks in order. A task without a route is reported and skipped.
    #[instrument(skip_all, name = "plan_all", fields(tasks = tasks.len()))]
    pub fn plan_all(&mut self, tasks: &[Task], stats: &mut Stats) -> PlanReport {
        let start_time = Instant::now();
        let mut report = PlanReport::default();

        for task in tasks {
            match self.plan(task, stats) {
                Ok(plan) => {
                    stats.routed_tasks += 1;
                    report.plans.push(plan);
                }
                Err(err) => {
                    warn!("task {} skipped: {err}", task.id);
                    stats.failed_tasks += 1;
                    report.failures.push(Failure {
                        task: task.id,
                        reason: err.to_string(),
                    });
                }
            }
        }

        stats.time_us += start_time.elapsed().as_micros() as usize;
        info!(
            "planned {} tasks, {} failed",
            report.plans.len(),
            report.failures.len()
        );
        report
    }

    /// Timeline of the planned arrivals, one sequence per plan.
    pub fn timeline(plans: &[Plan]) -> Timeline {
        Timeline::from_sequences(plans.iter().map(Plan::time_nodes).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self, init_tracing};
    use crate::resolver::{ConflictResolver, LaterAgvYields};

    fn task(id: usize, start: usize, target: usize) -> Task {
        Task {
            id,
            start,
            start_time: 0.0,
            target,
        }
    }

    fn planner() -> Planner {
        let graph = fixtures::factory_graph();
        let buffers = fixtures::factory_buffers(&graph);
        Planner::new(graph, buffers, fixtures::constants())
    }

    #[test]
    fn test_plan_all() {
        init_tracing();
        let mut planner = planner();
        let tasks = vec![task(0, 9, 5), task(1, 10, 4), task(2, 6, 42)];
        planner.park(&tasks).unwrap();
        let stats = &mut Stats::default();

        let report = planner.plan_all(&tasks, stats);

        assert_eq!(report.plans.len(), 2);
        assert_eq!(report.plans[0].nodes(), vec![9, 3, 4, 5]);
        let arrivals: Vec<(NodeId, f64)> = report.plans[1]
            .steps
            .iter()
            .map(|step| (step.node, step.arrival))
            .collect();
        assert_eq!(arrivals, vec![(10, 0.0), (2, 0.5), (3, 5.5), (4, 10.5)]);
        assert_eq!(report.plans[1].steps[3].next_node, None);

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].task, 2);
        assert_eq!(stats.routed_tasks, 2);
        assert_eq!(stats.failed_tasks, 1);

        // The failed vehicle stays parked.
        assert_eq!(
            planner.registry().reserved(6)[0],
            TimeWindow::reserved(6, 0.0, f64::INFINITY, None, f64::INFINITY)
        );
        planner.registry().verify_partition().unwrap();
    }

    #[test]
    fn test_timeline_keeps_planned_waits() {
        init_tracing();
        let mut planner = planner();
        let mut late = task(1, 10, 4);
        late.start_time = 2.0;
        let tasks = vec![task(0, 9, 5), late, task(2, 6, 6)];
        planner.park(&tasks).unwrap();
        let stats = &mut Stats::default();
        let report = planner.plan_all(&tasks, stats);
        assert_eq!(report.plans.len(), 3);

        let timeline = Planner::timeline(&report.plans);
        for (agv, plan) in report.plans.iter().enumerate().take(2) {
            let times: Vec<f64> = timeline.sequence(agv).unwrap().iter().map(|t| t.time).collect();
            let arrivals: Vec<f64> = plan.steps.iter().map(|step| step.arrival).collect();
            assert_eq!(times, arrivals);
        }
        assert_eq!(timeline.sequence(1).unwrap()[0].time, 2.0);
        // Already at its target.
        assert!(timeline.sequence(2).is_none());
    }

    #[test]
    fn test_shared_start_cannot_park() {
        let mut planner = planner();
        let tasks = vec![task(0, 9, 5), task(1, 9, 4)];
        assert!(matches!(
            planner.park(&tasks),
            Err(RegistryError::NoFreeWindow { node: 9, .. })
        ));
    }

    #[test]
    fn test_planned_batch_is_conflict_free() {
        init_tracing();
        let mut planner = planner();
        let tasks = vec![task(0, 9, 5), task(1, 10, 4)];
        planner.park(&tasks).unwrap();
        let stats = &mut Stats::default();
        let report = planner.plan_all(&tasks, stats);

        assert_eq!(report.plans[0].nodes(), vec![9, 3, 4, 5]);
        assert_eq!(report.plans[1].nodes(), vec![10, 2, 3, 4]);

        let mut timeline = Planner::timeline(&report.plans);
        let resolution = ConflictResolver::new(planner.constants().transit_hold())
            .resolve(&mut timeline, &LaterAgvYields, stats)
            .unwrap();
        assert_eq!(resolution.delays, 0);
    }
}
