use std::time::Instant;

use tracing::{debug, info, instrument};

use crate::error::TimelineError;
use crate::stat::Stats;
use crate::timeline::Timeline;

/// Decides which of two conflicting AGVs waits.
pub trait StopPolicy {
    fn stop_agv(&self, timeline: &Timeline, first: usize, second: usize) -> usize;
}

impl<F> StopPolicy for F
where
    F: Fn(usize, usize) -> usize,
{
    fn stop_agv(&self, _timeline: &Timeline, first: usize, second: usize) -> usize {
        self(first, second)
    }
}

/// The AGV with the higher batch index gives way.
#[derive(Debug, Clone, Copy, Default)]
pub struct LaterAgvYields;

impl StopPolicy for LaterAgvYields {
    fn stop_agv(&self, _timeline: &Timeline, first: usize, second: usize) -> usize {
        first.max(second)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub sweeps: usize,
    pub delays: usize,
}

/// Delays AGVs in a timeline until no two of them reach a node at the same instant.
#[derive(Debug, Clone, Copy)]
pub struct ConflictResolver {
    wait_time: f64,
}

impl ConflictResolver {
    pub fn new(wait_time: f64) -> Self {
        assert!(wait_time > 0.0, "wait time must be positive, got {wait_time}");
        ConflictResolver { wait_time }
    }

    /// Sweeps through the batch in time order until a sweep applies no delay.
    #[instrument(skip_all, name = "resolve", fields(agvs = timeline.len()), level = "debug")]
    pub fn resolve<P: StopPolicy>(
        &self,
        timeline: &mut Timeline,
        policy: &P,
        stats: &mut Stats,
    ) -> Result<Resolution, TimelineError> {
        let start_time = Instant::now();
        let max_sweeps = timeline
            .sequences()
            .iter()
            .flatten()
            .map(|sequence| sequence.len())
            .sum::<usize>()
            .max(1);

        let mut delays = 0;
        for sweep in 1..=max_sweeps {
            let applied = self.sweep(timeline, policy);
            delays += applied;
            stats.conflict_sweeps += 1;
            stats.delays += applied;

            if applied == 0 {
                info!(
                    "timeline settled after {sweep} sweeps and {delays} delays in {:?}",
                    start_time.elapsed()
                );
                return Ok(Resolution {
                    sweeps: sweep,
                    delays,
                });
            }
        }

        Err(TimelineError::NotConverged { sweeps: max_sweeps })
    }

    /// One pass over the batch; returns how many delays it applied.
    fn sweep<P: StopPolicy>(&self, timeline: &mut Timeline, policy: &P) -> usize {
        let mut pointers = vec![0; timeline.len()];
        let mut applied = 0;

        while let Some(now) = timeline.minimum_time(&pointers) {
            let brackets = timeline.find_current_time_windows_set(now, &mut pointers);
            for (index, first) in brackets.iter().enumerate() {
                for second in &brackets[index + 1..] {
                    let stop = policy.stop_agv(timeline, first.agv, second.agv);
                    if let Some(conflict) =
                        timeline.contains_same_time_node(first.agv, second.agv, stop)
                    {
                        debug!(
                            "AGVs {} and {} meet; AGV {stop} waits {} from step {:?}",
                            first.agv,
                            second.agv,
                            self.wait_time,
                            timeline.step(stop, conflict)
                        );
                        timeline.delay(stop, self.wait_time, conflict);
                        applied += 1;
                    }
                }
            }
        }
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::NodeId;
    use crate::fixtures::{self, init_tracing};

    fn timeline(paths: &[Vec<NodeId>]) -> Timeline {
        let graph = fixtures::factory_graph();
        let elapsed = vec![None; paths.len()];
        Timeline::generate_time_window(paths, &elapsed, &graph, &fixtures::constants()).unwrap()
    }

    fn assert_conflict_free(timeline: &Timeline) {
        for i in 0..timeline.len() {
            for j in (i + 1)..timeline.len() {
                assert_eq!(timeline.contains_same_time_node(i, j, i), None, "AGVs {i} and {j}");
            }
        }
    }

    fn path_length_sum(paths: &[Vec<NodeId>]) -> usize {
        paths.iter().map(|path| path.len()).sum()
    }

    #[test]
    fn test_two_agvs_head_on() {
        init_tracing();
        let paths = vec![vec![0, 1, 2], vec![2, 1, 0]];
        let mut timeline = timeline(&paths);
        let stats = &mut Stats::default();

        let resolution = ConflictResolver::new(1.5)
            .resolve(&mut timeline, &LaterAgvYields, stats)
            .unwrap();

        assert_eq!(resolution, Resolution { sweeps: 2, delays: 1 });
        assert!(resolution.sweeps <= path_length_sum(&paths));
        assert_conflict_free(&timeline);

        let first: Vec<f64> = timeline.sequence(0).unwrap().iter().map(|t| t.time).collect();
        let second: Vec<f64> = timeline.sequence(1).unwrap().iter().map(|t| t.time).collect();
        assert_eq!(first, vec![0.0, 3.0, 6.0]);
        assert_eq!(second, vec![0.0, 4.5, 7.5]);
        assert_eq!(stats.delays, 1);
        assert_eq!(stats.conflict_sweeps, 2);
    }

    #[test]
    fn test_three_agvs_cascade() {
        init_tracing();
        // AGV 2 shares AGV 0's start and, once delayed, runs into AGV 1.
        let paths = vec![vec![0, 1, 2], vec![2, 1, 0], vec![0, 1]];
        let mut timeline = timeline(&paths);
        let stats = &mut Stats::default();

        let resolution = ConflictResolver::new(1.5)
            .resolve(&mut timeline, &LaterAgvYields, stats)
            .unwrap();

        assert!(resolution.delays >= 2);
        assert!(resolution.sweeps <= path_length_sum(&paths));
        assert_conflict_free(&timeline);

        // Nobody outranks AGV 0.
        let first: Vec<f64> = timeline.sequence(0).unwrap().iter().map(|t| t.time).collect();
        assert_eq!(first, vec![0.0, 3.0, 6.0]);
    }

    #[test]
    fn test_closure_policy() {
        init_tracing();
        let paths = vec![vec![0, 1, 2], vec![2, 1, 0]];
        let mut timeline = timeline(&paths);
        let stats = &mut Stats::default();

        let earlier_yields = |first: usize, second: usize| first.min(second);
        ConflictResolver::new(1.5)
            .resolve(&mut timeline, &earlier_yields, stats)
            .unwrap();

        let first: Vec<f64> = timeline.sequence(0).unwrap().iter().map(|t| t.time).collect();
        assert_eq!(first, vec![0.0, 4.5, 7.5]);
        assert_conflict_free(&timeline);
    }

    #[test]
    fn test_static_agv_ignored() {
        use crate::timeline::TimeNode;

        let mut timeline = Timeline::from_sequences(vec![
            Some(vec![TimeNode::new(0.0, 0, 0), TimeNode::new(2.0, 1, 1)]),
            None,
            Some(vec![TimeNode::new(1.0, 2, 0), TimeNode::new(2.0, 1, 1)]),
        ]);
        let stats = &mut Stats::default();

        let resolution = ConflictResolver::new(1.5)
            .resolve(&mut timeline, &LaterAgvYields, stats)
            .unwrap();

        assert_eq!(resolution, Resolution { sweeps: 2, delays: 1 });
        let last: Vec<f64> = timeline.sequence(2).unwrap().iter().map(|t| t.time).collect();
        assert_eq!(last, vec![1.0, 3.5]);
        assert!(timeline.sequence(1).is_none());
    }

    #[test]
    fn test_conflict_free_batch_untouched() {
        let paths = vec![vec![9, 3, 4, 5], vec![10, 2, 1], vec![6]];
        let mut timeline = timeline(&paths);
        let before = timeline.clone();
        let stats = &mut Stats::default();

        let resolution = ConflictResolver::new(1.5)
            .resolve(&mut timeline, &LaterAgvYields, stats)
            .unwrap();

        assert_eq!(resolution, Resolution { sweeps: 1, delays: 0 });
        assert_eq!(timeline.sequences(), before.sequences());
    }
}
