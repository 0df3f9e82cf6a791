use std::collections::VecDeque;

use tracing::trace;

use crate::common::NodeId;
use crate::error::RegistryError;
use crate::ordering::sort_by_time;
use crate::window::TimeWindow;

/// One reservation a route commit makes.
#[derive(Debug, Clone, PartialEq)]
pub struct Claim {
    pub node: NodeId,
    pub start: f64,
    pub end: f64,
    pub next_node: Option<NodeId>,
    /// The claimant is currently parked on `node` and leaves at `start`.
    pub leaves_parking: bool,
}

/// Free and reserved windows of every node, each queue ordered by start time.
#[derive(Debug, Clone)]
pub struct IntervalRegistry {
    free: Vec<VecDeque<TimeWindow>>,
    reserved: Vec<VecDeque<TimeWindow>>,
    infinite: f64,
}

impl IntervalRegistry {
    /// Registry with empty queues; the caller is responsible for the partition.
    pub fn new(node_count: usize, infinite: f64) -> Self {
        IntervalRegistry {
            free: vec![VecDeque::new(); node_count],
            reserved: vec![VecDeque::new(); node_count],
            infinite,
        }
    }

    /// Every node free for all time.
    pub fn fully_free(node_count: usize, infinite: f64) -> Self {
        let mut registry = Self::new(node_count, infinite);
        for node in 0..node_count {
            registry.free[node].push_back(TimeWindow::free(node, 0.0, infinite, infinite));
        }
        registry
    }

    pub fn node_count(&self) -> usize {
        self.free.len()
    }

    pub fn infinite(&self) -> f64 {
        self.infinite
    }

    fn check_node(&self, node: NodeId) -> Result<(), RegistryError> {
        if node < self.node_count() {
            Ok(())
        } else {
            Err(RegistryError::UnknownNode {
                node,
                node_count: self.node_count(),
            })
        }
    }

    pub fn free(&self, node: NodeId) -> &VecDeque<TimeWindow> {
        &self.free[node]
    }

    pub fn reserved(&self, node: NodeId) -> &VecDeque<TimeWindow> {
        &self.reserved[node]
    }

    pub fn peek_free(&self, node: NodeId) -> Option<&TimeWindow> {
        self.free[node].front()
    }

    pub fn pop_free(&mut self, node: NodeId) -> Option<TimeWindow> {
        self.free[node].pop_front()
    }

    pub fn peek_reserved(&self, node: NodeId) -> Option<&TimeWindow> {
        self.reserved[node].front()
    }

    pub fn pop_reserved(&mut self, node: NodeId) -> Option<TimeWindow> {
        self.reserved[node].pop_front()
    }

    pub fn insert_free(&mut self, window: TimeWindow) {
        insert_ordered(&mut self.free[window.node], window);
    }

    pub fn insert_reserved(&mut self, window: TimeWindow) {
        insert_ordered(&mut self.reserved[window.node], window);
    }

    /// Carves `[start, end)` out of the free window containing it and queues it as reserved.
    pub fn split(
        &mut self,
        node: NodeId,
        start: f64,
        end: f64,
        next_node: Option<NodeId>,
    ) -> Result<(), RegistryError> {
        self.check_node(node)?;
        let position = self.free[node]
            .iter()
            .position(|window| window.contains(start, end))
            .ok_or(RegistryError::NoFreeWindow { node, start, end })?;

        let window = self.free[node]
            .remove(position)
            .ok_or(RegistryError::NoFreeWindow { node, start, end })?;
        let infinite = self.infinite;

        let before = TimeWindow::free(node, window.start, start, infinite);
        if !before.is_empty() {
            self.insert_free(before);
        }
        let after = TimeWindow::free(node, end, window.end, infinite);
        if !after.is_empty() {
            self.insert_free(after);
        }
        trace!("node {node}: free [{}, {}) split at [{start}, {end})", window.start, window.end);

        self.insert_reserved(TimeWindow::reserved(node, start, end, next_node, infinite));
        Ok(())
    }

    /// Reserves `[at, ∞)` for a vehicle standing on `node`.
    pub fn park(&mut self, node: NodeId, at: f64) -> Result<(), RegistryError> {
        self.split(node, at, self.infinite, None)
    }

    /// Hands the tail of a parked reservation covering `at` back to the free queue.
    /// Returns whether such a reservation existed.
    ///
    /// Reservations carry no owner: any open `next_node == None` slot counts as the
    /// caller's own parking, including a slot another vehicle claimed as its target.
    /// Callers must only release a node their own vehicle is parked on.
    pub fn release_parking(&mut self, node: NodeId, at: f64) -> Result<bool, RegistryError> {
        self.check_node(node)?;
        let Some(position) = self.parking_position(node, at) else {
            return Ok(false);
        };
        let Some(parked) = self.reserved[node].remove(position) else {
            return Ok(false);
        };
        let infinite = self.infinite;

        let kept = TimeWindow::reserved(node, parked.start, at, None, infinite);
        if !kept.is_empty() {
            self.insert_reserved(kept);
        }
        self.insert_free(TimeWindow::free(node, at, parked.end, infinite));
        Ok(true)
    }

    fn parking_position(&self, node: NodeId, at: f64) -> Option<usize> {
        self.reserved[node].iter().position(|window| {
            window.next_node.is_none() && window.start <= at && at < window.end
        })
    }

    /// When a vehicle standing on `node` at `at` may stay there until: the end of its
    /// own parking slot or of the free window it stands in. `None` if another vehicle
    /// holds the node at that time while passing through.
    ///
    /// As with [`release_parking`](Self::release_parking), a parked slot is assumed
    /// to belong to the asking vehicle.
    pub fn available_until(&self, node: NodeId, at: f64) -> Option<f64> {
        if node >= self.node_count() {
            return None;
        }
        if let Some(position) = self.parking_position(node, at) {
            return Some(self.reserved[node][position].end);
        }
        self.free[node]
            .iter()
            .find(|window| window.start <= at && at < window.end)
            .map(|window| window.end)
    }

    /// Applies all claims or none of them.
    pub fn commit(&mut self, claims: &[Claim]) -> Result<(), RegistryError> {
        let mut staged = self.clone();
        for claim in claims {
            if claim.leaves_parking {
                staged.release_parking(claim.node, claim.start)?;
            }
            staged.split(claim.node, claim.start, claim.end, claim.next_node)?;
        }
        *self = staged;
        Ok(())
    }

    /// Checks that free and reserved windows of every node tile `[0, ∞)` exactly.
    pub fn verify_partition(&self) -> Result<(), RegistryError> {
        for node in 0..self.node_count() {
            let mut windows: Vec<&TimeWindow> =
                self.free[node].iter().chain(self.reserved[node].iter()).collect();
            sort_by_time(&mut windows, |window| window.start);

            let mut cursor = 0.0;
            for window in windows {
                if window.start != cursor || window.is_empty() {
                    return Err(RegistryError::Broken { node, at: cursor });
                }
                cursor = window.end;
            }
            if cursor != self.infinite {
                return Err(RegistryError::Broken { node, at: cursor });
            }
        }
        Ok(())
    }
}

fn insert_ordered(queue: &mut VecDeque<TimeWindow>, window: TimeWindow) {
    let position = queue.partition_point(|existing| existing.start <= window.start);
    queue.insert(position, window);
}

#[cfg(test)]
mod tests {
    use super::*;

    const INF: f64 = f64::INFINITY;

    #[test]
    fn test_insert_keeps_time_order() {
        let mut registry = IntervalRegistry::new(1, INF);
        registry.insert_free(TimeWindow::free(0, 5.0, 6.0, INF));
        registry.insert_free(TimeWindow::free(0, 1.0, 2.0, INF));
        registry.insert_free(TimeWindow::free(0, 3.0, 4.0, INF));

        let starts: Vec<f64> = registry.free(0).iter().map(|w| w.start).collect();
        assert_eq!(starts, vec![1.0, 3.0, 5.0]);
        assert_eq!(registry.pop_free(0).unwrap().start, 1.0);
        assert_eq!(registry.peek_free(0).unwrap().start, 3.0);
    }

    #[test]
    fn test_split_in_the_middle() {
        let mut registry = IntervalRegistry::fully_free(2, INF);
        registry.split(1, 2.0, 3.5, Some(0)).unwrap();

        assert_eq!(
            registry.free(1),
            &VecDeque::from(vec![
                TimeWindow::free(1, 0.0, 2.0, INF),
                TimeWindow::free(1, 3.5, INF, INF),
            ])
        );
        assert_eq!(
            registry.peek_reserved(1),
            Some(&TimeWindow::reserved(1, 2.0, 3.5, Some(0), INF))
        );
        registry.verify_partition().unwrap();
    }

    #[test]
    fn test_split_drops_empty_residuals() {
        let mut registry = IntervalRegistry::fully_free(1, INF);
        registry.split(0, 0.0, 4.0, Some(3)).unwrap();
        assert_eq!(registry.free(0).len(), 1);
        assert_eq!(registry.peek_free(0).unwrap().start, 4.0);

        registry.park(0, 4.0).unwrap();
        assert!(registry.free(0).is_empty());
        assert_eq!(registry.reserved(0).len(), 2);
        registry.verify_partition().unwrap();
    }

    #[test]
    fn test_split_outside_free_time_fails() {
        let mut registry = IntervalRegistry::fully_free(1, INF);
        registry.split(0, 1.0, 2.0, None).unwrap();

        assert_eq!(
            registry.split(0, 1.5, 3.0, None),
            Err(RegistryError::NoFreeWindow {
                node: 0,
                start: 1.5,
                end: 3.0
            })
        );
        assert!(matches!(
            registry.split(7, 0.0, 1.0, None),
            Err(RegistryError::UnknownNode { node: 7, .. })
        ));
    }

    #[test]
    fn test_release_parking() {
        let mut registry = IntervalRegistry::fully_free(1, INF);
        registry.park(0, 2.0).unwrap();
        assert_eq!(registry.available_until(0, 3.0), Some(INF));
        assert_eq!(registry.available_until(0, 1.0), Some(2.0));

        assert!(registry.release_parking(0, 3.0).unwrap());
        assert_eq!(
            registry.peek_reserved(0),
            Some(&TimeWindow::reserved(0, 2.0, 3.0, None, INF))
        );
        assert_eq!(registry.free(0).back(), Some(&TimeWindow::free(0, 3.0, INF, INF)));
        assert!(!registry.release_parking(0, 3.5).unwrap());
        registry.verify_partition().unwrap();
    }

    #[test]
    fn test_parked_slots_have_no_owner() {
        let mut registry = IntervalRegistry::fully_free(1, INF);
        // A target claim and a parked vehicle look the same to the registry.
        registry.split(0, 4.0, INF, None).unwrap();
        assert_eq!(registry.available_until(0, 5.0), Some(INF));

        // A vehicle passing through is never mistaken for a parked one.
        let mut passing = IntervalRegistry::fully_free(1, INF);
        passing.split(0, 4.0, 6.0, Some(1)).unwrap();
        assert_eq!(passing.available_until(0, 5.0), None);
        assert!(!passing.release_parking(0, 5.0).unwrap());

        assert!(registry.release_parking(0, 5.0).unwrap());
        assert_eq!(
            registry.reserved(0),
            &VecDeque::from(vec![TimeWindow::reserved(0, 4.0, 5.0, None, INF)])
        );
        registry.verify_partition().unwrap();
    }

    #[test]
    fn test_commit_is_all_or_nothing() {
        let mut registry = IntervalRegistry::fully_free(2, INF);
        registry.split(1, 1.0, 2.0, None).unwrap();
        let before = registry.clone();

        let claims = [
            Claim {
                node: 0,
                start: 0.0,
                end: 1.0,
                next_node: Some(1),
                leaves_parking: false,
            },
            Claim {
                node: 1,
                start: 1.5,
                end: INF,
                next_node: None,
                leaves_parking: false,
            },
        ];
        assert!(registry.commit(&claims).is_err());
        for node in 0..2 {
            assert_eq!(registry.free(node), before.free(node));
            assert_eq!(registry.reserved(node), before.reserved(node));
        }
    }

    #[test]
    fn test_verify_partition_detects_overlap() {
        let mut registry = IntervalRegistry::fully_free(1, INF);
        registry.insert_reserved(TimeWindow::reserved(0, 0.0, 1.0, None, INF));
        assert!(matches!(
            registry.verify_partition(),
            Err(RegistryError::Broken { node: 0, .. })
        ));

        let empty = IntervalRegistry::new(1, INF);
        assert_eq!(
            empty.verify_partition(),
            Err(RegistryError::Broken { node: 0, at: 0.0 })
        );
    }
}
