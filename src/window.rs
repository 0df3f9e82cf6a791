use serde::Serialize;

use crate::common::NodeId;

/// Index of a window record inside a routing session's arena.
pub type WindowId = usize;

/// How the search got onto a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Heading {
    /// The AGV's own starting position.
    Origin,
    /// Entered `via` over the edge from `from`.
    Arrived { from: NodeId, via: NodeId },
}

impl Heading {
    pub fn previous(&self) -> Option<NodeId> {
        match self {
            Heading::Origin => None,
            Heading::Arrived { from, .. } => Some(*from),
        }
    }
}

/// A contiguous stretch of time on one node, either free or held by a vehicle.
///
/// Registry entries only use `node`, `start`, `end` and `next_node`; the other fields
/// are scratch state of the routing search.
#[derive(Debug, Clone, Serialize)]
pub struct TimeWindow {
    pub node: NodeId,
    pub start: f64,
    pub end: f64,
    pub least_time_reach_here: f64,
    pub heading: Heading,
    pub last_time_window: Option<WindowId>,
    /// Where the holder drives next; `None` means it parks.
    pub next_node: Option<NodeId>,
    pub first_step: bool,
}

impl TimeWindow {
    pub fn free(node: NodeId, start: f64, end: f64, infinite: f64) -> Self {
        TimeWindow {
            node,
            start,
            end,
            least_time_reach_here: infinite,
            heading: Heading::Origin,
            last_time_window: None,
            next_node: None,
            first_step: false,
        }
    }

    pub fn reserved(
        node: NodeId,
        start: f64,
        end: f64,
        next_node: Option<NodeId>,
        infinite: f64,
    ) -> Self {
        TimeWindow {
            next_node,
            ..TimeWindow::free(node, start, end, infinite)
        }
    }

    /// Search record for an AGV standing on `node` from `time` until `end`.
    pub fn origin(node: NodeId, time: f64, end: f64) -> Self {
        TimeWindow {
            node,
            start: time,
            end,
            least_time_reach_here: time,
            heading: Heading::Origin,
            last_time_window: None,
            next_node: None,
            first_step: true,
        }
    }

    pub fn contains(&self, start: f64, end: f64) -> bool {
        self.start <= start && end <= self.end
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

impl PartialEq for TimeWindow {
    fn eq(&self, other: &Self) -> bool {
        self.node == other.node
            && self.start == other.start
            && self.end == other.end
            && self.next_node == other.next_node
    }
}
