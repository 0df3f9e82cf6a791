use std::cmp::Ordering;

/// Total order over time stamps so they can key heaps and sorts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeKey(pub f64);

impl Eq for TimeKey {}

impl Ord for TimeKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl PartialOrd for TimeKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Stable ascending sort of raw time stamps.
pub fn sort_times(times: &mut [f64]) {
    times.sort_by_key(|&time| TimeKey(time));
}

/// Stable ascending sort by a time key; equal times keep their input order.
pub fn sort_by_time<T, F>(items: &mut [T], time_of: F)
where
    F: Fn(&T) -> f64,
{
    items.sort_by_key(|item| TimeKey(time_of(item)));
}
