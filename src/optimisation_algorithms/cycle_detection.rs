use std::fmt::Display;

/// A repetition found in the pivot history: the pivots `start..start + length` are
/// immediately repeated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cycle {
    pub start: usize,
    pub length: usize,
}

impl Display for Cycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "pivot sequence of length {} starting at pivot {} repeats",
            self.length, self.start
        )
    }
}

/// Sequence of (leaving variable, entering variable) pairs of the pivots of one phase.
#[derive(Clone, Debug, Default)]
pub struct PivotHistory {
    pivots: Vec<(usize, usize)>,
}

impl PivotHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pivots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pivots.is_empty()
    }

    /// Appends a pivot and scans the history for a cycle.
    pub fn record(&mut self, leaving: usize, entering: usize) -> Option<Cycle> {
        self.pivots.push((leaving, entering));
        self.find_cycle()
    }

    /// Looks for two equal pivots such that the run starting at the first one is
    /// repeated, in full, starting at the second one.
    pub fn find_cycle(&self) -> Option<Cycle> {
        let pivots = &self.pivots;
        let len = pivots.len();
        for e1 in 0..len.saturating_sub(1) {
            for e2 in e1 + 1..len {
                if pivots[e1] != pivots[e2] {
                    continue;
                }
                let length = e2 - e1;
                if length > len - e2 {
                    break;
                }
                if (1..length).all(|i| pivots[e1 + i] == pivots[e2 + i]) {
                    return Some(Cycle { start: e1, length });
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_cycle() {
        let mut history = PivotHistory::new();
        assert_eq!(history.record(1, 2), None);
        assert_eq!(history.record(2, 3), None);
        assert_eq!(history.record(3, 1), None);
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn cycle_of_two() {
        let mut history = PivotHistory::new();
        history.record(5, 6);
        history.record(1, 2);
        history.record(2, 1);
        history.record(1, 2);
        assert_eq!(history.find_cycle(), None);
        let cycle = history.record(2, 1).unwrap();
        assert_eq!(cycle, Cycle { start: 1, length: 2 });
    }

    #[test]
    fn repeated_pivot() {
        let mut history = PivotHistory::new();
        history.record(4, 7);
        assert_eq!(history.record(4, 7), Some(Cycle { start: 0, length: 1 }));
    }
}
