//! Progress snapshots, one per visited block.

/// Progress of a run after a visited block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueryProgress {
    /// Blocks fully processed so far. Strictly increasing per run.
    pub blocks_seen: u64,
    /// Matches emitted so far.
    pub matches_found: usize,
    /// `round(matches_found / result_bound * 100)`, clamped to `0..=100`.
    pub percent: u8,
    /// Length of the chain when the run started, if the port knows it.
    pub total_blocks: Option<u64>,
}

impl QueryProgress {
    pub fn snapshot(blocks_seen: u64, matches_found: usize, result_bound: usize) -> Self {
        Self {
            blocks_seen,
            matches_found,
            percent: percent_of(matches_found, result_bound),
            total_blocks: None,
        }
    }

    pub fn with_total_blocks(mut self, total_blocks: Option<u64>) -> Self {
        self.total_blocks = total_blocks;
        self
    }
}

/// Rounds half up, like the display layer expects.
fn percent_of(found: usize, bound: usize) -> u8 {
    if bound == 0 {
        return 0;
    }
    let found = found as u128;
    let bound = bound as u128;
    let rounded = (found * 200 + bound) / (bound * 2);
    rounded.min(100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_rounds_to_nearest() {
        let p: Vec<u8> = (1..=3)
            .map(|found| QueryProgress::snapshot(1, found, 3).percent)
            .collect();
        assert_eq!(p, vec![33, 67, 100]);

        assert_eq!(QueryProgress::snapshot(4, 0, 10).percent, 0);
        assert_eq!(QueryProgress::snapshot(4, 1, 200).percent, 1); // 0.5 rounds up
        assert_eq!(QueryProgress::snapshot(4, 1, 201).percent, 0);
    }

    #[test]
    fn percent_is_clamped() {
        assert_eq!(QueryProgress::snapshot(1, 12, 10).percent, 100);
        assert_eq!(QueryProgress::snapshot(1, usize::MAX, 1).percent, 100);
        assert_eq!(QueryProgress::snapshot(1, 3, 0).percent, 0);
    }
}
