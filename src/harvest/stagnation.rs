//! Stagnation detection with a bounded low-yield retry.

/// Outcome of one stagnation check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Container height or record count grew.
    Progress,
    /// No growth yet, but patience remains.
    Waiting { stagnant: u32 },
    /// Patience ran out with too few records; counter was reset.
    Retry,
    /// Patience ran out for good.
    Stagnated,
}

/// Tracks consecutive iterations without growth.
///
/// When patience runs out while fewer than `low_yield_floor` records have
/// been seen, the counter is reset up to `low_yield_retries` times before
/// the feed is declared stagnant.
#[derive(Debug, Clone)]
pub struct StagnationPolicy {
    patience: u32,
    low_yield_floor: usize,
    retries_left: u32,
    stagnant: u32,
    last_height: Option<u64>,
    last_seen: usize,
}

impl StagnationPolicy {
    pub fn new(patience: u32, low_yield_floor: usize, low_yield_retries: u32) -> Self {
        Self {
            patience: patience.max(1),
            low_yield_floor,
            retries_left: low_yield_retries,
            stagnant: 0,
            last_height: None,
            last_seen: 0,
        }
    }

    /// Record the starting point without judging it.
    pub fn prime(&mut self, height: Option<u64>, seen: usize) {
        if height.is_some() {
            self.last_height = height;
        }
        self.last_seen = seen;
    }

    /// Judge one iteration's measurements.
    pub fn observe(&mut self, height: Option<u64>, seen: usize) -> Verdict {
        let height_grew = match (height, self.last_height) {
            (Some(h), Some(last)) => h > last,
            (Some(_), None) => true,
            (None, _) => false,
        };
        let seen_grew = seen > self.last_seen;

        if let Some(h) = height {
            self.last_height = Some(self.last_height.map_or(h, |last| last.max(h)));
        }
        self.last_seen = self.last_seen.max(seen);

        if height_grew || seen_grew {
            self.stagnant = 0;
            return Verdict::Progress;
        }

        self.stagnant += 1;
        if self.stagnant < self.patience {
            return Verdict::Waiting {
                stagnant: self.stagnant,
            };
        }

        if seen < self.low_yield_floor && self.retries_left > 0 {
            self.retries_left -= 1;
            self.stagnant = 0;
            Verdict::Retry
        } else {
            Verdict::Stagnated
        }
    }

    /// Consecutive iterations without growth.
    pub fn stagnant(&self) -> u32 {
        self.stagnant
    }

    pub fn patience(&self) -> u32 {
        self.patience
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stagnates_after_patience() {
        let mut policy = StagnationPolicy::new(3, 0, 1);
        policy.prime(Some(1000), 5);
        assert_eq!(policy.observe(Some(1500), 5), Verdict::Progress);
        assert_eq!(policy.observe(Some(1500), 5), Verdict::Waiting { stagnant: 1 });
        assert_eq!(policy.observe(Some(1500), 5), Verdict::Waiting { stagnant: 2 });
        assert_eq!(policy.observe(Some(1500), 5), Verdict::Stagnated);
    }

    #[test]
    fn test_seen_growth_counts_as_progress() {
        let mut policy = StagnationPolicy::new(2, 0, 0);
        policy.prime(None, 0);
        assert_eq!(policy.observe(None, 3), Verdict::Progress);
        assert_eq!(policy.observe(None, 3), Verdict::Waiting { stagnant: 1 });
        assert_eq!(policy.observe(None, 4), Verdict::Progress);
        assert_eq!(policy.stagnant(), 0);
    }

    #[test]
    fn test_height_shrink_is_not_growth() {
        let mut policy = StagnationPolicy::new(5, 0, 0);
        policy.prime(Some(2000), 0);
        assert_eq!(policy.observe(Some(1800), 0), Verdict::Waiting { stagnant: 1 });
        // Back to the old maximum is still not growth.
        assert_eq!(policy.observe(Some(2000), 0), Verdict::Waiting { stagnant: 2 });
        assert_eq!(policy.observe(Some(2001), 0), Verdict::Progress);
    }

    #[test]
    fn test_low_yield_retry_is_bounded() {
        let mut policy = StagnationPolicy::new(2, 10, 1);
        policy.prime(Some(100), 2);
        assert_eq!(policy.observe(Some(100), 2), Verdict::Waiting { stagnant: 1 });
        assert_eq!(policy.observe(Some(100), 2), Verdict::Retry);
        assert_eq!(policy.stagnant(), 0);
        assert_eq!(policy.observe(Some(100), 2), Verdict::Waiting { stagnant: 1 });
        assert_eq!(policy.observe(Some(100), 2), Verdict::Stagnated);
    }

    #[test]
    fn test_no_retry_above_floor() {
        let mut policy = StagnationPolicy::new(1, 10, 3);
        policy.prime(None, 12);
        assert_eq!(policy.observe(None, 12), Verdict::Stagnated);
    }
}
