use tracing::info;

/// Logs the progress of a long step roughly every tenth of the way
pub struct ProgressLog {
    label: &'static str,
    total: usize,
    step: usize,
    next: usize,
}

impl ProgressLog {
    pub fn new(label: &'static str, total: usize) -> Self {
        let step = (total / 10).max(1);
        Self {
            label,
            total,
            step,
            next: step,
        }
    }

    /// Returns true when a line was logged
    pub fn update(&mut self, done: usize) -> bool {
        if done < self.next && done != self.total {
            return false;
        }
        self.next = done + self.step;
        info!(done, total = self.total, "{}", self.label);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_every_tenth_and_the_end() {
        let mut progress = ProgressLog::new("Scoring", 95);
        let logged: Vec<usize> = (1..=95).filter(|&n| progress.update(n)).collect();
        assert_eq!(logged, vec![9, 18, 27, 36, 45, 54, 63, 72, 81, 90, 95]);
    }

    #[test]
    fn small_totals_report_every_step() {
        let mut progress = ProgressLog::new("Weights", 3);
        assert!(progress.update(1));
        assert!(progress.update(2));
        assert!(progress.update(3));
    }
}
