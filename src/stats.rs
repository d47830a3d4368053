//! Small numeric helpers shared by the reports.
//!
//! Every ratio guards a zero denominator and yields 0 instead.

/// Round half away from zero to 2 decimals.
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// `part / whole * 100`, 0 when `whole` is 0.
pub fn percent(part: i64, whole: i64) -> f64 {
    if whole <= 0 {
        return 0.0;
    }
    part as f64 / whole as f64 * 100.0
}

/// correct / (correct + incorrect) * 100, rounded.
pub fn accuracy(correct: i64, incorrect: i64) -> f64 {
    round2(percent(correct, correct + incorrect))
}

pub fn completion_percentage(completed: i64, total: i64) -> f64 {
    round2(percent(completed, total))
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Mean {
    sum: f64,
    count: i64,
}

impl Mean {
    pub fn push(&mut self, v: f64) {
        self.sum += v;
        self.count += 1;
    }

    /// Rounded mean, 0 when empty.
    pub fn value(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            round2(self.sum / self.count as f64)
        }
    }
}

/// Running correct/incorrect/skipped tally plus mean time over non-skipped
/// timed responses. A zero `time_spent` counts as untimed.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Tally {
    pub correct: i64,
    pub incorrect: i64,
    pub skipped: i64,
    pub time: Mean,
}

impl Tally {
    pub fn push(&mut self, status: crate::model::ResponseStatus, time_spent: Option<i64>) {
        use crate::model::ResponseStatus;
        match status {
            ResponseStatus::Correct => self.correct += 1,
            ResponseStatus::Incorrect => self.incorrect += 1,
            ResponseStatus::Skipped => {
                self.skipped += 1;
                return;
            }
        }
        if let Some(t) = time_spent.filter(|t| *t != 0) {
            self.time.push(t as f64);
        }
    }

    pub fn total(&self) -> i64 {
        self.correct + self.incorrect + self.skipped
    }

    pub fn answered(&self) -> i64 {
        self.correct + self.incorrect
    }

    pub fn accuracy(&self) -> f64 {
        accuracy(self.correct, self.incorrect)
    }

    pub fn avg_time(&self) -> f64 {
        self.time.value()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    VeryHard,
}

impl Difficulty {
    pub fn from_success_rate(rate: f64) -> Self {
        if rate >= 80.0 {
            Difficulty::Easy
        } else if rate >= 60.0 {
            Difficulty::Medium
        } else if rate >= 40.0 {
            Difficulty::Hard
        } else {
            Difficulty::VeryHard
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
            Difficulty::VeryHard => "Very Hard",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ResponseStatus;

    #[test]
    fn zero_denominators_yield_zero() {
        assert_eq!(percent(5, 0), 0.0);
        assert_eq!(accuracy(0, 0), 0.0);
        assert_eq!(completion_percentage(3, 0), 0.0);
        assert_eq!(Mean::default().value(), 0.0);
    }

    #[test]
    fn completion_rounds_to_two_decimals() {
        assert_eq!(completion_percentage(3, 9), 33.33);
        assert_eq!(completion_percentage(2, 3), 66.67);
        assert_eq!(completion_percentage(9, 9), 100.0);
    }

    #[test]
    fn accuracy_stays_within_bounds() {
        for correct in 0..6 {
            for incorrect in 0..6 {
                let a = accuracy(correct, incorrect);
                assert!((0.0..=100.0).contains(&a), "{correct}/{incorrect} -> {a}");
            }
        }
    }

    #[test]
    fn tally_ignores_skipped_for_accuracy_and_time() {
        let mut t = Tally::default();
        t.push(ResponseStatus::Correct, Some(10));
        t.push(ResponseStatus::Incorrect, Some(20));
        t.push(ResponseStatus::Skipped, Some(1000));
        t.push(ResponseStatus::Correct, None);
        assert_eq!(t.total(), 4);
        assert_eq!(t.answered(), 3);
        assert_eq!(t.accuracy(), 66.67);
        assert_eq!(t.avg_time(), 15.0);
    }

    #[test]
    fn zero_seconds_is_untimed() {
        let mut t = Tally::default();
        t.push(ResponseStatus::Correct, Some(0));
        assert_eq!(t.avg_time(), 0.0);
        t.push(ResponseStatus::Incorrect, Some(30));
        t.push(ResponseStatus::Correct, Some(0));
        assert_eq!(t.avg_time(), 30.0);
        assert_eq!(t.answered(), 3);
    }

    #[test]
    fn difficulty_buckets() {
        assert_eq!(Difficulty::from_success_rate(80.0).label(), "Easy");
        assert_eq!(Difficulty::from_success_rate(79.99).label(), "Medium");
        assert_eq!(Difficulty::from_success_rate(60.0).label(), "Medium");
        assert_eq!(Difficulty::from_success_rate(40.0).label(), "Hard");
        assert_eq!(Difficulty::from_success_rate(39.9).label(), "Very Hard");
    }
}
