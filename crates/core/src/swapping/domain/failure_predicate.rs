use crate::shared::frame::Frame;

/// Judgement on one strategy's output.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Verdict {
    Accepted { diff: f64 },
    /// Mean absolute difference below epsilon: the stage changed nothing
    /// worth keeping.
    NoOp { diff: f64 },
    /// The candidate does not have the input's dimensions or channels.
    ShapeMismatch,
}

/// Mean-absolute-difference test shared by every strategy.
///
/// The epsilon is a tuned value on the 8-bit scale and does not transfer
/// across bit depths, so it comes from configuration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FailurePredicate {
    epsilon: f64,
}

impl FailurePredicate {
    pub fn new(epsilon: f64) -> Self {
        Self { epsilon }
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn evaluate(&self, candidate: &Frame, original: &Frame) -> Verdict {
        match candidate.mean_abs_diff(original) {
            None => Verdict::ShapeMismatch,
            Some(diff) if diff < self.epsilon => Verdict::NoOp { diff },
            Some(diff) => Verdict::Accepted { diff },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::identical(100, false)]
    #[case::just_below(104, false)]
    #[case::at_epsilon(105, true)]
    #[case::large(180, true)]
    fn test_uniform_shift(#[case] value: u8, #[case] accepted: bool) {
        let original = Frame::filled(4, 4, [100, 100, 100], 0);
        let candidate = Frame::filled(4, 4, [value, value, value], 0);
        let verdict = FailurePredicate::new(5.0).evaluate(&candidate, &original);
        assert_eq!(matches!(verdict, Verdict::Accepted { .. }), accepted);
    }

    #[test]
    fn test_shape_mismatch() {
        let original = Frame::filled(4, 4, [0, 0, 0], 0);
        let candidate = Frame::filled(4, 5, [0, 0, 0], 0);
        assert_eq!(
            FailurePredicate::new(5.0).evaluate(&candidate, &original),
            Verdict::ShapeMismatch
        );
    }

    #[test]
    fn test_zero_epsilon_accepts_identity() {
        let f = Frame::filled(2, 2, [9, 9, 9], 0);
        assert_eq!(
            FailurePredicate::new(0.0).evaluate(&f, &f),
            Verdict::Accepted { diff: 0.0 }
        );
    }
}
