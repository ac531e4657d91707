//! Status combination algebra.
//!
//! Two rules with opposite dominance orders:
//!
//! - [`effective_status`] is conjunctive: negative dominates, then pending.
//!   It joins the two halves of one clinical criterion (anamnesis and a
//!   location's examination findings).
//! - [`aggregate_status`] is disjunctive: positive dominates, then pending.
//!   It summarises many statuses into "is anything of interest here".
//!
//! Do not merge them.

use crate::CriterionStatus;

/// Conjunctive combination of two statuses.
///
/// | a \ b    | positive | pending | negative |
/// |----------|----------|---------|----------|
/// | positive | positive | pending | negative |
/// | pending  | pending  | pending | negative |
/// | negative | negative | negative| negative |
pub fn effective_status(a: CriterionStatus, b: CriterionStatus) -> CriterionStatus {
    use CriterionStatus::*;
    match (a, b) {
        (Negative, _) | (_, Negative) => Negative,
        (Pending, _) | (_, Pending) => Pending,
        (Positive, Positive) => Positive,
    }
}

/// Disjunctive combination of any number of statuses.
///
/// Positive if any element is positive, else pending if any is pending,
/// else negative. An empty input is negative.
pub fn aggregate_status<I>(statuses: I) -> CriterionStatus
where
    I: IntoIterator<Item = CriterionStatus>,
{
    let mut saw_pending = false;
    for status in statuses {
        match status {
            CriterionStatus::Positive => return CriterionStatus::Positive,
            CriterionStatus::Pending => saw_pending = true,
            CriterionStatus::Negative => {}
        }
    }
    if saw_pending {
        CriterionStatus::Pending
    } else {
        CriterionStatus::Negative
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use CriterionStatus::*;

    const ALL: [CriterionStatus; 3] = [Positive, Negative, Pending];

    #[test]
    fn test_effective_negative_dominates() {
        for x in ALL {
            assert_eq!(effective_status(Negative, x), Negative);
            assert_eq!(effective_status(x, Negative), Negative);
        }
    }

    #[test]
    fn test_effective_pending_beats_positive() {
        assert_eq!(effective_status(Positive, Pending), Pending);
        assert_eq!(effective_status(Pending, Positive), Pending);
        assert_eq!(effective_status(Positive, Positive), Positive);
    }

    #[test]
    fn test_effective_is_commutative() {
        for a in ALL {
            for b in ALL {
                assert_eq!(effective_status(a, b), effective_status(b, a));
            }
        }
    }

    #[test]
    fn test_aggregate_positive_dominates() {
        for x in ALL {
            for y in ALL {
                assert_eq!(aggregate_status([x, Positive, y]), Positive);
            }
        }
    }

    #[test]
    fn test_aggregate_pending_beats_negative() {
        assert_eq!(aggregate_status([Negative, Pending, Negative]), Pending);
        assert_eq!(aggregate_status([Negative, Negative]), Negative);
    }

    #[test]
    fn test_aggregate_empty_is_negative() {
        assert_eq!(aggregate_status(std::iter::empty()), Negative);
    }

    #[test]
    fn test_rules_disagree_on_mixed_input() {
        // The two orders are opposite: the same pair combines differently.
        assert_eq!(effective_status(Positive, Negative), Negative);
        assert_eq!(aggregate_status([Positive, Negative]), Positive);
    }
}
