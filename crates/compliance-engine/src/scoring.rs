//! Weighted compliance score

/// Weighted share of matched requirements as a percentage with one decimal.
///
/// Rounding never reports 100 unless everything matched, nor 0 unless nothing
/// did. With nothing to evaluate the score is 100.
pub fn compute_score<I>(items: I) -> f64
where
    I: IntoIterator<Item = (f64, bool)>,
{
    let mut total = 0.0;
    let mut matched = 0.0;
    let mut any_matched = false;
    let mut all_matched = true;

    for (weight, is_matched) in items {
        total += weight;
        if is_matched {
            matched += weight;
            any_matched = true;
        } else {
            all_matched = false;
        }
    }

    if total <= 0.0 || all_matched {
        return 100.0;
    }
    if !any_matched {
        return 0.0;
    }

    let score = (matched / total * 1000.0).round() / 10.0;
    score.clamp(0.1, 99.9)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weighted_share() {
        assert_eq!(compute_score([(5.0, true), (3.0, false)]), 62.5);
        assert_eq!(compute_score([(1.0, true), (1.0, false), (1.0, false)]), 33.3);
    }

    #[test]
    fn test_extremes() {
        assert_eq!(compute_score([(1.0, true), (2.0, true)]), 100.0);
        assert_eq!(compute_score([(1.0, false), (2.0, false)]), 0.0);
        assert_eq!(compute_score(std::iter::empty()), 100.0);
    }

    #[test]
    fn test_rounding_never_reaches_bounds() {
        assert_eq!(compute_score([(9999.0, true), (1.0, false)]), 99.9);
        assert_eq!(compute_score([(1.0, true), (9999.0, false)]), 0.1);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn items() -> impl Strategy<Value = Vec<(f64, bool)>> {
            prop::collection::vec((0.1f64..100.0, any::<bool>()), 1..30)
        }

        proptest! {
            #[test]
            fn score_in_range(items in items()) {
                let score = compute_score(items);
                prop_assert!((0.0..=100.0).contains(&score));
            }

            #[test]
            fn score_is_100_iff_all_matched(items in items()) {
                let all = items.iter().all(|(_, m)| *m);
                prop_assert_eq!(compute_score(items) == 100.0, all);
            }

            #[test]
            fn score_is_0_iff_none_matched(items in items()) {
                let none = items.iter().all(|(_, m)| !*m);
                prop_assert_eq!(compute_score(items) == 0.0, none);
            }
        }
    }
}
