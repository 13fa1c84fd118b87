//! Character-bigram string similarity.

use std::collections::HashMap;

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

fn bigrams(s: &str) -> Vec<(char, char)> {
    let chars: Vec<char> = s.chars().collect();
    chars.windows(2).map(|w| (w[0], w[1])).collect()
}

/// Similarity of two strings as the Dice coefficient over character
/// bigrams, in `0.0..=1.0`.
///
/// Comparison is case-insensitive and whitespace-trimmed. Strings that
/// normalize to equal compare as `1.0`; an empty side compares as `0.0`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = normalize(a);
    let b = normalize(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }

    let a_bigrams = bigrams(&a);
    let b_bigrams = bigrams(&b);
    if a_bigrams.is_empty() || b_bigrams.is_empty() {
        // At least one single-character string, and they are not equal.
        return 0.0;
    }

    let mut counts: HashMap<(char, char), usize> = HashMap::new();
    for bigram in &a_bigrams {
        *counts.entry(*bigram).or_insert(0) += 1;
    }
    let mut overlap = 0usize;
    for bigram in &b_bigrams {
        if let Some(count) = counts.get_mut(bigram) {
            if *count > 0 {
                *count -= 1;
                overlap += 1;
            }
        }
    }

    2.0 * overlap as f64 / (a_bigrams.len() + b_bigrams.len()) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_strings_score_one() {
        assert!((similarity("Newsletter", "newsletter") - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_disjoint_strings_score_zero() {
        assert!(similarity("abc", "xyz").abs() < f64::EPSILON);
    }

    #[test]
    fn test_typo_scores_high() {
        assert!(similarity("newsleter", "newsletter") > 0.8);
    }

    #[test]
    fn test_empty_side_scores_zero() {
        assert!(similarity("", "anything").abs() < f64::EPSILON);
        assert!(similarity("   ", "anything").abs() < f64::EPSILON);
    }

    #[test]
    fn test_single_characters() {
        assert!((similarity("a", "a") - 1.0).abs() < f64::EPSILON);
        assert!(similarity("a", "b").abs() < f64::EPSILON);
    }

    #[test]
    fn test_symmetry() {
        let ab = similarity("invoice march", "invojce marsh");
        let ba = similarity("invojce marsh", "invoice march");
        assert!((ab - ba).abs() < f64::EPSILON);
    }

    proptest::proptest! {
        #[test]
        fn test_score_stays_in_unit_range(a in ".*", b in ".*") {
            let score = similarity(&a, &b);
            proptest::prop_assert!((0.0..=1.0).contains(&score));
        }

        #[test]
        fn test_argument_order_is_irrelevant(a in ".*", b in ".*") {
            proptest::prop_assert!((similarity(&a, &b) - similarity(&b, &a)).abs() < f64::EPSILON);
        }
    }
}
