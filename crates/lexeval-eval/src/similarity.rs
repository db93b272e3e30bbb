//! String similarity for fuzzy matching

/// Length of the longest common subsequence of two char slices
fn lcs_len(a: &[char], b: &[char]) -> usize {
    // Single rolling row over the shorter side
    let (long, short) = if a.len() >= b.len() { (a, b) } else { (b, a) };
    let mut row = vec![0usize; short.len() + 1];

    for &lc in long {
        let mut diag = 0;
        for (j, &sc) in short.iter().enumerate() {
            let above = row[j + 1];
            row[j + 1] = if lc == sc {
                diag + 1
            } else {
                above.max(row[j])
            };
            diag = above;
        }
    }

    row[short.len()]
}

/// Similarity ratio in [0, 1]: `2 * LCS(a, b) / (|a| + |b|)` over chars
///
/// Symmetric, and `ratio(a, a) == 1.0` (including two empty strings).
pub fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }

    2.0 * lcs_len(&a, &b) as f64 / total as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_identical_strings() {
        assert_eq!(ratio("apelacao nº 123", "apelacao nº 123"), 1.0);
        assert_eq!(ratio("", ""), 1.0);
    }

    #[test]
    fn test_disjoint_strings() {
        assert_eq!(ratio("abc", "xyz"), 0.0);
        assert_eq!(ratio("abc", ""), 0.0);
    }

    #[test]
    fn test_partial_overlap() {
        // LCS("abc", "abd") = "ab"
        assert!((ratio("abc", "abd") - 4.0 / 6.0).abs() < 1e-12);
        // LCS("banco do brasil", "banco brasil") = "banco brasil" (12 chars)
        assert!((ratio("banco do brasil", "banco brasil") - 24.0 / 27.0).abs() < 1e-12);
    }

    #[test]
    fn test_counts_chars_not_bytes() {
        assert!((ratio("são", "sao") - 4.0 / 6.0).abs() < 1e-12);
    }

    proptest! {
        #[test]
        fn prop_ratio_is_symmetric(a in "[a-eç ]{0,16}", b in "[a-eç ]{0,16}") {
            prop_assert_eq!(ratio(&a, &b), ratio(&b, &a));
        }

        #[test]
        fn prop_ratio_in_unit_interval(a in "\\PC{0,16}", b in "\\PC{0,16}") {
            let r = ratio(&a, &b);
            prop_assert!((0.0..=1.0).contains(&r));
        }
    }
}
