//! Deterministic ensemble thinning.
//!
//! Thinning selects evenly-spaced member indices over the full range
//! instead of truncating to the first `k`, preserving the spread the
//! ensemble was built to express. The mapping is a pure function of
//! `(n, k)` — its output feeds cache keys, so identical inputs must
//! produce identical selections across runs.
//!
//! Rounding policy: slot `i` maps to `round(i * (n-1) / (k-1))` with
//! ties rounding away from zero (`f64::round`). Consecutive slots are
//! at least 1.0 apart for `k <= n`, so the rounded indices are strictly
//! increasing — no dedup step is needed.

/// Select `k` evenly-spaced indices from `0..n`.
///
/// Returns all indices when `k >= n`, `[0]` when `k == 1`, and always
/// includes both `0` and `n - 1` when `k >= 2`.
#[must_use]
pub fn thin_indices(n: usize, k: usize) -> Vec<usize> {
    if n == 0 {
        return Vec::new();
    }
    if k >= n {
        return (0..n).collect();
    }
    if k <= 1 {
        return vec![0];
    }

    let span = (n - 1) as f64;
    let slots = (k - 1) as f64;
    (0..k)
        .map(|i| ((i as f64) * span / slots).round() as usize)
        .collect()
}

/// Map selected indices to `memberNN` labels.
#[must_use]
pub fn member_labels(indices: &[usize]) -> Vec<String> {
    indices.iter().map(|i| format!("member{i:02}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn k_at_least_n_returns_all() {
        assert_eq!(thin_indices(5, 5), vec![0, 1, 2, 3, 4]);
        assert_eq!(thin_indices(5, 10), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn k_of_one_keeps_control_member() {
        assert_eq!(thin_indices(51, 1), vec![0]);
    }

    #[test]
    fn endpoints_always_present() {
        for n in 2..=60 {
            for k in 2..n {
                let picked = thin_indices(n, k);
                assert_eq!(picked.len(), k, "n={n} k={k}");
                assert_eq!(picked[0], 0, "n={n} k={k}");
                assert_eq!(*picked.last().unwrap(), n - 1, "n={n} k={k}");
            }
        }
    }

    #[test]
    fn indices_distinct_and_increasing() {
        for n in 1..=60 {
            for k in 1..=n {
                let picked = thin_indices(n, k);
                assert_eq!(picked.len(), k, "n={n} k={k}");
                assert!(
                    picked.windows(2).all(|w| w[0] < w[1]),
                    "not strictly increasing for n={n} k={k}: {picked:?}"
                );
                assert!(picked.iter().all(|&i| i < n), "n={n} k={k}");
            }
        }
    }

    #[test]
    fn deterministic_across_calls() {
        assert_eq!(thin_indices(51, 16), thin_indices(51, 16));
    }

    #[test]
    fn pinned_rounding_examples() {
        // (n-1)/(k-1) non-integer: nearest-integer, ties away from zero.
        assert_eq!(thin_indices(10, 4), vec![0, 3, 6, 9]);
        assert_eq!(thin_indices(51, 4), vec![0, 17, 33, 50]);
        assert_eq!(thin_indices(7, 3), vec![0, 3, 6]);
        assert_eq!(thin_indices(6, 4), vec![0, 2, 3, 5]);
    }

    #[test]
    fn labels_are_zero_padded() {
        assert_eq!(
            member_labels(&[0, 5, 50]),
            vec!["member00", "member05", "member50"]
        );
    }

    #[test]
    fn zero_members_is_empty() {
        assert!(thin_indices(0, 4).is_empty());
    }
}
