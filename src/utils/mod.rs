// Utility functions for feed-ranking

use std::collections::HashSet;
use std::hash::Hash;

/// Compute exponential decay for time-based scoring.
/// Reaches 0.5 at one half-life.
pub fn exponential_decay(age_hours: f32, half_life_hours: f32) -> f32 {
    (-age_hours / half_life_hours * std::f32::consts::LN_2).exp()
}

/// Jaccard similarity between two sets. Empty-over-empty is 0.
pub fn jaccard<T: Eq + Hash>(a: &HashSet<T>, b: &HashSet<T>) -> f32 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f32 / union as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_decay() {
        // One half-life decays to 0.5
        let score = exponential_decay(24.0, 24.0);
        assert!((score - 0.5).abs() < 0.001);

        // Zero age has no decay
        let score_fresh = exponential_decay(0.0, 24.0);
        assert!((score_fresh - 1.0).abs() < 0.001);

        // A week out is effectively zero
        let score_old = exponential_decay(168.0, 24.0);
        assert!(score_old < 0.01);
    }

    #[test]
    fn test_jaccard() {
        let a: HashSet<&str> = ["ai", "rust"].into_iter().collect();
        let b: HashSet<&str> = ["ai", "startups"].into_iter().collect();
        assert!((jaccard(&a, &b) - 1.0 / 3.0).abs() < 0.001);

        let identical: HashSet<&str> = ["ai"].into_iter().collect();
        assert!((jaccard(&identical, &identical) - 1.0).abs() < 0.001);

        let empty: HashSet<&str> = HashSet::new();
        assert_eq!(jaccard(&empty, &empty), 0.0);
    }
}
