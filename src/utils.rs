//! Utility functions for the dprl crate

use rand::{Rng, SeedableRng, rngs::StdRng};

/// Build a random number generator from an optional seed.
///
/// Seeded generators make training runs reproducible; unseeded generators
/// draw their state from the thread-local entropy source.
pub fn build_rng(seed: Option<u64>) -> StdRng {
    if let Some(seed) = seed {
        StdRng::seed_from_u64(seed)
    } else {
        StdRng::from_rng(&mut rand::rng())
    }
}

/// Decide a Bernoulli outcome with the given probability of `true`.
///
/// # Arguments
///
/// * `rng` - Mutable reference to a random number generator
/// * `probability` - Probability of returning `true`, expected in [0, 1]
///
/// # Examples
///
/// ```
/// use rand::SeedableRng;
/// use rand::rngs::StdRng;
/// use dprl::utils::random_decide;
///
/// let mut rng = StdRng::seed_from_u64(42);
/// assert!(!random_decide(&mut rng, 0.0));
/// assert!(random_decide(&mut rng, 1.0));
/// ```
pub fn random_decide<R>(rng: &mut R, probability: f64) -> bool
where
    R: Rng + ?Sized,
{
    rng.random::<f64>() < probability
}

/// Index of the largest value in an iterator, with ties broken toward the
/// lowest index.
///
/// Returns `None` for an empty iterator. The lowest-index tie break keeps
/// greedy decisions deterministic, which matters when comparing learned
/// policies against exact solutions.
///
/// # Examples
///
/// ```
/// use dprl::utils::argmax;
///
/// assert_eq!(argmax(vec![1.0, 3.0, 2.0]), Some(1));
///
/// // Ties resolve to the lowest index
/// assert_eq!(argmax(vec![2.0, 5.0, 5.0]), Some(1));
///
/// assert_eq!(argmax(Vec::<f64>::new()), None);
/// ```
pub fn argmax<I>(values: I) -> Option<usize>
where
    I: IntoIterator<Item = f64>,
{
    let mut best: Option<(usize, f64)> = None;
    for (index, value) in values.into_iter().enumerate() {
        match best {
            Some((_, best_value)) if value <= best_value => {}
            _ => best = Some((index, value)),
        }
    }
    best.map(|(index, _)| index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argmax_prefers_lowest_index_on_ties() {
        assert_eq!(argmax(vec![1.0, 1.0, 1.0]), Some(0));
        assert_eq!(argmax(vec![0.0, 7.0, 7.0, 3.0]), Some(1));
    }

    #[test]
    fn argmax_handles_negative_values() {
        assert_eq!(argmax(vec![-3.0, -1.0, -2.0]), Some(1));
    }

    #[test]
    fn test_random_decide_extremes() {
        let mut rng = build_rng(Some(7));
        for _ in 0..100 {
            assert!(!random_decide(&mut rng, 0.0));
            assert!(random_decide(&mut rng, 1.0));
        }
    }

    #[test]
    fn test_build_rng_deterministic_with_seed() {
        let mut rng1 = build_rng(Some(12345));
        let mut rng2 = build_rng(Some(12345));
        let draws1: Vec<f64> = (0..5).map(|_| rng1.random()).collect();
        let draws2: Vec<f64> = (0..5).map(|_| rng2.random()).collect();
        assert_eq!(draws1, draws2);
    }
}
