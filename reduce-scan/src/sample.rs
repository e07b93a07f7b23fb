use rand::distributions::Uniform;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// `n` independent draws from the uniform distribution on `[0, 1)`.
/// The same seed always yields the same vector.
pub fn random_vector(n: usize, seed: u64) -> Vec<f32> {
    StdRng::seed_from_u64(seed)
        .sample_iter(Uniform::new(0.0f32, 1.0))
        .take(n)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_vector() {
        assert_eq!(random_vector(4096, 42), random_vector(4096, 42));
        assert_ne!(random_vector(4096, 42), random_vector(4096, 43));
    }

    #[test]
    fn values_stay_in_range() {
        let v = random_vector(100_000, 1);
        assert_eq!(v.len(), 100_000);
        assert!(v.iter().all(|&x| (0.0..1.0).contains(&x)));
    }
}
