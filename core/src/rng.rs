use rand::{rngs::StdRng, Rng, SeedableRng};

/// Construct a deterministic RNG from a fixed seed.
pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// `count` uniform points in `[0, 1)`, fully determined by `seed`.
pub fn sample_domain_points(seed: u64, count: usize) -> Vec<f64> {
    let mut rng = seeded_rng(seed);
    (0..count).map(|_| rng.gen::<f64>()).collect()
}
