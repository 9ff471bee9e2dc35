use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Process-wide base seed for the current iteration.
/// Set by main before each scenario iteration; every RNG stream derives from it.
pub static RAND_SEED: AtomicU64 = AtomicU64::new(0);

/// Total number of series generated since the process started (or since main reset it)
pub static TOTAL_SIMULATION_RUNS: AtomicU64 = AtomicU64::new(0);

/// When set, per-consumer step details are logged (enabled with --verbose step)
pub static VERBOSE_STEP: AtomicBool = AtomicBool::new(false);

/// Derive a stream-specific seed from the process-wide RAND_SEED
/// Different salts give independent streams for the same iteration seed
pub fn get_seed(salt: u64) -> u64 {
    RAND_SEED
        .load(Ordering::Relaxed)
        .wrapping_mul(0x9E37_79B9_7F4A_7C15)
        .wrapping_add(salt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_seed_salts_differ() {
        RAND_SEED.store(7, Ordering::Relaxed);
        assert_ne!(get_seed(1), get_seed(2));
    }
}
