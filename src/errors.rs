use thiserror::Error;

/// Configuration problems, surfaced at config build or per-series
/// parameter randomization, never deep inside the step loop
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("tendency_to_rate must lie in [0, 1], got {0}")]
    TendencyToRateOutOfRange(f64),
    #[error("quality_std must be positive, got {0}")]
    NonPositiveQualityStd(f64),
    #[error("consumer_fit_std must be non-negative, got {0}")]
    NegativeConsumerFitStd(f64),
    #[error("review cut points are defined for exactly 5 rating levels, got {0}")]
    UnsupportedRatingLevels(usize),
    #[error("product_features must not be empty")]
    NoProductFeatures,
    #[error("population_beta must supply one distribution per product feature ({features} features, {betas} betas)")]
    PopulationBetaMismatch { features: usize, betas: usize },
    #[error("threshold_directionality requires explicit rate-decision thresholds")]
    MissingThresholds,
    #[error("step_budget must be positive")]
    ZeroStepBudget,
}

/// Failures raised while a series is being generated
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    /// Numerical-integrity check: the perception posterior collapsed to
    /// a non-finite point estimate. Signals a degenerate histogram or
    /// variance configuration and is never silently tolerated.
    #[error("perceived quality is not finite (anchor {anchor}, histogram {histogram:?})")]
    PerceivedQualityNotFinite { anchor: f64, histogram: Vec<u64> },
    /// The stopping condition was not reached within the step budget.
    /// A rating gate that rejects every candidate would otherwise loop forever.
    #[error("step budget of {budget} consumers exhausted before the stopping condition was met ({emitted} observations emitted)")]
    StepBudgetExhausted { budget: usize, emitted: usize },
    #[error(transparent)]
    Config(#[from] ConfigError),
}
