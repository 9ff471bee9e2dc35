/// Market configuration: a partially-specified parameter set (MarketParams)
/// goes through one explicit defaulting pass and one validation pass and
/// becomes an immutable MarketConfig.
///
/// Two kinds of parameters are kept apart on purpose:
/// - fixed configuration, resolved once here, and
/// - the per-series "parameters under inference" (comparison mode and the
///   rate-decision thresholds), resolved by RatingPolicy::randomize at the
///   start of every generated series according to the scenario selector.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand_distr::{Distribution, Normal, Uniform};

use crate::errors::ConfigError;

/// How a consumer judges experienced quality: against the product's inferred
/// (perceived) quality, or against the running average of submitted reviews
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonMode {
    /// "BM": compare to the Bayesian perceived quality of the product
    Benchmark,
    /// Compare to the consumer's view of the running average review
    Motivation,
}

/// Scenario selector determining which parameters are randomized per series
/// and which rating-threshold policy applies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    /// The comparison mode itself is the inference target
    BmVsMotivation,
    /// threshold_above drawn from {-1, +1} per series
    ThresholdPositiveZero,
    /// Thresholds pinned to 1.0
    ThresholdFixed,
    /// Thresholds supplied explicitly per series as the inference parameter vector
    ThresholdDirectionality,
    /// Every consumer reviews unconditionally, isolating perception dynamics
    /// from selective-rating effects
    AcquisitionBias,
}

/// Encoding of each emitted observation in the generated series
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputEncoding {
    /// The raw discrete review value
    Raw,
    /// Running average of all submitted reviews so far
    Averages,
    /// Snapshot of the review histogram (optionally normalized to frequencies)
    Histograms,
    /// Biased, non-Fisher kurtosis of the normalized histogram
    Kurtosis,
}

/// (mean, std) pair of a population-level taste distribution
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PopulationDist {
    pub mean: f64,
    pub std: f64,
}

impl PopulationDist {
    pub fn new(mean: f64, std: f64) -> Self {
        Self { mean, std }
    }

    /// Draw one private taste parameter. Construction cannot fail: std is
    /// validated non-negative when the config is built.
    pub fn sample(&self, rng: &mut StdRng) -> f64 {
        Normal::new(self.mean, self.std).unwrap().sample(rng)
    }
}

/// Partially-specified market configuration. Every missing field is filled
/// by fill_defaults without overwriting caller-supplied values.
#[derive(Debug, Clone, Default)]
pub struct MarketParams {
    pub number_of_rating_levels: Option<usize>,
    pub price: Option<f64>,
    pub product_features: Option<Vec<f64>>,
    pub neutral_quality: Option<f64>,
    pub quality_std: Option<f64>,
    /// Latent true quality; defaults to a draw from Normal(neutral_quality, quality_std)
    pub true_quality: Option<f64>,
    pub consumer_fit_std: Option<f64>,
    pub tendency_to_rate: Option<f64>,
    pub population_alpha: Option<PopulationDist>,
    /// One distribution per product feature
    pub population_beta: Option<Vec<PopulationDist>>,
    /// Pins the comparison mode for scenarios that would otherwise default it
    pub comparison_mode: Option<ComparisonMode>,
    /// Pins the thresholds for scenarios that would otherwise default them
    pub rate_decision_threshold_above: Option<f64>,
    pub rate_decision_threshold_below: Option<f64>,
    pub total_number_of_reviews: Option<usize>,
    pub value_of_outside_option: Option<f64>,
    pub input_type: Option<OutputEncoding>,
    pub input_histograms_are_normalized: Option<bool>,
    pub testing_what: Option<Scenario>,
    /// Hard cap on consumers per series, guarding unreachable stopping conditions
    pub step_budget: Option<usize>,
}

impl MarketParams {
    /// Fill every missing parameter with its documented default.
    /// Idempotent: already-set values are never overwritten, so applying the
    /// pass twice changes nothing. The only random defaults are true_quality
    /// and the population taste means, drawn from their priors.
    pub fn fill_defaults(&mut self, rng: &mut StdRng) {
        self.number_of_rating_levels.get_or_insert(5);
        self.price.get_or_insert(10.0);
        self.product_features.get_or_insert_with(|| vec![20.0]);
        self.neutral_quality.get_or_insert(3.0);
        self.quality_std.get_or_insert(1.5);
        if self.true_quality.is_none() {
            let prior = Normal::new(
                self.neutral_quality.unwrap(),
                self.quality_std.unwrap().abs(),
            )
            .unwrap();
            self.true_quality = Some(prior.sample(rng));
        }
        self.consumer_fit_std.get_or_insert(4.5);
        self.tendency_to_rate.get_or_insert(0.2);
        if self.population_alpha.is_none() {
            let mean = Uniform::new(-3.0, -2.0).sample(rng);
            self.population_alpha = Some(PopulationDist::new(mean, 1.0));
        }
        if self.population_beta.is_none() {
            let n_features = self.product_features.as_ref().unwrap().len();
            let betas = (0..n_features)
                .map(|_| PopulationDist::new(Uniform::new(1.0, 2.0).sample(rng), 1.0))
                .collect();
            self.population_beta = Some(betas);
        }
        self.total_number_of_reviews.get_or_insert(100);
        self.value_of_outside_option.get_or_insert(0.0);
        self.input_type.get_or_insert(OutputEncoding::Histograms);
        self.input_histograms_are_normalized.get_or_insert(false);
        self.testing_what.get_or_insert(Scenario::ThresholdDirectionality);
        self.step_budget.get_or_insert(1_000_000);
        // comparison_mode and the thresholds stay unset unless pinned by the
        // caller; they are per-series inference parameters
    }

    /// Fill defaults and validate, producing the immutable config
    pub fn build(mut self, rng: &mut StdRng) -> Result<MarketConfig, ConfigError> {
        self.fill_defaults(rng);

        let number_of_rating_levels = self.number_of_rating_levels.unwrap();
        // the ±0.5/±1.5 review cut points only make sense for five levels
        if number_of_rating_levels != 5 {
            return Err(ConfigError::UnsupportedRatingLevels(number_of_rating_levels));
        }
        let tendency_to_rate = self.tendency_to_rate.unwrap();
        if !(0.0..=1.0).contains(&tendency_to_rate) {
            return Err(ConfigError::TendencyToRateOutOfRange(tendency_to_rate));
        }
        let quality_std = self.quality_std.unwrap();
        if quality_std <= 0.0 {
            return Err(ConfigError::NonPositiveQualityStd(quality_std));
        }
        let consumer_fit_std = self.consumer_fit_std.unwrap();
        if consumer_fit_std < 0.0 {
            return Err(ConfigError::NegativeConsumerFitStd(consumer_fit_std));
        }
        let product_features = self.product_features.unwrap();
        if product_features.is_empty() {
            return Err(ConfigError::NoProductFeatures);
        }
        let population_beta = self.population_beta.unwrap();
        if population_beta.len() != product_features.len() {
            return Err(ConfigError::PopulationBetaMismatch {
                features: product_features.len(),
                betas: population_beta.len(),
            });
        }
        let step_budget = self.step_budget.unwrap();
        if step_budget == 0 {
            return Err(ConfigError::ZeroStepBudget);
        }

        Ok(MarketConfig {
            number_of_rating_levels,
            price: self.price.unwrap(),
            product_features,
            neutral_quality: self.neutral_quality.unwrap(),
            quality_std,
            true_quality: self.true_quality.unwrap(),
            consumer_fit_std,
            tendency_to_rate,
            population_alpha: self.population_alpha.unwrap(),
            population_beta,
            fixed_comparison_mode: self.comparison_mode,
            fixed_threshold_above: self.rate_decision_threshold_above,
            fixed_threshold_below: self.rate_decision_threshold_below,
            total_number_of_reviews: self.total_number_of_reviews.unwrap(),
            value_of_outside_option: self.value_of_outside_option.unwrap(),
            input_type: self.input_type.unwrap(),
            input_histograms_are_normalized: self.input_histograms_are_normalized.unwrap(),
            testing_what: self.testing_what.unwrap(),
            step_budget,
        })
    }
}

/// Fully-resolved, immutable market configuration
#[derive(Debug, Clone)]
pub struct MarketConfig {
    pub number_of_rating_levels: usize,
    pub price: f64,
    pub product_features: Vec<f64>,
    pub neutral_quality: f64,
    pub quality_std: f64,
    pub true_quality: f64,
    pub consumer_fit_std: f64,
    pub tendency_to_rate: f64,
    pub population_alpha: PopulationDist,
    pub population_beta: Vec<PopulationDist>,
    pub fixed_comparison_mode: Option<ComparisonMode>,
    pub fixed_threshold_above: Option<f64>,
    pub fixed_threshold_below: Option<f64>,
    pub total_number_of_reviews: usize,
    pub value_of_outside_option: f64,
    pub input_type: OutputEncoding,
    pub input_histograms_are_normalized: bool,
    pub testing_what: Scenario,
    pub step_budget: usize,
}

/// Explicit inference-parameter vector for scenarios that take one
/// (threshold_directionality). below defaults to above when not supplied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Theta {
    pub above: f64,
    pub below: Option<f64>,
}

impl Theta {
    pub fn symmetric(above: f64) -> Self {
        Self { above, below: None }
    }
}

/// Per-series rating policy: the resolved comparison mode and thresholds.
/// This is the "parameter vector under inference" seen by the step loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingPolicy {
    pub comparison_mode: ComparisonMode,
    pub threshold_above: f64,
    pub threshold_below: f64,
}

impl RatingPolicy {
    /// Resolve the scenario-specific inference parameters for one series.
    /// Follows the testing_what switch table; theta is only consulted by
    /// threshold_directionality and ignored elsewhere.
    pub fn randomize(
        config: &MarketConfig,
        theta: Option<Theta>,
        rng: &mut StdRng,
    ) -> Result<Self, ConfigError> {
        let default_mode = config
            .fixed_comparison_mode
            .unwrap_or(ComparisonMode::Motivation);

        let policy = match config.testing_what {
            Scenario::BmVsMotivation => {
                let modes = [ComparisonMode::Benchmark, ComparisonMode::Motivation];
                let comparison_mode = *modes.choose(rng).unwrap();
                let threshold_above = config.fixed_threshold_above.unwrap_or(1.0);
                let threshold_below = config.fixed_threshold_below.unwrap_or(threshold_above);
                Self {
                    comparison_mode,
                    threshold_above,
                    threshold_below,
                }
            }
            Scenario::ThresholdPositiveZero => {
                let choices = [-1.0, 1.0];
                let threshold_above = *choices.choose(rng).unwrap();
                Self {
                    comparison_mode: default_mode,
                    threshold_above,
                    threshold_below: threshold_above,
                }
            }
            Scenario::ThresholdFixed => Self {
                comparison_mode: default_mode,
                threshold_above: 1.0,
                threshold_below: 1.0,
            },
            Scenario::ThresholdDirectionality => {
                let theta = theta.ok_or(ConfigError::MissingThresholds)?;
                Self {
                    comparison_mode: default_mode,
                    threshold_above: theta.above,
                    threshold_below: theta.below.unwrap_or(theta.above),
                }
            }
            Scenario::AcquisitionBias => Self {
                comparison_mode: default_mode,
                threshold_above: 0.0,
                threshold_below: 0.0,
            },
        };
        Ok(policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::get_seed;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(get_seed(11))
    }

    #[test]
    fn test_fill_defaults_populates_everything() {
        let mut params = MarketParams::default();
        params.fill_defaults(&mut rng());
        assert_eq!(params.number_of_rating_levels, Some(5));
        assert_eq!(params.price, Some(10.0));
        assert_eq!(params.product_features, Some(vec![20.0]));
        assert_eq!(params.neutral_quality, Some(3.0));
        assert_eq!(params.quality_std, Some(1.5));
        assert!(params.true_quality.is_some());
        assert_eq!(params.consumer_fit_std, Some(4.5));
        assert_eq!(params.tendency_to_rate, Some(0.2));
        assert_eq!(params.total_number_of_reviews, Some(100));
        assert_eq!(params.input_type, Some(OutputEncoding::Histograms));
        assert_eq!(params.testing_what, Some(Scenario::ThresholdDirectionality));
        let alpha = params.population_alpha.unwrap();
        assert!(alpha.mean >= -3.0 && alpha.mean < -2.0);
        assert_eq!(alpha.std, 1.0);
        let betas = params.population_beta.as_ref().unwrap();
        assert_eq!(betas.len(), 1);
        assert!(betas[0].mean >= 1.0 && betas[0].mean < 2.0);
        // the per-series inference parameters must stay unset
        assert!(params.comparison_mode.is_none());
        assert!(params.rate_decision_threshold_above.is_none());
    }

    #[test]
    fn test_fill_defaults_is_idempotent_and_preserves_caller_values() {
        let mut params = MarketParams {
            price: Some(42.0),
            true_quality: Some(5.0),
            ..Default::default()
        };
        params.fill_defaults(&mut rng());
        let snapshot = format!("{:?}", params);
        params.fill_defaults(&mut rng());
        assert_eq!(format!("{:?}", params), snapshot);
        assert_eq!(params.price, Some(42.0));
        assert_eq!(params.true_quality, Some(5.0));
    }

    #[test]
    fn test_build_rejects_bad_values() {
        let bad_tendency = MarketParams {
            tendency_to_rate: Some(1.5),
            ..Default::default()
        };
        assert_eq!(
            bad_tendency.build(&mut rng()).unwrap_err(),
            ConfigError::TendencyToRateOutOfRange(1.5)
        );

        let bad_levels = MarketParams {
            number_of_rating_levels: Some(7),
            ..Default::default()
        };
        assert_eq!(
            bad_levels.build(&mut rng()).unwrap_err(),
            ConfigError::UnsupportedRatingLevels(7)
        );

        let bad_std = MarketParams {
            quality_std: Some(0.0),
            ..Default::default()
        };
        assert_eq!(
            bad_std.build(&mut rng()).unwrap_err(),
            ConfigError::NonPositiveQualityStd(0.0)
        );
    }

    #[test]
    fn test_randomize_threshold_fixed() {
        let config = MarketParams {
            testing_what: Some(Scenario::ThresholdFixed),
            ..Default::default()
        }
        .build(&mut rng())
        .unwrap();
        let policy = RatingPolicy::randomize(&config, None, &mut rng()).unwrap();
        assert_eq!(policy.comparison_mode, ComparisonMode::Motivation);
        assert_eq!(policy.threshold_above, 1.0);
        assert_eq!(policy.threshold_below, 1.0);
    }

    #[test]
    fn test_randomize_positive_zero_draws_from_choices() {
        let config = MarketParams {
            testing_what: Some(Scenario::ThresholdPositiveZero),
            ..Default::default()
        }
        .build(&mut rng())
        .unwrap();
        let mut r = rng();
        for _ in 0..20 {
            let policy = RatingPolicy::randomize(&config, None, &mut r).unwrap();
            assert!(policy.threshold_above == -1.0 || policy.threshold_above == 1.0);
            assert_eq!(policy.threshold_below, policy.threshold_above);
        }
    }

    #[test]
    fn test_randomize_directionality_requires_theta() {
        let config = MarketParams {
            testing_what: Some(Scenario::ThresholdDirectionality),
            ..Default::default()
        }
        .build(&mut rng())
        .unwrap();
        assert_eq!(
            RatingPolicy::randomize(&config, None, &mut rng()).unwrap_err(),
            ConfigError::MissingThresholds
        );
        let policy = RatingPolicy::randomize(
            &config,
            Some(Theta {
                above: 0.5,
                below: Some(-0.5),
            }),
            &mut rng(),
        )
        .unwrap();
        assert_eq!(policy.threshold_above, 0.5);
        assert_eq!(policy.threshold_below, -0.5);
        // below defaults to above when not independently supplied
        let policy = RatingPolicy::randomize(&config, Some(Theta::symmetric(2.0)), &mut rng()).unwrap();
        assert_eq!(policy.threshold_below, 2.0);
    }

    #[test]
    fn test_randomize_acquisition_bias_zero_thresholds() {
        let config = MarketParams {
            testing_what: Some(Scenario::AcquisitionBias),
            ..Default::default()
        }
        .build(&mut rng())
        .unwrap();
        let policy = RatingPolicy::randomize(&config, None, &mut rng()).unwrap();
        assert_eq!(policy.threshold_above, 0.0);
        assert_eq!(policy.threshold_below, 0.0);
    }

    #[test]
    fn test_randomize_respects_pinned_comparison_mode() {
        let config = MarketParams {
            testing_what: Some(Scenario::ThresholdFixed),
            comparison_mode: Some(ComparisonMode::Benchmark),
            ..Default::default()
        }
        .build(&mut rng())
        .unwrap();
        let policy = RatingPolicy::randomize(&config, None, &mut rng()).unwrap();
        assert_eq!(policy.comparison_mode, ComparisonMode::Benchmark);
    }
}
