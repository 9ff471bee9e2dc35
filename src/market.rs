/// Marketplace orchestrator: owns the sequential per-series state, drives
/// the consumer step loop, applies the scenario rating policy, and
/// assembles the output time series in one of the supported encodings.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::sync::atomic::Ordering;

use crate::config::{
    ComparisonMode, MarketConfig, OutputEncoding, RatingPolicy, Scenario, Theta,
};
use crate::consumer::{self, ConsumerPrivate};
use crate::errors::SimError;
use crate::logger::{LogEvent, Logger};
use crate::logln;
use crate::perception;
use crate::utils::{TOTAL_SIMULATION_RUNS, VERBOSE_STEP};

/// Running state of one generated series, reset at the start of each series.
///
/// Invariants, held after every step:
/// - perceived_qualities, anchors_shown and purchase_decisions all have
///   length customer_count;
/// - reviews, avg_reviews and rater_fits have equal length, which also
///   equals the histogram total.
#[derive(Debug, Clone)]
pub struct MarketState {
    /// One perceived-quality estimate per step
    pub perceived_qualities: Vec<f64>,
    /// Submitted reviews only
    pub reviews: Vec<u8>,
    /// Running average of submitted reviews, parallel to reviews
    pub avg_reviews: Vec<f64>,
    /// Count per rating level, incremented on each submitted review
    pub histogram_reviews: Vec<u64>,
    /// The quality anchor shown to each consumer, one per step
    pub anchors_shown: Vec<f64>,
    /// Fit draws of the consumers who submitted a review
    pub rater_fits: Vec<f64>,
    /// One purchase decision per step
    pub purchase_decisions: Vec<bool>,
    pub customer_count: usize,
    pub purchase_count: usize,
}

impl MarketState {
    pub fn new(number_of_rating_levels: usize) -> Self {
        Self {
            perceived_qualities: Vec::new(),
            reviews: Vec::new(),
            avg_reviews: Vec::new(),
            histogram_reviews: vec![0; number_of_rating_levels],
            anchors_shown: Vec::new(),
            rater_fits: Vec::new(),
            purchase_decisions: Vec::new(),
            customer_count: 0,
            purchase_count: 0,
        }
    }
}

/// One encoded observation of the generated series
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    /// Raw review, running average or kurtosis
    Scalar(f64),
    /// Histogram snapshot (counts or frequencies)
    Histogram(Vec<f64>),
}

impl Observation {
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Observation::Scalar(v) => Some(*v),
            Observation::Histogram(_) => None,
        }
    }

    pub fn as_histogram(&self) -> Option<&[f64]> {
        match self {
            Observation::Scalar(_) => None,
            Observation::Histogram(h) => Some(h),
        }
    }
}

/// Stopping condition of the generation loop. The two modes are mutually
/// exclusive by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoppingRule {
    /// Stop once the emitted series reaches this length
    TotalReviews(usize),
    /// Stop once this many consumers have arrived
    FixedPopulation(usize),
}

/// Options of one generate call
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Explicit inference thresholds; required by threshold_directionality
    pub theta: Option<Theta>,
    /// Defaults to TotalReviews(config.total_number_of_reviews)
    pub stopping: Option<StoppingRule>,
    /// Overrides the configured encoding (used for raw series in analyses)
    pub encoding_override: Option<OutputEncoding>,
    /// Return the fit draws of the consumers who rated
    pub include_rater_fits: bool,
}

/// Output of one generated series. The auxiliary sequences cover every
/// simulation step and can be longer than the observation series, since not
/// every step yields an observation.
#[derive(Debug, Clone)]
pub struct GeneratedSeries {
    pub observations: Vec<Observation>,
    pub anchors_shown: Vec<f64>,
    pub perceived_qualities: Vec<f64>,
    /// Only populated when requested via GenerateOptions::include_rater_fits
    pub rater_fits: Option<Vec<f64>>,
    /// The per-series rating policy that generated this series
    pub policy: RatingPolicy,
    pub customer_count: usize,
    pub purchase_count: usize,
}

/// The marketplace: immutable configuration plus the running series state
pub struct Market {
    pub config: MarketConfig,
    pub state: MarketState,
}

impl Market {
    pub fn new(config: MarketConfig) -> Self {
        let state = MarketState::new(config.number_of_rating_levels);
        Self { config, state }
    }

    /// Clear all running sequences and counters
    pub fn reset(&mut self) {
        self.state = MarketState::new(self.config.number_of_rating_levels);
    }

    /// Advance the market by one consumer. Returns whether a review was
    /// submitted this step.
    pub fn step(
        &mut self,
        policy: &RatingPolicy,
        rng: &mut StdRng,
        logger: &mut Logger,
    ) -> Result<bool, SimError> {
        let private = ConsumerPrivate::draw(&self.config, rng);

        // perception reflects the histogram as of the previous step
        let perception = perception::perceive_quality(&self.config, &self.state, policy.comparison_mode)?;
        self.state.perceived_qualities.push(perception.estimate);
        self.state.anchors_shown.push(perception.anchor);

        let purchased = consumer::decides_to_purchase(&self.config, &private, perception.estimate);
        self.state.purchase_decisions.push(purchased);
        if purchased {
            self.state.purchase_count += 1;
        }

        // evaluation runs for every consumer, purchaser or not
        let decision_anchor = self.decision_anchor(policy.comparison_mode);
        let product_review = consumer::evaluate_product(&self.config, private.fit, decision_anchor);

        let reviewed = match self.config.testing_what {
            // every consumer reviews, regardless of purchase or the rating gate
            Scenario::AcquisitionBias => true,
            _ => {
                purchased
                    && consumer::decides_to_rate(
                        &self.config,
                        policy,
                        product_review,
                        decision_anchor,
                        !self.state.reviews.is_empty(),
                        rng,
                    )
            }
        };

        if reviewed {
            self.state.reviews.push(product_review);
            let total: u64 = self.state.reviews.iter().map(|&r| u64::from(r)).sum();
            self.state
                .avg_reviews
                .push(total as f64 / self.state.reviews.len() as f64);
            self.state.histogram_reviews[usize::from(product_review) - 1] += 1;
            self.state.rater_fits.push(private.fit);
        }
        self.state.customer_count += 1;

        if VERBOSE_STEP.load(Ordering::Relaxed) {
            logln!(
                logger,
                LogEvent::Step,
                "consumer {}: perceived {:.3}, anchor {:.3}, purchased {}, review {}{}",
                self.state.customer_count,
                perception.estimate,
                decision_anchor,
                purchased,
                product_review,
                if reviewed { " (submitted)" } else { "" }
            );
        }

        Ok(reviewed)
    }

    /// The anchor consumers compare against: the freshly-updated perceived
    /// quality under Benchmark, the latest running average (or the neutral
    /// quality before any review exists) under Motivation
    fn decision_anchor(&self, mode: ComparisonMode) -> f64 {
        match mode {
            ComparisonMode::Benchmark => *self
                .state
                .perceived_qualities
                .last()
                .expect("perception update precedes consumer decisions"),
            ComparisonMode::Motivation => self
                .state
                .avg_reviews
                .last()
                .copied()
                .unwrap_or(self.config.neutral_quality),
        }
    }

    /// Generate one series: resolve the per-series inference parameters,
    /// reset state and loop steps until the stopping rule is met
    pub fn generate(
        &mut self,
        options: &GenerateOptions,
        rng: &mut StdRng,
        logger: &mut Logger,
    ) -> Result<GeneratedSeries, SimError> {
        TOTAL_SIMULATION_RUNS.fetch_add(1, Ordering::Relaxed);

        let policy = RatingPolicy::randomize(&self.config, options.theta, rng)?;
        self.reset();

        let stopping = options
            .stopping
            .unwrap_or(StoppingRule::TotalReviews(self.config.total_number_of_reviews));
        let encoding = options.encoding_override.unwrap_or(self.config.input_type);

        let mut observations = Vec::new();
        loop {
            if self.state.customer_count >= self.config.step_budget {
                return Err(SimError::StepBudgetExhausted {
                    budget: self.config.step_budget,
                    emitted: observations.len(),
                });
            }

            let reviewed = self.step(&policy, rng, logger)?;
            if reviewed {
                observations.push(self.encode_observation(encoding));
            }

            let done = match stopping {
                StoppingRule::TotalReviews(target) => observations.len() >= target,
                StoppingRule::FixedPopulation(target) => self.state.customer_count >= target,
            };
            if done {
                break;
            }
        }

        logln!(
            logger,
            LogEvent::Simulation,
            "series done: {} observations, {} consumers, {} purchases, policy {:?}",
            observations.len(),
            self.state.customer_count,
            self.state.purchase_count,
            policy
        );

        Ok(GeneratedSeries {
            observations,
            anchors_shown: self.state.anchors_shown.clone(),
            perceived_qualities: self.state.perceived_qualities.clone(),
            rater_fits: options
                .include_rater_fits
                .then(|| self.state.rater_fits.clone()),
            policy,
            customer_count: self.state.customer_count,
            purchase_count: self.state.purchase_count,
        })
    }

    /// Encode the state after a submitted review into one observation
    fn encode_observation(&self, encoding: OutputEncoding) -> Observation {
        match encoding {
            OutputEncoding::Raw => {
                let review = *self.state.reviews.last().expect("a review was just submitted");
                Observation::Scalar(f64::from(review))
            }
            OutputEncoding::Averages => Observation::Scalar(
                *self.state.avg_reviews.last().expect("a review was just submitted"),
            ),
            OutputEncoding::Histograms => {
                let snapshot = self.histogram_snapshot(self.config.input_histograms_are_normalized);
                Observation::Histogram(snapshot)
            }
            OutputEncoding::Kurtosis => {
                let snapshot = self.histogram_snapshot(true);
                Observation::Scalar(histogram_kurtosis(&snapshot))
            }
        }
    }

    /// Current histogram as floats, normalized to frequencies when requested
    /// and the total count is nonzero
    fn histogram_snapshot(&self, normalized: bool) -> Vec<f64> {
        let total: u64 = self.state.histogram_reviews.iter().sum();
        self.state
            .histogram_reviews
            .iter()
            .map(|&count| {
                if normalized && total > 0 {
                    count as f64 / total as f64
                } else {
                    count as f64
                }
            })
            .collect()
    }

    /// Probability that a review lands above the running average, estimated
    /// over dataset_size raw series with the inference threshold drawn
    /// uniformly from the supplied prior support per series
    pub fn direction_probability(
        &mut self,
        prior: &[f64],
        dataset_size: usize,
        rng: &mut StdRng,
        logger: &mut Logger,
    ) -> Result<f64, SimError> {
        assert!(!prior.is_empty(), "prior support must not be empty");

        let mut fractions = Vec::with_capacity(dataset_size);
        for _ in 0..dataset_size {
            let theta = *prior.choose(rng).expect("prior support is non-empty");
            let options = GenerateOptions {
                theta: Some(Theta::symmetric(theta)),
                encoding_override: Some(OutputEncoding::Raw),
                ..Default::default()
            };
            let series = self.generate(&options, rng, logger)?;
            let raw: Vec<f64> = series
                .observations
                .iter()
                .map(|obs| obs.as_scalar().expect("raw series is scalar"))
                .collect();

            let mut running_sum = raw[0];
            let mut count_above = 0usize;
            for (index, &review) in raw.iter().enumerate().skip(1) {
                let previous_average = running_sum / index as f64;
                if review > previous_average {
                    count_above += 1;
                }
                running_sum += review;
            }
            fractions.push(count_above as f64 / raw.len() as f64);
        }
        Ok(fractions.iter().sum::<f64>() / fractions.len() as f64)
    }
}

/// Kurtosis of the histogram vector treated as data: biased, non-Fisher
/// (m4 / m2², no excess subtraction, no bias correction)
pub fn histogram_kurtosis(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let m2 = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let m4 = values.iter().map(|v| (v - mean).powi(4)).sum::<f64>() / n;
    if m2 == 0.0 {
        return 0.0;
    }
    m4 / (m2 * m2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MarketParams;
    use rand::SeedableRng;

    fn quiet_logger() -> Logger {
        Logger::new()
    }

    fn build_market(params: MarketParams, seed: u64) -> (Market, StdRng) {
        let mut rng = StdRng::seed_from_u64(seed);
        let config = params.build(&mut rng).unwrap();
        (Market::new(config), rng)
    }

    fn threshold_fixed_params() -> MarketParams {
        MarketParams {
            testing_what: Some(Scenario::ThresholdFixed),
            tendency_to_rate: Some(1.0),
            total_number_of_reviews: Some(10),
            true_quality: Some(5.0),
            consumer_fit_std: Some(0.0),
            input_type: Some(OutputEncoding::Raw),
            ..Default::default()
        }
    }

    #[test]
    fn test_threshold_fixed_series_is_reproducible_by_hand() {
        let (mut market, mut rng) = build_market(threshold_fixed_params(), 42);
        let mut logger = quiet_logger();
        let series = market
            .generate(&GenerateOptions::default(), &mut rng, &mut logger)
            .unwrap();

        assert_eq!(series.observations.len(), 10);
        for obs in &series.observations {
            let value = obs.as_scalar().unwrap();
            assert!((1.0..=5.0).contains(&value));
        }
        // step 1: anchor 3.0, cut points [1.5, 2.5, 3.5, 4.5], experienced 5.0 -> review 5
        assert_eq!(series.observations[0].as_scalar(), Some(5.0));
        // step 2: anchor 5.0, cut points [3.5, 4.5, 5.5, 6.5], experienced 5.0 -> review 3
        assert_eq!(series.observations[1].as_scalar(), Some(3.0));
    }

    #[test]
    fn test_state_invariants_hold_after_generation() {
        let (mut market, mut rng) = build_market(
            MarketParams {
                testing_what: Some(Scenario::ThresholdFixed),
                total_number_of_reviews: Some(25),
                ..Default::default()
            },
            7,
        );
        let mut logger = quiet_logger();
        let series = market
            .generate(
                &GenerateOptions {
                    include_rater_fits: true,
                    ..Default::default()
                },
                &mut rng,
                &mut logger,
            )
            .unwrap();

        let state = &market.state;
        let histogram_total: u64 = state.histogram_reviews.iter().sum();
        assert_eq!(histogram_total as usize, state.reviews.len());
        assert_eq!(state.reviews.len(), state.avg_reviews.len());
        assert_eq!(state.reviews.len(), state.rater_fits.len());
        assert_eq!(state.perceived_qualities.len(), state.customer_count);
        assert_eq!(state.anchors_shown.len(), state.customer_count);
        assert_eq!(state.purchase_decisions.len(), state.customer_count);
        assert!(state.purchase_count <= state.customer_count);
        for &review in &state.reviews {
            assert!((1..=5).contains(&review));
        }

        assert_eq!(series.customer_count, state.customer_count);
        assert_eq!(series.rater_fits.as_ref().unwrap().len(), state.reviews.len());
        // auxiliary sequences cover every step, not just review-yielding ones
        assert!(series.perceived_qualities.len() >= series.observations.len());
    }

    #[test]
    fn test_acquisition_bias_reviews_every_step() {
        let (mut market, mut rng) = build_market(
            MarketParams {
                testing_what: Some(Scenario::AcquisitionBias),
                ..Default::default()
            },
            11,
        );
        let mut logger = quiet_logger();
        let series = market
            .generate(
                &GenerateOptions {
                    stopping: Some(StoppingRule::FixedPopulation(50)),
                    ..Default::default()
                },
                &mut rng,
                &mut logger,
            )
            .unwrap();
        assert_eq!(series.customer_count, 50);
        // every consumer reviewed, purchaser or not
        assert_eq!(series.observations.len(), 50);
        assert_eq!(market.state.reviews.len(), 50);
    }

    #[test]
    fn test_determinism_under_fixed_seed() {
        let run = |seed: u64| {
            let (mut market, mut rng) = build_market(threshold_fixed_params(), seed);
            let mut logger = quiet_logger();
            market
                .generate(&GenerateOptions::default(), &mut rng, &mut logger)
                .unwrap()
        };
        let a = run(1234);
        let b = run(1234);
        assert_eq!(a.observations, b.observations);
        assert_eq!(a.perceived_qualities, b.perceived_qualities);
        assert_eq!(a.anchors_shown, b.anchors_shown);
    }

    #[test]
    fn test_normalized_histogram_encoding_sums_to_one() {
        let (mut market, mut rng) = build_market(
            MarketParams {
                testing_what: Some(Scenario::ThresholdFixed),
                tendency_to_rate: Some(1.0),
                total_number_of_reviews: Some(12),
                input_type: Some(OutputEncoding::Histograms),
                input_histograms_are_normalized: Some(true),
                ..Default::default()
            },
            23,
        );
        let mut logger = quiet_logger();
        let series = market
            .generate(&GenerateOptions::default(), &mut rng, &mut logger)
            .unwrap();
        for (index, obs) in series.observations.iter().enumerate() {
            let histogram = obs.as_histogram().unwrap();
            assert_eq!(histogram.len(), 5);
            let total: f64 = histogram.iter().sum();
            assert!((total - 1.0).abs() < 1e-9, "observation {}: {}", index, total);
            // frequencies equal counts divided by their total: after k reviews
            // every entry is a multiple of 1/k
            let count_total = (index + 1) as f64;
            for &freq in histogram {
                let scaled = freq * count_total;
                assert!((scaled - scaled.round()).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_kurtosis_encoding_is_scalar_and_finite() {
        let (mut market, mut rng) = build_market(
            MarketParams {
                testing_what: Some(Scenario::ThresholdFixed),
                tendency_to_rate: Some(1.0),
                total_number_of_reviews: Some(8),
                input_type: Some(OutputEncoding::Kurtosis),
                ..Default::default()
            },
            31,
        );
        let mut logger = quiet_logger();
        let series = market
            .generate(&GenerateOptions::default(), &mut rng, &mut logger)
            .unwrap();
        assert_eq!(series.observations.len(), 8);
        for obs in &series.observations {
            assert!(obs.as_scalar().unwrap().is_finite());
        }
    }

    #[test]
    fn test_histogram_kurtosis_known_value() {
        // one review in the top bucket: frequencies [0, 0, 0, 0, 1]
        // mean 0.2, m2 = 0.032, m4 = 0.08192 * ... compute directly
        let values = [0.0, 0.0, 0.0, 0.0, 1.0];
        let mean = 0.2;
        let m2 = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / 5.0;
        let m4 = values.iter().map(|v| (v - mean).powi(4)).sum::<f64>() / 5.0;
        assert!((histogram_kurtosis(&values) - m4 / (m2 * m2)).abs() < 1e-12);
        // constant histogram has zero variance
        assert_eq!(histogram_kurtosis(&[0.2; 5]), 0.0);
    }

    #[test]
    fn test_unreachable_stopping_condition_exhausts_step_budget() {
        // outside option so high nobody ever purchases, so no review can be
        // submitted and TotalReviews(1) is unreachable
        let (mut market, mut rng) = build_market(
            MarketParams {
                testing_what: Some(Scenario::ThresholdFixed),
                value_of_outside_option: Some(1e9),
                total_number_of_reviews: Some(1),
                step_budget: Some(200),
                ..Default::default()
            },
            51,
        );
        let mut logger = quiet_logger();
        let err = market
            .generate(&GenerateOptions::default(), &mut rng, &mut logger)
            .unwrap_err();
        assert_eq!(
            err,
            SimError::StepBudgetExhausted {
                budget: 200,
                emitted: 0
            }
        );
    }

    #[test]
    fn test_directionality_without_theta_is_a_config_error() {
        let (mut market, mut rng) = build_market(
            MarketParams {
                testing_what: Some(Scenario::ThresholdDirectionality),
                ..Default::default()
            },
            61,
        );
        let mut logger = quiet_logger();
        let err = market
            .generate(&GenerateOptions::default(), &mut rng, &mut logger)
            .unwrap_err();
        assert_eq!(
            err,
            SimError::Config(crate::errors::ConfigError::MissingThresholds)
        );
    }

    #[test]
    fn test_direction_probability_is_a_probability() {
        let (mut market, mut rng) = build_market(
            MarketParams {
                testing_what: Some(Scenario::ThresholdDirectionality),
                total_number_of_reviews: Some(20),
                ..Default::default()
            },
            71,
        );
        let mut logger = quiet_logger();
        let p = market
            .direction_probability(&[-1.0, 1.0], 5, &mut rng, &mut logger)
            .unwrap();
        assert!((0.0..=1.0).contains(&p));
    }
}
