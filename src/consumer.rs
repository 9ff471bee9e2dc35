/// Consumer decision pipeline: one arriving shopper per step.
///
/// The pipeline is strictly ordered and stateless across steps: draw private
/// taste parameters, decide to purchase, discretize the experienced quality
/// into a review, decide whether to submit it. Evaluation runs for every
/// consumer including non-purchasers; the purchase gate is applied when the
/// review is recorded (see Market::step). That asymmetry is inherited from
/// the behavior under study and is deliberately left as is.

use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::config::{MarketConfig, RatingPolicy};

/// Private taste parameters of one arriving consumer, drawn fresh per step
#[derive(Debug, Clone)]
pub struct ConsumerPrivate {
    /// Idiosyncratic taste-product match
    pub fit: f64,
    /// Price sensitivity
    pub alpha: f64,
    /// Per-feature sensitivity, parallel to config.product_features
    pub betas: Vec<f64>,
}

impl ConsumerPrivate {
    pub fn draw(config: &MarketConfig, rng: &mut StdRng) -> Self {
        // stds are validated non-negative at config build, so construction cannot fail
        let fit = Normal::new(0.0, config.consumer_fit_std).unwrap().sample(rng);
        let alpha = config.population_alpha.sample(rng);
        let betas = config
            .population_beta
            .iter()
            .map(|dist| dist.sample(rng))
            .collect();
        Self { fit, alpha, betas }
    }
}

/// Purchase decision: expected utility must strictly exceed the outside
/// option; ties do not purchase
pub fn decides_to_purchase(
    config: &MarketConfig,
    private: &ConsumerPrivate,
    perceived_quality: f64,
) -> bool {
    let features_utility: f64 = config
        .product_features
        .iter()
        .zip(&private.betas)
        .map(|(feature, beta)| beta * feature)
        .sum();
    let price_utility = private.alpha * config.price;
    let expected_utility = features_utility + price_utility + perceived_quality + private.fit;
    expected_utility > config.value_of_outside_option
}

/// The four review cut points centered on the comparison anchor
pub fn review_cut_points(anchor: f64) -> [f64; 4] {
    [anchor - 1.5, anchor - 0.5, anchor + 0.5, anchor + 1.5]
}

/// Discretize the experienced quality (true quality plus fit) into a review
/// in 1..=5 against the anchor's cut points
pub fn evaluate_product(config: &MarketConfig, fit: f64, anchor: f64) -> u8 {
    let experienced_quality = config.true_quality + fit;
    let crossed = review_cut_points(anchor)
        .iter()
        .filter(|&&cut| experienced_quality >= cut)
        .count();
    1 + crossed as u8
}

/// Rate decision: with probability tendency_to_rate rate unconditionally;
/// otherwise, once reviews exist, rate only when the signed deviation of the
/// new review from the anchor breaches a threshold and an independent coin
/// with probability min(3 * tendency_to_rate, 1) succeeds. The first eligible
/// reviewer always rates.
pub fn decides_to_rate(
    config: &MarketConfig,
    policy: &RatingPolicy,
    product_review: u8,
    anchor: f64,
    any_reviews_yet: bool,
    rng: &mut StdRng,
) -> bool {
    if rng.gen_bool(config.tendency_to_rate) {
        return true;
    }
    if !any_reviews_yet {
        return true;
    }
    let deviation = f64::from(product_review) - anchor;
    let breaches = deviation > policy.threshold_above || deviation < -policy.threshold_below;
    breaches && rng.gen_bool((3.0 * config.tendency_to_rate).min(1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ComparisonMode, MarketParams, Scenario};
    use rand::SeedableRng;

    fn test_config(overrides: MarketParams) -> MarketConfig {
        let mut rng = StdRng::seed_from_u64(3);
        overrides.build(&mut rng).unwrap()
    }

    fn fixed_policy(above: f64, below: f64) -> RatingPolicy {
        RatingPolicy {
            comparison_mode: ComparisonMode::Motivation,
            threshold_above: above,
            threshold_below: below,
        }
    }

    #[test]
    fn test_evaluate_product_against_neutral_anchor() {
        // true quality 5, deterministic fit: experienced = 5.0,
        // cut points around anchor 3.0 are [1.5, 2.5, 3.5, 4.5]
        let config = test_config(MarketParams {
            true_quality: Some(5.0),
            consumer_fit_std: Some(0.0),
            ..Default::default()
        });
        assert_eq!(evaluate_product(&config, 0.0, 3.0), 5);
        // anchor 5.0: cut points [3.5, 4.5, 5.5, 6.5], experienced 5.0 crosses two
        assert_eq!(evaluate_product(&config, 0.0, 5.0), 3);
        // exact tie with a cut point counts as crossed
        assert_eq!(evaluate_product(&config, -1.5, 3.0), 4);
    }

    #[test]
    fn test_evaluate_product_range() {
        let config = test_config(MarketParams {
            true_quality: Some(3.0),
            ..Default::default()
        });
        for fit in [-100.0, -2.0, 0.0, 2.0, 100.0] {
            let review = evaluate_product(&config, fit, 3.0);
            assert!((1..=5).contains(&review));
        }
        assert_eq!(evaluate_product(&config, -100.0, 3.0), 1);
        assert_eq!(evaluate_product(&config, 100.0, 3.0), 5);
    }

    #[test]
    fn test_purchase_ties_do_not_purchase() {
        let config = test_config(MarketParams {
            price: Some(1.0),
            product_features: Some(vec![1.0]),
            value_of_outside_option: Some(0.0),
            ..Default::default()
        });
        // beta*1 + alpha*1 + perceived + fit == 0 exactly
        let private = ConsumerPrivate {
            fit: 0.0,
            alpha: -2.0,
            betas: vec![1.0],
        };
        assert!(!decides_to_purchase(&config, &private, 1.0));
        // strictly above the outside option purchases
        assert!(decides_to_purchase(&config, &private, 1.0 + 1e-9));
    }

    #[test]
    fn test_first_reviewer_always_rates() {
        // tendency 0 makes the unconditional coin always fail, so the
        // decision falls through to the first-reviewer guarantee
        let config = test_config(MarketParams {
            tendency_to_rate: Some(0.0),
            ..Default::default()
        });
        let policy = fixed_policy(1.0, 1.0);
        let mut rng = StdRng::seed_from_u64(5);
        assert!(decides_to_rate(&config, &policy, 3, 3.0, false, &mut rng));
    }

    #[test]
    fn test_threshold_gate_needs_secondary_coin() {
        // tendency 0: the secondary coin has probability min(0, 1) = 0, so
        // even a breaching deviation never rates once reviews exist
        let config = test_config(MarketParams {
            tendency_to_rate: Some(0.0),
            ..Default::default()
        });
        let policy = fixed_policy(1.0, 1.0);
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..50 {
            assert!(!decides_to_rate(&config, &policy, 5, 1.0, true, &mut rng));
        }
    }

    #[test]
    fn test_threshold_gate_breach_directions() {
        // tendency 1/3 gives the secondary coin probability 1, isolating the
        // threshold test itself; seed the primary coin until it fails
        let config = test_config(MarketParams {
            tendency_to_rate: Some(1.0 / 3.0),
            ..Default::default()
        });
        let policy = fixed_policy(1.0, 1.0);
        let mut rng = StdRng::seed_from_u64(5);
        let mut rated_above = 0usize;
        let mut rated_within = 0usize;
        for _ in 0..200 {
            // deviation +2 breaches the above-threshold
            if decides_to_rate(&config, &policy, 5, 3.0, true, &mut rng) {
                rated_above += 1;
            }
            // deviation 0 breaches nothing: rates only via the primary coin
            if decides_to_rate(&config, &policy, 3, 3.0, true, &mut rng) {
                rated_within += 1;
            }
        }
        // breaching deviations rate every time (primary or secondary coin)
        assert_eq!(rated_above, 200);
        // non-breaching deviations rate only at the primary-coin rate (~1/3)
        assert!(rated_within < 120, "rated_within = {}", rated_within);
        assert!(rated_within > 30, "rated_within = {}", rated_within);
    }

    #[test]
    fn test_private_draws_are_degenerate_with_zero_stds() {
        let config = test_config(MarketParams {
            consumer_fit_std: Some(0.0),
            population_alpha: Some(crate::config::PopulationDist::new(-2.5, 0.0)),
            population_beta: Some(vec![crate::config::PopulationDist::new(1.5, 0.0)]),
            ..Default::default()
        });
        let mut rng = StdRng::seed_from_u64(9);
        let private = ConsumerPrivate::draw(&config, &mut rng);
        assert_eq!(private.fit, 0.0);
        assert_eq!(private.alpha, -2.5);
        assert_eq!(private.betas, vec![1.5]);
    }
}
