/// Bayesian quality perception: recompute the point-estimate perceived
/// quality from the public review histogram.
///
/// The posterior over true quality is discretized on a fixed linear grid.
/// The log-prior is the normal density with mean neutral_quality and std
/// quality_std. The log-likelihood of the histogram comes from the five
/// review-bucket probabilities of the consumer-fit distribution, built from
/// its CDF at the four cut-point offsets (±0.5, ±1.5) around the anchor.
/// Everything is kept in log space until the final exponentiation so that
/// large histogram counts do not underflow term by term.

use crate::config::{ComparisonMode, MarketConfig};
use crate::errors::SimError;
use crate::gauss::{centered_normal_cdf, normal_log_pdf};
use crate::market::MarketState;

/// Discretization grid over plausible true-quality values
pub const GRID_POINTS: usize = 1000;
pub const GRID_MIN: f64 = -1.0;
pub const GRID_MAX: f64 = 8.0;

/// Outcome of one perception update
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Perception {
    /// Grid-weighted posterior mean, the perceived quality
    pub estimate: f64,
    /// The anchor the histogram was decoded against (and shown to the consumer)
    pub anchor: f64,
}

/// Anchor the likelihood is evaluated against: the latest perceived quality
/// under Benchmark, the latest running-average review under Motivation,
/// falling back to neutral_quality before any history exists
pub fn perception_anchor(config: &MarketConfig, state: &MarketState, mode: ComparisonMode) -> f64 {
    match mode {
        ComparisonMode::Benchmark => state
            .perceived_qualities
            .last()
            .copied()
            .unwrap_or(config.neutral_quality),
        ComparisonMode::Motivation => state
            .avg_reviews
            .last()
            .copied()
            .unwrap_or(config.neutral_quality),
    }
}

/// Recompute the perceived quality for the current histogram.
/// Fails loudly when the posterior collapses to a non-finite estimate;
/// that is a numerical or configuration defect, never tolerated silently.
pub fn perceive_quality(
    config: &MarketConfig,
    state: &MarketState,
    mode: ComparisonMode,
) -> Result<Perception, SimError> {
    let anchor = perception_anchor(config, state, mode);
    let counts = &state.histogram_reviews;
    let fit_std = config.consumer_fit_std;

    let grid_step = (GRID_MAX - GRID_MIN) / (GRID_POINTS - 1) as f64;
    let mut weighted_sum = 0.0;
    let mut total_mass = 0.0;

    for i in 0..GRID_POINTS {
        let quality = GRID_MIN + grid_step * i as f64;
        let log_prior = normal_log_pdf(quality, config.neutral_quality, config.quality_std);

        // CDF of the fit distribution at the four cut-point offsets around
        // anchor - quality; differences give the five bucket probabilities
        let below_far = centered_normal_cdf(anchor - quality - 1.5, fit_std);
        let below_near = centered_normal_cdf(anchor - quality - 0.5, fit_std);
        let above_near = centered_normal_cdf(anchor - quality + 0.5, fit_std);
        let above_far = centered_normal_cdf(anchor - quality + 1.5, fit_std);
        let bucket_probs = [
            below_far,
            below_near - below_far,
            above_near - below_near,
            above_far - above_near,
            1.0 - above_far,
        ];

        let mut log_likelihood = 0.0;
        for (prob, &count) in bucket_probs.iter().zip(counts.iter()) {
            // zero-count buckets contribute nothing; skipping them also keeps
            // the degenerate fit_std = 0 case (zero-probability buckets) finite
            if count > 0 {
                log_likelihood += prob.ln() * count as f64;
            }
        }

        let posterior = (log_prior + log_likelihood).exp();
        weighted_sum += posterior * quality;
        total_mass += posterior;
    }

    let estimate = weighted_sum / total_mass;
    if !estimate.is_finite() {
        return Err(SimError::PerceivedQualityNotFinite {
            anchor,
            histogram: counts.clone(),
        });
    }
    Ok(Perception { estimate, anchor })
}
