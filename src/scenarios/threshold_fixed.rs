/// Fixed-threshold rating policy with a hand-reproducible configuration.
///
/// Pins the true quality to 5.0, makes every consumer rate
/// (tendency_to_rate = 1) and removes taste noise (consumer_fit_std = 0),
/// so the first reviews can be computed by hand: the first submitted review
/// discretizes experienced quality 5.0 against cut points around the
/// neutral anchor 3.0 and must be 5; the second is judged against the new
/// running average 5.0 and must be 3.

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::{MarketParams, OutputEncoding, Scenario};
use crate::errln;
use crate::logger::{LogEvent, Logger};
use crate::logln;
use crate::market::{GenerateOptions, Market};
use crate::utils::get_seed;

inventory::submit!(crate::scenarios::ScenarioEntry {
    short_name: "threshold_fixed",
    run,
});

pub fn run(scenario_name: &str, logger: &mut Logger) -> Result<(), Box<dyn std::error::Error>> {
    let mut rng = StdRng::seed_from_u64(get_seed(101));
    let config = MarketParams {
        testing_what: Some(Scenario::ThresholdFixed),
        tendency_to_rate: Some(1.0),
        total_number_of_reviews: Some(10),
        true_quality: Some(5.0),
        consumer_fit_std: Some(0.0),
        input_type: Some(OutputEncoding::Raw),
        ..Default::default()
    }
    .build(&mut rng)?;

    let mut market = Market::new(config);
    let series = market.generate(&GenerateOptions::default(), &mut rng, logger)?;

    logln!(logger, LogEvent::Variant, "generated {} observations over {} consumers",
        series.observations.len(), series.customer_count);

    let mut errors: Vec<String> = Vec::new();

    let msg = format!(
        "Raw series has the requested length: {} == 10",
        series.observations.len()
    );
    if series.observations.len() == 10 {
        logln!(logger, LogEvent::Scenario, "✓ {}", msg);
    } else {
        errors.push(msg.clone());
        errln!(logger, LogEvent::Scenario, "✗ {}", msg);
    }

    let all_in_range = series
        .observations
        .iter()
        .all(|obs| matches!(obs.as_scalar(), Some(v) if (1.0..=5.0).contains(&v)));
    let msg = "Every discrete review lies in [1, 5]".to_string();
    if all_in_range {
        logln!(logger, LogEvent::Scenario, "✓ {}", msg);
    } else {
        errors.push(msg.clone());
        errln!(logger, LogEvent::Scenario, "✗ {}", msg);
    }

    let first_two: Vec<f64> = series
        .observations
        .iter()
        .take(2)
        .filter_map(|obs| obs.as_scalar())
        .collect();
    let msg = format!(
        "First two reviews match the hand computation [5, 3]: {:?}",
        first_two
    );
    if first_two == vec![5.0, 3.0] {
        logln!(logger, LogEvent::Scenario, "✓ {}", msg);
    } else {
        errors.push(msg.clone());
        errln!(logger, LogEvent::Scenario, "✗ {}", msg);
    }

    let histogram_total: u64 = market.state.histogram_reviews.iter().sum();
    let msg = format!(
        "Histogram total matches the review log: {} == {}",
        histogram_total,
        market.state.reviews.len()
    );
    if histogram_total as usize == market.state.reviews.len() {
        logln!(logger, LogEvent::Scenario, "✓ {}", msg);
    } else {
        errors.push(msg.clone());
        errln!(logger, LogEvent::Scenario, "✗ {}", msg);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(format!(
            "Scenario '{}' validation failed:\n{}",
            scenario_name,
            errors.join("\n")
        )
        .into())
    }
}
