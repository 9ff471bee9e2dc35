/// Threshold directionality: the rate-decision thresholds are the explicit
/// inference parameter vector. A missing vector is a typed configuration
/// error, and the sign structure of the thresholds must steer the direction
/// of the submitted reviews relative to the running average.

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::{MarketParams, OutputEncoding, Scenario, Theta};
use crate::errln;
use crate::errors::{ConfigError, SimError};
use crate::logger::{LogEvent, Logger};
use crate::logln;
use crate::market::{GenerateOptions, Market};
use crate::utils::get_seed;

inventory::submit!(crate::scenarios::ScenarioEntry {
    short_name: "threshold_directionality",
    run,
});

fn directionality_market(rng: &mut StdRng) -> Result<Market, Box<dyn std::error::Error>> {
    let config = MarketParams {
        testing_what: Some(Scenario::ThresholdDirectionality),
        tendency_to_rate: Some(0.05),
        total_number_of_reviews: Some(60),
        input_type: Some(OutputEncoding::Raw),
        ..Default::default()
    }
    .build(rng)?;
    Ok(Market::new(config))
}

/// Fraction of reviews strictly above the previous running average
fn fraction_above(raw: &[f64]) -> f64 {
    let mut running_sum = raw[0];
    let mut count_above = 0usize;
    for (index, &review) in raw.iter().enumerate().skip(1) {
        if review > running_sum / index as f64 {
            count_above += 1;
        }
        running_sum += review;
    }
    count_above as f64 / raw.len() as f64
}

pub fn run(scenario_name: &str, logger: &mut Logger) -> Result<(), Box<dyn std::error::Error>> {
    let mut rng = StdRng::seed_from_u64(get_seed(606));
    let mut errors: Vec<String> = Vec::new();

    // missing inference vector is a typed configuration error
    let mut market = directionality_market(&mut rng)?;
    let outcome = market.generate(&GenerateOptions::default(), &mut rng, logger);
    let msg = "Generating without an explicit theta fails with MissingThresholds".to_string();
    match outcome {
        Err(SimError::Config(ConfigError::MissingThresholds)) => {
            logln!(logger, LogEvent::Scenario, "✓ {}", msg);
        }
        other => {
            errors.push(msg.clone());
            errln!(logger, LogEvent::Scenario, "✗ {} (got {:?})", msg, other.map(|s| s.observations.len()));
        }
    }

    // an explicit symmetric theta generates the requested series
    let series = market.generate(
        &GenerateOptions {
            theta: Some(Theta::symmetric(1.0)),
            ..Default::default()
        },
        &mut rng,
        logger,
    )?;
    let msg = format!("Symmetric theta generates {} observations", series.observations.len());
    if series.observations.len() == 60 {
        logln!(logger, LogEvent::Scenario, "✓ {}", msg);
    } else {
        errors.push(msg.clone());
        errln!(logger, LogEvent::Scenario, "✗ {}", msg);
    }

    // an upward-permissive gate (tight above-threshold, unreachable
    // below-threshold) must land more reviews above the running average
    // than the mirrored downward-permissive gate
    let collect_fractions = |theta: Theta, rng: &mut StdRng, logger: &mut Logger| -> Result<f64, Box<dyn std::error::Error>> {
        let mut market = directionality_market(rng)?;
        let mut fractions = Vec::new();
        for _ in 0..5 {
            let series = market.generate(
                &GenerateOptions {
                    theta: Some(theta),
                    ..Default::default()
                },
                rng,
                logger,
            )?;
            let raw: Vec<f64> = series
                .observations
                .iter()
                .filter_map(|obs| obs.as_scalar())
                .collect();
            fractions.push(fraction_above(&raw));
        }
        Ok(fractions.iter().sum::<f64>() / fractions.len() as f64)
    };

    let upward = collect_fractions(
        Theta {
            above: 0.25,
            below: Some(8.0),
        },
        &mut rng,
        logger,
    )?;
    let downward = collect_fractions(
        Theta {
            above: 8.0,
            below: Some(0.25),
        },
        &mut rng,
        logger,
    )?;
    logln!(logger, LogEvent::Variant, "fraction above average: upward gate {:.3}, downward gate {:.3}",
        upward, downward);

    let msg = format!(
        "Upward-permissive gate lands more reviews above the running average: {:.3} > {:.3}",
        upward, downward
    );
    if upward > downward {
        logln!(logger, LogEvent::Scenario, "✓ {}", msg);
    } else {
        errors.push(msg.clone());
        errln!(logger, LogEvent::Scenario, "✗ {}", msg);
    }

    // the direction-probability analysis is itself a probability
    let mut market = directionality_market(&mut rng)?;
    let p = market.direction_probability(&[-1.0, 1.0], 10, &mut rng, logger)?;
    let msg = format!("Direction probability over the prior support is in [0, 1]: {:.3}", p);
    if (0.0..=1.0).contains(&p) {
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
