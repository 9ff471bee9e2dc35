/// Output encodings: raw reviews, running averages, histogram snapshots
/// (raw and normalized) and the histogram-kurtosis statistic, all produced
/// from the same configuration.

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::{MarketParams, OutputEncoding, Scenario};
use crate::errln;
use crate::logger::{LogEvent, Logger};
use crate::logln;
use crate::market::{GenerateOptions, Market};
use crate::utils::get_seed;

inventory::submit!(crate::scenarios::ScenarioEntry {
    short_name: "encodings",
    run,
});

fn build_market(
    encoding: OutputEncoding,
    normalized: bool,
    rng: &mut StdRng,
) -> Result<Market, Box<dyn std::error::Error>> {
    let config = MarketParams {
        testing_what: Some(Scenario::ThresholdFixed),
        tendency_to_rate: Some(1.0),
        total_number_of_reviews: Some(15),
        input_type: Some(encoding),
        input_histograms_are_normalized: Some(normalized),
        ..Default::default()
    }
    .build(rng)?;
    Ok(Market::new(config))
}

pub fn run(scenario_name: &str, logger: &mut Logger) -> Result<(), Box<dyn std::error::Error>> {
    let mut rng = StdRng::seed_from_u64(get_seed(404));
    let mut errors: Vec<String> = Vec::new();

    // raw: discrete scalars in review range
    let series = build_market(OutputEncoding::Raw, false, &mut rng)?.generate(
        &GenerateOptions::default(),
        &mut rng,
        logger,
    )?;
    let raw_ok = series.observations.iter().all(|obs| {
        matches!(obs.as_scalar(), Some(v) if v.fract() == 0.0 && (1.0..=5.0).contains(&v))
    });
    let msg = "Raw encoding yields integral scalars in [1, 5]".to_string();
    if raw_ok {
        logln!(logger, LogEvent::Scenario, "✓ {}", msg);
    } else {
        errors.push(msg.clone());
        errln!(logger, LogEvent::Scenario, "✗ {}", msg);
    }

    // averages: scalars in review range, last equals the state running average
    let mut market = build_market(OutputEncoding::Averages, false, &mut rng)?;
    let series = market.generate(&GenerateOptions::default(), &mut rng, logger)?;
    let avg_ok = series
        .observations
        .iter()
        .all(|obs| matches!(obs.as_scalar(), Some(v) if (1.0..=5.0).contains(&v)))
        && series.observations.last().and_then(|obs| obs.as_scalar())
            == market.state.avg_reviews.last().copied();
    let msg = "Averages encoding tracks the running average of submitted reviews".to_string();
    if avg_ok {
        logln!(logger, LogEvent::Scenario, "✓ {}", msg);
    } else {
        errors.push(msg.clone());
        errln!(logger, LogEvent::Scenario, "✗ {}", msg);
    }

    // raw histograms: counts accumulate one review per observation
    let series = build_market(OutputEncoding::Histograms, false, &mut rng)?.generate(
        &GenerateOptions::default(),
        &mut rng,
        logger,
    )?;
    let counts_ok = series.observations.iter().enumerate().all(|(index, obs)| {
        obs.as_histogram()
            .map(|h| h.iter().sum::<f64>() == (index + 1) as f64)
            .unwrap_or(false)
    });
    let msg = "Histogram encoding accumulates one count per observation".to_string();
    if counts_ok {
        logln!(logger, LogEvent::Scenario, "✓ {}", msg);
    } else {
        errors.push(msg.clone());
        errln!(logger, LogEvent::Scenario, "✗ {}", msg);
    }

    // normalized histograms: frequencies summing to one
    let series = build_market(OutputEncoding::Histograms, true, &mut rng)?.generate(
        &GenerateOptions::default(),
        &mut rng,
        logger,
    )?;
    let normalized_ok = series.observations.iter().all(|obs| {
        obs.as_histogram()
            .map(|h| (h.iter().sum::<f64>() - 1.0).abs() < 1e-9)
            .unwrap_or(false)
    });
    let msg = "Normalized histogram entries sum to 1.0".to_string();
    if normalized_ok {
        logln!(logger, LogEvent::Scenario, "✓ {}", msg);
    } else {
        errors.push(msg.clone());
        errln!(logger, LogEvent::Scenario, "✗ {}", msg);
    }

    // kurtosis: finite scalars
    let series = build_market(OutputEncoding::Kurtosis, false, &mut rng)?.generate(
        &GenerateOptions::default(),
        &mut rng,
        logger,
    )?;
    let kurtosis_ok = series
        .observations
        .iter()
        .all(|obs| matches!(obs.as_scalar(), Some(v) if v.is_finite()));
    let msg = "Kurtosis encoding yields finite scalars".to_string();
    if kurtosis_ok {
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
