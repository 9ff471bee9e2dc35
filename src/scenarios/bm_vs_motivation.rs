/// BM-vs-Motivation inference target: the comparison mode itself is
/// randomized per series. Both modes must produce valid series, the
/// perceived quality must stay inside the posterior grid, and the first
/// reviewer must always rate.

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::{ComparisonMode, MarketParams, OutputEncoding, Scenario};
use crate::errln;
use crate::logger::{LogEvent, Logger};
use crate::logln;
use crate::market::{GenerateOptions, Market};
use crate::perception::{GRID_MAX, GRID_MIN};
use crate::utils::get_seed;

inventory::submit!(crate::scenarios::ScenarioEntry {
    short_name: "bm_vs_motivation",
    run,
});

pub fn run(scenario_name: &str, logger: &mut Logger) -> Result<(), Box<dyn std::error::Error>> {
    let mut rng = StdRng::seed_from_u64(get_seed(303));
    let config = MarketParams {
        testing_what: Some(Scenario::BmVsMotivation),
        total_number_of_reviews: Some(30),
        input_type: Some(OutputEncoding::Averages),
        ..Default::default()
    }
    .build(&mut rng)?;

    let mut market = Market::new(config);
    let mut errors: Vec<String> = Vec::new();
    let mut seen_benchmark = false;
    let mut seen_motivation = false;

    for variant in 0..8 {
        let series = market.generate(&GenerateOptions::default(), &mut rng, logger)?;
        match series.policy.comparison_mode {
            ComparisonMode::Benchmark => seen_benchmark = true,
            ComparisonMode::Motivation => seen_motivation = true,
        }
        logln!(logger, LogEvent::Variant, "series {} under {:?}: {} consumers",
            variant, series.policy.comparison_mode, series.customer_count);

        let bounded = series
            .perceived_qualities
            .iter()
            .all(|&q| (GRID_MIN..=GRID_MAX).contains(&q));
        if !bounded {
            let msg = format!(
                "series {} under {:?}: perceived quality escaped the grid",
                variant, series.policy.comparison_mode
            );
            errors.push(msg.clone());
            errln!(logger, LogEvent::Scenario, "✗ {}", msg);
        }
        if series.observations.len() != 30 {
            let msg = format!(
                "series {} under {:?}: expected 30 observations, got {}",
                variant,
                series.policy.comparison_mode,
                series.observations.len()
            );
            errors.push(msg.clone());
            errln!(logger, LogEvent::Scenario, "✗ {}", msg);
        }
    }

    let msg = format!(
        "Both comparison modes were drawn over 8 series (benchmark: {}, motivation: {})",
        seen_benchmark, seen_motivation
    );
    if seen_benchmark && seen_motivation {
        logln!(logger, LogEvent::Scenario, "✓ {}", msg);
    } else {
        errors.push(msg.clone());
        errln!(logger, LogEvent::Scenario, "✗ {}", msg);
    }
    if errors.is_empty() {
        logln!(logger, LogEvent::Scenario, "✓ All series valid: bounded perception, full length");
    }

    // first-reviewer guarantee: with tendency_to_rate 0 the unconditional
    // coin never fires, yet the first eligible purchaser must still rate
    for mode in [ComparisonMode::Benchmark, ComparisonMode::Motivation] {
        let config = MarketParams {
            testing_what: Some(Scenario::ThresholdFixed),
            comparison_mode: Some(mode),
            tendency_to_rate: Some(0.0),
            total_number_of_reviews: Some(1),
            step_budget: Some(10_000),
            ..Default::default()
        }
        .build(&mut rng)?;
        let mut market = Market::new(config);
        let series = market.generate(&GenerateOptions::default(), &mut rng, logger)?;
        let msg = format!("First reviewer rates unconditionally under {:?}", mode);
        if series.observations.len() == 1 {
            logln!(logger, LogEvent::Scenario, "✓ {}", msg);
        } else {
            errors.push(msg.clone());
            errln!(logger, LogEvent::Scenario, "✗ {}", msg);
        }
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
