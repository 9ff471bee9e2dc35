/// Acquisition-bias mode: every consumer reviews unconditionally, isolating
/// the quality-perception dynamics from selective-rating effects. With a
/// fixed population, the series length must equal the consumer count.

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::{MarketParams, Scenario};
use crate::errln;
use crate::logger::{LogEvent, Logger};
use crate::logln;
use crate::market::{GenerateOptions, Market, StoppingRule};
use crate::utils::get_seed;

inventory::submit!(crate::scenarios::ScenarioEntry {
    short_name: "acquisition_bias",
    run,
});

pub fn run(scenario_name: &str, logger: &mut Logger) -> Result<(), Box<dyn std::error::Error>> {
    const POPULATION: usize = 120;

    let mut rng = StdRng::seed_from_u64(get_seed(202));
    let config = MarketParams {
        testing_what: Some(Scenario::AcquisitionBias),
        ..Default::default()
    }
    .build(&mut rng)?;

    let mut market = Market::new(config);
    let series = market.generate(
        &GenerateOptions {
            stopping: Some(StoppingRule::FixedPopulation(POPULATION)),
            include_rater_fits: true,
            ..Default::default()
        },
        &mut rng,
        logger,
    )?;

    logln!(logger, LogEvent::Variant, "population {}: {} observations, {} purchases",
        series.customer_count, series.observations.len(), series.purchase_count);

    let mut errors: Vec<String> = Vec::new();

    let msg = format!(
        "Every consumer reviewed: {} observations == {} consumers",
        series.observations.len(),
        series.customer_count
    );
    if series.observations.len() == POPULATION && series.customer_count == POPULATION {
        logln!(logger, LogEvent::Scenario, "✓ {}", msg);
    } else {
        errors.push(msg.clone());
        errln!(logger, LogEvent::Scenario, "✗ {}", msg);
    }

    // non-purchasers reviewed too: purchases are strictly fewer than reviews
    // with overwhelming probability at this population size
    let msg = format!(
        "Reviews are decoupled from purchases: {} purchases, {} reviews",
        series.purchase_count,
        market.state.reviews.len()
    );
    if series.purchase_count < market.state.reviews.len() {
        logln!(logger, LogEvent::Scenario, "✓ {}", msg);
    } else {
        errors.push(msg.clone());
        errln!(logger, LogEvent::Scenario, "✗ {}", msg);
    }

    let fits = series.rater_fits.as_ref().map(Vec::len).unwrap_or(0);
    let msg = format!(
        "Auxiliary sequences are consistent: {} fits, {} anchors, {} perceived",
        fits,
        series.anchors_shown.len(),
        series.perceived_qualities.len()
    );
    if fits == POPULATION
        && series.anchors_shown.len() == POPULATION
        && series.perceived_qualities.len() == POPULATION
    {
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
