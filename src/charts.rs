/// Chart generation for simulated review dynamics.
///
/// Simulates one market under each comparison mode and renders the final
/// review histogram plus the perceived-quality / running-average traces.

use plotters::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs;

use crate::config::{ComparisonMode, MarketParams, Scenario};
use crate::logger::Logger;
use crate::market::{GenerateOptions, Market};
use crate::utils::get_seed;

/// Simulate one series and return the market with its final state
fn simulate_market(mode: ComparisonMode, salt: u64) -> Result<Market, Box<dyn std::error::Error>> {
    let mut rng = StdRng::seed_from_u64(get_seed(salt));
    let config = MarketParams {
        testing_what: Some(Scenario::ThresholdFixed),
        comparison_mode: Some(mode),
        total_number_of_reviews: Some(200),
        ..Default::default()
    }
    .build(&mut rng)?;
    let mut market = Market::new(config);
    let mut logger = Logger::new();
    market.generate(&GenerateOptions::default(), &mut rng, &mut logger)?;
    Ok(market)
}

/// Main entry: generate all charts into the charts/ directory
pub fn generate_all_charts() -> Result<(), Box<dyn std::error::Error>> {
    fs::create_dir_all("charts")?;

    for (mode, label) in [
        (ComparisonMode::Benchmark, "benchmark"),
        (ComparisonMode::Motivation, "motivation"),
    ] {
        let market = simulate_market(mode, 4242)?;
        generate_review_histogram(
            &market,
            &format!("Review Histogram ({})", label),
            &format!("charts/review_histogram_{}.png", label),
        )?;
        generate_quality_traces(
            &market,
            &format!("Quality Dynamics ({})", label),
            &format!("charts/quality_traces_{}.png", label),
        )?;
    }

    Ok(())
}

/// Bar chart of the final review histogram
fn generate_review_histogram(
    market: &Market,
    title: &str,
    filename: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let counts = &market.state.histogram_reviews;
    let max_count = counts.iter().copied().max().unwrap_or(0) as u32;

    let root = BitMapBackend::new(filename, (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(0.5f64..5.5f64, 0u32..max_count + max_count / 10 + 1)?;

    chart
        .configure_mesh()
        .x_desc("Rating Level")
        .y_desc("Count")
        .draw()?;

    chart.draw_series(counts.iter().enumerate().map(|(i, &count)| {
        let level = (i + 1) as f64;
        Rectangle::new([(level - 0.4, 0), (level + 0.4, count as u32)], BLUE.filled())
    }))?;

    root.present()?;
    Ok(())
}

/// Line traces of the perceived quality, the anchors shown to consumers and
/// the running average review, all over consumer steps
fn generate_quality_traces(
    market: &Market,
    title: &str,
    filename: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let perceived = &market.state.perceived_qualities;
    let anchors = &market.state.anchors_shown;
    if perceived.is_empty() {
        return Err("cannot chart an empty series".into());
    }

    let all_values = perceived.iter().chain(anchors.iter());
    let min_y = all_values.clone().cloned().fold(f64::INFINITY, f64::min) - 0.5;
    let max_y = all_values.cloned().fold(f64::NEG_INFINITY, f64::max) + 0.5;

    let root = BitMapBackend::new(filename, (1200, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(0f64..perceived.len() as f64, min_y..max_y)?;

    chart
        .configure_mesh()
        .x_desc("Consumer Step")
        .y_desc("Quality")
        .draw()?;

    chart
        .draw_series(LineSeries::new(
            perceived.iter().enumerate().map(|(i, &q)| (i as f64, q)),
            &BLUE,
        ))?
        .label("Perceived Quality")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLUE));

    chart
        .draw_series(LineSeries::new(
            anchors.iter().enumerate().map(|(i, &a)| (i as f64, a)),
            &RED,
        ))?
        .label("Anchor Shown")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED));

    // true quality reference line
    chart
        .draw_series(std::iter::once(PathElement::new(
            vec![
                (0.0, market.config.true_quality),
                (perceived.len() as f64, market.config.true_quality),
            ],
            &BLACK,
        )))?
        .label(format!("True Quality: {:.2}", market.config.true_quality))
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLACK));

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}
