
mod utils;
mod logger;
mod errors;
mod gauss;
mod config;
mod consumer;
mod perception;
mod market;
mod charts;
mod scenarios;

use logger::{Logger, LogEvent, ConsoleReceiver, FileReceiver, sanitize_filename};
use std::path::PathBuf;

use scenarios::get_scenario_catalog;
use utils::{RAND_SEED, TOTAL_SIMULATION_RUNS};
use std::sync::atomic::Ordering;

fn main() {
    let raw_args: Vec<String> = std::env::args().collect();

    // Parse and filter out --verbose and --fastbreak arguments
    let mut args = Vec::new();
    let mut skip_next = false;
    let mut fastbreak = false;
    for (i, arg) in raw_args.iter().enumerate() {
        if skip_next {
            skip_next = false;
            continue;
        }
        if arg == "--verbose" {
            if i + 1 < raw_args.len() && raw_args[i + 1] == "step" {
                utils::VERBOSE_STEP.store(true, Ordering::Relaxed);
                skip_next = true;
            }
            continue;
        }
        if arg == "--fastbreak" {
            fastbreak = true;
            continue;
        }
        args.push(arg.clone());
    }

    // Check if "charts" argument is provided
    if args.len() > 1 && args[1] == "charts" {
        match charts::generate_all_charts() {
            Ok(()) => {
                println!("All chart generation completed successfully.");
            }
            Err(e) => {
                eprintln!("Error generating charts: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    if args.len() > 1 {
        let scenario_arg = &args[1];

        // Parse iterations parameter if present
        let iterations = if args.len() > 2 {
            match args[2].parse::<u64>() {
                Ok(n) => n,
                Err(_) => {
                    eprintln!("Error: Invalid iterations parameter '{}'. Expected a number.", args[2]);
                    std::process::exit(1);
                }
            }
        } else {
            1
        };

        // Parse optional starting iteration index if present
        let start_iteration = if args.len() > 3 {
            match args[3].parse::<u64>() {
                Ok(n) => n,
                Err(_) => {
                    eprintln!("Error: Invalid start iteration parameter '{}'. Expected a number.", args[3]);
                    std::process::exit(1);
                }
            }
        } else {
            0
        };

        // Get all scenarios from the catalog
        let all_scenarios = get_scenario_catalog();

        // Filter scenarios: if "all", use all scenarios; otherwise filter to the named scenario
        let scenarios: Vec<_> = if scenario_arg == "all" {
            all_scenarios.clone()
        } else {
            let found = all_scenarios.iter().find(|s| s.short_name == scenario_arg);
            match found {
                Some(scenario) => vec![scenario.clone()],
                None => {
                    eprintln!("Error: Scenario '{}' not found.", scenario_arg);
                    eprintln!("Available scenarios:");
                    for s in &all_scenarios {
                        eprintln!("  - {}", s.short_name);
                    }
                    std::process::exit(1);
                }
            }
        };

        // Set up logger with console and validation file receivers.
        // Per-validation detail only shows on console for single-iteration
        // runs of a single scenario; otherwise it would clutter the output.
        let mut logger = Logger::new();
        if scenario_arg != "all" && iterations == 1 {
            logger.add_receiver(ConsoleReceiver::new(vec![LogEvent::Validation, LogEvent::Scenario]));
        } else {
            logger.add_receiver(ConsoleReceiver::new(vec![LogEvent::Validation]));
        }

        let summary_receiver_id = logger.add_receiver(FileReceiver::new(&PathBuf::from("log/summary.log"), vec![LogEvent::Validation]));

        TOTAL_SIMULATION_RUNS.store(0, Ordering::Relaxed);
        let initial_count = TOTAL_SIMULATION_RUNS.load(Ordering::Relaxed);

        if scenario_arg == "all" {
            if iterations > 1 {
                logln!(&mut logger, LogEvent::Validation, "Running all scenarios {} times... (Total simulation runs: {})\n", iterations, initial_count);
            } else {
                logln!(&mut logger, LogEvent::Validation, "Running all scenarios... (Total simulation runs: {})\n", initial_count);
            }
        } else if iterations > 1 {
            logln!(&mut logger, LogEvent::Validation, "Running scenario '{}' {} times... (Total simulation runs: {})\n", scenario_arg, iterations, initial_count);
        } else {
            logln!(&mut logger, LogEvent::Validation, "Running scenario '{}'... (Total simulation runs: {})\n", scenario_arg, initial_count);
        }

        'scenarios: for scenario in &scenarios {
            log!(&mut logger, LogEvent::Validation, "{}: ", scenario.short_name);

            let scenario_receiver_id = logger.add_receiver(FileReceiver::new(&PathBuf::from(format!("log/{}/scenario.log", sanitize_filename(scenario.short_name))), vec![LogEvent::Scenario]));

            for i in start_iteration..(start_iteration + iterations) {
                if iterations > 1 {
                    let iteration_num = i - start_iteration + 1;
                    log!(&mut logger, LogEvent::Validation, "[{}/{}] ", iteration_num, iterations);
                }

                // Each iteration reseeds the deterministic run from its index
                RAND_SEED.store(i, Ordering::Relaxed);

                match (scenario.run)(scenario.short_name, &mut logger) {
                    Ok(()) => {
                        if iterations > 1 {
                            logln!(&mut logger, LogEvent::Validation, "✓");
                        } else {
                            logln!(&mut logger, LogEvent::Validation, "✓ PASSED");
                        }
                    }
                    Err(e) => {
                        if iterations > 1 {
                            logln!(&mut logger, LogEvent::Validation, "✗");
                        } else {
                            logln!(&mut logger, LogEvent::Validation, "✗ FAILED: {}", e);
                        }

                        if fastbreak {
                            logger.remove_receiver(scenario_receiver_id);
                            logln!(&mut logger, LogEvent::Validation, "\nStopping scenario execution due to failure (--fastbreak enabled)");
                            if iterations > 1 {
                                let iteration_num = i - start_iteration + 1;
                                logln!(&mut logger, LogEvent::Validation, "Error at iteration {}/{} (seed {}): {}", iteration_num, iterations, i, e);
                            } else {
                                logln!(&mut logger, LogEvent::Validation, "Error: {}", e);
                            }
                            break 'scenarios;
                        }
                    }
                }

                let _ = logger.flush();
            }

            logger.remove_receiver(scenario_receiver_id);
        }

        let final_count = TOTAL_SIMULATION_RUNS.load(Ordering::Relaxed);
        logln!(&mut logger, LogEvent::Validation, "\nTotal simulation runs completed: {}", final_count);

        logger.remove_receiver(summary_receiver_id);
    } else {
        // Default behavior: run the fixed-threshold scenario with summary verbosity
        let mut logger = Logger::new();
        logger.add_receiver(ConsoleReceiver::new(vec![LogEvent::Simulation, LogEvent::Variant]));
        if let Err(e) = scenarios::threshold_fixed::run("threshold_fixed", &mut logger) {
            eprintln!("Error running scenario: {}", e);
            std::process::exit(1);
        }
    }
}
