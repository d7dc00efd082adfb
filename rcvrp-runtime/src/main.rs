mod telemetry;

use anyhow::{anyhow, Result};
use clap::{arg, Command};
use rcvrp_challenges::{Challenge, Difficulty, Solution};
use rcvrp_oracle::{
    reference, Arena, CoefficientTables, OracleConfig, SelectorSet, SelectorSpace, Threshold,
    ThresholdOracle,
};
use rcvrp_utils::{jsonify, load_json, seed_from_str};
use serde::Serialize;
use serde_json::{Map, Value};
use std::{fs, path::PathBuf, thread};
use tracing::{debug, info};

fn cli() -> Command {
    Command::new("rcvrp-runtime")
        .about("Generates routing instances and runs them through the threshold oracle")
        .arg_required_else_help(true)
        .subcommand(
            Command::new("generate_instance")
                .about("Generates a random instance")
                .arg(
                    arg!(<SEED> "A string used in seed generation")
                        .value_parser(clap::value_parser!(String)),
                )
                .arg(
                    arg!(--nodes <NODES> "Number of nodes, depot included")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(--capacity <CAPACITY> "Vehicle capacity")
                        .value_parser(clap::value_parser!(u64)),
                )
                .arg(
                    arg!(--output [OUTPUT_FILE] "If set, the instance will be saved to this file path")
                        .value_parser(clap::value_parser!(PathBuf)),
                ),
        )
        .subcommand(
            Command::new("evaluate")
                .about("Runs one selector assignment through the oracle")
                .arg(
                    arg!(<INSTANCE> "Instance json string, path to json file, or '-' for stdin")
                        .value_parser(clap::value_parser!(String)),
                )
                .arg(
                    arg!(<SELECTORS> "Selector values as a json array, e.g. [2,0,1]")
                        .value_parser(clap::value_parser!(String)),
                )
                .arg(
                    arg!(--threshold [THRESHOLD] "Absolute threshold in instance units")
                        .value_parser(clap::value_parser!(f64)),
                )
                .arg(
                    arg!(--hyperparameters [HYPERPARAMETERS] "Hyperparameters json string or path to json file")
                        .value_parser(clap::value_parser!(String)),
                ),
        )
        .subcommand(
            Command::new("enumerate")
                .about("Runs every selector assignment through the oracle")
                .arg(
                    arg!(<INSTANCE> "Instance json string, path to json file, or '-' for stdin")
                        .value_parser(clap::value_parser!(String)),
                )
                .arg(
                    arg!(--hyperparameters [HYPERPARAMETERS] "Hyperparameters json string or path to json file")
                        .value_parser(clap::value_parser!(String)),
                )
                .arg(
                    arg!(--output [OUTPUT_FILE] "If set, the report will be saved to this file path")
                        .value_parser(clap::value_parser!(PathBuf)),
                ),
        )
}

fn main() {
    telemetry::init();
    let matches = cli().get_matches();

    if let Err(e) = match matches.subcommand() {
        Some(("generate_instance", sub_m)) => generate_instance(
            sub_m.get_one::<String>("SEED").unwrap().clone(),
            *sub_m.get_one::<usize>("nodes").unwrap(),
            *sub_m.get_one::<u64>("capacity").unwrap(),
            sub_m.get_one::<PathBuf>("output").cloned(),
        ),
        Some(("evaluate", sub_m)) => evaluate(
            sub_m.get_one::<String>("INSTANCE").unwrap().clone(),
            sub_m.get_one::<String>("SELECTORS").unwrap().clone(),
            sub_m.get_one::<f64>("threshold").cloned(),
            sub_m.get_one::<String>("hyperparameters").cloned(),
        ),
        Some(("enumerate", sub_m)) => enumerate(
            sub_m.get_one::<String>("INSTANCE").unwrap().clone(),
            sub_m.get_one::<String>("hyperparameters").cloned(),
            sub_m.get_one::<PathBuf>("output").cloned(),
        ),
        _ => Err(anyhow!("Invalid subcommand")),
    } {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[derive(Serialize, Debug)]
struct CandidateReport {
    assignment: Vec<u64>,
    itinerary: Vec<usize>,
    raw_length: u64,
    length: f64,
    routes: Vec<Vec<usize>>,
    route_length: f64,
}

#[derive(Serialize, Debug)]
struct EvaluationReport {
    threshold: f64,
    raw_threshold: u64,
    accepted: bool,
    peak_registers: usize,
    candidate: CandidateReport,
}

#[derive(Serialize, Debug)]
struct EnumerationReport {
    threshold: f64,
    raw_threshold: u64,
    num_candidates: u64,
    num_marked: u64,
    best: Option<CandidateReport>,
}

#[derive(Debug, Default)]
struct WorkerReport {
    num_marked: u64,
    best: Option<(u64, Vec<u64>)>,
}

pub fn generate_instance(
    seed: String,
    num_nodes: usize,
    max_capacity: u64,
    output_file: Option<PathBuf>,
) -> Result<()> {
    let difficulty = Difficulty {
        num_nodes,
        max_capacity,
    };
    let challenge = Challenge::generate_instance(&seed_from_str(&seed), &difficulty)?;
    info!(
        num_nodes,
        max_capacity,
        total_demand = challenge.total_demand(),
        "generated instance"
    );
    write_output(&challenge, output_file)
}

pub fn evaluate(
    instance: String,
    selectors: String,
    threshold: Option<f64>,
    hyperparameters: Option<String>,
) -> Result<()> {
    let challenge = load_challenge(&instance)?;
    let config = load_config(hyperparameters.as_deref(), &challenge)?;
    let assignment = load_json::<Vec<u64>>(&selectors)?;
    let tables = CoefficientTables::new(&challenge, config.precision)?;
    let oracle = ThresholdOracle::new(&tables);
    let threshold_value = threshold.unwrap_or_else(|| config.threshold_for(&challenge));
    let threshold = tables.threshold(threshold_value)?;

    let mut arena = Arena::new();
    let selectors = SelectorSet::allocate(&mut arena, &tables.selector_space(), &assignment)?;
    let mut accepted = false;
    oracle.evaluate(&mut arena, &selectors, threshold, &mut |_: &[u64]| {
        accepted = true
    })?;
    let raw_length = oracle.measure(&mut arena, &selectors)?;
    selectors.release(&mut arena);

    let report = EvaluationReport {
        threshold: threshold_value,
        raw_threshold: threshold.raw(),
        accepted,
        peak_registers: arena.peak_depth(),
        candidate: describe(&challenge, &tables, assignment, raw_length)?,
    };
    println!("{}", jsonify(&report)?);
    Ok(())
}

pub fn enumerate(
    instance: String,
    hyperparameters: Option<String>,
    output_file: Option<PathBuf>,
) -> Result<()> {
    let challenge = load_challenge(&instance)?;
    let config = load_config(hyperparameters.as_deref(), &challenge)?;
    let tables = CoefficientTables::new(&challenge, config.precision)?;
    let oracle = ThresholdOracle::new(&tables);
    let space = tables.selector_space();
    let num_candidates = space
        .num_candidates()
        .filter(|&n| n <= config.max_candidates)
        .ok_or_else(|| {
            anyhow!(
                "Instance with {} nodes has too many candidates (limit is {})",
                challenge.num_nodes,
                config.max_candidates
            )
        })?;
    let threshold_value = config.threshold_for(&challenge);
    let threshold = tables.threshold(threshold_value)?;
    let num_workers = (config.num_workers as u64).min(num_candidates).max(1);
    info!(
        num_candidates,
        num_workers,
        threshold = threshold_value,
        precision = tables.precision(),
        "enumerating candidates"
    );

    let reports = thread::scope(|s| {
        let handles: Vec<_> = (0..num_workers)
            .map(|worker| {
                let space = &space;
                s.spawn(move || {
                    run_worker(oracle, space, threshold, worker, num_workers, num_candidates)
                })
            })
            .collect();
        handles
            .into_iter()
            .enumerate()
            .map(|(i, h)| {
                h.join()
                    .map_err(|_| anyhow!("Worker {} panicked", i))
                    .and_then(|report| report)
            })
            .collect::<Result<Vec<_>>>()
    })?;

    let num_marked = reports.iter().map(|r| r.num_marked).sum();
    let best = reports
        .into_iter()
        .filter_map(|r| r.best)
        .min_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)))
        .map(|(raw_length, assignment)| describe(&challenge, &tables, assignment, raw_length))
        .transpose()?;
    info!(
        num_marked,
        best_length = best.as_ref().map(|b| b.route_length),
        "enumeration finished"
    );

    let report = EnumerationReport {
        threshold: threshold_value,
        raw_threshold: threshold.raw(),
        num_candidates,
        num_marked,
        best,
    };
    write_output(&report, output_file)
}

fn run_worker(
    oracle: ThresholdOracle,
    space: &SelectorSpace,
    threshold: Threshold,
    worker: u64,
    num_workers: u64,
    num_candidates: u64,
) -> Result<WorkerReport> {
    let mut arena = Arena::new();
    let mut report = WorkerReport::default();
    for rank in (worker..num_candidates).step_by(num_workers as usize) {
        let assignment = space.assignment(rank);
        let selectors = SelectorSet::allocate(&mut arena, space, &assignment)?;
        let mut marked = false;
        oracle.evaluate(&mut arena, &selectors, threshold, &mut |_: &[u64]| {
            marked = true
        })?;
        if marked {
            report.num_marked += 1;
            let length = oracle.measure(&mut arena, &selectors)?;
            if report.best.as_ref().map_or(true, |(best, _)| length < *best) {
                report.best = Some((length, assignment));
            }
        }
        selectors.release(&mut arena);
    }
    debug!(
        worker,
        num_marked = report.num_marked,
        peak_registers = arena.peak_depth(),
        "worker finished"
    );
    Ok(report)
}

fn describe(
    challenge: &Challenge,
    tables: &CoefficientTables,
    assignment: Vec<u64>,
    raw_length: u64,
) -> Result<CandidateReport> {
    let itinerary = reference::permutation(challenge.num_nodes, &assignment);
    let routes = challenge.split_routes(&itinerary);
    let route_length = challenge.verify_solution(&Solution {
        routes: routes.clone(),
    })?;
    Ok(CandidateReport {
        assignment,
        itinerary,
        raw_length,
        length: tables.to_real(raw_length),
        routes,
        route_length,
    })
}

fn load_challenge(instance: &str) -> Result<Challenge> {
    let challenge = load_json::<Challenge>(instance)?;
    challenge.validate()?;
    Ok(challenge)
}

fn load_config(hyperparameters: Option<&str>, challenge: &Challenge) -> Result<OracleConfig> {
    let hyperparameters = hyperparameters
        .map(load_json::<Map<String, Value>>)
        .transpose()?;
    OracleConfig::initialize(&hyperparameters, challenge)
}

fn write_output<T: Serialize>(obj: &T, output_file: Option<PathBuf>) -> Result<()> {
    let json = jsonify(obj)?;
    if let Some(path) = output_file {
        fs::write(&path, json)?;
        info!("output written to: {:?}", path);
    } else {
        println!("{}", json);
    }
    Ok(())
}
