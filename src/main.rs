use agv_routing::common::Task;
use agv_routing::config::{Cli, Config};
use agv_routing::planner::{Failure, Plan, Planner};
use agv_routing::resolver::{ConflictResolver, LaterAgvYields, Resolution};
use agv_routing::scenario::Scenario;
use agv_routing::stat::Stats;
use agv_routing::timeline::Timeline;

use anyhow::Context;
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Serialize)]
struct ResolvedBatch {
    timeline: Timeline,
    sweeps: usize,
    delays: usize,
}

impl ResolvedBatch {
    fn new(timeline: Timeline, resolution: Resolution) -> Self {
        ResolvedBatch {
            timeline,
            sweeps: resolution.sweeps,
            delays: resolution.delays,
        }
    }
}

#[derive(Debug, Serialize)]
struct RunReport {
    tasks: Vec<Task>,
    plans: Vec<Plan>,
    failures: Vec<Failure>,
    planned_batch: Option<ResolvedBatch>,
    scenario_batch: Option<ResolvedBatch>,
    stats: Stats,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let cli = Cli::parse();

    let config = if let Some(config_file) = cli.config.as_ref() {
        let config_str = std::fs::read_to_string(config_file)?;
        Config::from_yaml_str(&config_str)
            .with_context(|| format!("error with config file: {config_file}"))?
    } else {
        info!("No config file specified, using default config");
        Config::default()
    }
    .override_from_command_line(&cli)?;

    let scenario = Scenario::load_from_file(&config.scenario_path)?;
    let (graph, buffers) = scenario
        .build_graph()
        .with_context(|| format!("invalid floor in {}", config.scenario_path))?;

    let tasks = match config.num_tasks {
        Some(num_tasks) => {
            let mut rng = StdRng::seed_from_u64(config.seed);
            scenario.generate_tasks_randomly(num_tasks, &mut rng)?
        }
        None => scenario.tasks.clone(),
    };
    if let Some(path) = config.dump_tasks.as_ref() {
        Scenario::write_tasks_to_yaml(path, &tasks)
            .with_context(|| format!("cannot write tasks to {path}"))?;
    }

    let mut stats = Stats::default();
    let mut planner = Planner::new(graph, buffers, config.constants.clone());
    planner
        .park(&tasks)
        .context("cannot park the vehicles at their start nodes")?;
    let report = planner.plan_all(&tasks, &mut stats);

    let mut planned_batch = None;
    let mut scenario_batch = None;
    if config.conflict_pass {
        let resolver = ConflictResolver::new(config.wait_time());

        let mut timeline = Planner::timeline(&report.plans);
        let resolution = resolver.resolve(&mut timeline, &LaterAgvYields, &mut stats)?;
        planned_batch = Some(ResolvedBatch::new(timeline, resolution));

        if let Some(batch) = scenario.batch.as_ref() {
            let mut timeline = Timeline::generate_time_window(
                &batch.paths,
                &batch.elapsed(),
                planner.graph(),
                planner.constants(),
            )?;
            let resolution = resolver.resolve(&mut timeline, &LaterAgvYields, &mut stats)?;
            scenario_batch = Some(ResolvedBatch::new(timeline, resolution));
        }
    }

    let output = RunReport {
        tasks,
        plans: report.plans,
        failures: report.failures,
        planned_batch,
        scenario_batch,
        stats: stats.clone(),
    };
    if let Some(parent) = Path::new(&config.output_path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(&config.output_path)
        .with_context(|| format!("cannot create {}", config.output_path))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &output)?;
    info!("Report written to {}", config.output_path);

    stats.print();
    Ok(())
}
