use anyhow::anyhow;
use clap::Parser;
use serde::Deserialize;

use crate::common::Constants;

#[derive(Parser, Debug)]
#[command(
    name = "AGV Routing",
    about = "Conflict-free routing of AGVs over time windows.",
    version = "1.0"
)]
pub struct Cli {
    #[arg(long, help = "Path to a YAML config file")]
    pub config: Option<String>,

    #[arg(long, help = "Path to the YAML scenario file")]
    pub scenario_path: Option<String>,

    #[arg(long, help = "Path to the JSON report")]
    pub output_path: Option<String>,

    #[arg(
        long,
        help = "Number of random tasks, replacing the scenario's task list"
    )]
    pub num_tasks: Option<usize>,

    #[arg(long, help = "Seed for the random number generator")]
    pub seed: Option<u64>,

    #[arg(long, help = "Write the tasks in use to this YAML file")]
    pub dump_tasks: Option<String>,

    #[arg(long, help = "AGV speed, distance per time unit")]
    pub speed: Option<f64>,

    #[arg(long, help = "AGV length")]
    pub agv_length: Option<f64>,

    #[arg(long, help = "Distance needed to clear a crossing")]
    pub crossing_distance: Option<f64>,

    #[arg(long, help = "Floor applied to short edges")]
    pub min_distance: Option<f64>,

    #[arg(long, help = "Wait applied to a yielding AGV")]
    pub wait_time: Option<f64>,

    #[arg(
        long,
        help = "Skip the conflict pass over the planned batch",
        default_value_t = false
    )]
    pub skip_conflict_pass: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub scenario_path: String,
    pub output_path: String,
    pub num_tasks: Option<usize>,
    pub seed: u64,
    pub dump_tasks: Option<String>,
    pub constants: Constants,
    /// Defaults to the transit hold when unset.
    pub wait_time: Option<f64>,
    pub conflict_pass: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            scenario_path: "scenarios/factory_11.yaml".to_string(),
            output_path: "result/plan.json".to_string(),
            num_tasks: None,
            seed: 0,
            dump_tasks: None,
            constants: Constants::default(),
            wait_time: None,
            conflict_pass: true,
        }
    }
}

impl Config {
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn override_from_command_line(mut self, cli: &Cli) -> anyhow::Result<Self> {
        if let Some(path) = &cli.scenario_path {
            self.scenario_path = path.clone();
        }
        if let Some(path) = &cli.output_path {
            self.output_path = path.clone();
        }
        if cli.num_tasks.is_some() {
            self.num_tasks = cli.num_tasks;
        }
        if let Some(seed) = cli.seed {
            self.seed = seed;
        }
        if cli.dump_tasks.is_some() {
            self.dump_tasks = cli.dump_tasks.clone();
        }
        if let Some(speed) = cli.speed {
            self.constants.speed = speed;
        }
        if let Some(length) = cli.agv_length {
            self.constants.agv_length = length;
        }
        if let Some(distance) = cli.crossing_distance {
            self.constants.crossing_distance = distance;
        }
        if let Some(distance) = cli.min_distance {
            self.constants.min_distance = distance;
        }
        if cli.wait_time.is_some() {
            self.wait_time = cli.wait_time;
        }
        if cli.skip_conflict_pass {
            self.conflict_pass = false;
        }

        self.validate()?;
        Ok(self)
    }

    pub fn wait_time(&self) -> f64 {
        self.wait_time
            .unwrap_or_else(|| self.constants.transit_hold())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let constants = &self.constants;
        if constants.speed <= 0.0 {
            return Err(anyhow!("Speed must be positive, got {}", constants.speed));
        }
        if constants.agv_length < 0.0 {
            return Err(anyhow!(
                "AGV length must not be negative, got {}",
                constants.agv_length
            ));
        }
        if constants.crossing_distance < 0.0 {
            return Err(anyhow!(
                "Crossing distance must not be negative, got {}",
                constants.crossing_distance
            ));
        }
        if constants.min_distance <= 0.0 {
            return Err(anyhow!(
                "Minimum distance must be positive, got {}",
                constants.min_distance
            ));
        }
        if self.wait_time() <= 0.0 {
            return Err(anyhow!(
                "Wait time must be positive, got {}",
                self.wait_time()
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaml_config_with_defaults() {
        let config = Config::from_yaml_str(
            "scenario_path: floor.yaml\nseed: 7\nconstants:\n  speed: 4.0\n",
        )
        .unwrap();

        assert_eq!(config.scenario_path, "floor.yaml");
        assert_eq!(config.seed, 7);
        assert_eq!(config.constants.speed, 4.0);
        assert_eq!(config.constants.agv_length, 1.0);
        assert_eq!(config.output_path, "result/plan.json");
        assert!(config.conflict_pass);
        // (2 + 1) / 4
        assert_eq!(config.wait_time(), 0.75);
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(Config::from_yaml_str("solver: cbs\n").is_err());
    }

    #[test]
    fn test_command_line_overrides() {
        let cli = Cli::parse_from([
            "agv_routing",
            "--seed",
            "3",
            "--num-tasks",
            "4",
            "--wait-time",
            "2.5",
            "--skip-conflict-pass",
        ]);
        let config = Config::default().override_from_command_line(&cli).unwrap();

        assert_eq!(config.seed, 3);
        assert_eq!(config.num_tasks, Some(4));
        assert_eq!(config.wait_time(), 2.5);
        assert!(!config.conflict_pass);
        assert_eq!(config.scenario_path, "scenarios/factory_11.yaml");
    }

    #[test]
    fn test_invalid_constants() {
        let cli = Cli::parse_from(["agv_routing", "--speed", "0"]);
        let err = Config::default()
            .override_from_command_line(&cli)
            .unwrap_err();
        assert!(err.to_string().contains("Speed must be positive"));
    }
}
