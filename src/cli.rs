use std::fs::File;
use std::io::BufReader;

use log::{LevelFilter, Metadata, Record};
use serde_derive::{Deserialize, Serialize};

use crate::abc::{Prior, ReferenceTable};
use crate::error::Error;
use crate::genetics::Dataset;
use crate::geography::Landscape;
use crate::parameters::Scenario;

/// Command line settings of the `simulation` binary.
#[derive(Debug, Clone)]
pub struct Settings {
    pub setup: String,
    pub draws: usize,
    pub seed: u64,
    pub output: String,
    pub verbose: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            setup: "setup.json".to_string(),
            draws: 100,
            seed: 0,
            output: "reference_table.json".to_string(),
            verbose: false,
        }
    }
}

pub fn parse_args(s: &mut Settings) -> argparse::ArgumentParser<'_> {
    let mut parser = argparse::ArgumentParser::new();
    parser.set_description("Build an ABC reference table for a spatial invasion");
    parser.refer(&mut s.setup).add_option(
        &["--setup"],
        argparse::Store,
        "JSON file with the landscape, the genetic dataset, the scenario and the prior",
    );
    parser.refer(&mut s.draws).add_option(
        &["--draws"],
        argparse::Store,
        "number of parameter sets to draw from the prior",
    );
    parser.refer(&mut s.seed).add_option(
        &["--seed"],
        argparse::Store,
        "seed of the random number generator",
    );
    parser.refer(&mut s.output).add_option(
        &["--output"],
        argparse::Store,
        "file to store the reference table in",
    );
    parser.refer(&mut s.verbose).add_option(
        &["-v", "--verbose"],
        argparse::StoreTrue,
        "log every replicate",
    );
    parser
}

/// Everything an inference run needs, as read from the setup file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Setup {
    pub landscape: Landscape,
    pub dataset: Dataset,
    #[serde(default)]
    pub scenario: Scenario,
    #[serde(default)]
    pub prior: Prior,
}

pub fn load_setup(path: &str) -> Result<Setup, Error> {
    let file = File::open(path)?;
    let setup: Setup = serde_json::from_reader(BufReader::new(file))?;
    setup.scenario.validate()?;
    setup.prior.validate()?;
    Ok(setup)
}

pub fn store_table(table: &ReferenceTable, path: &str) -> Result<(), Error> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, table)?;
    Ok(())
}

pub struct MinimalLogger;

impl log::Log for MinimalLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        if record.level() > LevelFilter::Warn {
            println!("{:<5} {}", record.level(), record.args())
        } else {
            eprintln!("{:<5} {}", record.level(), record.args())
        }
    }

    fn flush(&self) {}
}

static LOGGER: MinimalLogger = MinimalLogger;

pub fn init_logger(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_defaults_scenario_and_prior() {
        let json = r#"{
            "landscape": { "demes": [ { "lat": 44.0, "lon": 0.2 } ] },
            "dataset": { "individuals": [
                { "coordinates": { "lat": 44.0, "lon": 0.2 },
                  "genotype": { "L1": [120, 0] } }
            ] }
        }"#;
        let setup: Setup = serde_json::from_str(json).unwrap();
        assert_eq!(setup.landscape.len(), 1);
        assert_eq!(setup.dataset.individuals[0].genotype["L1"], [120, 0]);
        assert_eq!(setup.scenario, Scenario::default());
        assert_eq!(setup.prior, Prior::default());
    }

    #[test]
    fn kernel_family_is_tagged() {
        let prior: Prior = serde_json::from_str(
            r#"{ "n0": 4, "k": [10, 20], "r": { "low": 1.0, "high": 2.0 },
                 "kernel": { "family": "Logistic",
                             "a": { "low": 10.0, "high": 50.0 },
                             "b": { "low": 2.5, "high": 4.0 } } }"#,
        )
        .unwrap();
        assert!(prior.validate().is_ok());
        assert_eq!(prior.k, (10, 20));
    }
}
