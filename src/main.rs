use log::{error, info};
use rand::rngs::StdRng;
use rand::SeedableRng;

use model::abc::ReferenceTable;
use model::cli::{init_logger, load_setup, parse_args, store_table, Settings};
use model::error::Error;
use model::InvasionModel;

fn main() {
    let mut settings = Settings::default();
    {
        let parser = parse_args(&mut settings);
        parser.parse_args_or_exit();
    }
    init_logger(settings.verbose);
    if let Err(e) = run(&settings) {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run(settings: &Settings) -> Result<(), Error> {
    let setup = load_setup(&settings.setup)?;
    info!(
        "{} demes, {} individuals, {} loci",
        setup.landscape.len(),
        setup.dataset.individuals.len(),
        setup.dataset.loci().len()
    );
    let model = InvasionModel::new(&setup.landscape, &setup.dataset, setup.scenario.clone())?;

    let mut rng = StdRng::seed_from_u64(settings.seed);
    let table =
        ReferenceTable::sample_prior_predictive(&model, &setup.prior, settings.draws, &mut rng);
    for (kind, n) in table.failures.iter() {
        info!("{:?}: {} draws", kind, n);
    }
    store_table(&table, &settings.output)?;
    info!("Reference table stored in {}", settings.output);
    Ok(())
}
