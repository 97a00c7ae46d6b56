use crate::coalescence::{CoalescenceProcess, IntroductionPolicy};
use crate::genetics::Individual;
use crate::geography::GeoCoord;
use crate::kernel::DispersalKernel;
use crate::*;
use approx::assert_abs_diff_eq;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn single_deme() -> Landscape {
    Landscape::new(vec![GeoCoord::new(44.00, 0.20)])
}

fn grid() -> Landscape {
    let mut demes = vec![];
    for i in 0..3 {
        for j in 0..3 {
            demes.push(GeoCoord::new(44.0 + 0.1 * i as f64, 0.2 + 0.1 * j as f64));
        }
    }
    Landscape::new(demes)
}

fn two_lineages() -> Forest {
    let mut forest = Forest::new();
    forest.insert(0, vec![0]);
    forest.insert(0, vec![0]);
    forest
}

fn with_policy(policy: IntroductionPolicy) -> Scenario {
    Scenario {
        introduction_policy: policy,
        ..Scenario::default()
    }
}

#[test]
pub fn test_single_deme_population_survives() {
    let model = InvasionModel::from_forests(&single_deme(), vec![], Scenario::default()).unwrap();
    let params = KernelParams {
        r: 10.,
        k: 250.,
        n0: 8,
        kernel: DispersalKernel::Gaussian { a: 500. },
    };
    let mut rng = StdRng::seed_from_u64(2004);
    let trials = 10_000;
    let mut alive = 0;
    for _ in 0..trials {
        if let Ok(history) = model.simulate_demography(&params, &mut rng) {
            assert_eq!(history.end() - history.start(), 4);
            if (2004..=2008).all(|t| history.size(0, t) > 0) {
                alive += 1;
            }
        }
    }
    assert!(alive * 100 >= trials * 99, "{} of {} survived", alive, trials);
}

#[test]
pub fn test_two_lineages_in_single_deme_coalesce() {
    let model = InvasionModel::from_forests(
        &single_deme(),
        vec![two_lineages()],
        with_policy(IntroductionPolicy::CommonFounder),
    )
    .unwrap();
    let params = KernelParams::default();
    let mut rng = StdRng::seed_from_u64(1);
    let history = model.simulate_demography(&params, &mut rng).unwrap();
    let mut forest = two_lineages();
    CoalescenceProcess::new(&history, IntroductionPolicy::CommonFounder)
        .coalesce(&mut forest, &mut rng)
        .unwrap();
    assert_eq!(forest.nb_trees(), 1);

    let mut sampler = PartitionSampler::new();
    for seed in 0..50 {
        let mut rng = StdRng::seed_from_u64(seed);
        let summary = model.replicate(&params, &mut sampler, &mut rng).unwrap();
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].n_clusters(), 1);
        assert_eq!(summary[0].get(0), Some(&[1.][..]));
    }
}

#[test]
pub fn test_unresolved_lineages_abort_the_replicate() {
    // Two lineages among 100000 individuals do not meet in four generations.
    let crowded = KernelParams {
        r: 0.,
        k: 100_000.,
        n0: 100_000,
        kernel: DispersalKernel::Gaussian { a: 500. },
    };
    let model =
        InvasionModel::from_forests(&single_deme(), vec![two_lineages()], Scenario::default())
            .unwrap();
    let mut rng = StdRng::seed_from_u64(7);
    assert_eq!(
        model.replicate(&crowded, &mut PartitionSampler::new(), &mut rng),
        Err(ReplicateError::UnresolvedCoalescence { remaining: 2 })
    );
}

fn grid_dataset() -> Dataset {
    Dataset::new(vec![
        Individual::new(GeoCoord::new(44.0, 0.2))
            .with_locus("A", [101, 103])
            .with_locus("B", [7, 7]),
        Individual::new(GeoCoord::new(44.01, 0.19))
            .with_locus("A", [101, 101])
            .with_locus("B", [9, 0]),
        Individual::new(GeoCoord::new(44.2, 0.4))
            .with_locus("A", [105, 103])
            .with_locus("B", [7, 9]),
        Individual::new(GeoCoord::new(44.1, 0.3))
            .with_locus("A", [0, 0])
            .with_locus("B", [11, 7]),
    ])
}

#[test]
pub fn test_replicate_summarizes_every_locus() {
    let landscape = grid();
    let dataset = grid_dataset();
    let model = InvasionModel::new(
        &landscape,
        &dataset,
        with_policy(IntroductionPolicy::FounderClusters),
    )
    .unwrap();
    assert_eq!(model.n_loci(), 2);
    assert_eq!(model.introduction_deme(), 0);

    let params = KernelParams {
        kernel: DispersalKernel::Gaussian { a: 30. },
        ..KernelParams::default()
    };
    let mut sampler = PartitionSampler::new();
    let mut rng = StdRng::seed_from_u64(11);
    let summary = model.replicate(&params, &mut sampler, &mut rng).unwrap();

    let mut reprojected = dataset.clone();
    reprojected.reproject(&landscape).unwrap();
    for (locus, simulated) in reprojected.loci().iter().zip(&summary) {
        let observed = reprojected.fuzzify_observed(locus).unwrap();
        // Both summaries describe the same demes.
        assert_eq!(
            simulated.demes().collect::<Vec<_>>(),
            observed.demes().collect::<Vec<_>>()
        );
        for (_, row) in simulated.iter() {
            assert_abs_diff_eq!(row.iter().sum::<f64>(), 1., epsilon = 1e-9);
        }
    }
    // Locus A is missing at deme 4.
    assert_eq!(summary[0].demes().collect::<Vec<_>>(), vec![0, 8]);
    assert_eq!(summary[1].demes().collect::<Vec<_>>(), vec![0, 4, 8]);
}

#[test]
pub fn test_replicates_are_reproducible() {
    let model = InvasionModel::new(
        &grid(),
        &grid_dataset(),
        with_policy(IntroductionPolicy::FounderClusters),
    )
    .unwrap();
    let params = KernelParams {
        kernel: DispersalKernel::Logistic { a: 20., b: 3. },
        ..KernelParams::default()
    };
    let run = |seed| {
        let mut rng = StdRng::seed_from_u64(seed);
        model.replicate(&params, &mut PartitionSampler::new(), &mut rng)
    };
    assert_eq!(run(3), run(3));
}

#[test]
pub fn test_unreachable_sampled_deme() {
    let landscape = Landscape::new(vec![GeoCoord::new(44.0, 0.2), GeoCoord::new(60.0, 20.0)]);
    let dataset = Dataset::new(vec![
        Individual::new(GeoCoord::new(44.0, 0.2)).with_locus("A", [1, 2]),
        Individual::new(GeoCoord::new(60.0, 20.0)).with_locus("A", [1, 1]),
    ]);
    let model = InvasionModel::new(&landscape, &dataset, Scenario::default()).unwrap();
    let params = KernelParams {
        kernel: DispersalKernel::Gaussian { a: 1. },
        ..KernelParams::default()
    };
    let mut rng = StdRng::seed_from_u64(5);
    assert_eq!(
        model.replicate(&params, &mut PartitionSampler::new(), &mut rng),
        Err(ReplicateError::UndersampledDeme {
            deme: 1,
            sampled: 2,
            present: 0
        })
    );
}

#[test]
pub fn test_invalid_setups_are_refused() {
    let backwards = Scenario {
        sampling_time: 2000,
        ..Scenario::default()
    };
    assert!(matches!(
        InvasionModel::from_forests(&single_deme(), vec![], backwards),
        Err(Error::InvalidScenario { .. })
    ));
    assert!(matches!(
        InvasionModel::from_forests(&Landscape::default(), vec![], Scenario::default()),
        Err(Error::InvalidScenario { .. })
    ));
    let params = KernelParams {
        kernel: DispersalKernel::Gaussian { a: -1. },
        ..KernelParams::default()
    };
    let model = InvasionModel::from_forests(&single_deme(), vec![], Scenario::default()).unwrap();
    assert!(matches!(
        model.simulate_demography(&params, &mut StdRng::seed_from_u64(0)),
        Err(ReplicateError::DomainViolation { .. })
    ));
}
