/*!
Approximate Bayesian computation around the model.

Parameter sets are drawn from a [`Prior`], every draw is turned into one
simulated summary (a fuzzy partition per locus) by
[`InvasionModel::replicate`], and the successful draws are collected in a
[`ReferenceTable`]. Draws whose replicate fails are discarded and only counted.
*/

use std::collections::BTreeMap;

use log::{info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde_derive::{Deserialize, Serialize};

use crate::error::{Error, FailureKind, ReplicateError};
use crate::kernel::DispersalKernel;
use crate::parameters::KernelParams;
use crate::partition::FuzzyPartition;
use crate::partition_sampler::PartitionSampler;
use crate::{InvasionModel, Population};

/// A closed interval `[low, high]` to draw uniformly from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Uniform {
    pub low: f64,
    pub high: f64,
}

impl Uniform {
    pub fn new(low: f64, high: f64) -> Self {
        Uniform { low, high }
    }

    /// `name` is drawn from this interval and must satisfy `admissible`,
    /// described by `domain` for the error message.
    fn check(&self, name: &str, admissible: fn(f64) -> bool, domain: &str) -> Result<(), Error> {
        if !(self.low.is_finite() && self.high.is_finite() && self.low <= self.high) {
            return Err(Error::InvalidPrior {
                reason: format!("{} must be drawn from a bounded, non-empty interval", name),
            });
        }
        if !admissible(self.low) {
            return Err(Error::InvalidPrior {
                reason: format!("{} must be {}, prior starts at {}", name, domain, self.low),
            });
        }
        Ok(())
    }

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        if self.low < self.high {
            rng.gen_range(self.low..self.high)
        } else {
            self.low
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family")]
pub enum KernelPrior {
    Gaussian { a: Uniform },
    Logistic { a: Uniform, b: Uniform },
}

/**
The prior over [`KernelParams`]. The number of founders is fixed, the
carrying capacity is a whole number of individuals, everything else is drawn
uniformly.
*/
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prior {
    pub n0: Population,
    /// Inclusive bounds of the carrying capacity.
    pub k: (u32, u32),
    pub r: Uniform,
    pub kernel: KernelPrior,
}

impl Default for Prior {
    fn default() -> Prior {
        Prior {
            n0: 8,
            k: (1, 500),
            r: Uniform::new(1., 20.),
            kernel: KernelPrior::Gaussian {
                a: Uniform::new(100., 1000.),
            },
        }
    }
}

impl Prior {
    /// Make sure every draw will be inside the domain of the model.
    pub fn validate(&self) -> Result<(), Error> {
        if self.n0 == 0 {
            return Err(Error::InvalidPrior {
                reason: "there must be at least one founder".to_string(),
            });
        }
        if self.k.0 == 0 || self.k.0 > self.k.1 {
            return Err(Error::InvalidPrior {
                reason: format!("carrying capacity range {:?} is empty or contains 0", self.k),
            });
        }
        self.r.check("r", |r| r >= 0., "non-negative")?;
        match &self.kernel {
            KernelPrior::Gaussian { a } => a.check("a", |a| a > 0., "positive")?,
            KernelPrior::Logistic { a, b } => {
                a.check("a", |a| a > 0., "positive")?;
                b.check("b", |b| b > 2., "greater than 2")?;
            }
        }
        Ok(())
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> KernelParams {
        let k = rng.gen_range(self.k.0..=self.k.1);
        let r = self.r.sample(rng);
        let kernel = match &self.kernel {
            KernelPrior::Gaussian { a } => DispersalKernel::Gaussian { a: a.sample(rng) },
            KernelPrior::Logistic { a, b } => DispersalKernel::Logistic {
                a: a.sample(rng),
                b: b.sample(rng),
            },
        };
        KernelParams {
            r,
            k: f64::from(k),
            n0: self.n0,
            kernel,
        }
    }
}

/// One accepted draw: its parameters, the seed of its replicate and the
/// simulated summary, one partition per locus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub params: KernelParams,
    pub seed: u64,
    pub summary: Vec<FuzzyPartition>,
}

/// How many draws were lost, per reason.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FailureTally(BTreeMap<FailureKind, usize>);

impl FailureTally {
    pub fn add(&mut self, kind: FailureKind) {
        *self.0.entry(kind).or_insert(0) += 1;
    }

    pub fn get(&self, kind: FailureKind) -> usize {
        self.0.get(&kind).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.0.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FailureKind, usize)> + '_ {
        self.0.iter().map(|(kind, n)| (*kind, *n))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceTable {
    pub entries: Vec<Entry>,
    pub failures: FailureTally,
}

impl ReferenceTable {
    /**
    Simulate `draws` replicates under parameters drawn from `prior`.

    Parameters and replicate seeds are drawn one after the other from `rng`
    before anything is simulated, and every replicate then runs on its own
    generator. The table is thus determined by the state of `rng` alone, no
    matter how the replicates are scheduled over threads.
    */
    pub fn sample_prior_predictive<R: Rng + ?Sized>(
        model: &InvasionModel,
        prior: &Prior,
        draws: usize,
        rng: &mut R,
    ) -> ReferenceTable {
        let jobs: Vec<(KernelParams, u64)> = (0..draws)
            .map(|_| {
                let params = prior.sample(rng);
                (params, rng.gen())
            })
            .collect();

        let outcomes: Vec<(u64, Result<Entry, ReplicateError>)> = jobs
            .into_par_iter()
            .map_init(PartitionSampler::new, |sampler, (params, seed)| {
                let mut rng = StdRng::seed_from_u64(seed);
                let outcome = model
                    .replicate(&params, sampler, &mut rng)
                    .map(|summary| Entry {
                        params,
                        seed,
                        summary,
                    });
                (seed, outcome)
            })
            .collect();

        let mut table = ReferenceTable::default();
        for (draw, (seed, outcome)) in outcomes.into_iter().enumerate() {
            match outcome {
                Ok(entry) => table.entries.push(entry),
                Err(e) => {
                    warn!("Draw {} (seed {}) discarded: {}", draw, seed, e);
                    table.failures.add(e.kind());
                }
            }
        }
        info!(
            "Kept {} of {} draws ({} discarded)",
            table.entries.len(),
            draws,
            table.failures.total()
        );
        table
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /**
    Distances between every stored summary and the `observed` one, locus by
    locus, with the parameters they were simulated under.
    */
    pub fn compute_distance_to<F>(
        &self,
        observed: &[FuzzyPartition],
        distance: F,
    ) -> Vec<(&KernelParams, Vec<f64>)>
    where
        F: Fn(&FuzzyPartition, &FuzzyPartition) -> f64,
    {
        self.entries
            .iter()
            .map(|entry| {
                let per_locus = entry
                    .summary
                    .iter()
                    .zip(observed)
                    .map(|(simulated, observed)| distance(simulated, observed))
                    .collect();
                (&entry.params, per_locus)
            })
            .collect()
    }
}
