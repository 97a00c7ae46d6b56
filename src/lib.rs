/*!
Model Description
=================

This model description follows the structure of the ODD (Overview, Design
concept, Details) protocol (Grimm et al., 2006; Grimm et al., 2010), adapted
to a model that is used inside a statistical inference loop rather than
explored on its own. As in a literate program, the model is described here in
the order a reader needs it, and the code below each section implements what
the section describes. The submodels live in their own modules.

# 1. Purpose

The model links the spatial expansion of an invasive species to the genetic
structure of the population it leaves behind. Starting from a few founders
introduced at a known place and time, it simulates how the population grows
and spreads over a landscape until the time genetic samples were taken, then
traces the ancestry of the sampled gene copies back through that expansion.

The ancestry of each locus is summarized as a fuzzy partition of the sampled
demes, which can be compared to the same summary computed from observed
genotypes. Repeating this for many parameter draws from a prior gives an
Approximate Bayesian Computation (ABC) reference table, from which the growth
rate, the carrying capacity and the dispersal kernel of the invader can be
inferred.

 */

use std::collections::BTreeMap;

use log::debug;
use rand::Rng;

pub mod abc;
pub mod cli;
pub mod coalescence;
mod debug;
pub mod demography;
pub mod error;
pub mod genetics;
pub mod geography;
pub mod kernel;
pub mod merge;
pub mod parameters;
pub mod partition;
pub mod partition_sampler;
pub mod util;

use coalescence::{CoalescenceProcess, Forest};
use demography::{DemographicHistory, ForwardSimulator, LogisticGrowth};
use error::{Error, ReplicateError};
use genetics::Dataset;
use geography::{DistanceTable, Landscape};
use kernel::TransitionKernelCache;
use parameters::{KernelParams, Scenario};
use partition::{fuzzify, FuzzyPartition};
use partition_sampler::PartitionSampler;

/**

# 2. Entities, state variables, and scales

## 2.1 Demes and landscape

Space is a fixed set of demes, the cells of a landscape, each represented by
the coordinates of its centroid. Demes are numbered by their position in the
landscape, and all per-deme tables are traversed in that order. Distances
between demes are great-circle distances in km, computed once for all pairs
when the model is set up (see [`geography`]).

 */
pub type DemeId = usize;

/**
## 2.2 Time

Time is discrete. One time step is one generation of the invader, which is
one year: the introduction time and the sampling time are calendar years.

 */
pub type Year = u32;

/**
## 2.3 Populations

The state of a deme at a given time is the number of individuals living in
it. There is no further structure inside a deme: individuals are exchangeable.

 */
pub type Population = u32;

/**
## 2.4 Gene lineages

Every sampled individual is diploid, so it contributes up to two gene copies
per locus, one lineage for each copy that is not missing. Going back in time,
lineages move between demes and merge into common ancestors. The lineages
that exist at some point of that backward walk are kept as trees (see
[`coalescence::Tree`]) grouped by the deme they are in, forming a
[`coalescence::Forest`].

## 2.5 The model

An [`InvasionModel`] holds everything that is shared by all replicates of an
inference run and never changes: the distance table, the scenario of the
introduction and, for every locus, the forest of sampled lineages to start the
backward walk from. A replicate only reads it.

 */
#[derive(Debug, Clone)]
pub struct InvasionModel {
    distances: DistanceTable,
    scenario: Scenario,
    introduction_deme: DemeId,
    forests: Vec<Forest>,
    sampled_copies: BTreeMap<DemeId, Population>,
}

impl InvasionModel {
    /// Set the model up for a genetic dataset, one forest per locus, in the
    /// order of [`Dataset::loci`].
    pub fn new(
        landscape: &Landscape,
        dataset: &Dataset,
        scenario: Scenario,
    ) -> Result<InvasionModel, Error> {
        let mut dataset = dataset.clone();
        dataset.reproject(landscape)?;
        let forests = dataset
            .loci()
            .iter()
            .map(|locus| dataset.make_forest(locus))
            .collect();
        InvasionModel::build(landscape, forests, dataset.sampled_copies(), scenario)
    }

    /// Set the model up directly from the initial forests of some loci. The
    /// number of gene copies sampled in a deme is the largest number of
    /// lineages any locus starts with there.
    pub fn from_forests(
        landscape: &Landscape,
        forests: Vec<Forest>,
        scenario: Scenario,
    ) -> Result<InvasionModel, Error> {
        let mut sampled_copies = BTreeMap::new();
        for forest in &forests {
            for (deme, n) in forest.sampling_counts() {
                let copies = sampled_copies.entry(deme).or_insert(0);
                *copies = n.max(*copies);
            }
        }
        InvasionModel::build(landscape, forests, sampled_copies, scenario)
    }

    fn build(
        landscape: &Landscape,
        forests: Vec<Forest>,
        sampled_copies: BTreeMap<DemeId, Population>,
        scenario: Scenario,
    ) -> Result<InvasionModel, Error> {
        scenario.validate()?;
        let introduction_deme = landscape
            .reproject_to_centroid(&scenario.introduction_point)
            .ok_or_else(|| Error::InvalidScenario {
                reason: "the landscape has no deme".to_string(),
            })?;
        if let Some(deme) = sampled_copies.keys().find(|d| **d >= landscape.len()) {
            return Err(Error::InvalidScenario {
                reason: format!("sampled deme {} is not part of the landscape", deme),
            });
        }
        Ok(InvasionModel {
            distances: DistanceTable::new(landscape),
            scenario,
            introduction_deme,
            forests,
            sampled_copies,
        })
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    pub fn introduction_deme(&self) -> DemeId {
        self.introduction_deme
    }

    pub fn distances(&self) -> &DistanceTable {
        &self.distances
    }

    pub fn n_loci(&self) -> usize {
        self.forests.len()
    }
}

/**

# 3. Process overview and scheduling

One replicate of the model, for one parameter draw, runs through the
following steps. All randomness comes from one generator, passed down
explicitly and consumed in this order, so that a replicate is determined by
its parameters and its seed.

 1. [Forward demography](#4-forward-demography): starting from `n0` founders
    in the introduction deme at the introduction time, each generation every
    populated deme grows and its offspring disperse. This yields the
    population size of every deme at every time and the migrant flows between
    consecutive times. A population that dies out ends the replicate.
 2. Demes must hold at least as many individuals at the sampling time as gene
    copies were sampled there.
 3. [Coalescence](#5-coalescence), for each locus: the sampled lineages are
    walked back through the recorded flows, merging when they pick the same
    parent, until a single lineage is left or the introduction is reached.
 4. [Summary](#6-summary), for each locus: the surviving lineages become the
    clusters of a fuzzy partition of the sampled demes. If there is more than
    one cluster, they are regrouped at random.

 */
impl InvasionModel {
    pub fn replicate<R: Rng + ?Sized>(
        &self,
        params: &KernelParams,
        sampler: &mut PartitionSampler,
        rng: &mut R,
    ) -> Result<Vec<FuzzyPartition>, ReplicateError> {
        let history = self.simulate_demography(params, rng)?;
        let process = CoalescenceProcess::new(&history, self.scenario.introduction_policy);
        let mut summary = Vec::with_capacity(self.forests.len());
        for template in &self.forests {
            let forest = self.coalesce(&process, template, rng)?;
            summary.push(summarize(&forest, template, sampler, rng)?);
        }
        Ok(summary)
    }

    /**
    # 4. Forward demography

    The parameters of a draw fix the local growth (see
    [`demography::LogisticGrowth`]) and the dispersal kernel. The transition
    kernel built from the latter belongs to this one replicate and is dropped
    with it.

     */
    pub fn simulate_demography<R: Rng + ?Sized>(
        &self,
        params: &KernelParams,
        rng: &mut R,
    ) -> Result<DemographicHistory, ReplicateError> {
        let growth = LogisticGrowth::new(params)?;
        let mut kernel = TransitionKernelCache::new(params.kernel, &self.distances)?;
        let history = ForwardSimulator::new(
            self.introduction_deme,
            self.scenario.introduction_time,
            params.n0,
            self.distances.len(),
        )
        .simulate(&growth, &mut kernel, self.scenario.sampling_time, rng)?;
        history.ensure_sampled(&self.sampled_copies)?;
        Ok(history)
    }

    /**
    # 5. Coalescence

    Every replicate coalesces a fresh copy of the initial forest of a locus;
    the initial forests themselves are never modified. What happens to
    lineages that are still apart at the introduction time is set by the
    [`coalescence::IntroductionPolicy`] of the scenario.

     */
    fn coalesce<R: Rng + ?Sized>(
        &self,
        process: &CoalescenceProcess,
        template: &Forest,
        rng: &mut R,
    ) -> Result<Forest, ReplicateError> {
        let mut forest = template.clone();
        process.coalesce(&mut forest, rng)?;
        debug!(
            "{} lineages coalesced into {} trees",
            template.nb_trees(),
            forest.nb_trees()
        );
        Ok(forest)
    }
}

/**
# 6. Summary

The demes a locus was sampled in are the rows of its fuzzy partition, the
surviving trees its clusters (see [`partition::fuzzify`]). The resolution of
the clusters is not something the genetic data can tell, so several clusters
are merged into blocks drawn by the [`PartitionSampler`].

 */
fn summarize<R: Rng + ?Sized>(
    forest: &Forest,
    template: &Forest,
    sampler: &mut PartitionSampler,
    rng: &mut R,
) -> Result<FuzzyPartition, ReplicateError> {
    let sampled = template.sampling_counts();
    let partition = fuzzify(forest, sampled.keys())?;
    let n = partition.n_clusters();
    if n > 1 {
        let blocks = sampler.sample(n, rng);
        Ok(partition.merge_clusters(&blocks))
    } else {
        Ok(partition)
    }
}

#[cfg(test)]
mod tests;
