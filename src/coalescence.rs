use std::collections::BTreeMap;

use log::debug;
use rand::Rng;
use serde_derive::{Deserialize, Serialize};

use crate::demography::DemographicHistory;
use crate::error::ReplicateError;
use crate::merge::{binary_merge, simultaneous_multiple_merge, OccupancySpectrum};
use crate::util::pick_by_count;
use crate::{DemeId, Population, Year};

/// The sampling demes of all the gene copies descending from one ancestral
/// lineage. A tree only grows, by concatenation, when lineages merge.
pub type Tree = Vec<DemeId>;

/// Attach `child` to `parent`.
pub fn graft(parent: &Tree, child: &Tree) -> Tree {
    let mut tree = Vec::with_capacity(parent.len() + child.len());
    tree.extend_from_slice(parent);
    tree.extend_from_slice(child);
    tree
}

/**
The lineages of one locus, by the deme they currently sit in.

Demes are kept ordered, so walking a forest always visits them in the same
order, whatever happened to it before.
*/
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Forest {
    trees: BTreeMap<DemeId, Vec<Tree>>,
}

impl Forest {
    pub fn new() -> Self {
        Forest::default()
    }

    pub fn insert(&mut self, deme: DemeId, tree: Tree) {
        self.trees.entry(deme).or_insert_with(Vec::new).push(tree);
    }

    /// The demes holding at least one lineage.
    pub fn positions(&self) -> impl Iterator<Item = DemeId> + '_ {
        self.trees
            .iter()
            .filter(|(_, trees)| !trees.is_empty())
            .map(|(deme, _)| *deme)
    }

    pub fn trees_at(&self, deme: DemeId) -> &[Tree] {
        self.trees.get(&deme).map(|t| t.as_slice()).unwrap_or(&[])
    }

    pub fn nb_trees(&self) -> usize {
        self.trees.values().map(|t| t.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.nb_trees() == 0
    }

    /// Every tree with its current deme, in deme order.
    pub fn iter(&self) -> impl Iterator<Item = (DemeId, &Tree)> + '_ {
        self.trees
            .iter()
            .flat_map(|(deme, trees)| trees.iter().map(move |tree| (*deme, tree)))
    }

    /// How many gene copies were sampled in each deme, counted over the
    /// content of all trees.
    pub fn sampling_counts(&self) -> BTreeMap<DemeId, Population> {
        let mut counts = BTreeMap::new();
        for (_, tree) in self.iter() {
            for deme in tree {
                *counts.entry(*deme).or_insert(0) += 1;
            }
        }
        counts
    }
}

/**
What to do with the lineages still apart when the backward walk reaches the
introduction time.
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntroductionPolicy {
    /// More than one lineage at the introduction fails the replicate.
    Unresolved,
    /// The founders descend from a single propagule: the remaining lineages
    /// are merged pairwise into one.
    CommonFounder,
    /// The remaining lineages are kept as distinct founder clusters.
    FounderClusters,
}

impl Default for IntroductionPolicy {
    fn default() -> Self {
        IntroductionPolicy::Unresolved
    }
}

/**
The backward walk of the lineages of one locus through a demographic history.

Going from generation `t` to generation `t - 1`, each lineage in deme `x`
first picks the deme its ancestor lived in, with probability proportional to
the number of migrants that came into `x` from there. Then, in every deme `y`
now holding `m >= 2` lineages, each lineage picks its parent uniformly among
the `N(y, t - 1)` individuals of `y`; parents picked several times are merge
events, and their occupancy spectrum is handed to the merge engine.
*/
pub struct CoalescenceProcess<'h> {
    history: &'h DemographicHistory,
    policy: IntroductionPolicy,
}

impl<'h> CoalescenceProcess<'h> {
    pub fn new(history: &'h DemographicHistory, policy: IntroductionPolicy) -> Self {
        CoalescenceProcess { history, policy }
    }

    /// Coalesce `forest`, which holds the lineages at the end of the history,
    /// in place.
    pub fn coalesce<R: Rng + ?Sized>(
        &self,
        forest: &mut Forest,
        rng: &mut R,
    ) -> Result<(), ReplicateError> {
        let start = self.history.start();
        let mut t = self.history.end();
        while t > start && forest.nb_trees() > 1 {
            self.relocate(forest, t, rng)?;
            self.merge_within_demes(forest, t - 1, rng);
            t -= 1;
        }
        debug!("{} trees left at t={}", forest.nb_trees(), t);

        if forest.nb_trees() > 1 {
            self.resolve_introduction(forest, rng)?;
        }
        Ok(())
    }

    /// Move every lineage of generation `t` to the deme of its ancestor in
    /// generation `t - 1`.
    fn relocate<R: Rng + ?Sized>(
        &self,
        forest: &mut Forest,
        t: Year,
        rng: &mut R,
    ) -> Result<(), ReplicateError> {
        let flow = match self.history.flow(t - 1) {
            Some(flow) => flow,
            None => return Ok(()),
        };
        let mut moved = Forest::new();
        for (x, trees) in std::mem::take(&mut forest.trees) {
            if trees.is_empty() {
                continue;
            }
            let sources = flow.sources(x);
            if sources.is_empty() {
                return Err(ReplicateError::OrphanLineage {
                    deme: x,
                    time: t,
                    lineages: trees.len(),
                });
            }
            for tree in trees {
                let y = pick_by_count(&sources, rng).ok_or(ReplicateError::OrphanLineage {
                    deme: x,
                    time: t,
                    lineages: 1,
                })?;
                moved.insert(y, tree);
            }
        }
        *forest = moved;
        Ok(())
    }

    fn merge_within_demes<R: Rng + ?Sized>(
        &self,
        forest: &mut Forest,
        t: Year,
        rng: &mut R,
    ) {
        for (y, trees) in forest.trees.iter_mut() {
            if trees.len() < 2 {
                continue;
            }
            let spectrum = OccupancySpectrum::sample(trees.len(), self.history.size(*y, t), rng);
            if spectrum.mergers() == 0 {
                continue;
            }
            let end = if spectrum.is_single_pair() {
                binary_merge(trees, Tree::new(), graft, rng)
            } else {
                simultaneous_multiple_merge(trees, Tree::new(), &spectrum, graft, rng)
            };
            trees.truncate(end);
        }
    }

    fn resolve_introduction<R: Rng + ?Sized>(
        &self,
        forest: &mut Forest,
        rng: &mut R,
    ) -> Result<(), ReplicateError> {
        match self.policy {
            IntroductionPolicy::Unresolved => Err(ReplicateError::UnresolvedCoalescence {
                remaining: forest.nb_trees(),
            }),
            IntroductionPolicy::FounderClusters => Ok(()),
            IntroductionPolicy::CommonFounder => {
                let deme = forest.positions().next().unwrap_or(0);
                let mut trees: Vec<Tree> = std::mem::take(&mut forest.trees)
                    .into_iter()
                    .flat_map(|(_, trees)| trees)
                    .collect();
                while trees.len() > 1 {
                    let end = binary_merge(&mut trees, Tree::new(), graft, rng);
                    trees.truncate(end);
                }
                for tree in trees {
                    forest.insert(deme, tree);
                }
                Ok(())
            }
        }
    }
}
