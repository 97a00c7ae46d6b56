/*!
Fuzzy partitions of the sampled demes.

A locus is summarized by how the gene copies sampled in each deme spread over
clusters. For a coalesced forest, the clusters are the surviving trees; for
observed data, they are the alleles. Either way, each sampled deme gets a row
of membership coefficients summing to one, and two such summaries can be
compared by a fuzzy-transfer distance.
*/

use std::collections::BTreeMap;

use serde_derive::{Deserialize, Serialize};

use crate::coalescence::Forest;
use crate::error::ReplicateError;
use crate::{DemeId, Population};

/// Rows of cluster-membership coefficients, one per sampled deme.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FuzzyPartition {
    coefficients: BTreeMap<DemeId, Vec<f64>>,
}

impl FuzzyPartition {
    /**
    Normalize per-deme counts into a partition. Rows must all have the same
    number of clusters.

    ```rust
    # use model::partition::FuzzyPartition;
    # use std::collections::BTreeMap;
    let mut counts = BTreeMap::new();
    counts.insert(3, vec![1, 3]);
    let p = FuzzyPartition::from_counts(counts).unwrap();
    assert_eq!(p.get(3), Some(&[0.25, 0.75][..]));
    ```
     */
    pub fn from_counts(
        counts: BTreeMap<DemeId, Vec<Population>>,
    ) -> Result<FuzzyPartition, ReplicateError> {
        let mut coefficients = BTreeMap::new();
        for (deme, row) in counts {
            let total: Population = row.iter().sum();
            if total == 0 {
                return Err(ReplicateError::DistanceUndefined { deme });
            }
            let total = f64::from(total);
            coefficients.insert(deme, row.iter().map(|c| f64::from(*c) / total).collect());
        }
        Ok(FuzzyPartition { coefficients })
    }

    pub fn n_clusters(&self) -> usize {
        self.coefficients.values().next().map_or(0, |row| row.len())
    }

    pub fn get(&self, deme: DemeId) -> Option<&[f64]> {
        self.coefficients.get(&deme).map(|row| row.as_slice())
    }

    pub fn demes(&self) -> impl Iterator<Item = DemeId> + '_ {
        self.coefficients.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (DemeId, &[f64])> + '_ {
        self.coefficients
            .iter()
            .map(|(deme, row)| (*deme, row.as_slice()))
    }

    /// Merge the clusters that `blocks` puts together: cluster `i` goes to
    /// block `blocks[i]` and the coefficients of a block are summed.
    pub fn merge_clusters(&self, blocks: &RestrictedGrowthString) -> FuzzyPartition {
        let n = blocks.n_blocks();
        let coefficients = self
            .coefficients
            .iter()
            .map(|(deme, row)| {
                let mut merged = vec![0.; n];
                for (cluster, value) in row.iter().enumerate() {
                    merged[blocks.block_of(cluster)] += value;
                }
                (*deme, merged)
            })
            .collect();
        FuzzyPartition { coefficients }
    }
}

/**
Turn a coalesced forest into a fuzzy partition of `sampled` demes.

Every surviving tree is a cluster, numbered in the order the forest lists
them. The coefficient of deme `x` in cluster `c` is the fraction of the copies
sampled in `x` that ended up in tree `c`.
*/
pub fn fuzzify<'a, I>(forest: &Forest, sampled: I) -> Result<FuzzyPartition, ReplicateError>
where
    I: IntoIterator<Item = &'a DemeId>,
{
    let trees: Vec<_> = forest.iter().map(|(_, tree)| tree).collect();
    let counts = sampled
        .into_iter()
        .map(|deme| {
            let row = trees
                .iter()
                .map(|tree| tree.iter().filter(|x| *x == deme).count() as Population)
                .collect();
            (*deme, row)
        })
        .collect();
    FuzzyPartition::from_counts(counts)
}

/**
A set partition of `0..n`, written as the block of each element, with blocks
numbered in order of first appearance: `[0, 0, 1, 0, 2]` is `{0, 1, 3}, {2},
{4}`.
*/
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestrictedGrowthString(Vec<usize>);

impl RestrictedGrowthString {
    /// All `n` elements in one block.
    pub fn single_block(n: usize) -> Self {
        RestrictedGrowthString(vec![0; n])
    }

    /**
    Relabel an arbitrary block assignment canonically.

    ```rust
    # use model::partition::RestrictedGrowthString;
    let rgs = RestrictedGrowthString::canonical(&[7, 7, 2, 5, 2]);
    assert_eq!(rgs.as_slice(), &[0, 0, 1, 2, 1]);
    assert_eq!(rgs.n_blocks(), 3);
    ```
     */
    pub fn canonical(assignment: &[usize]) -> Self {
        let mut labels: Vec<usize> = vec![];
        let blocks = assignment
            .iter()
            .map(|a| match labels.iter().position(|l| l == a) {
                Some(i) => i,
                None => {
                    labels.push(*a);
                    labels.len() - 1
                }
            })
            .collect();
        RestrictedGrowthString(blocks)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn n_blocks(&self) -> usize {
        self.0.iter().max().map_or(0, |m| m + 1)
    }

    pub fn block_of(&self, element: usize) -> usize {
        self.0[element]
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn forest() -> Forest {
        let mut forest = Forest::new();
        forest.insert(0, vec![0, 0, 1]);
        forest.insert(0, vec![1, 2]);
        forest.insert(4, vec![0, 2, 2]);
        forest
    }

    #[test]
    fn rows_sum_to_one() {
        let p = fuzzify(&forest(), &[0, 1, 2]).unwrap();
        assert_eq!(p.n_clusters(), 3);
        for (_, row) in p.iter() {
            assert_abs_diff_eq!(row.iter().sum::<f64>(), 1., epsilon = 1e-12);
        }
        assert_abs_diff_eq!(p.get(0).unwrap()[0], 2. / 3., epsilon = 1e-12);
        assert_abs_diff_eq!(p.get(2).unwrap()[2], 2. / 3., epsilon = 1e-12);
        assert_eq!(p.get(1).unwrap(), &[0.5, 0.5, 0.]);
    }

    #[test]
    fn deme_without_lineage_is_undefined() {
        assert_eq!(
            fuzzify(&forest(), &[0, 3]),
            Err(ReplicateError::DistanceUndefined { deme: 3 })
        );
    }

    #[test]
    fn merging_clusters_sums_columns() {
        let p = fuzzify(&forest(), &[0, 1, 2]).unwrap();
        let blocks = RestrictedGrowthString::canonical(&[0, 1, 0]);
        let merged = p.merge_clusters(&blocks);
        assert_eq!(merged.n_clusters(), 2);
        for (deme, row) in merged.iter() {
            assert_abs_diff_eq!(row.iter().sum::<f64>(), 1., epsilon = 1e-12);
            let original = p.get(deme).unwrap();
            assert_abs_diff_eq!(row[0], original[0] + original[2], epsilon = 1e-12);
        }

        let single = p.merge_clusters(&RestrictedGrowthString::single_block(3));
        assert_eq!(single.n_clusters(), 1);
        assert_abs_diff_eq!(single.get(2).unwrap()[0], 1., epsilon = 1e-12);
    }

    #[test]
    fn canonical_labels_follow_first_appearance() {
        let rgs = RestrictedGrowthString::canonical(&[3, 1, 3, 0]);
        assert_eq!(rgs.as_slice(), &[0, 1, 0, 2]);
        assert_eq!(RestrictedGrowthString::single_block(4).n_blocks(), 1);
        assert_eq!(RestrictedGrowthString::canonical(&[]).n_blocks(), 0);
    }
}
