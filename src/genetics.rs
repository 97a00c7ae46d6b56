/*!
The genetic dataset: diploid individuals genotyped at microsatellite loci,
each sampled at some coordinate of the landscape.

Allele states are repeat counts; state 0 stands for missing data and is never
turned into a lineage nor counted in a frequency.
*/

use std::collections::{BTreeMap, BTreeSet};

use serde_derive::{Deserialize, Serialize};

use crate::coalescence::Forest;
use crate::error::{Error, ReplicateError};
use crate::geography::{GeoCoord, Landscape};
use crate::partition::FuzzyPartition;
use crate::{DemeId, Population};

pub type Allele = u32;
pub const MISSING: Allele = 0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Individual {
    pub coordinates: GeoCoord,
    /// The two allele copies of each locus, by locus name.
    pub genotype: BTreeMap<String, [Allele; 2]>,
    /// The deme the sampling coordinates fall in, once reprojected.
    #[serde(default)]
    pub deme: Option<DemeId>,
}

impl Individual {
    pub fn new(coordinates: GeoCoord) -> Self {
        Individual {
            coordinates,
            genotype: BTreeMap::new(),
            deme: None,
        }
    }

    pub fn with_locus(mut self, locus: &str, alleles: [Allele; 2]) -> Self {
        self.genotype.insert(locus.to_string(), alleles);
        self
    }

    /// The non-missing allele copies at `locus`.
    pub fn copies<'a>(&'a self, locus: &str) -> impl Iterator<Item = Allele> + 'a {
        self.genotype
            .get(locus)
            .into_iter()
            .flat_map(|alleles| alleles.iter().copied())
            .filter(|a| *a != MISSING)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub individuals: Vec<Individual>,
}

impl Dataset {
    pub fn new(individuals: Vec<Individual>) -> Self {
        Dataset { individuals }
    }

    /// Attach every individual to the deme closest to its coordinates.
    pub fn reproject(&mut self, landscape: &Landscape) -> Result<(), Error> {
        for individual in self.individuals.iter_mut() {
            let deme = landscape
                .reproject_to_centroid(&individual.coordinates)
                .ok_or_else(|| Error::InvalidScenario {
                    reason: "cannot place samples on an empty landscape".to_string(),
                })?;
            individual.deme = Some(deme);
        }
        Ok(())
    }

    /// All locus names, in lexicographic order.
    pub fn loci(&self) -> Vec<String> {
        self.individuals
            .iter()
            .flat_map(|i| i.genotype.keys())
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn sampling_points(&self) -> BTreeSet<DemeId> {
        self.individuals.iter().filter_map(|i| i.deme).collect()
    }

    pub fn individuals_at(&self, deme: DemeId) -> impl Iterator<Item = &Individual> + '_ {
        self.individuals
            .iter()
            .filter(move |i| i.deme == Some(deme))
    }

    /// Gene copies sampled per deme, two per diploid individual.
    pub fn sampled_copies(&self) -> BTreeMap<DemeId, Population> {
        let mut copies = BTreeMap::new();
        for deme in self.individuals.iter().filter_map(|i| i.deme) {
            *copies.entry(deme).or_insert(0) += 2;
        }
        copies
    }

    /// One lineage for every non-missing allele copy of `locus`, in the deme
    /// it was sampled in.
    pub fn make_forest(&self, locus: &str) -> Forest {
        let mut forest = Forest::new();
        for individual in &self.individuals {
            if let Some(deme) = individual.deme {
                for _ in individual.copies(locus) {
                    forest.insert(deme, vec![deme]);
                }
            }
        }
        forest
    }

    fn allele_counts(&self, locus: &str) -> BTreeMap<DemeId, BTreeMap<Allele, Population>> {
        let mut counts: BTreeMap<DemeId, BTreeMap<Allele, Population>> = BTreeMap::new();
        for individual in &self.individuals {
            if let Some(deme) = individual.deme {
                for allele in individual.copies(locus) {
                    *counts
                        .entry(deme)
                        .or_insert_with(BTreeMap::new)
                        .entry(allele)
                        .or_insert(0) += 1;
                }
            }
        }
        counts
    }

    /// Allele frequencies of `locus` per deme, among the non-missing copies.
    /// Demes without any such copy are left out.
    pub fn frequencies_discarding_missing(
        &self,
        locus: &str,
    ) -> BTreeMap<DemeId, BTreeMap<Allele, f64>> {
        self.allele_counts(locus)
            .into_iter()
            .map(|(deme, alleles)| {
                let total = f64::from(alleles.values().sum::<Population>());
                let frequencies = alleles
                    .into_iter()
                    .map(|(a, n)| (a, f64::from(n) / total))
                    .collect();
                (deme, frequencies)
            })
            .collect()
    }

    /// Number of distinct alleles observed at `locus` over the whole dataset.
    pub fn allelic_richness(&self, locus: &str) -> usize {
        self.alleles(locus).len()
    }

    fn alleles(&self, locus: &str) -> BTreeSet<Allele> {
        self.individuals
            .iter()
            .filter(|i| i.deme.is_some())
            .flat_map(|i| i.copies(locus))
            .collect()
    }

    /**
    The observed counterpart of a coalescent partition: each allele is a
    cluster, in ascending allele order, and the coefficients of a deme are
    its allele frequencies.
    */
    pub fn fuzzify_observed(&self, locus: &str) -> Result<FuzzyPartition, ReplicateError> {
        let alleles: Vec<Allele> = self.alleles(locus).into_iter().collect();
        let counts = self
            .allele_counts(locus)
            .into_iter()
            .map(|(deme, present)| {
                let row = alleles
                    .iter()
                    .map(|a| present.get(a).copied().unwrap_or(0))
                    .collect();
                (deme, row)
            })
            .collect();
        FuzzyPartition::from_counts(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn dataset() -> Dataset {
        let landscape = Landscape::new(vec![GeoCoord::new(44.0, 0.2), GeoCoord::new(45.0, 1.0)]);
        let mut data = Dataset::new(vec![
            Individual::new(GeoCoord::new(44.01, 0.21))
                .with_locus("L1", [120, 124])
                .with_locus("L2", [88, MISSING]),
            Individual::new(GeoCoord::new(43.99, 0.18))
                .with_locus("L1", [120, 120])
                .with_locus("L2", [MISSING, MISSING]),
            Individual::new(GeoCoord::new(45.02, 0.97))
                .with_locus("L1", [128, MISSING])
                .with_locus("L2", [90, 88]),
        ]);
        data.reproject(&landscape).unwrap();
        data
    }

    #[test]
    fn samples_are_placed_in_nearest_deme() {
        let data = dataset();
        assert_eq!(data.sampling_points().into_iter().collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(data.individuals_at(0).count(), 2);
        assert_eq!(data.sampled_copies().get(&0), Some(&4));
        assert_eq!(data.sampled_copies().get(&1), Some(&2));
        assert_eq!(data.loci(), vec!["L1".to_string(), "L2".to_string()]);
    }

    #[test]
    fn missing_copies_make_no_lineage() {
        let data = dataset();
        let forest = data.make_forest("L1");
        assert_eq!(forest.trees_at(0).len(), 4);
        assert_eq!(forest.trees_at(1), &[vec![1]]);
        assert_eq!(data.make_forest("L2").nb_trees(), 3);
        assert!(data.make_forest("L3").is_empty());
    }

    #[test]
    fn frequencies_and_richness() {
        let data = dataset();
        let f = data.frequencies_discarding_missing("L1");
        assert_abs_diff_eq!(f[&0][&120], 0.75, epsilon = 1e-12);
        assert_abs_diff_eq!(f[&1][&128], 1., epsilon = 1e-12);
        assert_eq!(data.allelic_richness("L1"), 3);
        assert_eq!(data.allelic_richness("L2"), 2);
    }

    #[test]
    fn observed_partition_follows_allele_order() {
        let data = dataset();
        let p = data.fuzzify_observed("L2").unwrap();
        assert_eq!(p.n_clusters(), 2);
        // Clusters are alleles 88 and 90.
        assert_eq!(p.get(0), Some(&[1., 0.][..]));
        assert_eq!(p.get(1), Some(&[0.5, 0.5][..]));
    }
}
