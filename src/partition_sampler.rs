/*!
Random coarsening of cluster partitions.

The number of clusters a coalescent forest produces is finer than what genetic
data can resolve. Before comparing with observed data, the `n` clusters of a
simulated locus are therefore regrouped at random: first a number of blocks
`K` is drawn from

```text
P(K = k) ∝ k^n / (k! · Bell(n) · e),    k = 1..n
```

then each cluster picks one of the `K` blocks uniformly. The resulting
assignment is returned as a restricted growth string.

Stirling numbers of the second kind and Bell numbers overflow `u64` early
(`Bell(26)` already does), so everything is computed in log space and memoized
in the sampler: the Stirling triangle grows row by row as larger `n` are
requested, and the law of `K` is built once per `n` and then reused.
*/

use rand::Rng;
use rustc_hash::FxHashMap;
use statrs::function::factorial::ln_factorial;

use crate::partition::RestrictedGrowthString;
use crate::util::ln_add_exp;

/// Rows of `ln S(n, k)`, `k = 0..=n`, for all `n` computed so far.
#[derive(Debug, Clone)]
pub struct StirlingTable {
    rows: Vec<Vec<f64>>,
}

impl Default for StirlingTable {
    fn default() -> Self {
        StirlingTable {
            rows: vec![vec![0.]],
        }
    }
}

impl StirlingTable {
    fn extend_to(&mut self, n: usize) {
        while self.rows.len() <= n {
            let previous = &self.rows[self.rows.len() - 1];
            let m = self.rows.len();
            let mut row = vec![f64::NEG_INFINITY; m + 1];
            for k in 1..=m {
                // S(m, k) = k S(m-1, k) + S(m-1, k-1)
                let stay = previous
                    .get(k)
                    .map_or(f64::NEG_INFINITY, |s| (k as f64).ln() + s);
                row[k] = ln_add_exp(stay, previous[k - 1]);
            }
            self.rows.push(row);
        }
    }

    /**
    `ln S(n, k)`, the log of the number of partitions of `n` elements into `k`
    non-empty blocks.

    ```rust
    # use model::partition_sampler::StirlingTable;
    let mut table = StirlingTable::default();
    assert!((table.ln_stirling(5, 3).exp() - 25.).abs() < 1e-9);
    assert_eq!(table.ln_stirling(3, 4), f64::NEG_INFINITY);
    ```
     */
    pub fn ln_stirling(&mut self, n: usize, k: usize) -> f64 {
        self.extend_to(n);
        self.rows[n].get(k).copied().unwrap_or(f64::NEG_INFINITY)
    }

    /// `ln Bell(n)`, the log of the number of partitions of `n` elements.
    pub fn ln_bell(&mut self, n: usize) -> f64 {
        self.extend_to(n);
        self.rows[n]
            .iter()
            .fold(f64::NEG_INFINITY, |acc, s| ln_add_exp(acc, *s))
    }
}

/**
Draws restricted growth strings for a number of clusters.

The sampler owns its memo tables and is meant to live as long as the inference
run (one per worker thread when replicates run in parallel).
*/
#[derive(Debug, Clone, Default)]
pub struct PartitionSampler {
    stirling: StirlingTable,
    /// Cumulative law of the block count, per number of clusters.
    block_count_laws: FxHashMap<usize, Vec<f64>>,
}

impl PartitionSampler {
    pub fn new() -> Self {
        PartitionSampler::default()
    }

    /// `P(K = k)` for `k = 1..=n`, at index `k - 1`.
    pub fn block_count_probabilities(&mut self, n: usize) -> Vec<f64> {
        if n == 0 {
            return vec![];
        }
        let ln_bell = self.stirling.ln_bell(n);
        let ln_weights: Vec<f64> = (1..=n)
            .map(|k| n as f64 * (k as f64).ln() - ln_factorial(k as u64) - ln_bell - 1.)
            .collect();
        let max = ln_weights
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);
        let weights: Vec<f64> = ln_weights.iter().map(|w| (w - max).exp()).collect();
        let total: f64 = weights.iter().sum();
        weights.iter().map(|w| w / total).collect()
    }

    fn block_count_law(&mut self, n: usize) -> &[f64] {
        if !self.block_count_laws.contains_key(&n) {
            let mut cumulative = self.block_count_probabilities(n);
            let mut acc = 0.;
            for p in cumulative.iter_mut() {
                acc += *p;
                *p = acc;
            }
            self.block_count_laws.insert(n, cumulative);
        }
        self.block_count_laws
            .get(&n)
            .map(|law| law.as_slice())
            .unwrap_or(&[])
    }

    /// Draw the number of blocks `K` for `n >= 1` clusters.
    pub fn sample_block_count<R: Rng + ?Sized>(&mut self, n: usize, rng: &mut R) -> usize {
        if n <= 1 {
            return n;
        }
        let u: f64 = rng.gen();
        let law = self.block_count_law(n);
        // Rounding can leave the last cumulative value a hair below 1.
        law.partition_point(|c| *c <= u).min(law.len() - 1) + 1
    }

    /**
    Draw a regrouping of `n` clusters. With at most one cluster there is
    nothing to draw and `rng` is left untouched.

    ```rust
    # use model::partition_sampler::PartitionSampler;
    # use rand::SeedableRng;
    let mut sampler = PartitionSampler::new();
    let mut rng = rand::rngs::StdRng::seed_from_u64(1);
    let rgs = sampler.sample(6, &mut rng);
    assert_eq!(rgs.len(), 6);
    assert_eq!(rgs.as_slice()[0], 0);
    ```
     */
    pub fn sample<R: Rng + ?Sized>(&mut self, n: usize, rng: &mut R) -> RestrictedGrowthString {
        if n <= 1 {
            return RestrictedGrowthString::single_block(n);
        }
        let k = self.sample_block_count(n, rng);
        let assignment: Vec<usize> = (0..n).map(|_| rng.gen_range(0..k)).collect();
        RestrictedGrowthString::canonical(&assignment)
    }

    /// Number of cluster counts whose law has been built.
    pub fn memoized(&self) -> usize {
        self.block_count_laws.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::rngs::StdRng;
    use rand::{RngCore, SeedableRng};

    #[test]
    fn stirling_and_bell_numbers() {
        let mut table = StirlingTable::default();
        assert_abs_diff_eq!(table.ln_stirling(5, 2).exp(), 15., epsilon = 1e-9);
        assert_abs_diff_eq!(table.ln_stirling(4, 4).exp(), 1., epsilon = 1e-12);
        assert_eq!(table.ln_stirling(4, 0), f64::NEG_INFINITY);
        assert_abs_diff_eq!(table.ln_bell(0).exp(), 1., epsilon = 1e-12);
        assert_abs_diff_eq!(table.ln_bell(5).exp(), 52., epsilon = 1e-9);
        assert_abs_diff_eq!(table.ln_bell(10).exp(), 115_975., epsilon = 1e-6);
        // Far beyond what fits in an integer.
        assert!(table.ln_bell(300).is_finite());
    }

    #[test]
    fn block_count_law() {
        let mut sampler = PartitionSampler::new();
        // k^3 / k! for k = 1, 2, 3 is 1, 4, 4.5.
        let p = sampler.block_count_probabilities(3);
        assert_abs_diff_eq!(p[0], 1. / 9.5, epsilon = 1e-12);
        assert_abs_diff_eq!(p[1], 4. / 9.5, epsilon = 1e-12);
        assert_abs_diff_eq!(p[2], 4.5 / 9.5, epsilon = 1e-12);

        let mut rng = StdRng::seed_from_u64(8);
        let draws = 20_000;
        let mut counts = [0_usize; 3];
        for _ in 0..draws {
            counts[sampler.sample_block_count(3, &mut rng) - 1] += 1;
        }
        for k in 0..3 {
            assert_abs_diff_eq!(counts[k] as f64 / draws as f64, p[k], epsilon = 0.02);
        }
        assert_eq!(sampler.memoized(), 1);

        let large = sampler.block_count_probabilities(500);
        assert_abs_diff_eq!(large.iter().sum::<f64>(), 1., epsilon = 1e-9);
        assert!(large.iter().all(|p| p.is_finite()));
    }

    #[test]
    fn one_cluster_needs_no_randomness() {
        let mut sampler = PartitionSampler::new();
        let mut rng = StdRng::seed_from_u64(5);
        let mut untouched = rng.clone();
        for _ in 0..10 {
            assert_eq!(
                sampler.sample(1, &mut rng),
                RestrictedGrowthString::single_block(1)
            );
        }
        assert_eq!(rng.next_u64(), untouched.next_u64());
        assert_eq!(sampler.memoized(), 0);
    }

    #[test]
    fn samples_are_restricted_growth_strings() {
        let mut sampler = PartitionSampler::new();
        let mut rng = StdRng::seed_from_u64(13);
        for n in 2..30 {
            for _ in 0..20 {
                let rgs = sampler.sample(n, &mut rng);
                assert_eq!(rgs.len(), n);
                let mut next = 0;
                for b in rgs.as_slice() {
                    assert!(*b <= next);
                    if *b == next {
                        next += 1;
                    }
                }
                assert_eq!(rgs.n_blocks(), next);
            }
        }
    }
}
