/*!
Random merging of elements of a collection.

These are the building blocks of coalescence: the caller decides what an
element is (a lineage, a tree, a plain number) and how a child is attached to
its parent; the functions only decide, at random, who merges with whom. Both
work in place on a slice and return the new logical length: the elements that
survive the merge are `items[..returned]`, what lies behind is garbage.
*/

use rand::seq::SliceRandom;
use rand::Rng;
use rustc_hash::FxHashMap;

use crate::Population;

/**
How many parents received how many of the lineages in one generation.

`spectrum[j]` is the number of parents with exactly `j` children among the
lineages considered: entry 0 counts parents without any of them, entry 1 the
parents of a single lineage, and only entries `j >= 2` are merge events.
*/
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OccupancySpectrum {
    counts: Vec<usize>,
}

impl OccupancySpectrum {
    pub fn from_counts(counts: Vec<usize>) -> Self {
        OccupancySpectrum { counts }
    }

    /**
    Let each of `lineages` lineages pick its parent uniformly among `parents`
    individuals, and count the coincidences. This is the Wright-Fisher
    assumption: parents are exchangeable and every child picks independently.
    */
    pub fn sample<R: Rng + ?Sized>(lineages: usize, parents: Population, rng: &mut R) -> Self {
        if parents == 0 || lineages == 0 {
            return OccupancySpectrum::default();
        }
        let mut children_per_parent: FxHashMap<Population, usize> = FxHashMap::default();
        for _ in 0..lineages {
            *children_per_parent
                .entry(rng.gen_range(0..parents))
                .or_insert(0) += 1;
        }
        let mut counts = vec![0; 2];
        for children in children_per_parent.values() {
            if *children >= counts.len() {
                counts.resize(children + 1, 0);
            }
            counts[*children] += 1;
        }
        counts[0] = parents as usize - children_per_parent.len();
        OccupancySpectrum { counts }
    }

    /// Number of parents with exactly `j` children.
    pub fn get(&self, j: usize) -> usize {
        self.counts.get(j).copied().unwrap_or(0)
    }

    /// All lineages distributed over parents, `sum(j * spectrum[j])`.
    pub fn lineages(&self) -> usize {
        self.counts.iter().enumerate().map(|(j, m)| j * m).sum()
    }

    /// Parents that have at least one child, i.e. lineages left after the
    /// generation.
    pub fn parents(&self) -> usize {
        self.counts.iter().skip(1).sum()
    }

    /// Number of merge events (parents of two or more children).
    pub fn mergers(&self) -> usize {
        self.counts.iter().skip(2).sum()
    }

    /// Lineages that disappear by merging.
    pub fn coalesced(&self) -> usize {
        self.groups().map(|(j, m)| (j - 1) * m).sum()
    }

    /// The `(j, spectrum[j])` pairs for `j >= 2` with at least one parent.
    pub fn groups(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.counts
            .iter()
            .enumerate()
            .skip(2)
            .filter(|(_, m)| **m > 0)
            .map(|(j, m)| (j, *m))
    }

    /// Exactly one pair of lineages merges, everything else stays apart.
    pub fn is_single_pair(&self) -> bool {
        self.get(2) == 1 && self.mergers() == 1
    }
}

/**
Merge two randomly chosen elements.

The slice is shuffled, then the last element is attached to a parent
initialized with `init` and the second-to-last is attached to the result,
which replaces the second-to-last. Returns the new length, one less than
before. Slices with fewer than two elements are left alone.

```rust
# use model::merge::binary_merge;
# use rand::SeedableRng;
let mut rng = rand::rngs::StdRng::seed_from_u64(0);
let mut nodes = vec![1, 1, 1, 1];
let last = binary_merge(&mut nodes, 0, |a, b| a + b, &mut rng);
assert_eq!(last, 3);
let mut survivors = nodes[..last].to_vec();
survivors.sort();
assert_eq!(survivors, vec![1, 1, 2]);
```
 */
pub fn binary_merge<T, F, R>(items: &mut [T], init: T, mut op: F, rng: &mut R) -> usize
where
    F: FnMut(&T, &T) -> T,
    R: Rng + ?Sized,
{
    if items.len() < 2 {
        return items.len();
    }
    items.shuffle(rng);
    let last = items.len() - 1;
    let parent = op(&init, &items[last]);
    items[last - 1] = op(&parent, &items[last - 1]);
    last
}

/**
Merge randomly chosen elements according to an occupancy spectrum.

The slice is shuffled once. Then, for every group size `j >= 2` and for each
of the `spectrum[j]` parents, the element at the front becomes the first child
of a new parent (initialized with `init`), `j - 1` elements are taken from the
back and attached to it, and the parent is written into the front slot. The
surviving elements are the parents in the order they were formed, followed by
the elements that did not take part in any merge.

# Panics

If the spectrum holds more merging lineages than the slice has elements.
 */
pub fn simultaneous_multiple_merge<T, F, R>(
    items: &mut [T],
    init: T,
    spectrum: &OccupancySpectrum,
    mut op: F,
    rng: &mut R,
) -> usize
where
    F: FnMut(&T, &T) -> T,
    R: Rng + ?Sized,
{
    let merging: usize = spectrum.groups().map(|(j, m)| j * m).sum();
    assert!(
        merging <= items.len(),
        "spectrum merges {} elements, only {} available",
        merging,
        items.len()
    );
    items.shuffle(rng);

    let mut first = 0;
    let mut last = items.len();
    for (j, parents) in spectrum.groups() {
        for _ in 0..parents {
            let mut parent = op(&init, &items[first]);
            for _ in 1..j {
                last -= 1;
                parent = op(&parent, &items[last]);
            }
            items[first] = parent;
            first += 1;
        }
    }
    last
}
