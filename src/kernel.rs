use std::collections::hash_map::Entry::{Occupied, Vacant};
use std::f64::consts::PI;

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use rustc_hash::FxHashMap;
use serde_derive::{Deserialize, Serialize};
use statrs::function::gamma::gamma;

use crate::error::ReplicateError;
use crate::geography::DistanceTable;
use crate::DemeId;

/**
The dispersal kernel gives the density of dispersing a distance `r` (in km)
away from the parent's deme. The kernel family is chosen per replicate, so it
is a plain enum carrying its own shape parameters.
*/
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family")]
pub enum DispersalKernel {
    /// Thin-tailed: `1/(π a²) exp(-r²/a²)`.
    Gaussian { a: f64 },
    /// Fat-tailed, with `b > 2`:
    /// `b / (2π a² Γ(2/b) Γ(1-2/b)) · 1/(1 + r^b/a^b)`.
    Logistic { a: f64, b: f64 },
}

impl DispersalKernel {
    /// Check the parameters are inside the domain where the density is
    /// defined and positive.
    pub fn validate(&self) -> Result<(), ReplicateError> {
        match *self {
            DispersalKernel::Gaussian { a } => {
                if !(a > 0. && a.is_finite()) {
                    return Err(ReplicateError::DomainViolation {
                        reason: format!("Gaussian kernel needs a > 0, got a = {}", a),
                    });
                }
            }
            DispersalKernel::Logistic { a, b } => {
                if !(a > 0. && a.is_finite()) {
                    return Err(ReplicateError::DomainViolation {
                        reason: format!("Logistic kernel needs a > 0, got a = {}", a),
                    });
                }
                if !(b > 2. && b.is_finite()) {
                    return Err(ReplicateError::DomainViolation {
                        reason: format!("Logistic kernel needs b > 2, got b = {}", b),
                    });
                }
            }
        }
        Ok(())
    }

    /**
    The density at distance `r`. Parameters are assumed to be validated.

    ```rust
    # use model::kernel::DispersalKernel;
    use std::f64::consts::PI;
    let k = DispersalKernel::Gaussian { a: 2. };
    assert!((k.pdf(0.) - 1. / (PI * 4.)).abs() < 1e-12);
    assert!(k.pdf(1.) > k.pdf(2.));
    ```
     */
    pub fn pdf(&self, r: f64) -> f64 {
        match *self {
            DispersalKernel::Gaussian { a } => 1. / (PI * a * a) * (-(r * r) / (a * a)).exp(),
            DispersalKernel::Logistic { a, b } => {
                let norm = b / (2. * PI * a * a * gamma(2. / b) * gamma(1. - 2. / b));
                norm / (1. + (r / a).powf(b))
            }
        }
    }
}

/**
The transition kernel of one replicate.

For each source deme, the probability of moving to any other deme is
proportional to the kernel density at their distance. Building that law needs
one density evaluation per deme, so it is only done for the demes that are
actually colonised, the first time one of their offspring disperses, and kept
for the rest of the replicate. A cache is tied to one parameter draw and must
not be reused for another one.
*/
pub struct TransitionKernelCache<'a> {
    kernel: DispersalKernel,
    distances: &'a DistanceTable,
    laws: FxHashMap<DemeId, WeightedIndex<f64>>,
}

impl<'a> TransitionKernelCache<'a> {
    pub fn new(
        kernel: DispersalKernel,
        distances: &'a DistanceTable,
    ) -> Result<Self, ReplicateError> {
        kernel.validate()?;
        Ok(TransitionKernelCache {
            kernel,
            distances,
            laws: FxHashMap::default(),
        })
    }

    pub fn kernel(&self) -> &DispersalKernel {
        &self.kernel
    }

    /// Unnormalized destination weights from `source`, in deme order.
    pub fn weights(&self, source: DemeId) -> Vec<f64> {
        compute_weights(&self.kernel, self.distances.from_deme(source))
    }

    pub fn distribution(&mut self, source: DemeId) -> Result<&WeightedIndex<f64>, ReplicateError> {
        match self.laws.entry(source) {
            Occupied(law) => Ok(&*law.into_mut()),
            Vacant(slot) => {
                let weights = compute_weights(&self.kernel, self.distances.from_deme(source));
                let law = WeightedIndex::new(&weights).map_err(|e| {
                    ReplicateError::DomainViolation {
                        reason: format!("no dispersal possible from deme {}: {}", source, e),
                    }
                })?;
                Ok(&*slot.insert(law))
            }
        }
    }

    /// Draw the destination of one migrant leaving `source`.
    pub fn sample<R: Rng + ?Sized>(
        &mut self,
        source: DemeId,
        rng: &mut R,
    ) -> Result<DemeId, ReplicateError> {
        Ok(self.distribution(source)?.sample(rng))
    }

    /// Number of source demes whose law has been built so far.
    pub fn cached(&self) -> usize {
        self.laws.len()
    }
}

fn compute_weights(kernel: &DispersalKernel, distances: &[f64]) -> Vec<f64> {
    distances.iter().map(|r| kernel.pdf(*r)).collect()
}
