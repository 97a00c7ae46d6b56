use std::collections::BTreeMap;

use log::debug;
use rand::Rng;
use rand_distr::{Distribution, Poisson};

use crate::error::ReplicateError;
use crate::kernel::TransitionKernelCache;
use crate::parameters::KernelParams;
use crate::{DemeId, Population, Year};

/**
Local growth is saturating (Beverton-Holt): a deme of `N` individuals
produces on average

```text
g(N) = N (1 + r) / (1 + r N / k)
```

offspring for the next generation, which is close to `N (1 + r)` in a sparsely
populated deme and has its fixed point at the carrying capacity `k`.
*/
#[derive(Debug, Clone, Copy)]
pub struct LogisticGrowth {
    r: f64,
    k: f64,
}

impl LogisticGrowth {
    pub fn new(params: &KernelParams) -> Result<Self, ReplicateError> {
        if !(params.r >= 0. && params.r.is_finite()) {
            return Err(ReplicateError::DomainViolation {
                reason: format!("growth rate must be non-negative, got r = {}", params.r),
            });
        }
        if !(params.k > 0. && params.k.is_finite()) {
            return Err(ReplicateError::DomainViolation {
                reason: format!("carrying capacity must be positive, got k = {}", params.k),
            });
        }
        Ok(LogisticGrowth {
            r: params.r,
            k: params.k,
        })
    }

    /**
    ```rust
    # use model::demography::LogisticGrowth;
    # use model::parameters::KernelParams;
    let g = LogisticGrowth::new(&KernelParams { r: 10., k: 250., ..KernelParams::default() }).unwrap();
    assert!((g.expected(8) - 88. / 1.32).abs() < 1e-9);
    assert!((g.expected(250) - 250.).abs() < 1e-9);
    assert_eq!(g.expected(0), 0.);
    ```
     */
    pub fn expected(&self, n: Population) -> f64 {
        let n = f64::from(n);
        n * (1. + self.r) / (1. + self.r * n / self.k)
    }

    /// The realized number of offspring, Poisson distributed around
    /// [`expected`](Self::expected).
    pub fn sample<R: Rng + ?Sized>(
        &self,
        n: Population,
        rng: &mut R,
    ) -> Result<Population, ReplicateError> {
        let g = self.expected(n);
        if g <= 0. {
            return Ok(0);
        }
        let poisson = Poisson::new(g).map_err(|e| ReplicateError::DomainViolation {
            reason: format!("no offspring distribution with mean {}: {}", g, e),
        })?;
        let offspring: f64 = poisson.sample(rng);
        Ok(offspring as Population)
    }
}

/**
Migrants between demes during one generation. Offspring that stay in their
parent's deme are recorded as a flow from that deme to itself.
*/
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Flow {
    /// destination -> source -> number of migrants
    by_destination: BTreeMap<DemeId, BTreeMap<DemeId, Population>>,
}

impl Flow {
    pub fn add(&mut self, from: DemeId, to: DemeId, count: Population) {
        if count == 0 {
            return;
        }
        *self
            .by_destination
            .entry(to)
            .or_insert_with(BTreeMap::new)
            .entry(from)
            .or_insert(0) += count;
    }

    pub fn get(&self, from: DemeId, to: DemeId) -> Population {
        self.by_destination
            .get(&to)
            .and_then(|sources| sources.get(&from))
            .copied()
            .unwrap_or(0)
    }

    /// The demes the migrants into `to` came from, with their counts, in deme
    /// order.
    pub fn sources(&self, to: DemeId) -> Vec<(DemeId, Population)> {
        match self.by_destination.get(&to) {
            None => vec![],
            Some(sources) => sources.iter().map(|(y, n)| (*y, *n)).collect(),
        }
    }

    pub fn incoming(&self, to: DemeId) -> Population {
        self.by_destination
            .get(&to)
            .map(|sources| sources.values().sum())
            .unwrap_or(0)
    }

    pub fn outgoing(&self, from: DemeId) -> Population {
        self.by_destination
            .values()
            .filter_map(|sources| sources.get(&from))
            .sum()
    }

    /// All `(from, to, count)` triples, ordered by destination, then source.
    pub fn iter(&self) -> impl Iterator<Item = (DemeId, DemeId, Population)> + '_ {
        self.by_destination
            .iter()
            .flat_map(|(to, sources)| sources.iter().map(move |(from, n)| (*from, *to, *n)))
    }
}

/**
Population sizes of every deme at every time from the introduction to the
sampling time, and the flows between consecutive times. A history is created
by [`ForwardSimulator::simulate`] and only read afterwards.
*/
#[derive(Debug, Clone)]
pub struct DemographicHistory {
    start: Year,
    sizes: Vec<Vec<Population>>,
    flows: Vec<Flow>,
}

impl DemographicHistory {
    pub fn start(&self) -> Year {
        self.start
    }

    /// The last recorded time, the sampling time for a complete history.
    pub fn end(&self) -> Year {
        self.start + self.flows.len() as Year
    }

    pub fn size(&self, deme: DemeId, t: Year) -> Population {
        self.sizes_at(t)
            .and_then(|row| row.get(deme))
            .copied()
            .unwrap_or(0)
    }

    pub fn sizes_at(&self, t: Year) -> Option<&[Population]> {
        let i = t.checked_sub(self.start)? as usize;
        self.sizes.get(i).map(|row| row.as_slice())
    }

    pub fn total_size(&self, t: Year) -> Population {
        self.sizes_at(t).map(|row| row.iter().sum()).unwrap_or(0)
    }

    /// The migrations from generation `t` to generation `t + 1`.
    pub fn flow(&self, t: Year) -> Option<&Flow> {
        let i = t.checked_sub(self.start)? as usize;
        self.flows.get(i)
    }

    /// Refuse a history in which some deme holds fewer individuals at the
    /// sampling time than gene copies were sampled there.
    pub fn ensure_sampled(
        &self,
        sampled: &BTreeMap<DemeId, Population>,
    ) -> Result<(), ReplicateError> {
        let t = self.end();
        for (deme, copies) in sampled {
            let present = self.size(*deme, t);
            if present < *copies {
                return Err(ReplicateError::UndersampledDeme {
                    deme: *deme,
                    sampled: *copies,
                    present,
                });
            }
        }
        Ok(())
    }
}

/**
Forward in time, from the introduction of `n0` founders into deme `x0` at
time `t0`, every generation each populated deme produces offspring according
to the growth function and sends each of them to a destination drawn from
the transition kernel. Demes are visited in ascending order, so that a fixed
seed reproduces the same history.
*/
#[derive(Debug, Clone, Copy)]
pub struct ForwardSimulator {
    x0: DemeId,
    t0: Year,
    n0: Population,
    demes: usize,
}

impl ForwardSimulator {
    pub fn new(x0: DemeId, t0: Year, n0: Population, demes: usize) -> Self {
        ForwardSimulator { x0, t0, n0, demes }
    }

    pub fn simulate<R: Rng + ?Sized>(
        &self,
        growth: &LogisticGrowth,
        kernel: &mut TransitionKernelCache,
        sampling_time: Year,
        rng: &mut R,
    ) -> Result<DemographicHistory, ReplicateError> {
        if self.n0 == 0 || self.x0 >= self.demes {
            return Err(ReplicateError::SimulationDeadEnd { time: self.t0 });
        }
        let mut founders = vec![0; self.demes];
        founders[self.x0] = self.n0;

        let mut history = DemographicHistory {
            start: self.t0,
            sizes: vec![founders],
            flows: vec![],
        };
        let mut arrivals: Vec<Population> = vec![0; self.demes];

        for t in self.t0..sampling_time {
            let mut next = vec![0; self.demes];
            let mut flow = Flow::default();
            for (x, n) in history.sizes[history.sizes.len() - 1].iter().enumerate() {
                if *n == 0 {
                    continue;
                }
                let offspring = growth.sample(*n, rng)?;
                for _ in 0..offspring {
                    arrivals[kernel.sample(x, rng)?] += 1;
                }
                for (y, count) in arrivals.iter_mut().enumerate() {
                    if *count > 0 {
                        flow.add(x, y, *count);
                        next[y] += *count;
                        *count = 0;
                    }
                }
            }
            if next.iter().all(|n| *n == 0) {
                debug!("Population died out at t={}", t + 1);
                return Err(ReplicateError::SimulationDeadEnd { time: t + 1 });
            }
            history.sizes.push(next);
            history.flows.push(flow);
        }

        debug!(
            "Simulated {} generations, {} individuals at t={}, {} dispersal laws built",
            history.flows.len(),
            history.total_size(history.end()),
            history.end(),
            kernel.cached()
        );
        Ok(history)
    }
}
