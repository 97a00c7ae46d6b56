use crate::{DemeId, Population, Year};
use serde_derive::{Deserialize, Serialize};

/**
Everything that can go wrong inside one replicate of the model.

None of these is fatal for an inference run: the replicate is discarded and
the next parameter draw is simulated. The driver only learns the kind of
failure, through [`ReplicateError::kind`], to report how many draws were lost
to which cause.
*/
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReplicateError {
    #[error("dispersal kernel parameters out of domain: {reason}")]
    DomainViolation { reason: String },
    #[error("population went extinct at time {time}, before reaching the sampling time")]
    SimulationDeadEnd { time: Year },
    #[error("deme {deme} holds {present} individuals at sampling time, but {sampled} gene copies were sampled there")]
    UndersampledDeme {
        deme: DemeId,
        sampled: Population,
        present: Population,
    },
    #[error("{lineages} lineages in deme {deme} at time {time}, but no individual arrived there")]
    OrphanLineage {
        deme: DemeId,
        time: Year,
        lineages: usize,
    },
    #[error("{remaining} lineages did not coalesce before the introduction time")]
    UnresolvedCoalescence { remaining: usize },
    #[error("sampled deme {deme} has no lineage in any cluster")]
    DistanceUndefined { deme: DemeId },
}

/// The reason a replicate was discarded, without the details.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FailureKind {
    DomainViolation,
    SimulationDeadEnd,
    UndersampledDeme,
    OrphanLineage,
    UnresolvedCoalescence,
    DistanceUndefined,
}

impl ReplicateError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ReplicateError::DomainViolation { .. } => FailureKind::DomainViolation,
            ReplicateError::SimulationDeadEnd { .. } => FailureKind::SimulationDeadEnd,
            ReplicateError::UndersampledDeme { .. } => FailureKind::UndersampledDeme,
            ReplicateError::OrphanLineage { .. } => FailureKind::OrphanLineage,
            ReplicateError::UnresolvedCoalescence { .. } => FailureKind::UnresolvedCoalescence,
            ReplicateError::DistanceUndefined { .. } => FailureKind::DistanceUndefined,
        }
    }
}

/// Errors of the surrounding machinery: reading setups, validating priors,
/// storing results.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("could not access file: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not (de)serialize: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid prior: {reason}")]
    InvalidPrior { reason: String },
    #[error("invalid scenario: {reason}")]
    InvalidScenario { reason: String },
    #[error(transparent)]
    Replicate(#[from] ReplicateError),
}
