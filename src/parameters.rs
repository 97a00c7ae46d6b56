use crate::coalescence::IntroductionPolicy;
use crate::error::Error;
use crate::geography::GeoCoord;
use crate::kernel::DispersalKernel;
use crate::{Population, Year};
use serde_derive::{Deserialize, Serialize};

/// The parameters of one draw from the prior. A replicate never changes them.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct KernelParams {
    /// Intrinsic growth rate.
    pub r: f64,
    /// Carrying capacity of a deme, in individuals.
    pub k: f64,
    /// Number of founders at the introduction point.
    pub n0: Population,
    pub kernel: DispersalKernel,
}

impl Default for KernelParams {
    fn default() -> KernelParams {
        KernelParams {
            r: 10.,
            k: 250.,
            n0: 8,
            kernel: DispersalKernel::Gaussian { a: 500. },
        }
    }
}

/// When and where the invasion started, and when the genetic samples were
/// taken. Shared by all replicates of an inference run.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Scenario {
    pub introduction_point: GeoCoord,
    pub introduction_time: Year,
    pub sampling_time: Year,
    #[serde(default)]
    pub introduction_policy: IntroductionPolicy,
}

impl Default for Scenario {
    fn default() -> Scenario {
        Scenario {
            // South-western France, where the first nest was found.
            introduction_point: GeoCoord::new(44.00, 0.20),
            introduction_time: 2004,
            sampling_time: 2008,
            introduction_policy: IntroductionPolicy::default(),
        }
    }
}

impl Scenario {
    pub fn validate(&self) -> Result<(), Error> {
        if self.sampling_time <= self.introduction_time {
            return Err(Error::InvalidScenario {
                reason: format!(
                    "sampling time {} is not after introduction time {}",
                    self.sampling_time, self.introduction_time
                ),
            });
        }
        Ok(())
    }

    /// Number of generations simulated forward.
    pub fn generations(&self) -> Year {
        self.sampling_time.saturating_sub(self.introduction_time)
    }
}
