//! Human-like pacing delays.

use std::str::FromStr;
use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;

use super::StealthError;

/// Named aggressiveness profiles mapping to a [min,max] delay range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayProfile {
    Cautious,
    Normal,
    Aggressive,
}

impl FromStr for DelayProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cautious" => Ok(DelayProfile::Cautious),
            "normal" => Ok(DelayProfile::Normal),
            "aggressive" => Ok(DelayProfile::Aggressive),
            other => Err(format!("unknown delay profile {other:?}")),
        }
    }
}

/// Randomized jitter generator mimicking human browsing cadence.
#[derive(Debug, Clone, Copy)]
pub struct HumanDelay {
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl HumanDelay {
    pub fn new(profile: DelayProfile) -> Self {
        match profile {
            DelayProfile::Cautious => Self {
                min_delay: Duration::from_secs(2),
                max_delay: Duration::from_secs(5),
            },
            DelayProfile::Normal => Self {
                min_delay: Duration::from_millis(500),
                max_delay: Duration::from_secs(2),
            },
            DelayProfile::Aggressive => Self {
                min_delay: Duration::from_millis(200),
                max_delay: Duration::from_millis(800),
            },
        }
    }

    /// Random delay for a single request, uniform in [min, max].
    pub fn request_delay(&self) -> Duration {
        random_between(self.min_delay, self.max_delay)
    }

    /// Longer delay for between-page navigation, uniform in [max, 2*max].
    pub fn page_browse_delay(&self) -> Duration {
        random_between(self.max_delay, self.max_delay * 2)
    }

    /// Sleep for [`request_delay`](Self::request_delay), returning early with
    /// [`StealthError::Canceled`] if the token fires first.
    pub async fn wait(&self, cancel: &CancellationToken) -> Result<(), StealthError> {
        let d = self.request_delay();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(StealthError::Canceled),
            _ = tokio::time::sleep(d) => Ok(()),
        }
    }
}

fn random_between(min: Duration, max: Duration) -> Duration {
    if min >= max {
        return min;
    }
    min + Duration::from_nanos(rand::thread_rng().gen_range(0..(max - min).as_nanos() as u64))
}
