//! Poll-until-stable completion detection

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::debug;

/// Polling budget and stability requirement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollPolicy {
    /// Wait before the first poll cycle (milliseconds)
    pub initial_delay_ms: u64,

    /// Wait before every poll (milliseconds)
    pub interval_ms: u64,

    /// Number of polls before giving up
    pub max_attempts: u32,

    /// Consecutive repeats of the same accepted value required; 0 accepts the first one
    pub stable_polls: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_delay_ms: 0,
            interval_ms: 2_000,
            max_attempts: 30,
            stable_polls: 1,
        }
    }
}

impl PollPolicy {
    pub fn budget(&self) -> Duration {
        Duration::from_millis(
            self.interval_ms
                .saturating_mul(u64::from(self.max_attempts))
                .saturating_add(self.initial_delay_ms),
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollOutcome<T> {
    Settled(T),
    Exhausted { last_seen: Option<T> },
}

/// Polls `extract` until it yields a value that passes `accept` and then stays identical for
/// `stable_polls` further polls, or until the attempt budget runs out.
pub async fn poll_until_stable<T, E, F, Fut, P>(
    policy: &PollPolicy,
    mut extract: F,
    accept: P,
) -> Result<PollOutcome<T>, E>
where
    T: Clone + PartialEq,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
    P: Fn(&T) -> bool,
{
    if policy.initial_delay_ms > 0 {
        sleep(Duration::from_millis(policy.initial_delay_ms)).await;
    }

    let interval = Duration::from_millis(policy.interval_ms);
    let mut last_seen: Option<T> = None;
    let mut repeats = 0u32;

    for attempt in 1..=policy.max_attempts {
        sleep(interval).await;

        let Some(current) = extract().await? else {
            repeats = 0;
            continue;
        };

        if accept(&current) {
            if policy.stable_polls == 0 {
                return Ok(PollOutcome::Settled(current));
            }
            if last_seen.as_ref() == Some(&current) {
                repeats += 1;
                if repeats >= policy.stable_polls {
                    debug!(attempt, "poll settled");
                    return Ok(PollOutcome::Settled(current));
                }
            } else {
                repeats = 0;
            }
        } else {
            repeats = 0;
        }
        last_seen = Some(current);
    }

    Ok(PollOutcome::Exhausted { last_seen })
}
